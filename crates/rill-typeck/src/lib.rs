//! Type inference for Rill.
//!
//! Monomorphic Hindley-Milner-style inference with destructive
//! unification and no generalization: every binding gets exactly one
//! type for the whole compilation, so a function applied at two
//! different argument types fails to unify. Checking stops at the
//! first mismatch.

mod checker;
mod error;
mod result;
mod types;

pub use checker::check;
pub use error::{Note, TypeError};
pub use result::TypeInfo;
pub use types::{TypeArena, TypeId, TypeNode};

use std::collections::HashMap;

use la_arena::ArenaMap;
use rill_ast::{ExprId, SymbolId};

use crate::types::{TypeArena, TypeId};

/// Everything later passes need from type checking: the arena the
/// types live in plus per-expression and per-binding annotations.
#[derive(Debug)]
pub struct TypeInfo {
    pub types: TypeArena,
    /// Inferred type of every expression visited by the checker.
    pub expr_types: ArenaMap<ExprId, TypeId>,
    /// Type bound to every symbol: primitives, toplevels, params and
    /// let bindings.
    pub id_types: HashMap<SymbolId, TypeId>,
}

impl TypeInfo {
    /// Diagnostic rendering of an expression's type.
    pub fn render_expr(&self, id: ExprId) -> Option<String> {
        self.expr_types.get(id).map(|&ty| self.types.render(ty))
    }
}

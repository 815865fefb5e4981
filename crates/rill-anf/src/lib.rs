//! ANF-style intermediate representation for the Rill language.
//!
//! [`lower_module`] flattens a resolved, typechecked [`Module`] into an
//! [`AnfModule`]: one [`Definition`] per toplevel function, plus one per
//! lambda lifted out of a function body. A definition is a vector of
//! basic blocks whose instructions operate on the numeric ids handed
//! out during name resolution; compiler temporaries continue the same
//! id sequence, so parameters, let bindings, and temporaries share one
//! namespace.
//!
//! [`Module`]: rill_ast::Module

use std::fmt;

use rill_ast::SymbolId;
use smol_str::SmolStr;

mod dce;
mod gen;
mod verify;

pub use dce::eliminate_dead_code;
pub use gen::{lower_module, LowerResult, LowerWarning};
pub use verify::{verify_module, VerifyError};


// ── Instructions ──────────────────────────────────────────────────

/// Index of a basic block within its definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub usize);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Bind the incoming arguments to the parameter ids. Appears only
    /// as the first instruction of a definition's entry block.
    Receive { params: Vec<SymbolId> },
    /// Reserve frame space for the locals of the current function.
    AdjustStack,
    /// Load the value of a global binding into a local.
    LoadGlobal { name: SmolStr, dst: SymbolId },
    /// Load an integer constant. Booleans lower to 0 or 1, unit to 0.
    LoadConst { value: i64, dst: SymbolId },
    /// Call a function. A tail call has no destination; its result is
    /// the caller's result, so nothing follows it on its path.
    Call {
        target: CallTarget,
        args: Vec<SymbolId>,
        dst: Option<SymbolId>,
        tail: bool,
    },
    /// Copy one local into another.
    Alias { src: SymbolId, dst: SymbolId },
    /// Conditional transfer. `cond` holds 0 or 1.
    Branch {
        cond: SymbolId,
        then_block: BlockId,
        else_block: BlockId,
    },
    /// Return a value to the caller.
    Return { value: SymbolId },
    /// Unconditional transfer.
    Jump { target: BlockId },
    /// Store a local into a global binding.
    GlobalAssign { name: SmolStr, src: SymbolId },
}

/// What a call dispatches through: a first-class function value held
/// in a local, or a global binding known by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallTarget {
    Value(SymbolId),
    Global(SmolStr),
}

// ── Module ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub instrs: Vec<Instruction>,
}

#[derive(Debug, Clone, Default)]
pub struct Definition {
    pub name: SmolStr,
    /// Index 0 is the entry block.
    pub blocks: Vec<Block>,
    /// Toplevel definitions are globals; lifted lambdas are not.
    pub is_global: bool,
}

/// A lowered module: a flat list of function definitions.
#[derive(Debug, Clone, Default)]
pub struct AnfModule {
    pub defs: Vec<Definition>,
    /// First id past the globals. Ids at or above this are locals of
    /// whichever definition uses them.
    pub first_local: SymbolId,
}

// ── Printer ───────────────────────────────────────────────────────

/// Render a module in the flat text form `rill ir` emits.
///
/// Local ids print relative to `first_local`, so each definition's
/// parameters start near 0 no matter how many ids earlier passes
/// consumed.
pub fn print_anf(module: &AnfModule) -> String {
    let mut printer = Printer {
        module,
        buf: String::new(),
    };
    printer.print_module();
    printer.buf
}

struct Printer<'a> {
    module: &'a AnfModule,
    buf: String,
}

impl Printer<'_> {
    fn rel(&self, id: SymbolId) -> u32 {
        id.0 - self.module.first_local.0
    }

    fn print_module(&mut self) {
        for def in &self.module.defs {
            self.print_def(def);
        }
    }

    fn print_def(&mut self, def: &Definition) {
        if def.is_global {
            self.buf.push_str("<global> ");
        }
        self.buf.push_str(def.name.as_str());
        self.buf.push_str(":\n");
        for (index, block) in def.blocks.iter().enumerate() {
            self.buf.push_str(&format!(".L{index}:\n"));
            for instr in &block.instrs {
                self.print_instr(instr);
            }
        }
    }

    fn print_instr(&mut self, instr: &Instruction) {
        self.buf.push('\t');
        match instr {
            Instruction::Receive { params } => {
                if !params.is_empty() {
                    self.print_ids(params);
                    self.buf.push_str(" <- ");
                }
                self.buf.push_str("receive");
            }
            Instruction::AdjustStack => self.buf.push_str("adjust_stack"),
            Instruction::LoadGlobal { name, dst } => {
                let line = format!("{} <- global \"{name}\"", self.rel(*dst));
                self.buf.push_str(&line);
            }
            Instruction::LoadConst { value, dst } => {
                let line = format!("{} <- const {value}", self.rel(*dst));
                self.buf.push_str(&line);
            }
            Instruction::Call {
                target,
                args,
                dst,
                tail,
            } => {
                match (tail, dst) {
                    (true, _) => self.buf.push_str("tailcall "),
                    (false, Some(dst)) => {
                        let prefix = format!("{} <- call ", self.rel(*dst));
                        self.buf.push_str(&prefix);
                    }
                    (false, None) => self.buf.push_str("call "),
                }
                match target {
                    CallTarget::Value(id) => {
                        let id = self.rel(*id).to_string();
                        self.buf.push_str(&id);
                    }
                    CallTarget::Global(name) => {
                        self.buf.push_str(&format!("\"{name}\""));
                    }
                }
                self.buf.push('(');
                self.print_ids(args);
                self.buf.push(')');
            }
            Instruction::Alias { src, dst } => {
                let line = format!("{} <- alias {}", self.rel(*dst), self.rel(*src));
                self.buf.push_str(&line);
            }
            Instruction::Branch {
                cond,
                then_block,
                else_block,
            } => {
                let line = format!("if {}: {then_block} {else_block}", self.rel(*cond));
                self.buf.push_str(&line);
            }
            Instruction::Return { value } => {
                let line = format!("ret {}", self.rel(*value));
                self.buf.push_str(&line);
            }
            Instruction::Jump { target } => {
                self.buf.push_str(&format!("jmp {target}"));
            }
            Instruction::GlobalAssign { name, src } => {
                let line = format!("assign_global \"{name}\" <- {}", self.rel(*src));
                self.buf.push_str(&line);
            }
        }
        self.buf.push('\n');
    }

    fn print_ids(&mut self, ids: &[SymbolId]) {
        for (i, &id) in ids.iter().enumerate() {
            if i > 0 {
                self.buf.push_str(", ");
            }
            let id = self.rel(id).to_string();
            self.buf.push_str(&id);
        }
    }
}

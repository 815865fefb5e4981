//! Lowering from the resolved syntax tree to basic blocks.
//!
//! Functions are processed off a work queue: every toplevel whose value
//! is a lambda is enqueued up front, and lambdas found inside a body
//! are appended as they are encountered, so nested functions come out
//! after the function that contains them. Each function lowers to a
//! prologue (`receive`, `adjust_stack`) followed by its body, with the
//! body expression in tail position.

use std::collections::HashMap;
use std::fmt;
use std::mem;

use rill_ast::{ExprId, ExprKind, Literal, Module, Span, SymbolId};
use rill_resolve::SymbolTable;
use smol_str::SmolStr;

use crate::{AnfModule, Block, BlockId, CallTarget, Definition, Instruction};

// ── Results ───────────────────────────────────────────────────────

/// A toplevel the generator skipped, with why.
#[derive(Debug, Clone)]
pub struct LowerWarning {
    pub message: String,
    pub span: Span,
}

impl fmt::Display for LowerWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}:{}] {}",
            self.span.start, self.span.end, self.message
        )
    }
}

/// The lowered module together with how often each local id is read.
///
/// The counts drive [`eliminate_dead_code`]: an instruction that only
/// materializes a value nobody reads can be dropped.
///
/// [`eliminate_dead_code`]: crate::eliminate_dead_code
#[derive(Debug)]
pub struct LowerResult {
    pub module: AnfModule,
    pub ref_counts: HashMap<SymbolId, u32>,
    pub warnings: Vec<LowerWarning>,
}

// ── Entry point ───────────────────────────────────────────────────

pub fn lower_module(module: &Module, table: &SymbolTable) -> LowerResult {
    let mut gen = Generator {
        module,
        next_id: table.next_id(),
        first_local: table.first_local_id(),
        infos: HashMap::new(),
        queue: Vec::new(),
        defs: Vec::new(),
        current: Definition::default(),
        block: 0,
        tail: true,
        warnings: Vec::new(),
    };

    for decl in &module.decls {
        let Some(value) = decl.value else { continue };
        match &module.exprs[value].kind {
            ExprKind::Lambda { params, body } => gen.queue.push(QueuedFn {
                name: decl.name.clone(),
                params: params.iter().map(|p| p.id).collect(),
                body: *body,
                is_global: true,
            }),
            _ => gen.warnings.push(LowerWarning {
                message: format!("no code generated for \"{}\": not a function", decl.name),
                span: decl.name_span,
            }),
        }
    }
    gen.run();

    LowerResult {
        module: AnfModule {
            defs: gen.defs,
            first_local: gen.first_local,
        },
        ref_counts: gen
            .infos
            .into_iter()
            .map(|(id, info)| (id, info.ref_count))
            .collect(),
        warnings: gen.warnings,
    }
}

// ── Generator ─────────────────────────────────────────────────────

/// A function waiting to be lowered.
#[derive(Debug, Clone)]
struct QueuedFn {
    name: SmolStr,
    params: Vec<SymbolId>,
    body: ExprId,
    is_global: bool,
}

/// Per-id bookkeeping while a module lowers.
#[derive(Debug, Default)]
struct LocalInfo {
    /// How many instructions read the id.
    ref_count: u32,
    /// Set when the id is a freshly loaded global; calls through such
    /// an id dispatch by name instead, leaving the load unread.
    rewritable: Option<SmolStr>,
}

struct Generator<'a> {
    module: &'a Module,
    /// Continues the id sequence of name resolution.
    next_id: u32,
    first_local: SymbolId,
    infos: HashMap<SymbolId, LocalInfo>,
    queue: Vec<QueuedFn>,
    defs: Vec<Definition>,
    current: Definition,
    /// Index of the block instructions are appended to.
    block: usize,
    /// Whether the expression being lowered is the last thing the
    /// current function does.
    tail: bool,
    warnings: Vec<LowerWarning>,
}

impl Generator<'_> {
    fn run(&mut self) {
        let mut index = 0;
        while index < self.queue.len() {
            let item = self.queue[index].clone();
            index += 1;

            self.current = Definition {
                name: item.name,
                blocks: vec![Block::default()],
                is_global: item.is_global,
            };
            self.block = 0;
            self.emit(Instruction::Receive {
                params: item.params,
            });
            self.emit(Instruction::AdjustStack);
            self.tail = true;
            self.lower_expr(item.body);

            let finished = mem::take(&mut self.current);
            self.defs.push(finished);
        }
    }

    fn fresh(&mut self) -> SymbolId {
        let id = SymbolId(self.next_id);
        self.next_id += 1;
        id
    }

    fn is_local(&self, id: SymbolId) -> bool {
        id >= self.first_local
    }

    fn bump(&mut self, id: SymbolId) {
        self.infos.entry(id).or_default().ref_count += 1;
    }

    /// Append to the current block, counting every id the instruction
    /// reads. All instructions go through here so the counts stay in
    /// step with the emitted code.
    fn emit(&mut self, instr: Instruction) {
        match &instr {
            Instruction::Receive { .. }
            | Instruction::AdjustStack
            | Instruction::LoadGlobal { .. }
            | Instruction::LoadConst { .. }
            | Instruction::Jump { .. } => {}
            Instruction::Call { target, args, .. } => {
                if let CallTarget::Value(id) = target {
                    self.bump(*id);
                }
                for &arg in args {
                    self.bump(arg);
                }
            }
            Instruction::Alias { src, .. } => self.bump(*src),
            Instruction::Branch { cond, .. } => self.bump(*cond),
            Instruction::Return { value } => self.bump(*value),
            Instruction::GlobalAssign { src, .. } => self.bump(*src),
        }
        self.current.blocks[self.block].instrs.push(instr);
    }

    // ── Expressions ───────────────────────────────────────────────

    /// Lower one expression, returning the id holding its value. In
    /// tail position the value is returned to the caller instead and
    /// the result id is not meant to be read.
    fn lower_expr(&mut self, id: ExprId) -> SymbolId {
        let module = self.module;
        match &module.exprs[id].kind {
            ExprKind::Lit(lit) => {
                let value = match lit {
                    Literal::Int(n) => *n,
                    Literal::Bool(b) => *b as i64,
                    Literal::Unit => 0,
                };
                self.lower_const(value)
            }
            ExprKind::Var { name, id: sym } => {
                if self.is_local(*sym) {
                    if self.tail {
                        self.emit(Instruction::Return { value: *sym });
                    }
                    *sym
                } else {
                    self.lower_global(name.clone())
                }
            }
            ExprKind::Apply { func, args } => {
                let tail = mem::replace(&mut self.tail, false);
                let callee = self.lower_expr(*func);
                let arg_ids: Vec<_> = args.iter().map(|&arg| self.lower_expr(arg)).collect();
                self.tail = tail;

                let dst = if tail { None } else { Some(self.fresh()) };
                let target = match self
                    .infos
                    .get(&callee)
                    .and_then(|info| info.rewritable.clone())
                {
                    Some(name) => CallTarget::Global(name),
                    None => CallTarget::Value(callee),
                };
                self.emit(Instruction::Call {
                    target,
                    args: arg_ids,
                    dst,
                    tail,
                });
                dst.unwrap_or(SymbolId::UNBOUND)
            }
            ExprKind::Lambda { params, body } => {
                let dst = self.fresh();
                let name = SmolStr::from(format!("fun{}", dst.0));
                self.queue.push(QueuedFn {
                    name: name.clone(),
                    params: params.iter().map(|p| p.id).collect(),
                    body: *body,
                    is_global: false,
                });
                self.infos.entry(dst).or_default().rewritable = Some(name.clone());
                self.emit(Instruction::LoadGlobal { name, dst });
                if self.tail {
                    self.emit(Instruction::Return { value: dst });
                }
                dst
            }
            ExprKind::Let { bindings, body, .. } => {
                let tail = mem::replace(&mut self.tail, false);
                for binding in bindings {
                    let value = self.lower_expr(binding.value);
                    self.emit(Instruction::Alias {
                        src: value,
                        dst: binding.id,
                    });
                }
                self.lower_body(body, tail)
            }
            ExprKind::Begin { body } => {
                let tail = mem::replace(&mut self.tail, false);
                self.lower_body(body, tail)
            }
            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let tail = mem::replace(&mut self.tail, false);
                let cond = self.lower_expr(*condition);
                self.tail = tail;

                let branch_block = self.block;
                let first_new = self.current.blocks.len();
                let (then_block, else_block, cont) = if tail {
                    self.current.blocks.push(Block::default());
                    self.current.blocks.push(Block::default());
                    (first_new, first_new + 1, None)
                } else {
                    self.current.blocks.push(Block::default());
                    self.current.blocks.push(Block::default());
                    self.current.blocks.push(Block::default());
                    (first_new + 1, first_new + 2, Some((first_new, self.fresh())))
                };

                self.block = branch_block;
                self.emit(Instruction::Branch {
                    cond,
                    then_block: BlockId(then_block),
                    else_block: BlockId(else_block),
                });

                self.lower_branch(then_block, *then_branch, cont);
                self.lower_branch(else_block, *else_branch, cont);

                match cont {
                    Some((cont_block, result)) => {
                        self.block = cont_block;
                        result
                    }
                    // Both branches returned; there is no join value.
                    None => SymbolId::UNBOUND,
                }
            }
        }
    }

    /// Lower a `let` or `begin` body: every expression but the last
    /// runs for effect only, the last carries the body's value and the
    /// surrounding tail position. An empty body yields unit.
    fn lower_body(&mut self, body: &[ExprId], tail: bool) -> SymbolId {
        match body.split_last() {
            Some((last, rest)) => {
                for &expr in rest {
                    self.lower_expr(expr);
                }
                self.tail = tail;
                self.lower_expr(*last)
            }
            None => {
                self.tail = tail;
                self.lower_const(0)
            }
        }
    }

    /// Fill one arm of a conditional. The arm starts on a fresh frame
    /// boundary; a non-tail arm funnels its value into the shared
    /// result id and jumps to the continuation block.
    fn lower_branch(&mut self, block: usize, expr: ExprId, cont: Option<(usize, SymbolId)>) {
        self.block = block;
        self.emit(Instruction::AdjustStack);
        let value = self.lower_expr(expr);
        if let Some((cont_block, result)) = cont {
            self.emit(Instruction::Alias {
                src: value,
                dst: result,
            });
            self.emit(Instruction::Jump {
                target: BlockId(cont_block),
            });
        }
    }

    fn lower_const(&mut self, value: i64) -> SymbolId {
        let dst = self.fresh();
        self.emit(Instruction::LoadConst { value, dst });
        if self.tail {
            self.emit(Instruction::Return { value: dst });
        }
        dst
    }

    fn lower_global(&mut self, name: SmolStr) -> SymbolId {
        let dst = self.fresh();
        self.infos.entry(dst).or_default().rewritable = Some(name.clone());
        self.emit(Instruction::LoadGlobal { name, dst });
        if self.tail {
            self.emit(Instruction::Return { value: dst });
        }
        dst
    }
}

//! Name resolution for Rill.
//!
//! Walks every toplevel value expression and replaces names with
//! numeric [`SymbolId`]s, in place. Primitives are registered first,
//! then every toplevel name (so definitions may refer to each other in
//! any order), then locals as scopes open. Resolution collects all
//! errors instead of stopping at the first one.

use std::fmt;

use rill_ast::{ExprId, ExprKind, Module, Span, SymbolId};
use smol_str::SmolStr;

mod primitives;
mod table;

pub use primitives::{PrimType, PRIMITIVES};
pub use table::{Scope, SymbolTable};

// ── Errors ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ResolveError {
    pub message: String,
    pub span: Span,
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}:{}] {}",
            self.span.start, self.span.end, self.message
        )
    }
}

// ── Entry point ───────────────────────────────────────────────────

/// What resolution hands to the next pass: the finished table plus any
/// diagnostics. The module itself is updated in place.
#[derive(Debug)]
pub struct ResolveResult {
    pub table: SymbolTable,
    pub errors: Vec<ResolveError>,
}

pub fn resolve(module: &mut Module) -> ResolveResult {
    let mut resolver = Resolver {
        table: SymbolTable::new(),
        fn_floors: Vec::new(),
        errors: Vec::new(),
    };
    resolver.register_primitives();
    resolver.register_toplevels(module);
    resolver.resolve_toplevels(module);
    ResolveResult {
        table: resolver.table,
        errors: resolver.errors,
    }
}

// ── Resolver ──────────────────────────────────────────────────────

struct Resolver {
    table: SymbolTable,
    /// First id minted inside each enclosing function body, innermost
    /// last. A local id below the top of this stack was bound outside
    /// the current function.
    fn_floors: Vec<u32>,
    errors: Vec<ResolveError>,
}

impl Resolver {
    fn register_primitives(&mut self) {
        for (name, _) in PRIMITIVES {
            self.table.register_primitive(SmolStr::from(*name));
        }
    }

    fn register_toplevels(&mut self, module: &mut Module) {
        self.table.start_globals();
        for decl in &mut module.decls {
            decl.id = self.table.register_global(decl.name.clone());
        }
        self.table.start_locals();
    }

    fn resolve_toplevels(&mut self, module: &mut Module) {
        for index in 0..module.decls.len() {
            let Some(value) = module.decls[index].value else {
                continue;
            };
            self.fn_floors.push(self.table.next_id());
            self.resolve_expr(module, value);
            self.fn_floors.pop();
        }
    }

    fn resolve_expr(&mut self, module: &mut Module, id: ExprId) {
        let kind = module.exprs[id].kind.clone();
        match kind {
            ExprKind::Lit(_) => {}
            ExprKind::Var { name, .. } => {
                let span = module.exprs[id].span;
                match self.table.lookup(&name) {
                    Some(sym) => {
                        self.check_capture(&name, sym, span);
                        if let ExprKind::Var { id: slot, .. } = &mut module.exprs[id].kind {
                            *slot = sym;
                        }
                    }
                    None => {
                        self.error(format!("No binding \"{}\" in scope", name), span);
                    }
                }
            }
            ExprKind::Apply { func, args } => {
                self.resolve_expr(module, func);
                for arg in args {
                    self.resolve_expr(module, arg);
                }
            }
            ExprKind::Lambda { params, body } => {
                // The floor opens before the parameters so the params
                // themselves count as inside the function.
                self.fn_floors.push(self.table.next_id());
                let mut scope = Scope::new();
                let ids: Vec<_> = params
                    .iter()
                    .map(|p| self.table.register_local(p.name.clone(), &mut scope))
                    .collect();
                if let ExprKind::Lambda { params, .. } = &mut module.exprs[id].kind {
                    for (param, sym) in params.iter_mut().zip(&ids) {
                        param.id = *sym;
                    }
                }
                self.resolve_expr(module, body);
                self.table.pop_scope(scope);
                self.fn_floors.pop();
            }
            ExprKind::Let {
                recursive,
                bindings,
                body,
            } => {
                let mut scope = Scope::new();
                if recursive {
                    // Register the whole group first so every binding
                    // value sees every sibling.
                    let ids: Vec<_> = bindings
                        .iter()
                        .map(|b| self.table.register_local(b.name.clone(), &mut scope))
                        .collect();
                    if let ExprKind::Let { bindings, .. } = &mut module.exprs[id].kind {
                        for (binding, sym) in bindings.iter_mut().zip(&ids) {
                            binding.id = *sym;
                        }
                    }
                    for binding in &bindings {
                        self.resolve_expr(module, binding.value);
                    }
                } else {
                    // Binding values resolve in the enclosing scope and
                    // do not see their siblings.
                    for binding in &bindings {
                        self.resolve_expr(module, binding.value);
                    }
                    let ids: Vec<_> = bindings
                        .iter()
                        .map(|b| self.table.register_local(b.name.clone(), &mut scope))
                        .collect();
                    if let ExprKind::Let { bindings, .. } = &mut module.exprs[id].kind {
                        for (binding, sym) in bindings.iter_mut().zip(&ids) {
                            binding.id = *sym;
                        }
                    }
                }
                for expr in body {
                    self.resolve_expr(module, expr);
                }
                self.table.pop_scope(scope);
            }
            ExprKind::Begin { body } => {
                for expr in body {
                    self.resolve_expr(module, expr);
                }
            }
            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(module, condition);
                self.resolve_expr(module, then_branch);
                self.resolve_expr(module, else_branch);
            }
        }
    }

    /// Locals bound outside the current function cannot be referenced
    /// inside it; there is no closure environment to carry them.
    fn check_capture(&mut self, name: &str, sym: SymbolId, span: Span) {
        let floor = *self.fn_floors.last().unwrap();
        if self.table.is_local(sym) && sym.0 < floor {
            self.error(
                format!("binding \"{}\" is local to an enclosing function", name),
                span,
            );
        }
    }

    fn error(&mut self, message: impl Into<String>, span: Span) {
        self.errors.push(ResolveError {
            message: message.into(),
            span,
        });
    }
}

#[cfg(test)]
mod tests;

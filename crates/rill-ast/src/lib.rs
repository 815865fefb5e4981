//! Syntax tree for the Rill language.
//!
//! Expressions and type expressions live in arenas owned by the
//! [`Module`]; nodes reference each other by arena index. Name
//! resolution fills in the [`SymbolId`] slots in place, so the same
//! tree flows through every pass.

use std::fmt;

use la_arena::{Arena, Idx};
use smol_str::SmolStr;
pub use rill_lexer::Span;

// ── Symbol ids ────────────────────────────────────────────────────

/// Numeric identity assigned to every binding by name resolution.
///
/// Ids are unique within a module and ordered by registration:
/// primitives come first, then toplevel globals, then locals. Id 0 is
/// the unbound sentinel that every node starts out with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolId(pub u32);

impl SymbolId {
    pub const UNBOUND: SymbolId = SymbolId(0);

    pub fn is_unbound(self) -> bool {
        self == SymbolId::UNBOUND
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── ID types ──────────────────────────────────────────────────────

pub type ExprId = Idx<Expr>;
pub type TypeExprId = Idx<TypeExpr>;

// ── Module ────────────────────────────────────────────────────────

/// A parsed source file: toplevel declarations plus the arenas their
/// expressions live in.
#[derive(Debug, Clone)]
pub struct Module {
    pub decls: Vec<Toplevel>,
    pub exprs: Arena<Expr>,
    pub type_exprs: Arena<TypeExpr>,
}

impl Module {
    pub fn new() -> Self {
        Self {
            decls: Vec::new(),
            exprs: Arena::new(),
            type_exprs: Arena::new(),
        }
    }
}

impl Default for Module {
    fn default() -> Self {
        Self::new()
    }
}

// ── Toplevel declarations ─────────────────────────────────────────

/// One toplevel name. `(define name expr)` supplies the value,
/// `(declare name type)` supplies the declared type; the parser merges
/// both forms for the same name into a single declaration.
#[derive(Debug, Clone)]
pub struct Toplevel {
    pub name: SmolStr,
    pub name_span: Span,
    /// Filled in by resolution.
    pub id: SymbolId,
    pub declared_type: Option<TypeExprId>,
    pub value: Option<ExprId>,
    pub span: Span,
}

/// Lambda parameter.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: SmolStr,
    pub name_span: Span,
    /// Filled in by resolution.
    pub id: SymbolId,
}

/// A binding in a let expression: `(name value)`.
#[derive(Debug, Clone)]
pub struct LetBinding {
    pub name: SmolStr,
    pub name_span: Span,
    /// Filled in by resolution.
    pub id: SymbolId,
    pub value: ExprId,
    pub span: Span,
}

// ── Expressions ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    /// Literal value.
    Lit(Literal),
    /// Variable reference. `id` is filled in by resolution.
    Var { name: SmolStr, id: SymbolId },
    /// Application: `(f args...)`
    Apply { func: ExprId, args: Vec<ExprId> },
    /// Lambda: `(lambda (params...) body)`
    Lambda { params: Vec<Param>, body: ExprId },
    /// Let binding: `(let (bindings...) body...)`, optionally
    /// `(let rec ...)` making the bindings visible to each other.
    Let {
        recursive: bool,
        bindings: Vec<LetBinding>,
        body: Vec<ExprId>,
    },
    /// Sequencing: `(begin exprs...)`, value of the last.
    Begin { body: Vec<ExprId> },
    /// If expression: `(if cond then else)`
    If {
        condition: ExprId,
        then_branch: ExprId,
        else_branch: ExprId,
    },
}

/// Literal values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Int(i64),
    Bool(bool),
    Unit,
}

// ── Type expressions ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TypeExpr {
    pub kind: TypeExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum TypeExprKind {
    Int,
    Bool,
    Unit,
    /// Function type: `(-> params... result)`
    Fn {
        params: Vec<TypeExprId>,
        result: TypeExprId,
    },
}

// ── Pretty printer ────────────────────────────────────────────────

pub fn pretty_print(module: &Module) -> String {
    let mut printer = PrettyPrinter {
        module,
        buf: String::new(),
        indent: 0,
    };
    printer.print_module();
    printer.buf
}

struct PrettyPrinter<'a> {
    module: &'a Module,
    buf: String,
    indent: usize,
}

impl<'a> PrettyPrinter<'a> {
    fn write_indent(&mut self) {
        for _ in 0..self.indent {
            self.buf.push_str("  ");
        }
    }

    fn writeln(&mut self, s: &str) {
        self.write_indent();
        self.buf.push_str(s);
        self.buf.push('\n');
    }

    fn print_module(&mut self) {
        for decl in &self.module.decls {
            self.print_toplevel(decl);
        }
    }

    fn print_toplevel(&mut self, decl: &Toplevel) {
        match (decl.declared_type, decl.value) {
            (Some(ty), None) => {
                self.write_indent();
                self.buf.push_str(&format!("(declare {} ", decl.name));
                self.print_type_expr(ty);
                self.buf.push_str(")\n");
            }
            (declared, value) => {
                self.writeln(&format!("(define {}", decl.name));
                self.indent += 1;
                if let Some(ty) = declared {
                    self.write_indent();
                    self.buf.push_str("type: ");
                    self.print_type_expr(ty);
                    self.buf.push('\n');
                }
                if let Some(expr) = value {
                    self.write_indent();
                    self.buf.push_str("value: ");
                    self.print_expr(expr);
                    self.buf.push('\n');
                }
                self.indent -= 1;
                self.writeln(")");
            }
        }
    }

    fn print_expr(&mut self, id: ExprId) {
        let expr = &self.module.exprs[id];
        match &expr.kind {
            ExprKind::Lit(lit) => self.print_literal(lit),
            ExprKind::Var { name, .. } => self.buf.push_str(name),
            ExprKind::Apply { func, args } => {
                self.buf.push('(');
                self.print_expr(*func);
                for &arg in args {
                    self.buf.push(' ');
                    self.print_expr(arg);
                }
                self.buf.push(')');
            }
            ExprKind::Lambda { params, body } => {
                self.buf.push_str("(lambda (");
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        self.buf.push(' ');
                    }
                    self.buf.push_str(p.name.as_str());
                }
                self.buf.push_str(") ");
                self.print_expr(*body);
                self.buf.push(')');
            }
            ExprKind::Let {
                recursive,
                bindings,
                body,
            } => {
                self.buf.push_str(if *recursive { "(let rec (" } else { "(let (" });
                for (i, b) in bindings.iter().enumerate() {
                    if i > 0 {
                        self.buf.push(' ');
                    }
                    self.buf.push('(');
                    self.buf.push_str(b.name.as_str());
                    self.buf.push(' ');
                    self.print_expr(b.value);
                    self.buf.push(')');
                }
                self.buf.push(')');
                for &e in body {
                    self.buf.push(' ');
                    self.print_expr(e);
                }
                self.buf.push(')');
            }
            ExprKind::Begin { body } => {
                self.buf.push_str("(begin");
                for &e in body {
                    self.buf.push(' ');
                    self.print_expr(e);
                }
                self.buf.push(')');
            }
            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.buf.push_str("(if ");
                self.print_expr(*condition);
                self.buf.push(' ');
                self.print_expr(*then_branch);
                self.buf.push(' ');
                self.print_expr(*else_branch);
                self.buf.push(')');
            }
        }
    }

    fn print_literal(&mut self, lit: &Literal) {
        match lit {
            Literal::Int(n) => self.buf.push_str(&n.to_string()),
            Literal::Bool(b) => self.buf.push_str(if *b { "true" } else { "false" }),
            Literal::Unit => self.buf.push_str("<>"),
        }
    }

    fn print_type_expr(&mut self, id: TypeExprId) {
        let ty = &self.module.type_exprs[id];
        match &ty.kind {
            TypeExprKind::Int => self.buf.push_str("int"),
            TypeExprKind::Bool => self.buf.push_str("bool"),
            TypeExprKind::Unit => self.buf.push_str("unit"),
            TypeExprKind::Fn { params, result } => {
                self.buf.push_str("(->");
                for &p in params {
                    self.buf.push(' ');
                    self.print_type_expr(p);
                }
                self.buf.push(' ');
                self.print_type_expr(*result);
                self.buf.push(')');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> Span {
        Span::new(0, 0)
    }

    fn expr(module: &mut Module, kind: ExprKind) -> ExprId {
        module.exprs.alloc(Expr { kind, span: span() })
    }

    #[test]
    fn pretty_prints_a_definition() {
        let mut module = Module::new();
        let x = expr(
            &mut module,
            ExprKind::Var {
                name: SmolStr::from("x"),
                id: SymbolId::UNBOUND,
            },
        );
        let body = expr(
            &mut module,
            ExprKind::Lambda {
                params: vec![Param {
                    name: SmolStr::from("x"),
                    name_span: span(),
                    id: SymbolId::UNBOUND,
                }],
                body: x,
            },
        );
        module.decls.push(Toplevel {
            name: SmolStr::from("id"),
            name_span: span(),
            id: SymbolId::UNBOUND,
            declared_type: None,
            value: Some(body),
            span: span(),
        });

        let printed = pretty_print(&module);
        assert!(printed.contains("(define id"));
        assert!(printed.contains("value: (lambda (x) x)"));
    }

    #[test]
    fn pretty_prints_a_declaration() {
        let mut module = Module::new();
        let int = module.type_exprs.alloc(TypeExpr {
            kind: TypeExprKind::Int,
            span: span(),
        });
        let fn_ty = module.type_exprs.alloc(TypeExpr {
            kind: TypeExprKind::Fn {
                params: vec![int],
                result: int,
            },
            span: span(),
        });
        module.decls.push(Toplevel {
            name: SmolStr::from("inc"),
            name_span: span(),
            id: SymbolId::UNBOUND,
            declared_type: Some(fn_ty),
            value: None,
            span: span(),
        });

        assert_eq!(pretty_print(&module), "(declare inc (-> int int))\n");
    }

    #[test]
    fn pretty_prints_let_rec_and_if() {
        let mut module = Module::new();
        let one = expr(&mut module, ExprKind::Lit(Literal::Int(1)));
        let t = expr(&mut module, ExprKind::Lit(Literal::Bool(true)));
        let n = expr(
            &mut module,
            ExprKind::Var {
                name: SmolStr::from("n"),
                id: SymbolId::UNBOUND,
            },
        );
        let branch = expr(
            &mut module,
            ExprKind::If {
                condition: t,
                then_branch: n,
                else_branch: one,
            },
        );
        let let_expr = expr(
            &mut module,
            ExprKind::Let {
                recursive: true,
                bindings: vec![LetBinding {
                    name: SmolStr::from("n"),
                    name_span: span(),
                    id: SymbolId::UNBOUND,
                    value: one,
                    span: span(),
                }],
                body: vec![branch],
            },
        );
        module.decls.push(Toplevel {
            name: SmolStr::from("main"),
            name_span: span(),
            id: SymbolId::UNBOUND,
            declared_type: None,
            value: Some(let_expr),
            span: span(),
        });

        let printed = pretty_print(&module);
        assert!(printed.contains("(let rec ((n 1)) (if true n 1))"));
    }
}

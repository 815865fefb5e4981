//! Parser for the Rill language.
//!
//! Consumes the token list from `rill-lexer` and builds a
//! [`Module`]. Errors are collected rather than aborting the parse;
//! recovery skips to the close paren of the offending form so one
//! mistake produces one diagnostic.

use std::collections::HashMap;

use smol_str::SmolStr;
use rill_ast::*;
use rill_lexer::{lex, Span, Token};

#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.span.start, self.span.end, self.message)
    }
}

pub fn parse(source: &str) -> (Module, Vec<ParseError>) {
    let (tokens, lex_errors) = lex(source);
    let mut parser = Parser::new(tokens);
    let mut errors: Vec<ParseError> = lex_errors
        .into_iter()
        .map(|span| ParseError {
            message: "unexpected character".into(),
            span,
        })
        .collect();
    parser.parse_module();
    errors.append(&mut parser.errors);
    (parser.module, errors)
}

struct Parser {
    tokens: Vec<(Token, Span)>,
    pos: usize,
    module: Module,
    /// Declarations by name, so `define` and `declare` forms for the
    /// same name merge into one entry.
    decl_index: HashMap<SmolStr, usize>,
    errors: Vec<ParseError>,
}

impl Parser {
    fn new(tokens: Vec<(Token, Span)>) -> Self {
        Self {
            tokens,
            pos: 0,
            module: Module::new(),
            decl_index: HashMap::new(),
            errors: Vec::new(),
        }
    }

    // ── Token helpers ─────────────────────────────────────────────

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map(|(_, s)| *s)
            .unwrap_or_else(|| {
                self.tokens
                    .last()
                    .map(|(_, s)| Span::new(s.end, s.end))
                    .unwrap_or(Span::new(0, 0))
            })
    }

    fn advance(&mut self) -> (Token, Span) {
        let tok = self.tokens[self.pos].clone();
        self.pos += 1;
        tok
    }

    fn check(&self, expected: &Token) -> bool {
        self.peek() == Some(expected)
    }

    fn check_symbol(&self, name: &str) -> bool {
        matches!(self.peek(), Some(Token::Symbol(s)) if s.as_str() == name)
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_symbol(&mut self, name: &str) -> bool {
        if self.check_symbol(name) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Option<Span> {
        if self.check(expected) {
            let (_, span) = self.advance();
            Some(span)
        } else {
            let span = self.peek_span();
            self.error(
                format!("expected {:?}, found {:?}", expected, self.peek()),
                span,
            );
            None
        }
    }

    fn expect_symbol(&mut self) -> Option<(SmolStr, Span)> {
        if let Some(Token::Symbol(_)) = self.peek() {
            let (tok, span) = self.advance();
            if let Token::Symbol(s) = tok {
                return Some((s, span));
            }
        }
        let span = self.peek_span();
        self.error(format!("expected symbol, found {:?}", self.peek()), span);
        None
    }

    fn error(&mut self, message: String, span: Span) {
        self.errors.push(ParseError { message, span });
    }

    /// Skip tokens until we reach a `)` at depth 0, consuming it.
    fn recover_to_close_paren(&mut self) {
        let mut depth = 1;
        while !self.at_end() && depth > 0 {
            match self.peek() {
                Some(Token::LParen) => {
                    depth += 1;
                    self.advance();
                }
                Some(Token::RParen) => {
                    depth -= 1;
                    self.advance();
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    // ── Allocators ────────────────────────────────────────────────

    fn alloc_expr(&mut self, kind: ExprKind, span: Span) -> ExprId {
        self.module.exprs.alloc(Expr { kind, span })
    }

    fn alloc_type(&mut self, kind: TypeExprKind, span: Span) -> TypeExprId {
        self.module.type_exprs.alloc(TypeExpr { kind, span })
    }

    // ── Module parsing ────────────────────────────────────────────

    fn parse_module(&mut self) {
        while !self.at_end() {
            self.parse_toplevel();
        }
    }

    fn parse_toplevel(&mut self) {
        let start = self.peek_span();
        if !self.eat(&Token::LParen) {
            let span = self.peek_span();
            self.error("expected '(' to start a toplevel form".into(), span);
            self.advance();
            return;
        }

        if self.check_symbol("define") {
            self.advance();
            let _ = self.parse_define(start);
        } else if self.check_symbol("declare") {
            self.advance();
            let _ = self.parse_declare(start);
        } else {
            let span = self.peek_span();
            self.error(
                format!(
                    "expected toplevel form (define or declare), found {:?}",
                    self.peek()
                ),
                span,
            );
            self.recover_to_close_paren();
            return;
        }

        let end = self.peek_span();
        if !self.eat(&Token::RParen) {
            self.error("expected ')' to close toplevel form".into(), end);
            self.recover_to_close_paren();
        }
    }

    /// `(define name expr)`. Merges with an earlier `declare` for the
    /// same name; a second value for one name is an error.
    fn parse_define(&mut self, start: Span) -> Option<()> {
        let (name, name_span) = self.expect_symbol()?;
        let value = self.parse_expr()?;
        let end = self.peek_span();
        let span = start.merge(end);

        match self.decl_index.get(&name) {
            Some(&index) => {
                if self.module.decls[index].value.is_some() {
                    self.error(format!("Duplicate definition of \"{}\"", name), name_span);
                } else {
                    let decl = &mut self.module.decls[index];
                    decl.value = Some(value);
                    decl.span = decl.span.merge(span);
                }
            }
            None => {
                let index = self.module.decls.len();
                self.module.decls.push(Toplevel {
                    name: name.clone(),
                    name_span,
                    id: SymbolId::UNBOUND,
                    declared_type: None,
                    value: Some(value),
                    span,
                });
                self.decl_index.insert(name, index);
            }
        }
        Some(())
    }

    /// `(declare name type)`. Merges with the `define` for the same
    /// name; a second declared type for one name is an error.
    fn parse_declare(&mut self, start: Span) -> Option<()> {
        let (name, name_span) = self.expect_symbol()?;
        let declared = self.parse_type_expr()?;
        let end = self.peek_span();
        let span = start.merge(end);

        match self.decl_index.get(&name) {
            Some(&index) => {
                if self.module.decls[index].declared_type.is_some() {
                    self.error(format!("Duplicate declaration of \"{}\"", name), name_span);
                } else {
                    let decl = &mut self.module.decls[index];
                    decl.declared_type = Some(declared);
                    decl.span = decl.span.merge(span);
                }
            }
            None => {
                let index = self.module.decls.len();
                self.module.decls.push(Toplevel {
                    name: name.clone(),
                    name_span,
                    id: SymbolId::UNBOUND,
                    declared_type: Some(declared),
                    value: None,
                    span,
                });
                self.decl_index.insert(name, index);
            }
        }
        Some(())
    }

    // ── Expressions ───────────────────────────────────────────────

    fn try_parse_expr(&mut self) -> Option<ExprId> {
        if self.at_end() {
            return None;
        }
        self.parse_expr()
    }

    fn parse_expr(&mut self) -> Option<ExprId> {
        let start = self.peek_span();
        match self.peek()? {
            Token::LParen => self.parse_list_expr(),
            Token::Int(_) => {
                let (tok, span) = self.advance();
                if let Token::Int(n) = tok {
                    Some(self.alloc_expr(ExprKind::Lit(Literal::Int(n)), span))
                } else {
                    None
                }
            }
            Token::True => {
                let (_, span) = self.advance();
                Some(self.alloc_expr(ExprKind::Lit(Literal::Bool(true)), span))
            }
            Token::False => {
                let (_, span) = self.advance();
                Some(self.alloc_expr(ExprKind::Lit(Literal::Bool(false)), span))
            }
            Token::Unit => {
                let (_, span) = self.advance();
                Some(self.alloc_expr(ExprKind::Lit(Literal::Unit), span))
            }
            Token::Symbol(_) => {
                let (tok, span) = self.advance();
                if let Token::Symbol(name) = tok {
                    Some(self.alloc_expr(
                        ExprKind::Var {
                            name,
                            id: SymbolId::UNBOUND,
                        },
                        span,
                    ))
                } else {
                    None
                }
            }
            _ => {
                self.error(format!("unexpected token {:?}", self.peek()), start);
                self.advance();
                None
            }
        }
    }

    fn parse_list_expr(&mut self) -> Option<ExprId> {
        let start = self.peek_span();
        self.expect(&Token::LParen)?;

        if self.check(&Token::RParen) {
            let end = self.peek_span();
            self.expect(&Token::RParen)?;
            self.error("empty parentheses".into(), start.merge(end));
            return None;
        }

        let result = if self.check_symbol("lambda") {
            self.advance();
            self.parse_lambda_body()
        } else if self.check_symbol("let") {
            self.advance();
            self.parse_let_body()
        } else if self.check_symbol("begin") {
            self.advance();
            self.parse_begin_body()
        } else if self.check_symbol("if") {
            self.advance();
            self.parse_if_body()
        } else {
            self.parse_apply_body()
        };

        let end = self.peek_span();
        self.expect(&Token::RParen)?;
        result.map(|kind| self.alloc_expr(kind, start.merge(end)))
    }

    fn parse_lambda_body(&mut self) -> Option<ExprKind> {
        self.expect(&Token::LParen)?;
        let mut params = Vec::new();
        while !self.at_end() && !self.check(&Token::RParen) {
            if let Some((name, name_span)) = self.expect_symbol() {
                params.push(Param {
                    name,
                    name_span,
                    id: SymbolId::UNBOUND,
                });
            } else {
                break;
            }
        }
        self.expect(&Token::RParen)?;
        let body = self.parse_expr()?;
        Some(ExprKind::Lambda { params, body })
    }

    fn parse_let_body(&mut self) -> Option<ExprKind> {
        let recursive = self.eat_symbol("rec");

        self.expect(&Token::LParen)?;
        let mut bindings = Vec::new();
        while !self.at_end() && !self.check(&Token::RParen) {
            if let Some(b) = self.parse_let_binding() {
                bindings.push(b);
            } else {
                break;
            }
        }
        self.expect(&Token::RParen)?;

        let mut body = Vec::new();
        while !self.at_end() && !self.check(&Token::RParen) {
            if let Some(expr) = self.try_parse_expr() {
                body.push(expr);
            } else {
                break;
            }
        }

        Some(ExprKind::Let {
            recursive,
            bindings,
            body,
        })
    }

    fn parse_let_binding(&mut self) -> Option<LetBinding> {
        let start = self.peek_span();
        self.expect(&Token::LParen)?;
        let (name, name_span) = self.expect_symbol()?;
        let value = self.parse_expr()?;
        let end = self.peek_span();
        self.expect(&Token::RParen)?;
        Some(LetBinding {
            name,
            name_span,
            id: SymbolId::UNBOUND,
            value,
            span: start.merge(end),
        })
    }

    fn parse_begin_body(&mut self) -> Option<ExprKind> {
        let mut body = Vec::new();
        while !self.at_end() && !self.check(&Token::RParen) {
            if let Some(expr) = self.try_parse_expr() {
                body.push(expr);
            } else {
                break;
            }
        }
        Some(ExprKind::Begin { body })
    }

    fn parse_if_body(&mut self) -> Option<ExprKind> {
        let condition = self.parse_expr()?;
        let then_branch = self.parse_expr()?;
        let else_branch = self.parse_expr()?;
        Some(ExprKind::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn parse_apply_body(&mut self) -> Option<ExprKind> {
        let func = self.parse_expr()?;
        let mut args = Vec::new();
        while !self.at_end() && !self.check(&Token::RParen) {
            if let Some(arg) = self.try_parse_expr() {
                args.push(arg);
            } else {
                break;
            }
        }
        Some(ExprKind::Apply { func, args })
    }

    // ── Type expressions ──────────────────────────────────────────

    fn parse_type_expr(&mut self) -> Option<TypeExprId> {
        let start = self.peek_span();
        match self.peek()? {
            Token::Symbol(_) => {
                let (tok, span) = self.advance();
                if let Token::Symbol(s) = tok {
                    let kind = match s.as_str() {
                        "int" => TypeExprKind::Int,
                        "bool" => TypeExprKind::Bool,
                        "unit" => TypeExprKind::Unit,
                        _ => {
                            self.error(format!("unknown type name \"{}\"", s), span);
                            return None;
                        }
                    };
                    Some(self.alloc_type(kind, span))
                } else {
                    None
                }
            }
            Token::LParen => {
                self.advance();
                let result = if self.eat_symbol("->") {
                    self.parse_fn_type(start)
                } else {
                    let span = self.peek_span();
                    self.error(format!("expected '->', found {:?}", self.peek()), span);
                    None
                };
                self.expect(&Token::RParen)?;
                result
            }
            _ => {
                self.error(format!("expected type, found {:?}", self.peek()), start);
                None
            }
        }
    }

    /// After eating `->`: zero or more parameter types, then the
    /// result type.
    fn parse_fn_type(&mut self, start: Span) -> Option<TypeExprId> {
        let mut items = Vec::new();
        while !self.at_end() && !self.check(&Token::RParen) {
            items.push(self.parse_type_expr()?);
        }
        let result = match items.pop() {
            Some(result) => result,
            None => {
                self.error("expected result type after '->'".into(), start);
                return None;
            }
        };
        let end = self.peek_span();
        Some(self.alloc_type(
            TypeExprKind::Fn {
                params: items,
                result,
            },
            start.merge(end),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Module {
        let (module, errors) = parse(source);
        assert!(errors.is_empty(), "unexpected parse errors: {errors:?}");
        module
    }

    fn parse_and_print(source: &str) -> String {
        let (module, errors) = parse(source);
        if !errors.is_empty() {
            let mut result = String::from("ERRORS:\n");
            for e in &errors {
                result.push_str(&format!("  {}\n", e));
            }
            result.push('\n');
            result.push_str(&pretty_print(&module));
            result
        } else {
            pretty_print(&module)
        }
    }

    fn error_messages(source: &str) -> Vec<String> {
        parse(source).1.into_iter().map(|e| e.message).collect()
    }

    #[test]
    fn parse_define_lambda() {
        let module = parse_ok("(define id (lambda (x) x))");
        assert_eq!(module.decls.len(), 1);
        let decl = &module.decls[0];
        assert_eq!(decl.name, "id");
        assert!(decl.declared_type.is_none());
        let value = decl.value.expect("define should have a value");
        match &module.exprs[value].kind {
            ExprKind::Lambda { params, .. } => assert_eq!(params.len(), 1),
            other => panic!("expected lambda, got {other:?}"),
        }
    }

    #[test]
    fn parse_declare_fn_type() {
        let module = parse_ok("(declare inc (-> int int))");
        let decl = &module.decls[0];
        assert!(decl.value.is_none());
        let ty = decl.declared_type.expect("declare should have a type");
        match &module.type_exprs[ty].kind {
            TypeExprKind::Fn { params, .. } => assert_eq!(params.len(), 1),
            other => panic!("expected fn type, got {other:?}"),
        }
    }

    #[test]
    fn parse_zero_param_fn_type() {
        let module = parse_ok("(declare thunk (-> unit))");
        let ty = module.decls[0].declared_type.unwrap();
        match &module.type_exprs[ty].kind {
            TypeExprKind::Fn { params, result } => {
                assert!(params.is_empty());
                assert!(matches!(
                    module.type_exprs[*result].kind,
                    TypeExprKind::Unit
                ));
            }
            other => panic!("expected fn type, got {other:?}"),
        }
    }

    #[test]
    fn declare_then_define_merge() {
        let module = parse_ok("(declare f (-> int int)) (define f (lambda (x) x))");
        assert_eq!(module.decls.len(), 1);
        assert!(module.decls[0].declared_type.is_some());
        assert!(module.decls[0].value.is_some());
    }

    #[test]
    fn define_then_declare_merge() {
        let module = parse_ok("(define f (lambda (x) x)) (declare f (-> int int))");
        assert_eq!(module.decls.len(), 1);
        assert!(module.decls[0].declared_type.is_some());
        assert!(module.decls[0].value.is_some());
    }

    #[test]
    fn duplicate_define_is_an_error() {
        let messages = error_messages("(define f 1) (define f 2)");
        assert_eq!(messages, vec!["Duplicate definition of \"f\"".to_string()]);
    }

    #[test]
    fn duplicate_declare_is_an_error() {
        let messages = error_messages("(declare f int) (declare f bool)");
        assert_eq!(messages, vec!["Duplicate declaration of \"f\"".to_string()]);
    }

    #[test]
    fn parse_let_and_let_rec() {
        let module = parse_ok("(define a (let ((x 1)) x)) (define b (let rec ((y 2)) y))");
        let kind_of = |decl: &Toplevel| module.exprs[decl.value.unwrap()].kind.clone();
        match kind_of(&module.decls[0]) {
            ExprKind::Let { recursive, bindings, body } => {
                assert!(!recursive);
                assert_eq!(bindings.len(), 1);
                assert_eq!(body.len(), 1);
            }
            other => panic!("expected let, got {other:?}"),
        }
        match kind_of(&module.decls[1]) {
            ExprKind::Let { recursive, .. } => assert!(recursive),
            other => panic!("expected let, got {other:?}"),
        }
    }

    #[test]
    fn parse_begin() {
        let module = parse_ok("(define f (lambda () (begin 1 2 3)))");
        let body = match &module.exprs[module.decls[0].value.unwrap()].kind {
            ExprKind::Lambda { body, .. } => *body,
            other => panic!("expected lambda, got {other:?}"),
        };
        match &module.exprs[body].kind {
            ExprKind::Begin { body } => assert_eq!(body.len(), 3),
            other => panic!("expected begin, got {other:?}"),
        }
    }

    #[test]
    fn parse_application() {
        let module = parse_ok("(define r (+ 1 2))");
        match &module.exprs[module.decls[0].value.unwrap()].kind {
            ExprKind::Apply { func, args } => {
                assert!(matches!(
                    &module.exprs[*func].kind,
                    ExprKind::Var { name, .. } if name == "+"
                ));
                assert_eq!(args.len(), 2);
            }
            other => panic!("expected application, got {other:?}"),
        }
    }

    #[test]
    fn parse_literals() {
        let module = parse_ok("(define a 42) (define b true) (define c <>)");
        let lit_of = |i: usize| match &module.exprs[module.decls[i].value.unwrap()].kind {
            ExprKind::Lit(lit) => lit.clone(),
            other => panic!("expected literal, got {other:?}"),
        };
        assert_eq!(lit_of(0), Literal::Int(42));
        assert_eq!(lit_of(1), Literal::Bool(true));
        assert_eq!(lit_of(2), Literal::Unit);
    }

    #[test]
    fn pretty_print_roundtrips_surface_syntax() {
        let printed = parse_and_print("(define f (lambda (x y) (if (< x y) x y)))");
        assert!(printed.contains("(define f"));
        assert!(printed.contains("(lambda (x y) (if (< x y) x y))"));
    }

    // ── Error recovery tests ─────────────────────────────────────

    #[test]
    fn error_empty_input() {
        let (module, errors) = parse("");
        assert!(module.decls.is_empty());
        assert!(errors.is_empty());
    }

    #[test]
    fn error_if_requires_else() {
        assert!(!error_messages("(define f (lambda (x) (if x 1)))").is_empty());
    }

    #[test]
    fn error_empty_parens() {
        let messages = error_messages("(define f ())");
        assert!(messages.iter().any(|m| m == "empty parentheses"));
    }

    #[test]
    fn error_unknown_toplevel_form() {
        let messages = error_messages("(include lib)");
        assert!(messages[0].starts_with("expected toplevel form"));
    }

    #[test]
    fn error_unknown_type_name() {
        let messages = error_messages("(declare f (-> int string))");
        assert!(messages.iter().any(|m| m.contains("unknown type name")));
    }

    #[test]
    fn error_unclosed_paren() {
        assert!(!error_messages("(define f (lambda (x) x)").is_empty());
    }

    #[test]
    fn recovery_continues_after_bad_toplevel() {
        let (module, errors) = parse("(bogus 1 2) (define g (lambda () 1))");
        assert!(!errors.is_empty());
        assert_eq!(module.decls.len(), 1);
        assert_eq!(module.decls[0].name, "g");
    }

    #[test]
    fn recovery_continues_after_bad_define() {
        let (module, errors) = parse("(define) (define g 1)");
        assert!(!errors.is_empty());
        assert_eq!(module.decls.len(), 1);
        assert_eq!(module.decls[0].name, "g");
    }

    // ── Property-based tests ────────────────────────────────────

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn parse_never_panics_on_ascii(s in "\\PC{0,200}") {
                let _ = parse(&s);
            }

            #[test]
            fn parse_never_panics_on_bytes(bytes in proptest::collection::vec(any::<u8>(), 0..200)) {
                if let Ok(s) = std::str::from_utf8(&bytes) {
                    let _ = parse(s);
                }
            }

            #[test]
            fn parse_never_panics_on_lispy_input(
                s in proptest::string::string_regex(r"[\(\) a-z0-9\+\-\*/<>=!;\n ]{0,150}")
                    .unwrap()
            ) {
                let _ = parse(&s);
            }
        }
    }
}

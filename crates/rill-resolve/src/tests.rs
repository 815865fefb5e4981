use rill_ast::{ExprKind, Module, SymbolId};
use rill_parser::parse;
use smol_str::SmolStr;

use super::*;

fn parse_ok(source: &str) -> Module {
    let (module, errors) = parse(source);
    assert!(errors.is_empty(), "parse errors: {:?}", errors);
    module
}

fn resolve_ok(source: &str) -> (Module, SymbolTable) {
    let mut module = parse_ok(source);
    let result = resolve(&mut module);
    assert!(
        result.errors.is_empty(),
        "resolve errors: {:?}",
        result.errors
    );
    (module, result.table)
}

fn resolve_err(source: &str) -> Vec<ResolveError> {
    let mut module = parse_ok(source);
    let result = resolve(&mut module);
    assert!(!result.errors.is_empty(), "expected resolution to fail");
    result.errors
}

/// Every variable reference with its resolved id, in parse order.
fn var_ids(module: &Module) -> Vec<(SmolStr, SymbolId)> {
    module
        .exprs
        .iter()
        .filter_map(|(_, expr)| match &expr.kind {
            ExprKind::Var { name, id } => Some((name.clone(), *id)),
            _ => None,
        })
        .collect()
}

#[test]
fn primitive_ids_are_stable() {
    let (_, table) = resolve_ok("(define main 1)");
    assert_eq!(table.lookup("+"), Some(SymbolId(1)));
    assert_eq!(table.lookup("neg"), Some(SymbolId(11)));
    assert_eq!(table.lookup("<>"), Some(SymbolId(24)));
    assert_eq!(table.first_global_id(), SymbolId(25));
}

#[test]
fn toplevels_register_in_order() {
    let (module, table) = resolve_ok("(define f 1) (define g 2)");
    assert_eq!(module.decls[0].id, SymbolId(25));
    assert_eq!(module.decls[1].id, SymbolId(26));
    assert_eq!(table.first_local_id(), SymbolId(27));
}

#[test]
fn declared_names_are_registered() {
    let (module, _) = resolve_ok("(declare inc (-> int int)) (define main (inc 1))");
    let vars = var_ids(&module);
    assert_eq!(vars, vec![(SmolStr::from("inc"), module.decls[0].id)]);
}

#[test]
fn forward_references_resolve() {
    let (module, _) = resolve_ok("(define f (lambda (x) (g x))) (define g (lambda (y) y))");
    let g = var_ids(&module)
        .into_iter()
        .find(|(name, _)| name == "g")
        .unwrap();
    assert_eq!(g.1, module.decls[1].id);
}

#[test]
fn unbound_name_reports_exact_message() {
    let src = "(define main nope)";
    let errors = resolve_err(src);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "No binding \"nope\" in scope");
    let span = errors[0].span;
    assert_eq!(&src[span.start as usize..span.end as usize], "nope");
}

#[test]
fn all_unbound_names_are_collected() {
    let errors = resolve_err("(define main (+ a b))");
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].message, "No binding \"a\" in scope");
    assert_eq!(errors[1].message, "No binding \"b\" in scope");
}

#[test]
fn unbound_vars_keep_the_sentinel_id() {
    let src = "(define f (lambda (x) (+ x y)))";
    let mut module = parse_ok(src);
    let result = resolve(&mut module);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(&src[result.errors[0].span.start as usize..result.errors[0].span.end as usize], "y");

    let y = var_ids(&module)
        .into_iter()
        .find(|(name, _)| name == "y")
        .unwrap();
    assert!(y.1.is_unbound());
}

#[test]
fn lambda_params_shadow_globals() {
    let (module, table) = resolve_ok("(define x 1) (define main (lambda (x) x))");
    let global = module.decls[0].id;

    let body_var = var_ids(&module)[0].clone();
    assert_ne!(body_var.1, global);
    assert!(table.is_local(body_var.1));

    // The scope popped, so the global is visible again.
    assert_eq!(table.lookup("x"), Some(global));
}

#[test]
fn later_param_with_same_name_wins() {
    let (module, _) = resolve_ok("(define f (lambda (x x) x))");
    let value = module.decls[0].value.unwrap();
    let ExprKind::Lambda { params, .. } = &module.exprs[value].kind else {
        panic!("expected a lambda");
    };
    assert_ne!(params[0].id, params[1].id);

    let body_var = var_ids(&module)[0].clone();
    assert_eq!(body_var.1, params[1].id);
}

#[test]
fn let_values_resolve_in_outer_scope() {
    let (module, table) = resolve_ok("(define x 1) (define main (let ((x (+ x 2))) x))");
    let global = module.decls[0].id;

    // Parse order: "+", the value's x, the body's x.
    let vars = var_ids(&module);
    assert_eq!(vars[0], (SmolStr::from("+"), SymbolId(1)));
    assert_eq!(vars[1].1, global);
    assert_ne!(vars[2].1, global);
    assert!(table.is_local(vars[2].1));
}

#[test]
fn plain_let_does_not_see_siblings() {
    let errors = resolve_err("(define main (let ((a 1) (b a)) b))");
    assert_eq!(errors[0].message, "No binding \"a\" in scope");
}

#[test]
fn let_self_reference_requires_rec() {
    let errors = resolve_err("(define main (let ((x x)) x))");
    assert_eq!(errors[0].message, "No binding \"x\" in scope");
}

#[test]
fn let_rec_group_is_visible() {
    let (module, _) = resolve_ok("(define main (let rec ((a b) (b 1)) a))");
    let value = module.decls[0].value.unwrap();
    let ExprKind::Let { bindings, .. } = &module.exprs[value].kind else {
        panic!("expected a let");
    };

    let vars = var_ids(&module);
    assert_eq!(vars[0], (SmolStr::from("b"), bindings[1].id));
    assert_eq!(vars[1], (SmolStr::from("a"), bindings[0].id));
}

#[test]
fn capture_of_let_binding_is_rejected() {
    let src = "(define main (let ((y 1)) (lambda (x) y)))";
    let errors = resolve_err(src);
    assert_eq!(
        errors[0].message,
        "binding \"y\" is local to an enclosing function"
    );
    let span = errors[0].span;
    assert_eq!(&src[span.start as usize..span.end as usize], "y");
}

#[test]
fn capture_of_param_is_rejected() {
    let errors = resolve_err("(define f (lambda (x) (lambda (y) x)))");
    assert_eq!(
        errors[0].message,
        "binding \"x\" is local to an enclosing function"
    );
}

#[test]
fn globals_reach_into_nested_functions() {
    let (module, _) = resolve_ok("(define g 1) (define f (lambda (x) (lambda (y) g)))");
    let var = var_ids(&module)
        .into_iter()
        .find(|(name, _)| name == "g")
        .unwrap();
    assert_eq!(var.1, module.decls[0].id);
}

#[test]
fn locals_do_not_leak_out_of_toplevels() {
    let (_, table) = resolve_ok("(define f (lambda (a) (let ((b a)) b))) (define g 1)");
    assert_eq!(table.lookup("a"), None);
    assert_eq!(table.lookup("b"), None);
}

#[test]
fn resolution_is_deterministic() {
    let src = "(define f (lambda (x) (let ((y (+ x 1))) (if (< y 2) (f y) y))))";
    let (first, _) = resolve_ok(src);
    let (second, _) = resolve_ok(src);
    assert_eq!(var_ids(&first), var_ids(&second));
    assert_eq!(first.decls[0].id, second.decls[0].id);
}

use std::collections::HashMap;

use la_arena::ArenaMap;
use rill_ast::{ExprId, ExprKind, Literal, Module, SymbolId, TypeExprId, TypeExprKind};
use rill_resolve::{PrimType, SymbolTable, PRIMITIVES};

use crate::error::{Note, TypeError};
use crate::result::TypeInfo;
use crate::types::{TypeArena, TypeId};

/// Infer a type for every expression in the module, or fail on the
/// first mismatch. The module must have been resolved without errors.
///
/// Checking stops at the first failed unification: a failed unify
/// leaves partial bindings in the type graph, so anything inferred
/// after it could be nonsense.
pub fn check(module: &Module, table: &SymbolTable) -> Result<TypeInfo, TypeError> {
    let mut checker = Checker {
        module,
        types: TypeArena::new(),
        id_types: HashMap::new(),
        expr_types: ArenaMap::default(),
    };
    checker.register_primitives(table);
    checker.register_toplevels();
    checker.check_toplevels()?;
    Ok(TypeInfo {
        types: checker.types,
        expr_types: checker.expr_types,
        id_types: checker.id_types,
    })
}

// ── Checker ───────────────────────────────────────────────────────

struct Checker<'a> {
    module: &'a Module,
    types: TypeArena,
    id_types: HashMap<SymbolId, TypeId>,
    expr_types: ArenaMap<ExprId, TypeId>,
}

impl<'a> Checker<'a> {
    /// Primitives share five function-type nodes, so every use of the
    /// same operator unifies against the same node.
    fn register_primitives(&mut self, table: &SymbolTable) {
        let int = self.types.int();
        let boolean = self.types.bool();
        let bi_int = self.types.fn_type(vec![int, int], int);
        let uni_int = self.types.fn_type(vec![int], int);
        let comp_int = self.types.fn_type(vec![int, int], boolean);
        let bi_bool = self.types.fn_type(vec![boolean, boolean], boolean);
        let uni_bool = self.types.fn_type(vec![boolean], boolean);

        for ((name, prim), (registered, id)) in PRIMITIVES.iter().zip(table.primitives()) {
            debug_assert_eq!(*name, registered.as_str());
            let ty = match prim {
                PrimType::IntIntInt => bi_int,
                PrimType::IntInt => uni_int,
                PrimType::IntIntBool => comp_int,
                PrimType::BoolBoolBool => bi_bool,
                PrimType::BoolBool => uni_bool,
                PrimType::Bool => boolean,
                PrimType::Unit => self.types.unit(),
            };
            self.id_types.insert(*id, ty);
        }
    }

    /// Declared types are imported into the graph up front; everything
    /// else gets a fresh variable so forward references unify later.
    fn register_toplevels(&mut self) {
        let module = self.module;
        for decl in &module.decls {
            let ty = match decl.declared_type {
                Some(type_expr) => self.import_type_expr(type_expr),
                None => self.types.fresh_var(),
            };
            self.id_types.insert(decl.id, ty);
        }
    }

    fn check_toplevels(&mut self) -> Result<(), TypeError> {
        let module = self.module;
        for decl in &module.decls {
            let Some(value) = decl.value else {
                continue;
            };
            let expr_type = self.check_expr(value)?;
            let decl_type = self.id_types[&decl.id];
            if !self.types.unify(expr_type, decl_type) {
                return Err(TypeError {
                    message: format!(
                        "Function definition \"{}\" is of unexpected type",
                        decl.name
                    ),
                    span: module.exprs[value].span,
                    notes: vec![
                        Note {
                            message: format!(
                                "Definition is of type: {}",
                                self.types.render(expr_type)
                            ),
                            span: None,
                        },
                        Note {
                            message: format!("Expected type: {}", self.types.render(decl_type)),
                            span: None,
                        },
                    ],
                });
            }
        }
        Ok(())
    }

    fn import_type_expr(&mut self, id: TypeExprId) -> TypeId {
        let module = self.module;
        match &module.type_exprs[id].kind {
            TypeExprKind::Int => self.types.int(),
            TypeExprKind::Bool => self.types.bool(),
            TypeExprKind::Unit => self.types.unit(),
            TypeExprKind::Fn { params, result } => {
                let param_types: Vec<_> =
                    params.iter().map(|&p| self.import_type_expr(p)).collect();
                let result_type = self.import_type_expr(*result);
                self.types.fn_type(param_types, result_type)
            }
        }
    }

    fn check_expr(&mut self, id: ExprId) -> Result<TypeId, TypeError> {
        let module = self.module;
        let expr = &module.exprs[id];
        let ty = match &expr.kind {
            ExprKind::Lit(lit) => match lit {
                Literal::Int(_) => self.types.int(),
                Literal::Bool(_) => self.types.bool(),
                Literal::Unit => self.types.unit(),
            },
            // Resolution bound the id, so the type is already here.
            ExprKind::Var { id: sym, .. } => self.id_types[sym],
            ExprKind::Apply { func, args } => {
                let ftype = self.check_expr(*func)?;
                let mut params = Vec::with_capacity(args.len());
                for &arg in args {
                    params.push(self.check_expr(arg)?);
                }
                let result = self.types.fresh_var();
                let applied = self.types.fn_type(params, result);
                if !self.types.unify(applied, ftype) {
                    return Err(TypeError {
                        message: format!(
                            "applying function of type {} where {} is expected",
                            self.types.render(ftype),
                            self.types.render(applied)
                        ),
                        span: expr.span,
                        notes: Vec::new(),
                    });
                }
                result
            }
            ExprKind::Lambda { params, body } => {
                let param_types: Vec<_> = params
                    .iter()
                    .map(|param| {
                        let var = self.types.fresh_var();
                        self.id_types.insert(param.id, var);
                        var
                    })
                    .collect();
                let body_type = self.check_expr(*body)?;
                self.types.fn_type(param_types, body_type)
            }
            ExprKind::Let {
                recursive,
                bindings,
                body,
            } => {
                if *recursive {
                    // Two phases, like toplevels: fresh variables for
                    // the whole group, then unify each against its
                    // inferred value.
                    for binding in bindings {
                        let var = self.types.fresh_var();
                        self.id_types.insert(binding.id, var);
                    }
                    for binding in bindings {
                        let value_type = self.check_expr(binding.value)?;
                        let declared = self.id_types[&binding.id];
                        if !self.types.unify(value_type, declared) {
                            return Err(TypeError {
                                message: format!(
                                    "Recursive binding \"{}\" is of unexpected type",
                                    binding.name
                                ),
                                span: module.exprs[binding.value].span,
                                notes: vec![
                                    Note {
                                        message: format!(
                                            "Binding is of type: {}",
                                            self.types.render(value_type)
                                        ),
                                        span: None,
                                    },
                                    Note {
                                        message: format!(
                                            "Expected type: {}",
                                            self.types.render(declared)
                                        ),
                                        span: None,
                                    },
                                ],
                            });
                        }
                    }
                } else {
                    for binding in bindings {
                        let value_type = self.check_expr(binding.value)?;
                        self.id_types.insert(binding.id, value_type);
                    }
                }
                let mut result = self.types.unit();
                for &body_expr in body {
                    result = self.check_expr(body_expr)?;
                }
                result
            }
            ExprKind::Begin { body } => {
                let mut result = self.types.unit();
                for &body_expr in body {
                    result = self.check_expr(body_expr)?;
                }
                result
            }
            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let cond_type = self.check_expr(*condition)?;
                let bool_type = self.types.bool();
                if !self.types.unify(bool_type, cond_type) {
                    return Err(TypeError {
                        message: format!(
                            "Using expression of type {} in if condition",
                            self.types.render(cond_type)
                        ),
                        span: expr.span,
                        notes: Vec::new(),
                    });
                }
                let then_type = self.check_expr(*then_branch)?;
                let else_type = self.check_expr(*else_branch)?;
                if !self.types.unify(then_type, else_type) {
                    return Err(TypeError {
                        message: "if branches do not unify".to_string(),
                        span: expr.span,
                        notes: vec![
                            Note {
                                message: format!(
                                    "then branch of type {}",
                                    self.types.render(then_type)
                                ),
                                span: Some(module.exprs[*then_branch].span),
                            },
                            Note {
                                message: format!(
                                    "else branch of type {}",
                                    self.types.render(else_type)
                                ),
                                span: Some(module.exprs[*else_branch].span),
                            },
                        ],
                    });
                }
                then_type
            }
        };
        self.expr_types.insert(id, ty);
        Ok(ty)
    }
}

use la_arena::{Arena, Idx};

pub type TypeId = Idx<TypeNode>;

/// One node in the type graph. Variables carry an optional target
/// link; unification binds the link destructively and never unbinds
/// it, so a failed unification can leave partial bindings behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeNode {
    Int,
    Bool,
    Unit,
    /// Function type: `(-> params... result)`
    Fn { params: Vec<TypeId>, result: TypeId },
    /// Inference variable, unbound while `target` is `None`.
    Var { target: Option<TypeId> },
}

/// Arena the whole type graph lives in. The three base types are
/// allocated once and shared; everything else is allocated on demand.
#[derive(Debug)]
pub struct TypeArena {
    nodes: Arena<TypeNode>,
    int_type: TypeId,
    bool_type: TypeId,
    unit_type: TypeId,
}

impl TypeArena {
    pub fn new() -> Self {
        let mut nodes = Arena::new();
        let int_type = nodes.alloc(TypeNode::Int);
        let bool_type = nodes.alloc(TypeNode::Bool);
        let unit_type = nodes.alloc(TypeNode::Unit);
        TypeArena {
            nodes,
            int_type,
            bool_type,
            unit_type,
        }
    }

    pub fn int(&self) -> TypeId {
        self.int_type
    }

    pub fn bool(&self) -> TypeId {
        self.bool_type
    }

    pub fn unit(&self) -> TypeId {
        self.unit_type
    }

    pub fn fresh_var(&mut self) -> TypeId {
        self.nodes.alloc(TypeNode::Var { target: None })
    }

    pub fn fn_type(&mut self, params: Vec<TypeId>, result: TypeId) -> TypeId {
        self.nodes.alloc(TypeNode::Fn { params, result })
    }

    /// Follow variable targets until a non-variable or an unbound
    /// variable is reached.
    pub fn resolve(&self, mut id: TypeId) -> TypeId {
        while let TypeNode::Var { target: Some(next) } = &self.nodes[id] {
            id = *next;
        }
        id
    }

    /// Destructively equate two types. Binds unbound variables to the
    /// other side; structural types must match shape. Bindings made
    /// before a failure are not rolled back.
    pub fn unify(&mut self, a: TypeId, b: TypeId) -> bool {
        let a = self.resolve(a);
        let b = self.resolve(b);
        if a == b {
            return true;
        }
        match (self.nodes[a].clone(), self.nodes[b].clone()) {
            (TypeNode::Var { .. }, _) => self.bind(a, b),
            (_, TypeNode::Var { .. }) => self.bind(b, a),
            (
                TypeNode::Fn {
                    params: left_params,
                    result: left_result,
                },
                TypeNode::Fn {
                    params: right_params,
                    result: right_result,
                },
            ) => {
                left_params.len() == right_params.len()
                    && left_params
                        .iter()
                        .zip(&right_params)
                        .all(|(&x, &y)| self.unify(x, y))
                    && self.unify(left_result, right_result)
            }
            (left, right) => left == right,
        }
    }

    /// `var` must resolve to an unbound variable. Binding a variable
    /// into a type that contains it would make the graph cyclic, so
    /// that case fails instead.
    fn bind(&mut self, var: TypeId, target: TypeId) -> bool {
        if self.occurs(var, target) {
            return false;
        }
        self.nodes[var] = TypeNode::Var {
            target: Some(target),
        };
        true
    }

    fn occurs(&self, var: TypeId, id: TypeId) -> bool {
        let id = self.resolve(id);
        if id == var {
            return true;
        }
        match &self.nodes[id] {
            TypeNode::Fn { params, result } => {
                params.iter().any(|&p| self.occurs(var, p)) || self.occurs(var, *result)
            }
            _ => false,
        }
    }

    /// Render a type for diagnostics: `int`, `bool`, `unit`,
    /// `(-> T1 ... Tn R)` for functions, `[ ]` for an unbound variable.
    pub fn render(&self, id: TypeId) -> String {
        let mut out = String::new();
        self.render_into(id, &mut out);
        out
    }

    fn render_into(&self, id: TypeId, out: &mut String) {
        let id = self.resolve(id);
        match &self.nodes[id] {
            TypeNode::Int => out.push_str("int"),
            TypeNode::Bool => out.push_str("bool"),
            TypeNode::Unit => out.push_str("unit"),
            TypeNode::Fn { params, result } => {
                out.push_str("(-> ");
                for &param in params {
                    self.render_into(param, out);
                    out.push(' ');
                }
                self.render_into(*result, out);
                out.push(')');
            }
            // resolve() stops only on unbound variables.
            TypeNode::Var { .. } => out.push_str("[ ]"),
        }
    }
}

impl Default for TypeArena {
    fn default() -> Self {
        Self::new()
    }
}

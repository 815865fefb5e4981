//! Scope-stack symbol table.

use std::collections::HashMap;

use smol_str::SmolStr;
use rill_ast::SymbolId;

/// Undo record for one lexical scope. `register_local` notes what each
/// name was bound to before the scope shadowed it; only the first
/// registration of a name per scope is recorded, so re-binding the
/// same name inside one scope still restores the pre-scope state.
#[derive(Debug, Default)]
pub struct Scope {
    saved: HashMap<SmolStr, Option<SymbolId>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Flat name-to-id map with per-scope undo.
///
/// Ids come from a single counter starting at 1 and are never reused.
/// The two boundary markers split the id space into three ranges:
/// primitives `[1, first_global)`, toplevel globals
/// `[first_global, first_local)`, and locals `[first_local, ..)`.
#[derive(Debug)]
pub struct SymbolTable {
    names: HashMap<SmolStr, SymbolId>,
    primitives: Vec<(SmolStr, SymbolId)>,
    next: u32,
    first_global: u32,
    first_local: u32,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            names: HashMap::new(),
            primitives: Vec::new(),
            next: 1,
            first_global: 0,
            first_local: 0,
        }
    }

    fn fresh(&mut self) -> SymbolId {
        let id = SymbolId(self.next);
        self.next += 1;
        id
    }

    /// Mint an id without binding a name to it.
    pub fn fresh_id(&mut self) -> SymbolId {
        self.fresh()
    }

    /// The id the table would assign next.
    pub fn next_id(&self) -> u32 {
        self.next
    }

    pub fn first_global_id(&self) -> SymbolId {
        SymbolId(self.first_global)
    }

    pub fn first_local_id(&self) -> SymbolId {
        SymbolId(self.first_local)
    }

    /// True when `id` was minted after the local boundary opened.
    pub fn is_local(&self, id: SymbolId) -> bool {
        self.first_local != 0 && id.0 >= self.first_local
    }

    /// Every registered primitive with its id, in registration order.
    pub fn primitives(&self) -> &[(SmolStr, SymbolId)] {
        &self.primitives
    }

    /// Close the primitive range; must precede any global registration.
    pub fn start_globals(&mut self) {
        debug_assert_eq!(self.first_global, 0, "globals already started");
        self.first_global = self.next;
    }

    /// Close the global range; must precede any local registration.
    pub fn start_locals(&mut self) {
        debug_assert_eq!(self.first_local, 0, "locals already started");
        self.first_local = self.next;
    }

    pub fn register_primitive(&mut self, name: SmolStr) -> SymbolId {
        debug_assert_eq!(self.first_global, 0, "primitives must come first");
        let id = self.fresh();
        self.names.insert(name.clone(), id);
        self.primitives.push((name, id));
        id
    }

    pub fn register_global(&mut self, name: SmolStr) -> SymbolId {
        debug_assert!(
            self.first_global != 0 && self.first_local == 0,
            "globals must come between primitives and locals"
        );
        let id = self.fresh();
        self.names.insert(name, id);
        id
    }

    /// Bind `name` as a local, recording the displaced binding in
    /// `scope` so `pop_scope` can restore it.
    pub fn register_local(&mut self, name: SmolStr, scope: &mut Scope) -> SymbolId {
        debug_assert!(self.first_local != 0, "locals not started");
        let id = self.fresh();
        let previous = self.names.insert(name.clone(), id);
        scope.saved.entry(name).or_insert(previous);
        id
    }

    /// Exact inverse of the scope's registrations: shadowed bindings
    /// come back, introductions disappear. Scopes must pop in reverse
    /// order of creation.
    pub fn pop_scope(&mut self, scope: Scope) {
        for (name, previous) in scope.saved {
            match previous {
                Some(id) => {
                    self.names.insert(name, id);
                }
                None => {
                    self.names.remove(&name);
                }
            }
        }
    }

    /// The innermost binding currently visible for `name`.
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.names.get(name).copied()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with_global(name: &str) -> (SymbolTable, SymbolId) {
        let mut table = SymbolTable::new();
        table.start_globals();
        let id = table.register_global(SmolStr::from(name));
        table.start_locals();
        (table, id)
    }

    #[test]
    fn ids_are_assigned_in_order() {
        let mut table = SymbolTable::new();
        assert_eq!(table.register_primitive(SmolStr::from("+")), SymbolId(1));
        assert_eq!(table.register_primitive(SmolStr::from("-")), SymbolId(2));
        table.start_globals();
        assert_eq!(table.register_global(SmolStr::from("f")), SymbolId(3));
        assert_eq!(table.first_global_id(), SymbolId(3));
        table.start_locals();
        assert_eq!(table.first_local_id(), SymbolId(4));
    }

    #[test]
    fn lookup_miss_returns_none() {
        let table = SymbolTable::new();
        assert_eq!(table.lookup("nope"), None);
    }

    #[test]
    fn shadowing_round_trips() {
        let (mut table, global) = table_with_global("x");

        let mut outer = Scope::new();
        let l1 = table.register_local(SmolStr::from("x"), &mut outer);
        assert_eq!(table.lookup("x"), Some(l1));

        let mut inner = Scope::new();
        let l2 = table.register_local(SmolStr::from("x"), &mut inner);
        assert_eq!(table.lookup("x"), Some(l2));

        table.pop_scope(inner);
        assert_eq!(table.lookup("x"), Some(l1));
        table.pop_scope(outer);
        assert_eq!(table.lookup("x"), Some(global));
    }

    #[test]
    fn pop_removes_non_shadowing_introductions() {
        let (mut table, _) = table_with_global("x");

        let mut scope = Scope::new();
        table.register_local(SmolStr::from("y"), &mut scope);
        assert!(table.lookup("y").is_some());

        table.pop_scope(scope);
        assert_eq!(table.lookup("y"), None);
    }

    #[test]
    fn rebinding_in_one_scope_restores_pre_scope_state() {
        let (mut table, global) = table_with_global("x");

        let mut scope = Scope::new();
        let first = table.register_local(SmolStr::from("x"), &mut scope);
        let second = table.register_local(SmolStr::from("x"), &mut scope);
        assert_ne!(first, second);
        assert_eq!(table.lookup("x"), Some(second));

        table.pop_scope(scope);
        assert_eq!(table.lookup("x"), Some(global));
    }

    #[test]
    fn local_range_check() {
        let (mut table, global) = table_with_global("x");
        assert!(!table.is_local(global));

        let mut scope = Scope::new();
        let local = table.register_local(SmolStr::from("y"), &mut scope);
        assert!(table.is_local(local));
        table.pop_scope(scope);

        // Range membership outlives the binding.
        assert!(table.is_local(local));
    }
}

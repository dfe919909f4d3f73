//! Symbol tables and the scope stack.
//!
//! Scopes are `Rc<RefCell<SymbolTable>>` so a table can sit on the active
//! stack while also being owned by the class or function descriptor it
//! belongs to. The stack itself is plain `Vec` push/pop; analysis code saves
//! the depth before pushing and truncates back to it afterwards.

use std::collections::HashMap;
use std::rc::Rc;

use std::cell::RefCell;

use super::types::TypeRef;

/// A single scope's name-to-descriptor map.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: HashMap<String, TypeRef>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    pub fn insert(&mut self, name: &str, ty: TypeRef) {
        self.symbols.insert(name.to_owned(), ty);
    }

    pub fn get(&self, name: &str) -> Option<TypeRef> {
        self.symbols.get(name).map(Rc::clone)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypeRef)> {
        self.symbols.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Shared handle to a scope.
pub type ScopeRef = Rc<RefCell<SymbolTable>>;

pub fn new_scope() -> ScopeRef {
    Rc::new(RefCell::new(SymbolTable::new()))
}

/// The active scope stack plus the constants table, which lives outside the
/// stack and is never popped.
#[derive(Debug)]
pub struct ScopeStack {
    scopes: Vec<ScopeRef>,
    constants: ScopeRef,
}

impl ScopeStack {
    /// A stack holding just the global scope.
    pub fn new() -> ScopeStack {
        ScopeStack {
            scopes: vec![new_scope()],
            constants: new_scope(),
        }
    }

    pub fn push(&mut self, scope: ScopeRef) {
        self.scopes.push(scope);
    }

    pub fn pop(&mut self) -> Option<ScopeRef> {
        // the global scope stays
        if self.scopes.len() > 1 {
            self.scopes.pop()
        } else {
            None
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Pop back down to a previously saved depth.
    pub fn truncate(&mut self, depth: usize) {
        while self.scopes.len() > depth.max(1) {
            self.scopes.pop();
        }
    }

    pub fn current(&self) -> ScopeRef {
        // the stack is never empty
        Rc::clone(&self.scopes[self.scopes.len() - 1])
    }

    pub fn global(&self) -> ScopeRef {
        Rc::clone(&self.scopes[0])
    }

    pub fn constants(&self) -> ScopeRef {
        Rc::clone(&self.constants)
    }

    /// Innermost-first search through every scope on the stack.
    pub fn search(&self, name: &str) -> Option<TypeRef> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.borrow().get(name))
    }

    /// Search the innermost scope only.
    pub fn search_current(&self, name: &str) -> Option<TypeRef> {
        self.current().borrow().get(name)
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        ScopeStack::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantics::types::Primitives;

    #[test]
    fn search_is_innermost_first() {
        let prims = Primitives::new();
        let mut stack = ScopeStack::new();
        stack.global().borrow_mut().insert("x", Rc::clone(&prims.int));

        let inner = new_scope();
        inner.borrow_mut().insert("x", Rc::clone(&prims.float));
        stack.push(inner);

        let found = stack.search("x").unwrap();
        assert!(found.compatible(&prims.float));

        // current-scope search does not see outer entries
        assert!(stack.search_current("x").is_some());
        stack.truncate(1);
        let found = stack.search("x").unwrap();
        assert!(found.compatible(&prims.int));
    }

    #[test]
    fn global_scope_cannot_be_popped() {
        let mut stack = ScopeStack::new();
        assert!(stack.pop().is_none());
        stack.push(new_scope());
        assert!(stack.pop().is_some());
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn truncate_restores_saved_depth() {
        let mut stack = ScopeStack::new();
        let depth = stack.depth();
        stack.push(new_scope());
        stack.push(new_scope());
        stack.truncate(depth);
        assert_eq!(stack.depth(), depth);
    }
}

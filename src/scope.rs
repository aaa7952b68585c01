//! Lexical binding environment
//!
//! A `Scope` is a stack of `Layer`s. Each layer owns a name→value map and an
//! optional *parent* layer used for lookups. The parent is distinct from
//! "the layer below on the stack": physically nested blocks parent to the
//! layer that was on top when they were entered, while function activations
//! parent to the layer captured at the function's declaration site, and
//! file imports push a layer with no parent at all.
//!
//! The same machinery is instantiated twice and never shares storage:
//! `Scope<Type>` during type checking and `Scope<Value>` at run time.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;

/// Lookup or assignment failure: no enclosing layer owns the name.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Unknown identifier: {0}")]
pub struct UnknownName(pub String);

/// Shared handle to one binding layer
pub type LayerRef<T> = Rc<RefCell<Layer<T>>>;

/// One frame of a lexical binding chain
#[derive(Debug)]
pub struct Layer<T> {
    bindings: HashMap<String, T>,
    parent: Option<LayerRef<T>>,
}

impl<T> Layer<T> {
    pub fn new() -> LayerRef<T> {
        Rc::new(RefCell::new(Self { bindings: HashMap::new(), parent: None }))
    }

    pub fn with_parent(parent: LayerRef<T>) -> LayerRef<T> {
        Rc::new(RefCell::new(Self { bindings: HashMap::new(), parent: Some(parent) }))
    }

    /// Insert directly into this layer, shadowing any earlier binding.
    /// Used by `Scope::define` and by import re-export.
    pub fn insert(&mut self, name: impl Into<String>, value: T) {
        self.bindings.insert(name.into(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }
}

/// A stack of binding layers
#[derive(Debug)]
pub struct Scope<T> {
    stack: Vec<LayerRef<T>>,
}

impl<T: Clone> Scope<T> {
    /// Create a scope holding exactly one root layer
    pub fn new() -> Self {
        Self { stack: vec![Layer::new()] }
    }

    /// Push a layer parented to the current top (nested block)
    pub fn enter(&mut self) {
        let parent = self.top();
        self.stack.push(Layer::with_parent(parent));
    }

    /// Push a layer parented to an arbitrary captured layer
    /// (function activation against its declaration-time environment)
    pub fn enter_with(&mut self, parent: LayerRef<T>) {
        self.stack.push(Layer::with_parent(parent));
    }

    /// Push a layer with no parent (file import boundary)
    pub fn enter_detached(&mut self) {
        self.stack.push(Layer::new());
    }

    /// Pop the top layer. Every `enter*` must be paired with exactly one
    /// `leave` on all control-flow paths, including failure paths.
    pub fn leave(&mut self) {
        debug_assert!(self.stack.len() > 1, "leave() would pop the root layer");
        self.stack.pop();
    }

    /// The current top layer
    pub fn top(&self) -> LayerRef<T> {
        Rc::clone(self.stack.last().expect("scope stack is never empty"))
    }

    /// Number of layers currently on the stack
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Bind a name in the top layer. Always succeeds; a repeated `define`
    /// in the same layer overwrites (this is what gives `let` its
    /// shadowing and loop-body re-initialization semantics).
    pub fn define(&mut self, name: impl Into<String>, value: T) {
        self.top().borrow_mut().insert(name, value);
    }

    /// Mutate the nearest enclosing binding of `name`, walking the parent
    /// chain from the top layer.
    pub fn assign(&mut self, name: &str, value: T) -> Result<(), UnknownName> {
        let mut layer = Some(self.top());
        while let Some(l) = layer {
            let mut borrowed = l.borrow_mut();
            if borrowed.contains(name) {
                borrowed.insert(name, value);
                return Ok(());
            }
            let parent = borrowed.parent.clone();
            drop(borrowed);
            layer = parent;
        }
        Err(UnknownName(name.to_string()))
    }

    /// Read the nearest enclosing binding of `name`, walking the parent
    /// chain from the top layer.
    pub fn get(&self, name: &str) -> Result<T, UnknownName> {
        let mut layer = Some(self.top());
        while let Some(l) = layer {
            let borrowed = l.borrow();
            if let Some(value) = borrowed.bindings.get(name) {
                return Ok(value.clone());
            }
            let parent = borrowed.parent.clone();
            drop(borrowed);
            layer = parent;
        }
        Err(UnknownName(name.to_string()))
    }

    /// Drop every layer and start over with a single empty root layer
    pub fn reset(&mut self) {
        self.stack.clear();
        self.stack.push(Layer::new());
    }
}

impl<T: Clone> Default for Scope<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn define_and_get() {
        let mut scope: Scope<i64> = Scope::new();
        scope.define("x", 5);
        assert_eq!(scope.get("x"), Ok(5));
        assert_eq!(scope.get("y"), Err(UnknownName("y".into())));
    }

    #[test]
    fn nested_block_reads_and_shadows() {
        let mut scope: Scope<i64> = Scope::new();
        scope.define("x", 5);
        scope.enter();
        assert_eq!(scope.get("x"), Ok(5));
        scope.define("x", 15);
        assert_eq!(scope.get("x"), Ok(15));
        scope.leave();
        assert_eq!(scope.get("x"), Ok(5));
    }

    #[test]
    fn assign_mutates_owning_layer() {
        let mut scope: Scope<i64> = Scope::new();
        scope.define("x", 5);
        scope.enter();
        scope.assign("x", 10).unwrap();
        scope.leave();
        assert_eq!(scope.get("x"), Ok(10));
    }

    #[test]
    fn assign_fails_when_chain_exhausted() {
        let mut scope: Scope<i64> = Scope::new();
        assert_eq!(scope.assign("x", 1), Err(UnknownName("x".into())));
    }

    #[test]
    fn detached_layer_hides_enclosing_bindings() {
        let mut scope: Scope<i64> = Scope::new();
        scope.define("x", 5);
        scope.enter_detached();
        assert_eq!(scope.get("x"), Err(UnknownName("x".into())));
        scope.define("y", 10);
        assert_eq!(scope.get("y"), Ok(10));
        scope.leave();
        assert_eq!(scope.get("x"), Ok(5));
    }

    #[test]
    fn captured_layer_sees_declaration_site_not_call_site() {
        let mut scope: Scope<i64> = Scope::new();
        scope.define("x", 5);
        let captured = scope.top();

        // simulate a call happening inside an unrelated block
        scope.enter();
        scope.define("x", 99);
        scope.enter_with(captured);
        assert_eq!(scope.get("x"), Ok(5));
        scope.leave();
        assert_eq!(scope.get("x"), Ok(99));
        scope.leave();
    }

    #[test]
    fn captured_layer_sees_later_assignment() {
        let mut scope: Scope<i64> = Scope::new();
        scope.define("x", 5);
        let captured = scope.top();
        scope.assign("x", 7).unwrap();

        scope.enter_with(captured);
        assert_eq!(scope.get("x"), Ok(7));
        scope.leave();
    }

    #[test]
    fn reset_restores_single_empty_layer() {
        let mut scope: Scope<i64> = Scope::new();
        scope.define("x", 5);
        scope.enter();
        scope.reset();
        assert_eq!(scope.depth(), 1);
        assert_eq!(scope.get("x"), Err(UnknownName("x".into())));
    }
}

use std::{cell::RefCell, rc::Rc};

use indexmap::IndexMap;

use crate::{
    diagnostics::{Diagnostic, ManifastError, Result, SourceSpan},
    value::Value,
};

pub type EnvironmentRef = Rc<RefCell<Environment>>;

/// One lexical scope. Closures hold an `EnvironmentRef`, so writes made after
/// capture stay visible to them.
#[derive(Default)]
pub struct Environment {
    parent: Option<EnvironmentRef>,
    bindings: IndexMap<String, Value>,
}

impl Environment {
    pub fn new() -> EnvironmentRef {
        Rc::new(RefCell::new(Self::default()))
    }

    pub fn with_parent(parent: EnvironmentRef) -> EnvironmentRef {
        Rc::new(RefCell::new(Self {
            parent: Some(parent),
            bindings: IndexMap::new(),
        }))
    }

    /// Declares `name` in this scope, shadowing any outer binding.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    pub fn contains_local(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Updates the nearest scope declaring `name`. Names declared nowhere
    /// become globals, as in Lua.
    pub fn assign(env: &EnvironmentRef, name: &str, value: Value) {
        let mut current = Rc::clone(env);
        loop {
            if let Some(slot) = current.borrow_mut().bindings.get_mut(name) {
                *slot = value;
                return;
            }
            let parent = current.borrow().parent.clone();
            match parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        current.borrow_mut().define(name, value);
    }

    pub fn get(env: &EnvironmentRef, name: &str, span: SourceSpan) -> Result<Value> {
        let mut current = Rc::clone(env);
        loop {
            if let Some(value) = current.borrow().bindings.get(name) {
                return Ok(value.clone());
            }
            let parent = current.borrow().parent.clone();
            match parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        Err(ManifastError::from(
            Diagnostic::runtime(format!("undefined variable `{name}`")).with_span(span),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(env: &EnvironmentRef, name: &str) -> Option<Value> {
        Environment::get(env, name, SourceSpan::default()).ok()
    }

    #[test]
    fn lookup_walks_parent_chain() {
        let root = Environment::new();
        root.borrow_mut().define("x", Value::number(1.0));
        let child = Environment::with_parent(Rc::clone(&root));
        assert_eq!(lookup(&child, "x").and_then(|v| v.as_number()), Some(1.0));
        assert!(lookup(&child, "y").is_none());
    }

    #[test]
    fn define_shadows_outer_binding() {
        let root = Environment::new();
        root.borrow_mut().define("x", Value::number(1.0));
        let child = Environment::with_parent(Rc::clone(&root));
        child.borrow_mut().define("x", Value::number(2.0));
        assert_eq!(lookup(&child, "x").and_then(|v| v.as_number()), Some(2.0));
        assert_eq!(lookup(&root, "x").and_then(|v| v.as_number()), Some(1.0));
    }

    #[test]
    fn assign_updates_declaring_scope() {
        let root = Environment::new();
        root.borrow_mut().define("count", Value::number(0.0));
        let child = Environment::with_parent(Rc::clone(&root));
        Environment::assign(&child, "count", Value::number(5.0));
        assert!(!child.borrow().contains_local("count"));
        assert_eq!(lookup(&root, "count").and_then(|v| v.as_number()), Some(5.0));
    }

    #[test]
    fn assign_to_unknown_name_creates_global() {
        let root = Environment::new();
        let child = Environment::with_parent(Rc::clone(&root));
        let grandchild = Environment::with_parent(Rc::clone(&child));
        Environment::assign(&grandchild, "fresh", Value::bool(true));
        assert!(root.borrow().contains_local("fresh"));
        assert!(!child.borrow().contains_local("fresh"));
    }

    #[test]
    fn undefined_variable_is_reported() {
        let root = Environment::new();
        let err = Environment::get(&root, "nope", SourceSpan::new(3, 7)).err();
        match err {
            Some(ManifastError::Diagnostic(diag)) => {
                assert_eq!(diag.message, "undefined variable `nope`");
                assert_eq!(diag.span, Some(SourceSpan::new(3, 7)));
            }
            other => panic!("unexpected result {other:?}"),
        }
    }
}

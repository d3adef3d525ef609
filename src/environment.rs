//! Lexical scopes at run time.
//!
//! An environment is shared (`Rc<RefCell<_>>`) by every block, call frame and
//! closure that can see it, so a returned closure keeps its whole defining
//! chain alive and observes later writes to captured variables.  The parent
//! link is fixed at construction; names are never removed once defined.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::error::{LoxError, Result};
use crate::token::Token;
use crate::value::Value;

/// Shared handle to a scope.
pub type EnvRef = Rc<RefCell<Environment>>;

#[derive(Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<EnvRef>,
}

impl Environment {
    /// A root (global) scope.
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: EnvRef) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Wrap a fresh child of `enclosing` in a shared handle.
    pub fn child(enclosing: &EnvRef) -> EnvRef {
        Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(enclosing))))
    }

    /// Bind `name` in this scope, shadowing any existing binding of the same
    /// name here.  Always succeeds.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Look `name` up, walking the parent chain to the root.
    pub fn get(&self, name: &Token) -> Result<Value> {
        if let Some(value) = self.values.get(&name.lexeme) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(undefined(name))
        }
    }

    /// Overwrite the nearest existing binding of `name`.
    pub fn assign(&mut self, name: &Token, value: Value) -> Result<()> {
        if let Some(slot) = self.values.get_mut(&name.lexeme) {
            *slot = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(undefined(name))
        }
    }

    /// Follow exactly `distance` parent links.
    pub fn ancestor(env: &EnvRef, distance: usize) -> Option<EnvRef> {
        let mut current: EnvRef = Rc::clone(env);

        for _ in 0..distance {
            let parent: EnvRef = current.borrow().enclosing.clone()?;
            current = parent;
        }

        Some(current)
    }

    /// Read `name` directly from the scope `distance` links up; no search
    /// beyond that one map.
    pub fn get_at(env: &EnvRef, distance: usize, name: &str) -> Option<Value> {
        debug!("get_at '{}' distance={}", name, distance);

        let scope: EnvRef = Self::ancestor(env, distance)?;
        let value: Option<Value> = scope.borrow().values.get(name).cloned();

        value
    }

    /// Write `name` directly into the scope `distance` links up.
    pub fn assign_at(env: &EnvRef, distance: usize, name: &Token, value: Value) -> Result<()> {
        debug!("assign_at '{}' distance={}", name.lexeme, distance);

        let target: EnvRef = Self::ancestor(env, distance).ok_or_else(|| undefined(name))?;
        let mut scope = target.borrow_mut();

        match scope.values.get_mut(&name.lexeme) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(undefined(name)),
        }
    }
}

fn undefined(name: &Token) -> LoxError {
    LoxError::runtime(name, format!("Undefined variable '{}'.", name.lexeme))
}

#[cfg(test)]
mod environment_tests {
    use super::*;
    use crate::token::TokenType;

    fn ident(name: &str) -> Token {
        Token::new(TokenType::IDENTIFIER, name, 1)
    }

    fn number(value: Result<Value>) -> f64 {
        match value {
            Ok(Value::Number(n)) => n,
            other => panic!("expected a number, got {:?}", other.map(|v| v.to_string())),
        }
    }

    #[test]
    fn lookup_walks_to_the_root() {
        let global: EnvRef = Rc::new(RefCell::new(Environment::new()));
        global.borrow_mut().define("a", Value::Number(1.0));

        let inner: EnvRef = Environment::child(&Environment::child(&global));

        assert_eq!(number(inner.borrow().get(&ident("a"))), 1.0);
        assert!(inner.borrow().get(&ident("missing")).is_err());
    }

    #[test]
    fn define_shadows_and_assign_hits_nearest() {
        let global: EnvRef = Rc::new(RefCell::new(Environment::new()));
        global.borrow_mut().define("a", Value::Number(1.0));
        global.borrow_mut().define("a", Value::Number(2.0));

        let inner: EnvRef = Environment::child(&global);
        inner
            .borrow_mut()
            .assign(&ident("a"), Value::Number(3.0))
            .unwrap();

        assert_eq!(number(global.borrow().get(&ident("a"))), 3.0);
        assert!(inner
            .borrow_mut()
            .assign(&ident("nope"), Value::Nil)
            .is_err());
    }

    #[test]
    fn distance_access_uses_one_map_only() {
        let global: EnvRef = Rc::new(RefCell::new(Environment::new()));
        global.borrow_mut().define("a", Value::Number(1.0));

        let middle: EnvRef = Environment::child(&global);
        middle.borrow_mut().define("a", Value::Number(2.0));

        let inner: EnvRef = Environment::child(&middle);

        assert!(Environment::get_at(&inner, 0, "a").is_none());
        assert!(matches!(
            Environment::get_at(&inner, 1, "a"),
            Some(Value::Number(n)) if n == 2.0
        ));

        Environment::assign_at(&inner, 2, &ident("a"), Value::Number(9.0)).unwrap();
        assert_eq!(number(global.borrow().get(&ident("a"))), 9.0);
        assert_eq!(number(middle.borrow().get(&ident("a"))), 2.0);

        assert!(Environment::get_at(&inner, 7, "a").is_none());
    }
}

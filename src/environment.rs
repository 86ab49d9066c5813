use indexmap::IndexMap;
use tracing::trace;

use crate::{diagnostics::RuntimeError, value::Value};

type Scope = IndexMap<String, Option<Value>>;

/// A stack of lexical scopes. The root scope is created with the environment
/// and is never popped.
#[derive(Debug)]
pub struct Environment {
    scopes: Vec<Scope>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new()],
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::new());
        trace!(depth = self.scopes.len(), "pushed scope");
    }

    pub fn pop_scope(&mut self) -> Result<(), RuntimeError> {
        if self.scopes.len() <= 1 {
            return Err(RuntimeError::RootScope);
        }
        self.scopes.pop();
        trace!(depth = self.scopes.len(), "popped scope");
        Ok(())
    }

    /// Innermost binding for `name`, searching outward.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).and_then(Option::as_ref))
    }

    /// The slot holding `name`. If no scope binds it yet, an empty slot is
    /// created in the innermost scope, never in an enclosing one.
    pub fn lookup_or_create_slot(&mut self, name: &str) -> &mut Option<Value> {
        let index = self
            .scopes
            .iter()
            .rposition(|scope| matches!(scope.get(name), Some(Some(_))))
            .unwrap_or(self.scopes.len() - 1);
        self.scopes[index].entry(name.to_string()).or_insert(None)
    }

    /// Binds `name` using the slot semantics of [`Environment::lookup_or_create_slot`].
    pub fn assign(&mut self, name: &str, value: Value) {
        *self.lookup_or_create_slot(name) = Some(value);
    }

    /// Binds `name` in the innermost scope, shadowing any outer binding.
    pub fn define_local(&mut self, name: &str, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), Some(value));
        }
    }

    /// Names bound in the root scope, in definition order.
    pub fn globals(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.scopes[0]
            .iter()
            .filter_map(|(name, slot)| slot.as_ref().map(|value| (name.as_str(), value)))
    }
}

//! Lexical environment
//!
//! A stack of scopes. Frames remember the depth they were pushed at and
//! truncate back to it when they are popped, so scopes never outlive the
//! statement that opened them, whether it exits normally or by unwinding.

use super::errors::{self, ErrorInfo};
use super::types::{Val, VarKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Binding {
    pub value: Val,
    pub kind: VarKind,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scope {
    pub vars: HashMap<String, Binding>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Env {
    scopes: Vec<Scope>,
}

impl Env {
    /// Create an environment whose outermost scope holds `globals` as constants
    pub fn new(globals: HashMap<String, Val>) -> Self {
        let vars = globals
            .into_iter()
            .map(|(name, value)| {
                (
                    name,
                    Binding {
                        value,
                        kind: VarKind::Const,
                    },
                )
            })
            .collect();

        Self {
            scopes: vec![Scope { vars }],
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    /// Drop every scope above `depth`
    pub fn truncate(&mut self, depth: usize) {
        self.scopes.truncate(depth.max(1));
    }

    /// Declare a variable in the innermost scope (shadowing outer bindings)
    pub fn declare(&mut self, name: impl Into<String>, value: Val, kind: VarKind) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.vars.insert(name.into(), Binding { value, kind });
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Val> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.vars.get(name))
            .map(|binding| &binding.value)
    }

    /// Assign to the nearest existing binding
    pub fn assign(&mut self, name: &str, value: Val) -> Result<(), ErrorInfo> {
        let binding = self
            .scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.vars.get_mut(name))
            .ok_or_else(|| {
                ErrorInfo::new(
                    errors::UNDEFINED_VARIABLE,
                    format!("Variable '{}' is not defined", name),
                )
            })?;

        if binding.kind == VarKind::Const {
            return Err(ErrorInfo::new(
                errors::CONST_ASSIGNMENT,
                format!("Cannot assign to constant '{}'", name),
            ));
        }

        binding.value = value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::hashmap;

    #[test]
    fn test_truncate_drops_inner_bindings() {
        let mut env = Env::new(HashMap::new());
        env.push_scope();
        env.declare("x", Val::Num(1.0), VarKind::Let);
        let depth = env.depth();

        env.push_scope();
        env.declare("y", Val::Num(2.0), VarKind::Let);
        assert_eq!(env.lookup("y"), Some(&Val::Num(2.0)));

        env.truncate(depth);
        assert_eq!(env.lookup("y"), None);
        assert_eq!(env.lookup("x"), Some(&Val::Num(1.0)));
    }

    #[test]
    fn test_assign_updates_nearest_binding() {
        let mut env = Env::new(HashMap::new());
        env.push_scope();
        env.declare("x", Val::Num(1.0), VarKind::Let);
        env.push_scope();
        env.declare("x", Val::Num(2.0), VarKind::Let);

        env.assign("x", Val::Num(3.0)).unwrap();
        assert_eq!(env.lookup("x"), Some(&Val::Num(3.0)));

        env.truncate(2);
        assert_eq!(env.lookup("x"), Some(&Val::Num(1.0)));
    }

    #[test]
    fn test_globals_are_constant() {
        let mut env = Env::new(hashmap! { "limit".to_string() => Val::Num(3.0) });
        let err = env.assign("limit", Val::Num(4.0)).unwrap_err();
        assert_eq!(err.code, errors::CONST_ASSIGNMENT);
    }

    #[test]
    fn test_assign_undefined() {
        let mut env = Env::new(HashMap::new());
        let err = env.assign("missing", Val::Null).unwrap_err();
        assert_eq!(err.code, errors::UNDEFINED_VARIABLE);
    }
}

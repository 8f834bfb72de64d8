//! Rule: Const Assignment
//!
//! Reports an error when a `const` binding (or a standard library global)
//! is assigned to.
//!
//! ```text
//! const limit = 3;
//! limit = 4;          // Error
//! ```

use std::collections::HashMap;

use crate::executor::stdlib::GLOBAL_NAMES;
use crate::executor::types::ast::{Stmt, VarKind};
use crate::parser::ProcedureDef;

use super::super::{ValidationError, ValidationRule};

pub struct ConstAssignRule;

impl ValidationRule for ConstAssignRule {
    fn id(&self) -> &'static str {
        "const-assign"
    }

    fn description(&self) -> &'static str {
        "const bindings cannot be reassigned"
    }

    fn validate(&self, procedures: &[ProcedureDef], _source: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for procedure in procedures {
            let mut scopes = Scopes::default();
            for name in GLOBAL_NAMES {
                scopes.define(name, VarKind::Const);
            }
            scopes.push();
            for param in &procedure.params {
                scopes.define(param, VarKind::Let);
            }
            check_stmt(&procedure.body, &mut scopes, &mut errors, self.id());
        }
        errors
    }
}

/// Lexical scopes mapping names to how they were declared
#[derive(Default)]
struct Scopes {
    stack: Vec<HashMap<String, VarKind>>,
}

impl Scopes {
    fn push(&mut self) {
        self.stack.push(HashMap::new());
    }

    fn pop(&mut self) {
        self.stack.pop();
    }

    fn define(&mut self, name: &str, kind: VarKind) {
        if self.stack.is_empty() {
            self.push();
        }
        if let Some(scope) = self.stack.last_mut() {
            scope.insert(name.to_string(), kind);
        }
    }

    fn kind_of(&self, name: &str) -> Option<VarKind> {
        self.stack.iter().rev().find_map(|s| s.get(name)).copied()
    }
}

fn check_stmt(stmt: &Stmt, scopes: &mut Scopes, errors: &mut Vec<ValidationError>, rule_id: &'static str) {
    match stmt {
        Stmt::Declare { var_kind, name, .. } => scopes.define(name, *var_kind),

        Stmt::Assign { name, span, .. } => {
            if scopes.kind_of(name) == Some(VarKind::Const) {
                errors.push(ValidationError::error(
                    *span,
                    format!("Cannot assign to constant '{}'", name),
                    rule_id,
                ));
            }
        }

        Stmt::Block { body, .. } => {
            scopes.push();
            for s in body {
                check_stmt(s, scopes, errors, rule_id);
            }
            scopes.pop();
        }

        Stmt::If { then_s, else_s, .. } => {
            check_stmt(then_s, scopes, errors, rule_id);
            if let Some(else_s) = else_s {
                check_stmt(else_s, scopes, errors, rule_id);
            }
        }

        Stmt::While { body, .. } => check_stmt(body, scopes, errors, rule_id),

        Stmt::ForOf {
            var_kind,
            binding,
            body,
            ..
        } => {
            scopes.push();
            scopes.define(binding, *var_kind);
            check_stmt(body, scopes, errors, rule_id);
            scopes.pop();
        }

        Stmt::Try {
            body,
            catch_var,
            catch_body,
            finally_body,
            ..
        } => {
            check_stmt(body, scopes, errors, rule_id);
            if let Some(catch_body) = catch_body {
                scopes.push();
                if let Some(var) = catch_var {
                    scopes.define(var, VarKind::Let);
                }
                check_stmt(catch_body, scopes, errors, rule_id);
                scopes.pop();
            }
            if let Some(finally_body) = finally_body {
                check_stmt(finally_body, scopes, errors, rule_id);
            }
        }

        Stmt::Defer { body, .. } => check_stmt(body, scopes, errors, rule_id),

        Stmt::Return { .. }
        | Stmt::Throw { .. }
        | Stmt::Expr { .. }
        | Stmt::Break { .. }
        | Stmt::Continue { .. } => {}
    }
}

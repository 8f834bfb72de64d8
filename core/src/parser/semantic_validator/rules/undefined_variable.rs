//! Rule: Undefined Variable
//!
//! Warns when an identifier is read or assigned with no declaration in a
//! visible scope. The interpreter raises a catchable `UNDEFINED_VARIABLE`
//! error at runtime, so this stays a warning.
//!
//! ```text
//! let y = x + 1;      // Warning: 'x' is declared below
//! let x = 5;
//! ```

use std::collections::HashSet;

use crate::executor::stdlib::GLOBAL_NAMES;
use crate::executor::types::ast::{Expr, Stmt};
use crate::parser::ProcedureDef;

use super::super::{ValidationError, ValidationRule};
use super::{for_each_child_expr, for_each_stmt_expr};

pub struct UndefinedVariableRule;

impl ValidationRule for UndefinedVariableRule {
    fn id(&self) -> &'static str {
        "undefined-variable"
    }

    fn description(&self) -> &'static str {
        "Variables should be declared before use"
    }

    fn validate(&self, procedures: &[ProcedureDef], _source: &str) -> Vec<ValidationError> {
        let mut checker = Checker {
            scopes: vec![GLOBAL_NAMES.iter().map(|s| s.to_string()).collect()],
            errors: Vec::new(),
            rule_id: self.id(),
        };

        for procedure in procedures {
            checker.scopes.push(procedure.params.iter().cloned().collect());
            checker.stmt(&procedure.body);
            checker.scopes.truncate(1);
        }

        checker.errors
    }
}

struct Checker {
    /// Innermost scope last
    scopes: Vec<HashSet<String>>,
    errors: Vec<ValidationError>,
    rule_id: &'static str,
}

impl Checker {
    fn declare(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string());
        }
    }

    fn is_visible(&self, name: &str) -> bool {
        self.scopes.iter().any(|s| s.contains(name))
    }

    /// Check `stmt` in a fresh scope, optionally pre-binding `name`
    fn nested(&mut self, stmt: &Stmt, name: Option<&str>) {
        self.scopes.push(name.into_iter().map(str::to_string).collect());
        self.stmt(stmt);
        self.scopes.pop();
    }

    fn stmt(&mut self, stmt: &Stmt) {
        // Initializers are checked before the name is bound: `let x = x + 1;`
        for_each_stmt_expr(stmt, |e| self.expr(e));

        match stmt {
            Stmt::Declare { name, .. } => self.declare(name),

            Stmt::Assign { name, span, .. } => {
                if !self.is_visible(name) {
                    self.errors.push(ValidationError::warning(
                        *span,
                        format!("Assignment to undeclared variable '{}'", name),
                        self.rule_id,
                    ));
                }
            }

            Stmt::Block { body, .. } => {
                self.scopes.push(HashSet::new());
                for s in body {
                    self.stmt(s);
                }
                self.scopes.pop();
            }

            Stmt::If { then_s, else_s, .. } => {
                self.nested(then_s, None);
                if let Some(else_s) = else_s {
                    self.nested(else_s, None);
                }
            }

            Stmt::While { body, .. } | Stmt::Defer { body, .. } => self.nested(body, None),

            Stmt::ForOf { binding, body, .. } => self.nested(body, Some(binding.as_str())),

            Stmt::Try {
                body,
                catch_var,
                catch_body,
                finally_body,
                ..
            } => {
                self.nested(body, None);
                if let Some(catch_body) = catch_body {
                    self.nested(catch_body, catch_var.as_deref());
                }
                if let Some(finally_body) = finally_body {
                    self.nested(finally_body, None);
                }
            }

            Stmt::Return { .. }
            | Stmt::Throw { .. }
            | Stmt::Expr { .. }
            | Stmt::Break { .. }
            | Stmt::Continue { .. } => {}
        }
    }

    fn expr(&mut self, expr: &Expr) {
        if let Expr::Ident { name, span } = expr {
            if !self.is_visible(name) {
                self.errors.push(ValidationError::warning(
                    *span,
                    format!("Undefined variable '{}'", name),
                    self.rule_id,
                ));
            }
        }
        for_each_child_expr(expr, |child| self.expr(child));
    }
}

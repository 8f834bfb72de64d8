//! Rule: Loop Control
//!
//! Reports an error for `break` or `continue` outside any loop.

use crate::executor::types::ast::Stmt;
use crate::parser::ProcedureDef;

use super::super::{ValidationError, ValidationRule};

pub struct LoopControlRule;

impl ValidationRule for LoopControlRule {
    fn id(&self) -> &'static str {
        "loop-control"
    }

    fn description(&self) -> &'static str {
        "break and continue must be inside a loop"
    }

    fn validate(&self, procedures: &[ProcedureDef], _source: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for procedure in procedures {
            check_stmt(&procedure.body, 0, &mut errors, self.id());
        }
        errors
    }
}

fn check_stmt(stmt: &Stmt, loops: usize, errors: &mut Vec<ValidationError>, rule_id: &'static str) {
    match stmt {
        Stmt::Block { body, .. } => {
            for s in body {
                check_stmt(s, loops, errors, rule_id);
            }
        }
        Stmt::If { then_s, else_s, .. } => {
            check_stmt(then_s, loops, errors, rule_id);
            if let Some(else_s) = else_s {
                check_stmt(else_s, loops, errors, rule_id);
            }
        }
        Stmt::While { body, .. } | Stmt::ForOf { body, .. } => {
            check_stmt(body, loops + 1, errors, rule_id)
        }
        Stmt::Try {
            body,
            catch_body,
            finally_body,
            ..
        } => {
            check_stmt(body, loops, errors, rule_id);
            if let Some(catch_body) = catch_body {
                check_stmt(catch_body, loops, errors, rule_id);
            }
            if let Some(finally_body) = finally_body {
                check_stmt(finally_body, loops, errors, rule_id);
            }
        }
        Stmt::Defer { body, .. } => check_stmt(body, loops, errors, rule_id),
        Stmt::Break { span } if loops == 0 => errors.push(ValidationError::error(
            *span,
            "break outside of a loop",
            rule_id,
        )),
        Stmt::Continue { span } if loops == 0 => errors.push(ValidationError::error(
            *span,
            "continue outside of a loop",
            rule_id,
        )),
        _ => {}
    }
}

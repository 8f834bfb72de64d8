//! Rule: Cleanup Control
//!
//! Cleanup bodies (`finally` clauses and `defer` blocks) run while the
//! computation is being cancelled or is unwinding an error. They must not
//! suspend and must not redirect control flow out of themselves.
//!
//! # Invalid
//!
//! ```text
//! try { ... } finally { yield "late" }       // suspends during cleanup
//! defer { return 1 }                         // replaces the result
//! while (x) { defer { break } }              // jumps out of the cleanup
//! ```
//!
//! A loop written entirely inside the cleanup body may use `break` and
//! `continue` freely.

use crate::executor::types::ast::{Expr, Span, Stmt};
use crate::parser::ProcedureDef;

use super::super::{ValidationError, ValidationRule};
use super::{for_each_child_expr, for_each_stmt_expr};

pub struct CleanupControlRule;

impl ValidationRule for CleanupControlRule {
    fn id(&self) -> &'static str {
        "cleanup-control"
    }

    fn description(&self) -> &'static str {
        "finally and defer bodies may not yield, return, or jump out"
    }

    fn validate(&self, procedures: &[ProcedureDef], _source: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for procedure in procedures {
            find_cleanups(&procedure.body, &mut errors, self.id());
        }
        errors
    }
}

/// Walk ordinary code looking for cleanup bodies
fn find_cleanups(stmt: &Stmt, errors: &mut Vec<ValidationError>, rule_id: &'static str) {
    match stmt {
        Stmt::Block { body, .. } => {
            for s in body {
                find_cleanups(s, errors, rule_id);
            }
        }
        Stmt::If { then_s, else_s, .. } => {
            find_cleanups(then_s, errors, rule_id);
            if let Some(else_s) = else_s {
                find_cleanups(else_s, errors, rule_id);
            }
        }
        Stmt::While { body, .. } | Stmt::ForOf { body, .. } => find_cleanups(body, errors, rule_id),
        Stmt::Try {
            body,
            catch_body,
            finally_body,
            ..
        } => {
            find_cleanups(body, errors, rule_id);
            if let Some(catch_body) = catch_body {
                find_cleanups(catch_body, errors, rule_id);
            }
            if let Some(finally_body) = finally_body {
                check_cleanup(finally_body, 0, "finally", errors, rule_id);
            }
        }
        Stmt::Defer { body, .. } => check_cleanup(body, 0, "defer", errors, rule_id),
        _ => {}
    }
}

/// Check a statement inside a cleanup body; `loops` counts loops opened inside it
fn check_cleanup(
    stmt: &Stmt,
    loops: usize,
    context: &'static str,
    errors: &mut Vec<ValidationError>,
    rule_id: &'static str,
) {
    for_each_stmt_expr(stmt, |e| check_expr(e, context, errors, rule_id));

    match stmt {
        Stmt::Block { body, .. } => {
            for s in body {
                check_cleanup(s, loops, context, errors, rule_id);
            }
        }
        Stmt::If { then_s, else_s, .. } => {
            check_cleanup(then_s, loops, context, errors, rule_id);
            if let Some(else_s) = else_s {
                check_cleanup(else_s, loops, context, errors, rule_id);
            }
        }
        Stmt::While { body, .. } | Stmt::ForOf { body, .. } => {
            check_cleanup(body, loops + 1, context, errors, rule_id)
        }
        Stmt::Try {
            body,
            catch_body,
            finally_body,
            ..
        } => {
            check_cleanup(body, loops, context, errors, rule_id);
            if let Some(catch_body) = catch_body {
                check_cleanup(catch_body, loops, context, errors, rule_id);
            }
            if let Some(finally_body) = finally_body {
                check_cleanup(finally_body, 0, "finally", errors, rule_id);
            }
        }
        Stmt::Defer { body, .. } => check_cleanup(body, 0, "defer", errors, rule_id),
        Stmt::Return { span, .. } => {
            errors.push(ValidationError::error(
                *span,
                format!("return is not allowed inside a {} body", context),
                rule_id,
            ));
        }
        Stmt::Break { span } if loops == 0 => jump_error(*span, "break", context, errors, rule_id),
        Stmt::Continue { span } if loops == 0 => {
            jump_error(*span, "continue", context, errors, rule_id)
        }
        _ => {}
    }
}

fn jump_error(
    span: Span,
    keyword: &str,
    context: &str,
    errors: &mut Vec<ValidationError>,
    rule_id: &'static str,
) {
    errors.push(ValidationError::error(
        span,
        format!("{} cannot leave a {} body", keyword, context),
        rule_id,
    ));
}

fn check_expr(
    expr: &Expr,
    context: &'static str,
    errors: &mut Vec<ValidationError>,
    rule_id: &'static str,
) {
    if let Expr::Yield { span, .. } = expr {
        errors.push(ValidationError::error(
            *span,
            format!("yield is not allowed inside a {} body", context),
            rule_id,
        ));
    }
    for_each_child_expr(expr, |child| check_expr(child, context, errors, rule_id));
}

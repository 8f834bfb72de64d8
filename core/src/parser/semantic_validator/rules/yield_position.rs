//! Rule: Yield Position
//!
//! Reports an error when `yield` appears inside an expression rather than
//! as the whole value of a statement. The executor suspends at statement
//! granularity, so these are the only places it can resume into.
//!
//! # Valid
//!
//! ```text
//! yield "ready"
//! let answer = yield "question"
//! answer = yield
//! ```
//!
//! # Invalid
//!
//! ```text
//! let x = (yield 1) + 1      // yield inside binary op
//! emit(yield)                // yield inside call args
//! return yield 2             // yield as a return value
//! if (yield) { }             // yield in condition
//! yield yield 1              // yield as the operand of a yield
//! ```

use crate::executor::types::ast::{Expr, Stmt};
use crate::parser::ProcedureDef;

use super::super::{ValidationError, ValidationRule};
use super::{for_each_child_expr, for_each_stmt_expr};

/// Rule that checks for yield expressions nested inside other expressions.
pub struct YieldPositionRule;

impl ValidationRule for YieldPositionRule {
    fn id(&self) -> &'static str {
        "yield-position"
    }

    fn description(&self) -> &'static str {
        "yield must be a whole statement, initializer or assigned value"
    }

    fn validate(&self, procedures: &[ProcedureDef], _source: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for procedure in procedures {
            check_stmt(&procedure.body, &mut errors, self.id());
        }
        errors
    }
}

// ============================================================================
// AST Traversal
// ============================================================================

fn check_stmt(stmt: &Stmt, errors: &mut Vec<ValidationError>, rule_id: &'static str) {
    match stmt {
        // These ALLOW yield as the outermost expression
        Stmt::Expr { expr, .. }
        | Stmt::Assign { value: expr, .. }
        | Stmt::Declare {
            init: Some(expr), ..
        } => check_top_level_expr(expr, errors, rule_id),

        Stmt::Block { body, .. } => {
            for s in body {
                check_stmt(s, errors, rule_id);
            }
        }
        Stmt::If { then_s, else_s, .. } => {
            check_nested_stmt_exprs(stmt, errors, rule_id);
            check_stmt(then_s, errors, rule_id);
            if let Some(else_s) = else_s {
                check_stmt(else_s, errors, rule_id);
            }
        }
        Stmt::While { body, .. } | Stmt::ForOf { body, .. } => {
            check_nested_stmt_exprs(stmt, errors, rule_id);
            check_stmt(body, errors, rule_id);
        }
        Stmt::Try {
            body,
            catch_body,
            finally_body,
            ..
        } => {
            check_stmt(body, errors, rule_id);
            if let Some(catch_body) = catch_body {
                check_stmt(catch_body, errors, rule_id);
            }
            if let Some(finally_body) = finally_body {
                check_stmt(finally_body, errors, rule_id);
            }
        }
        Stmt::Defer { body, .. } => check_stmt(body, errors, rule_id),

        // These DON'T allow yield anywhere in their expressions
        Stmt::Return { .. } | Stmt::Throw { .. } => check_nested_stmt_exprs(stmt, errors, rule_id),

        Stmt::Declare { init: None, .. } | Stmt::Break { .. } | Stmt::Continue { .. } => {}
    }
}

/// A yield is allowed here, but not inside its operand
fn check_top_level_expr(expr: &Expr, errors: &mut Vec<ValidationError>, rule_id: &'static str) {
    match expr {
        Expr::Yield {
            value: Some(operand),
            ..
        } => check_no_yield(operand, errors, rule_id),
        Expr::Yield { value: None, .. } => {}
        _ => check_no_yield(expr, errors, rule_id),
    }
}

fn check_nested_stmt_exprs(stmt: &Stmt, errors: &mut Vec<ValidationError>, rule_id: &'static str) {
    for_each_stmt_expr(stmt, |e| check_no_yield(e, errors, rule_id));
}

fn check_no_yield(expr: &Expr, errors: &mut Vec<ValidationError>, rule_id: &'static str) {
    if let Expr::Yield { span, .. } = expr {
        errors.push(ValidationError::error(
            *span,
            "yield can only be used as a whole statement, a declaration initializer or an assigned value",
            rule_id,
        ));
    }
    for_each_child_expr(expr, |child| check_no_yield(child, errors, rule_id));
}

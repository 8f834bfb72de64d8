//! Validation Rules
//!
//! Each file in this module contains one validation rule:
//!
//! - `yield_position.rs` - `yield` nested inside other expressions
//! - `cleanup_control.rs` - suspending or jumping out of `finally` / `defer`
//! - `loop_control.rs` - `break` / `continue` outside loops
//! - `const_assign.rs` - assignment to constants
//! - `duplicate_template.rs` - two templates with one name
//! - `undefined_variable.rs` - identifiers with no visible declaration

mod cleanup_control;
mod const_assign;
mod duplicate_template;
mod loop_control;
mod undefined_variable;
mod yield_position;

pub use cleanup_control::CleanupControlRule;
pub use const_assign::ConstAssignRule;
pub use duplicate_template::DuplicateTemplateRule;
pub use loop_control::LoopControlRule;
pub use undefined_variable::UndefinedVariableRule;
pub use yield_position::YieldPositionRule;

use crate::executor::types::ast::{Expr, Stmt};

/// Call `f` on every direct sub-expression of `expr`
pub(crate) fn for_each_child_expr(expr: &Expr, mut f: impl FnMut(&Expr)) {
    match expr {
        Expr::LitList { elements, .. } => elements.iter().for_each(f),
        Expr::LitObj { properties, .. } => properties.iter().for_each(|(_, v)| f(v)),
        Expr::Member { object, .. } => f(object),
        Expr::Call { callee, args, .. } => {
            f(callee);
            args.iter().for_each(f);
        }
        Expr::Unary { operand, .. } => f(operand),
        Expr::Binary { left, right, .. } => {
            f(left);
            f(right);
        }
        Expr::Yield { value, .. } => {
            if let Some(value) = value {
                f(value);
            }
        }
        Expr::LitBool { .. }
        | Expr::LitNum { .. }
        | Expr::LitStr { .. }
        | Expr::LitNull { .. }
        | Expr::Ident { .. } => {}
    }
}

/// Call `f` on every expression held directly by `stmt` (not by nested statements)
pub(crate) fn for_each_stmt_expr(stmt: &Stmt, mut f: impl FnMut(&Expr)) {
    match stmt {
        Stmt::Declare { init: Some(e), .. }
        | Stmt::Return { value: Some(e), .. }
        | Stmt::Assign { value: e, .. }
        | Stmt::If { test: e, .. }
        | Stmt::While { test: e, .. }
        | Stmt::ForOf { iterable: e, .. }
        | Stmt::Throw { value: e, .. }
        | Stmt::Expr { expr: e, .. } => f(e),
        _ => {}
    }
}

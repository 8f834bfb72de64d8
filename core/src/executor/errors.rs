//! Runtime error values
//!
//! Errors raised while a procedure runs are ordinary values (`Val::Error`), so a
//! `try`/`catch` in the procedure can inspect and handle them.

use serde::{Deserialize, Serialize};
use std::fmt;

/* ===================== Error Codes ===================== */

/// Raised by `Error(...)` when no explicit code is given
pub const USER_ERROR: &str = "Error";
pub const UNDEFINED_VARIABLE: &str = "UNDEFINED_VARIABLE";
pub const CONST_ASSIGNMENT: &str = "CONST_ASSIGNMENT";
pub const PROPERTY_NOT_FOUND: &str = "PROPERTY_NOT_FOUND";
pub const TYPE_ERROR: &str = "TYPE_ERROR";
pub const NOT_A_FUNCTION: &str = "NOT_A_FUNCTION";
pub const WRONG_ARG_COUNT: &str = "WRONG_ARG_COUNT";
pub const WRONG_ARG_TYPE: &str = "WRONG_ARG_TYPE";
/// The driver ran out of step budget for a single control operation
pub const STEP_LIMIT: &str = "STEP_LIMIT";
/// Interpreter invariant broken (malformed or unvalidated program)
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";

/* ===================== ErrorInfo ===================== */

/// Error payload carried by `Val::Error`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

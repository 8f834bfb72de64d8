//! Semantic Validation for procedure templates
//!
//! This module provides an extensible rule-based validation system that runs
//! after parsing to catch semantic errors that the grammar can't enforce.
//!
//! # Usage
//!
//! ```ignore
//! use resumable_core::parser::{parse_procedures, semantic_validator::validate_procedures};
//!
//! let procedures = parse_procedures(source)?;
//! let errors = validate_procedures(&procedures, source);
//! if errors.iter().any(|e| e.is_error()) {
//!     // Refuse to register the templates
//! }
//! ```
//!
//! # Architecture
//!
//! 1. **ValidationRule trait** - Each rule implements this trait
//! 2. **Validator** - Collects and runs all rules
//! 3. **ValidationError** - The output of validation (errors and warnings)
//!
//! # Adding a New Rule
//!
//! 1. Create a new file in `semantic_validator/rules/`
//! 2. Implement `ValidationRule` for your struct
//! 3. Add it to the `Validator::new()` constructor

pub mod rules;

use crate::executor::types::ast::Span;

use super::ProcedureDef;

// ============================================================================
// Validation Error Types
// ============================================================================

/// A validation error produced by semantic analysis.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The source location of the issue
    pub span: Span,
    /// Human-readable message
    pub message: String,
    /// Severity level
    pub severity: Severity,
    /// Which rule produced this error
    pub rule_id: &'static str,
}

/// Severity levels for validation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Must be fixed - the template is rejected
    Error,
    /// Should probably be fixed - potential bug
    Warning,
}

impl ValidationError {
    /// Create a new error
    pub fn error(span: Span, message: impl Into<String>, rule_id: &'static str) -> Self {
        Self {
            span,
            message: message.into(),
            severity: Severity::Error,
            rule_id,
        }
    }

    /// Create a new warning
    pub fn warning(span: Span, message: impl Into<String>, rule_id: &'static str) -> Self {
        Self {
            span,
            message: message.into(),
            severity: Severity::Warning,
            rule_id,
        }
    }

    /// Check if this is an error (not a warning)
    pub fn is_error(&self) -> bool {
        matches!(self.severity, Severity::Error)
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(
            f,
            "{} at line {}, col {}: {} [{}]",
            severity,
            self.span.start_line + 1,
            self.span.start_col + 1,
            self.message,
            self.rule_id
        )
    }
}

impl std::error::Error for ValidationError {}

// ============================================================================
// ValidationRule Trait
// ============================================================================

/// Trait that all validation rules must implement.
///
/// Each rule is responsible for checking one specific aspect of the code.
/// Rules see every procedure of a file so that cross-procedure checks
/// (duplicate names) fit the same shape as per-procedure ones.
pub trait ValidationRule: Send + Sync {
    /// Unique identifier for this rule (e.g., "undefined-variable")
    fn id(&self) -> &'static str;

    /// Human-readable description of what this rule checks
    fn description(&self) -> &'static str;

    /// Run the validation and return any errors found.
    fn validate(&self, procedures: &[ProcedureDef], source: &str) -> Vec<ValidationError>;
}

// ============================================================================
// Validator - Runs All Rules
// ============================================================================

/// The main validator that orchestrates all validation rules.
pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    /// Create a new validator with all built-in rules.
    pub fn new() -> Self {
        Self {
            rules: vec![
                // Error rules - the executor relies on these
                Box::new(rules::YieldPositionRule),
                Box::new(rules::CleanupControlRule),
                Box::new(rules::LoopControlRule),
                Box::new(rules::ConstAssignRule),
                Box::new(rules::DuplicateTemplateRule),
                // Warning rules
                Box::new(rules::UndefinedVariableRule),
            ],
        }
    }

    /// Run all validation rules and collect errors.
    pub fn validate(&self, procedures: &[ProcedureDef], source: &str) -> Vec<ValidationError> {
        let mut errors: Vec<ValidationError> = self
            .rules
            .iter()
            .flat_map(|rule| rule.validate(procedures, source))
            .collect();
        errors.sort_by_key(|e| (e.span.start, e.rule_id));
        errors
    }

    /// Get a list of all registered rules
    pub fn rules(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.rules.iter().map(|r| (r.id(), r.description()))
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Validate the procedures of one file and return all diagnostics found.
pub fn validate_procedures(procedures: &[ProcedureDef], source: &str) -> Vec<ValidationError> {
    Validator::new().validate(procedures, source)
}

/// Check if the procedures have any validation errors (not just warnings).
pub fn has_errors(procedures: &[ProcedureDef], source: &str) -> bool {
    validate_procedures(procedures, source)
        .iter()
        .any(|e| e.is_error())
}

#[cfg(test)]
mod tests;

//! Rule: Duplicate Template
//!
//! Reports an error when one file defines two templates with the same name.
//! The catalog keys templates by name, so the second would be unreachable.

use std::collections::HashMap;

use crate::parser::ProcedureDef;

use super::super::{ValidationError, ValidationRule};

pub struct DuplicateTemplateRule;

impl ValidationRule for DuplicateTemplateRule {
    fn id(&self) -> &'static str {
        "duplicate-template"
    }

    fn description(&self) -> &'static str {
        "template names must be unique within a file"
    }

    fn validate(&self, procedures: &[ProcedureDef], _source: &str) -> Vec<ValidationError> {
        let mut first_seen: HashMap<&str, &ProcedureDef> = HashMap::new();
        let mut errors = Vec::new();

        for procedure in procedures {
            match first_seen.get(procedure.name.as_str()) {
                Some(first) => errors.push(ValidationError::error(
                    procedure.span,
                    format!(
                        "Template '{}' is already defined on line {}",
                        procedure.name,
                        first.span.start_line + 1
                    ),
                    self.id(),
                )),
                None => {
                    first_seen.insert(&procedure.name, procedure);
                }
            }
        }

        errors
    }
}

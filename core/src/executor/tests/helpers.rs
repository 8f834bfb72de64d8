//! Test helpers for executor tests
//!
//! Common utilities for parsing procedures and building VMs

use crate::executor::{run_until_done, Val, VM};
use crate::parser::ProcedureDef;
use std::collections::HashMap;

/// Wrap `body` in a procedure whose parameters are the keys of `bindings`
fn wrap(body: &str, bindings: &HashMap<String, Val>) -> String {
    let mut params: Vec<_> = bindings.keys().cloned().collect();
    params.sort();
    format!("function* main({}) {{\n{}\n}}", params.join(", "), body)
}

/// Parse a procedure body, validate, serialize/deserialize, and create VM
///
/// This helper:
/// - Wraps the body in a `function* main(...)` taking every binding as a parameter
/// - Validates it (warnings are allowed, errors fail the test)
/// - Serializes and deserializes the procedure (to test round-trip compatibility)
/// - Creates a VM with the bindings and stdlib injected
///
/// # Returns
/// A VM ready to execute with `run_until_done()` or `step()`
pub fn parse_procedure_and_build_vm(body: &str, bindings: HashMap<String, Val>) -> VM {
    let source = wrap(body, &bindings);
    let procedures = crate::parser::parse_procedures(&source).expect("Parse procedure failed");
    let diagnostics = crate::parser::semantic_validator::validate_procedures(&procedures, &source);
    let validation_errors: Vec<_> = diagnostics.iter().filter(|e| e.is_error()).collect();
    assert!(
        validation_errors.is_empty(),
        "Procedure validation failed: {:?}",
        validation_errors
    );

    build(&procedures[0], bindings)
}

/// Parse a procedure body WITHOUT validation, for testing runtime error behavior.
///
/// Use this helper when testing that the runtime correctly handles programs
/// the validator would reject (e.g., `yield` nested in an expression, `break`
/// outside a loop). These tests verify runtime robustness.
pub fn parse_procedure_without_validation(body: &str, bindings: HashMap<String, Val>) -> VM {
    let source = wrap(body, &bindings);
    let procedures = crate::parser::parse_procedures(&source).expect("Parse procedure failed");
    build(&procedures[0], bindings)
}

fn build(procedure: &ProcedureDef, bindings: HashMap<String, Val>) -> VM {
    let json = serde_json::to_string(procedure).expect("Procedure serialization failed");
    let procedure: ProcedureDef =
        serde_json::from_str(&json).expect("Procedure deserialization failed");
    VM::new(procedure.body, bindings)
}

/// Run to the next stop, then send the VM through JSON and back
pub fn run_and_round_trip(vm: VM) -> VM {
    let mut vm = vm;
    run_until_done(&mut vm);
    let json = serde_json::to_string(&vm).expect("VM serialization failed");
    serde_json::from_str(&json).expect("VM deserialization failed")
}

/// Drain the outbox, keeping only the emitted values
pub fn effects(vm: &mut VM) -> Vec<Val> {
    vm.outbox.drain().into_iter().map(|e| e.value).collect()
}

/// Error code of a thrown or aborting error value
pub fn error_code(v: &Val) -> &str {
    match v {
        Val::Error(err) => &err.code,
        other => panic!("Expected an error value, got {:?}", other),
    }
}

//! Tests for the semantic validation system

use super::*;
use crate::parser::{parse_procedures, ProcedureDef};

// ============================================================================
// Helper Functions
// ============================================================================

/// Wrap statements in a single template and validate, returning errors
fn validate(body: &str) -> Vec<ValidationError> {
    let source = format!("function* main(input) {{\n{}\n}}", body);
    validate_file(&source)
}

fn validate_file(source: &str) -> Vec<ValidationError> {
    let procedures: Vec<ProcedureDef> = parse_procedures(source).expect("Parse should succeed");
    validate_procedures(&procedures, source)
}

/// Check if errors contain a specific rule
fn has_rule(errors: &[ValidationError], rule_id: &str) -> bool {
    errors.iter().any(|e| e.rule_id == rule_id)
}

/// Get errors for a specific rule
fn for_rule<'a>(errors: &'a [ValidationError], rule_id: &str) -> Vec<&'a ValidationError> {
    errors.iter().filter(|e| e.rule_id == rule_id).collect()
}

// ============================================================================
// Yield Position Tests
// ============================================================================

#[test]
fn test_yield_allowed_positions() {
    let errors = validate(
        r#"
yield "a";
let x = yield 1;
x = yield;
const y = yield x + 1;
"#,
    );
    assert!(!has_rule(&errors, "yield-position"), "{:?}", errors);
}

#[test]
fn test_yield_inside_binary_expression() {
    let errors = validate("let x = (yield 1) + 1;");
    let found = for_rule(&errors, "yield-position");
    assert_eq!(found.len(), 1);
    assert!(found[0].is_error());
}

#[test]
fn test_yield_inside_call_argument() {
    let errors = validate("emit(yield 1);");
    assert!(has_rule(&errors, "yield-position"));
}

#[test]
fn test_yield_in_condition_and_return() {
    let errors = validate(
        r#"
if (yield) { emit(1); }
return yield 2;
"#,
    );
    assert_eq!(for_rule(&errors, "yield-position").len(), 2);
}

#[test]
fn test_yield_as_operand_of_yield() {
    let errors = validate("yield yield 1;");
    assert_eq!(for_rule(&errors, "yield-position").len(), 1);
}

// ============================================================================
// Cleanup Control Tests
// ============================================================================

#[test]
fn test_yield_in_finally() {
    let errors = validate(
        r#"
try { yield 1; } finally { yield 2; }
"#,
    );
    let found = for_rule(&errors, "cleanup-control");
    assert_eq!(found.len(), 1);
    assert!(found[0].message.contains("finally"));
}

#[test]
fn test_return_in_defer() {
    let errors = validate("defer { return 1; }");
    let found = for_rule(&errors, "cleanup-control");
    assert_eq!(found.len(), 1);
    assert!(found[0].message.contains("return"));
}

#[test]
fn test_break_out_of_defer() {
    let errors = validate(
        r#"
while (true) {
    defer { break; }
    yield 1;
}
"#,
    );
    assert!(has_rule(&errors, "cleanup-control"));
    // The break is inside a loop, so loop-control stays quiet
    assert!(!has_rule(&errors, "loop-control"));
}

#[test]
fn test_loop_inside_cleanup_is_fine() {
    let errors = validate(
        r#"
try {
    yield 1;
} finally {
    for (let item of [1, 2, 3]) {
        if (item == 2) { continue; }
        emit(item);
        break;
    }
}
"#,
    );
    assert!(!has_rule(&errors, "cleanup-control"), "{:?}", errors);
}

#[test]
fn test_yield_in_try_body_is_fine() {
    let errors = validate(
        r#"
try {
    let x = yield 1;
} catch (e) {
    let y = yield 2;
} finally {
    emit("closed");
}
"#,
    );
    assert!(!has_rule(&errors, "cleanup-control"));
}

// ============================================================================
// Loop Control Tests
// ============================================================================

#[test]
fn test_break_outside_loop() {
    let errors = validate("break;");
    assert_eq!(for_rule(&errors, "loop-control").len(), 1);
}

#[test]
fn test_continue_inside_nested_if_in_loop() {
    let errors = validate(
        r#"
let i = 0;
while (i < 3) {
    i = i + 1;
    if (i == 2) { continue; }
}
"#,
    );
    assert!(!has_rule(&errors, "loop-control"));
}

// ============================================================================
// Const Assignment Tests
// ============================================================================

#[test]
fn test_assign_to_const() {
    let errors = validate(
        r#"
const limit = 3;
limit = 4;
"#,
    );
    let found = for_rule(&errors, "const-assign");
    assert_eq!(found.len(), 1);
    assert!(found[0].message.contains("'limit'"));
}

#[test]
fn test_shadowed_const_is_assignable() {
    let errors = validate(
        r#"
const x = 1;
{
    let x = 2;
    x = 3;
}
"#,
    );
    assert!(!has_rule(&errors, "const-assign"));
}

#[test]
fn test_assign_to_const_loop_binding() {
    let errors = validate("for (const item of [1]) { item = 2; }");
    assert!(has_rule(&errors, "const-assign"));
}

#[test]
fn test_assign_to_global() {
    let errors = validate("Math = 1;");
    assert!(has_rule(&errors, "const-assign"));
}

#[test]
fn test_assign_to_param() {
    let errors = validate("input = 1;");
    assert!(!has_rule(&errors, "const-assign"));
}

// ============================================================================
// Undefined Variable Tests
// ============================================================================

#[test]
fn test_undefined_variable_is_warning() {
    let errors = validate("let y = x + 1;");
    let found = for_rule(&errors, "undefined-variable");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].severity, Severity::Warning);
    assert!(found[0].message.contains("'x'"));
    assert!(!has_errors(
        &parse_procedures("function* main() { let y = x; }").unwrap(),
        ""
    ));
}

#[test]
fn test_params_and_globals_are_defined() {
    let errors = validate(
        r#"
let n = Math.floor(input.count);
emit(str(len([n])));
throw Error("E", "boom");
"#,
    );
    assert!(!has_rule(&errors, "undefined-variable"), "{:?}", errors);
}

#[test]
fn test_catch_variable_scoped_to_catch() {
    let errors = validate(
        r#"
try { yield 1; } catch (e) { emit(e); }
emit(e);
"#,
    );
    assert_eq!(for_rule(&errors, "undefined-variable").len(), 1);
}

#[test]
fn test_for_loop_binding() {
    let errors = validate(
        r#"
for (let item of [1, 2]) { emit(item); }
emit(item);
"#,
    );
    assert_eq!(for_rule(&errors, "undefined-variable").len(), 1);
}

// ============================================================================
// Duplicate Template Tests
// ============================================================================

#[test]
fn test_duplicate_template() {
    let errors = validate_file(
        r#"
function* main() { return 1; }
function* other() { return 2; }
function* main() { return 3; }
"#,
    );
    let found = for_rule(&errors, "duplicate-template");
    assert_eq!(found.len(), 1);
    assert!(found[0].message.contains("line 2"));
}

// ============================================================================
// Validator
// ============================================================================

#[test]
fn test_validator_lists_rules() {
    let ids: Vec<_> = Validator::new().rules().map(|(id, _)| id).collect();
    assert!(ids.contains(&"yield-position"));
    assert!(ids.contains(&"cleanup-control"));
    assert!(ids.contains(&"loop-control"));
    assert!(ids.contains(&"const-assign"));
    assert!(ids.contains(&"duplicate-template"));
    assert!(ids.contains(&"undefined-variable"));
}

#[test]
fn test_display_uses_one_based_positions() {
    let errors = validate("break;");
    let text = for_rule(&errors, "loop-control")[0].to_string();
    assert!(text.starts_with("error at line 2, col 1"), "{}", text);
    assert!(text.ends_with("[loop-control]"));
}

#[test]
fn test_warning_display_and_severity() {
    let errors = validate("emit(missing);");
    let found = for_rule(&errors, "undefined-variable");
    assert!(!found[0].is_error());
    assert!(found[0].to_string().starts_with("warning at line 2"), "{}", found[0]);
}

//! Tests for the computation control protocol

use super::*;
use crate::catalog::Catalog;
use crate::executor::errors;
use maplit::hashmap;

// ============================================================================
// Helper Functions
// ============================================================================

/// Register `source` and start its only template
fn start(source: &str, args: Vec<Val>) -> Computation {
    start_with(source, args, Limits::default())
}

fn start_with(source: &str, args: Vec<Val>, limits: Limits) -> Computation {
    let mut catalog = Catalog::new();
    let names = catalog
        .register_source("test.gen", source)
        .expect("Template should register");
    catalog.start(&names[0], args, limits).unwrap()
}

fn effect_values(computation: &mut Computation) -> Vec<Val> {
    computation
        .take_effects()
        .into_iter()
        .map(|e| e.value)
        .collect()
}

/// Every operation on a terminal computation answers with the finished marker
fn assert_inert(computation: &mut Computation) {
    let state = computation.state();
    assert!(state.is_terminal());

    assert_eq!(computation.resume(Val::Null), Ok(Outcome::Finished));
    assert_eq!(computation.cancel(Val::from("again")), Ok(Outcome::Finished));
    assert_eq!(
        computation.inject_failure(Val::from("again")),
        Ok(Outcome::Finished)
    );

    assert_eq!(computation.state(), state);
    assert!(effect_values(computation).is_empty());
    assert!(computation.pending_cleanup().is_empty());
}

// ============================================================================
// resume
// ============================================================================

#[test]
fn test_zero_suspension_points() {
    let mut computation = start("function* answer() { return 42; }", vec![]);
    assert_eq!(computation.state(), ComputationState::Created);

    assert_eq!(
        computation.resume(Val::Null),
        Ok(Outcome::Returned(Val::Num(42.0)))
    );
    assert_eq!(computation.state(), ComputationState::Completed);
    assert_eq!(computation.completion_value(), Some(&Val::Num(42.0)));
}

#[test]
fn test_completion_without_return_is_null() {
    let mut computation = start("function* nothing() { emit(1); }", vec![]);
    assert_eq!(computation.resume(Val::Null), Ok(Outcome::Returned(Val::Null)));
    assert_eq!(computation.state(), ComputationState::Completed);
}

#[test]
fn test_n_suspension_points_take_n_plus_one_resumes() {
    for n in 0..5 {
        let body = "yield 0;\n".repeat(n);
        let mut computation = start(&format!("function* f() {{\n{}}}", body), vec![]);

        let mut calls = 0;
        loop {
            calls += 1;
            let outcome = computation.resume(Val::Null).unwrap();
            if outcome.is_done() {
                break;
            }
            assert_eq!(computation.state(), ComputationState::Suspended);
        }
        assert_eq!(calls, n + 1, "{} suspension points", n);
    }
}

#[test]
fn test_yield_yield_done_scenario() {
    let source = r#"
function* flow() {
    yield "A";
    yield "B";
    return "done";
}
"#;
    let mut computation = start(source, vec![]);

    assert_eq!(
        computation.resume(Val::Null),
        Ok(Outcome::Yielded(Val::from("A")))
    );
    assert_eq!(computation.last_yielded(), Some(&Val::from("A")));
    assert_eq!(
        computation.resume(Val::Null),
        Ok(Outcome::Yielded(Val::from("B")))
    );
    assert_eq!(
        computation.resume(Val::Null),
        Ok(Outcome::Returned(Val::from("done")))
    );
    assert_eq!(computation.state(), ComputationState::Completed);
    assert_eq!(computation.last_yielded(), Some(&Val::from("B")));

    assert_inert(&mut computation);
}

#[test]
fn test_kth_resume_delivers_input() {
    let source = r#"
function* collect() {
    let a = yield 1;
    let b = yield 2;
    return [a, b];
}
"#;
    let mut computation = start(source, vec![]);

    // The first input has no yield to land on
    computation.resume(Val::from("ignored")).unwrap();
    computation.resume(Val::from("x")).unwrap();
    assert_eq!(
        computation.resume(Val::from("y")),
        Ok(Outcome::Returned(Val::List(vec![
            Val::from("x"),
            Val::from("y")
        ])))
    );
}

#[test]
fn test_raised_error_fails_computation() {
    let source = r#"
function* broken() {
    yield 1;
    throw Error("E_BROKEN", "it broke");
}
"#;
    let mut computation = start(source, vec![]);
    computation.resume(Val::Null).unwrap();

    let err = computation.resume(Val::Null).unwrap_err();
    assert_eq!(
        err,
        ComputationError::Raised(Val::error("E_BROKEN", "it broke"))
    );
    assert_eq!(err.error_value(), Some(&Val::error("E_BROKEN", "it broke")));
    assert_eq!(computation.state(), ComputationState::Failed);

    assert_inert(&mut computation);
}

#[test]
fn test_runtime_error_fails_computation() {
    let mut computation = start("function* f(x) { return x.missing; }", vec![Val::Num(1.0)]);

    let Err(ComputationError::Raised(Val::Error(info))) = computation.resume(Val::Null) else {
        panic!("Expected a raised error value");
    };
    assert_eq!(info.code, errors::TYPE_ERROR);
}

// ============================================================================
// cancel
// ============================================================================

#[test]
fn test_cancel_runs_cleanup_scenario() {
    let source = r#"
function* flow() {
    try {
        yield "A";
        yield "B";
    } finally {
        emit("cleanup");
    }
}
"#;
    let mut computation = start(source, vec![]);
    computation.resume(Val::Null).unwrap();
    assert_eq!(computation.pending_cleanup().len(), 1);

    assert_eq!(
        computation.cancel(Val::from("stopped")),
        Ok(Outcome::Returned(Val::from("stopped")))
    );
    assert_eq!(computation.state(), ComputationState::Completed);
    assert_eq!(effect_values(&mut computation), vec![Val::from("cleanup")]);
    assert_eq!(computation.completion_value(), Some(&Val::from("stopped")));

    assert_inert(&mut computation);
}

#[test]
fn test_cancel_runs_cleanups_once_in_reverse_order() {
    let source = r#"
function* nested() {
    defer emit("first registered");
    try {
        defer emit("third registered");
        yield "working";
        emit("never");
    } finally {
        emit("second registered");
    }
    emit("never either");
}
"#;
    let mut computation = start(source, vec![]);
    computation.resume(Val::Null).unwrap();

    let kinds: Vec<_> = computation
        .pending_cleanup()
        .iter()
        .map(|c| c.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![CleanupKind::Defer, CleanupKind::Finally, CleanupKind::Defer]
    );

    computation.cancel(Val::Null).unwrap();
    assert_eq!(
        effect_values(&mut computation),
        vec![
            Val::from("third registered"),
            Val::from("second registered"),
            Val::from("first registered"),
        ]
    );
    assert!(computation.pending_cleanup().is_empty());
}

#[test]
fn test_cancel_is_not_caught() {
    let source = r#"
function* guarded() {
    try {
        yield 1;
    } catch (e) {
        emit("caught");
    }
    emit("after");
}
"#;
    let mut computation = start(source, vec![]);
    computation.resume(Val::Null).unwrap();

    assert_eq!(
        computation.cancel(Val::Num(0.0)),
        Ok(Outcome::Returned(Val::Num(0.0)))
    );
    assert!(effect_values(&mut computation).is_empty());
}

#[test]
fn test_cancel_before_start_runs_nothing() {
    let source = r#"
function* eager() {
    emit("started");
    defer emit("cleanup");
    yield 1;
}
"#;
    let mut computation = start(source, vec![]);

    assert_eq!(
        computation.cancel(Val::from("early")),
        Ok(Outcome::Returned(Val::from("early")))
    );
    assert_eq!(computation.state(), ComputationState::Completed);
    assert!(effect_values(&mut computation).is_empty());

    assert_inert(&mut computation);
}

#[test]
fn test_cleanup_error_supersedes_cancel() {
    let source = r#"
function* fragile() {
    try {
        yield 1;
    } finally {
        throw "cleanup failed";
    }
}
"#;
    let mut computation = start(source, vec![]);
    computation.resume(Val::Null).unwrap();

    assert_eq!(
        computation.cancel(Val::Null),
        Err(ComputationError::Raised(Val::from("cleanup failed")))
    );
    assert_eq!(computation.state(), ComputationState::Failed);
}

#[test]
fn test_cleanup_error_during_cancel_bypasses_catch() {
    let source = r#"
function* guarded() {
    try {
        try {
            yield "A";
        } finally {
            throw "cleanup failed";
        }
    } catch (e) {
        emit("caught " + e);
    }
    yield "B";
}
"#;
    let mut computation = start(source, vec![]);
    assert_eq!(
        computation.resume(Val::Null),
        Ok(Outcome::Yielded(Val::from("A")))
    );

    assert_eq!(
        computation.cancel(Val::from("stopped")),
        Err(ComputationError::Raised(Val::from("cleanup failed")))
    );
    assert_eq!(computation.state(), ComputationState::Failed);
    assert!(effect_values(&mut computation).is_empty());
    assert_inert(&mut computation);
}

#[test]
fn test_cancel_unvalidated_yield_in_finally() {
    let program = crate::parser::parse("try { yield 1; } finally { yield 2; }").unwrap();
    let mut computation = Computation::from_program(program, hashmap! {}, Limits::default());
    assert_eq!(
        computation.resume(Val::Null),
        Ok(Outcome::Yielded(Val::Num(1.0)))
    );

    let err = computation.cancel(Val::from("stopped")).unwrap_err();
    let ComputationError::Raised(Val::Error(info)) = &err else {
        panic!("Expected a raised error value, got {:?}", err);
    };
    assert_eq!(info.code, errors::INTERNAL_ERROR);
    assert_eq!(computation.state(), ComputationState::Failed);
    assert_inert(&mut computation);
}

#[test]
fn test_bare_defer_in_loop_body() {
    let mut computation = start(
        "function* each() { for (let x of [1, 2]) defer emit(x); }",
        vec![],
    );
    assert_eq!(computation.resume(Val::Null), Ok(Outcome::Returned(Val::Null)));
    assert_eq!(
        effect_values(&mut computation),
        vec![Val::Num(1.0), Val::Num(2.0)]
    );
}

// ============================================================================
// inject_failure
// ============================================================================

#[test]
fn test_injected_failure_caught_scenario() {
    let source = r#"
function* flow() {
    try {
        yield "A";
    } catch (e) {
        emit("caught " + e.message);
    }
    yield "B";
}
"#;
    let mut computation = start(source, vec![]);
    computation.resume(Val::Null).unwrap();

    assert_eq!(
        computation.inject_failure(Val::error("E_NET", "connection reset")),
        Ok(Outcome::Yielded(Val::from("B")))
    );
    assert_eq!(computation.state(), ComputationState::Suspended);
    assert_eq!(
        effect_values(&mut computation),
        vec![Val::from("caught connection reset")]
    );

    assert_eq!(computation.resume(Val::Null), Ok(Outcome::Returned(Val::Null)));
}

#[test]
fn test_uncaught_injection_propagates_unchanged() {
    let source = r#"
function* flow() {
    defer emit("released");
    let reply = yield "waiting";
    return reply;
}
"#;
    let mut computation = start(source, vec![]);
    computation.resume(Val::Null).unwrap();

    let error = Val::error("E_TIMEOUT", "no reply");
    assert_eq!(
        computation.inject_failure(error.clone()),
        Err(ComputationError::Injected(error))
    );
    assert_eq!(computation.state(), ComputationState::Failed);
    assert_eq!(effect_values(&mut computation), vec![Val::from("released")]);

    assert_inert(&mut computation);
}

#[test]
fn test_rethrown_injection_is_still_injected() {
    let source = r#"
function* relay() {
    try {
        yield 1;
    } catch (e) {
        emit("saw " + e);
        throw e;
    }
}
"#;
    let mut computation = start(source, vec![]);
    computation.resume(Val::Null).unwrap();

    assert_eq!(
        computation.inject_failure(Val::from("boom")),
        Err(ComputationError::Injected(Val::from("boom")))
    );
}

#[test]
fn test_replaced_injection_is_raised() {
    let source = r#"
function* translate() {
    try {
        yield 1;
    } catch (e) {
        throw Error("E_WRAPPED", "wrapped: " + e);
    }
}
"#;
    let mut computation = start(source, vec![]);
    computation.resume(Val::Null).unwrap();

    assert_eq!(
        computation.inject_failure(Val::from("boom")),
        Err(ComputationError::Raised(Val::error(
            "E_WRAPPED",
            "wrapped: boom"
        )))
    );
}

#[test]
fn test_injection_caught_then_same_value_raised_later() {
    // Once the operation that delivered the failure ends, it no longer counts
    let source = r#"
function* later() {
    let saved = null;
    try {
        yield 1;
    } catch (e) {
        saved = e;
    }
    yield 2;
    throw saved;
}
"#;
    let mut computation = start(source, vec![]);
    computation.resume(Val::Null).unwrap();
    computation.inject_failure(Val::from("boom")).unwrap();

    assert_eq!(
        computation.resume(Val::Null),
        Err(ComputationError::Raised(Val::from("boom")))
    );
}

#[test]
fn test_inject_before_start_fails_immediately() {
    let mut computation = start("function* f() { emit(\"ran\"); yield 1; }", vec![]);

    assert_eq!(
        computation.inject_failure(Val::from("early")),
        Err(ComputationError::Injected(Val::from("early")))
    );
    assert_eq!(computation.state(), ComputationState::Failed);
    assert!(effect_values(&mut computation).is_empty());

    assert_inert(&mut computation);
}

// ============================================================================
// Step limit
// ============================================================================

#[test]
fn test_step_limit_aborts_and_runs_cleanup() {
    let source = r#"
function* spin() {
    defer emit("released");
    try {
        while (true) { }
    } catch (e) {
        emit("caught");
    }
}
"#;
    let mut computation = start_with(source, vec![], Limits { max_steps: 50 });

    assert_eq!(
        computation.resume(Val::Null),
        Err(ComputationError::StepLimitExceeded { limit: 50 })
    );
    assert_eq!(computation.state(), ComputationState::Failed);
    assert_eq!(effect_values(&mut computation), vec![Val::from("released")]);

    assert_inert(&mut computation);
}

#[test]
fn test_step_limit_drops_endless_cleanup() {
    let source = r#"
function* stuck() {
    try {
        while (true) { }
    } finally {
        while (true) { }
    }
}
"#;
    let mut computation = start_with(source, vec![], Limits { max_steps: 50 });

    assert_eq!(
        computation.resume(Val::Null),
        Err(ComputationError::StepLimitExceeded { limit: 50 })
    );
    assert_eq!(computation.state(), ComputationState::Failed);
    assert_inert(&mut computation);
}

#[test]
fn test_step_limit_is_per_operation() {
    let source = r#"
function* ticker() {
    let i = 0;
    while (true) {
        i = i + 1;
        yield i;
    }
}
"#;
    let mut computation = start_with(source, vec![], Limits { max_steps: 20 });

    for expected in 1..=50 {
        assert_eq!(
            computation.resume(Val::Null),
            Ok(Outcome::Yielded(Val::Num(expected as f64)))
        );
    }
}

// ============================================================================
// Snapshots
// ============================================================================

#[test]
fn test_snapshot_restore_continues() {
    let source = r#"
function* approval(request) {
    defer emit("closed " + request);
    let decision = yield "review " + request;
    return decision;
}
"#;
    let mut computation = start(source, vec![Val::from("PR-7")]);
    computation.resume(Val::Null).unwrap();

    let json = computation.snapshot().to_json().unwrap();
    let snapshot = Snapshot::from_json(&json).unwrap();
    assert_eq!(snapshot.state, ComputationState::Suspended);
    assert_eq!(snapshot.template, "approval");

    let mut restored = Computation::restore(snapshot, Limits::default()).unwrap();
    assert_eq!(restored.id(), computation.id());
    assert_eq!(restored.version_hash(), computation.version_hash());
    assert_eq!(restored.last_yielded(), Some(&Val::from("review PR-7")));

    assert_eq!(
        restored.resume(Val::from("approved")),
        Ok(Outcome::Returned(Val::from("approved")))
    );
    assert_eq!(effect_values(&mut restored), vec![Val::from("closed PR-7")]);

    // The original is untouched
    assert_eq!(computation.state(), ComputationState::Suspended);
}

#[test]
fn test_restore_rejects_inconsistent_state() {
    let mut computation = start("function* f() { yield 1; }", vec![]);
    computation.resume(Val::Null).unwrap();

    let mut snapshot = computation.snapshot();
    snapshot.state = ComputationState::Completed;
    assert!(matches!(
        Computation::restore(snapshot.clone(), Limits::default()),
        Err(ComputationError::Snapshot(_))
    ));

    snapshot.state = ComputationState::Running;
    assert!(Computation::restore(snapshot, Limits::default()).is_err());

    assert!(matches!(
        Snapshot::from_json("{ not json"),
        Err(ComputationError::Snapshot(_))
    ));
}

#[test]
fn test_restore_terminal_stays_inert() {
    let mut computation = start("function* f() { return 1; }", vec![]);
    computation.resume(Val::Null).unwrap();

    let mut restored = Computation::restore(computation.snapshot(), Limits::default()).unwrap();
    assert_eq!(restored.completion_value(), Some(&Val::Num(1.0)));
    assert_inert(&mut restored);
}

// ============================================================================
// Driver conveniences
// ============================================================================

#[test]
fn test_iterator_yields_until_completion() {
    let computation = start("function* f() { yield 1; yield 2; return 3; }", vec![]);
    let values: Vec<_> = computation.collect();
    assert_eq!(values, vec![Ok(Val::Num(1.0)), Ok(Val::Num(2.0))]);
}

#[test]
fn test_iterator_surfaces_errors() {
    let mut computation = start("function* f() { yield 1; throw \"x\"; }", vec![]);
    assert_eq!(computation.next(), Some(Ok(Val::Num(1.0))));
    assert_eq!(
        computation.next(),
        Some(Err(ComputationError::Raised(Val::from("x"))))
    );
    assert_eq!(computation.next(), None);
}

#[test]
fn test_from_program_bindings() {
    let program = crate::parser::parse("let reply = yield greeting; return reply;").unwrap();
    let mut computation = Computation::from_program(
        program,
        hashmap! { "greeting".to_string() => Val::from("hello") },
        Limits::default(),
    );

    assert_eq!(computation.template(), "");
    assert_eq!(
        computation.resume(Val::Null),
        Ok(Outcome::Yielded(Val::from("hello")))
    );
    assert_eq!(
        computation.resume(Val::from("hi")),
        Ok(Outcome::Returned(Val::from("hi")))
    );
}

#[test]
fn test_outcome_json() {
    assert_eq!(
        Outcome::Yielded(Val::from("A")).to_json(),
        serde_json::json!({ "value": "A", "done": false })
    );
    assert_eq!(
        Outcome::Returned(Val::Null).to_json(),
        serde_json::json!({ "value": null, "done": true })
    );
    assert_eq!(Outcome::Finished.to_json(), serde_json::json!({ "done": true }));
    assert_eq!(Outcome::Finished.value(), None);
}

#[test]
fn test_computation_can_move_between_threads() {
    fn assert_send<T: Send>() {}
    assert_send::<Computation>();

    let mut computation = start("function* f() { let x = yield 1; return x; }", vec![]);
    computation.resume(Val::Null).unwrap();

    let handle = std::thread::spawn(move || computation.resume(Val::from("from thread")));
    assert_eq!(
        handle.join().unwrap(),
        Ok(Outcome::Returned(Val::from("from thread")))
    );
}

// Suspendable computations
//
// A Computation wraps an executor VM with the driver-facing protocol:
// - resume(input): run to the next `yield` or to termination
// - cancel(value): finish as if `return value` ran at the suspension point
// - inject_failure(error): resume as if the `yield` threw `error`
//
// Procedure code only runs inside one of these calls. Once a computation
// completes or fails, every further call answers with the finished marker.

mod snapshot;

#[cfg(test)]
mod tests;

pub use snapshot::Snapshot;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use crate::catalog::Template;
use crate::executor::errors;
use crate::executor::{run_for, Budget, CleanupKind, Control, Effect, Span, Stmt, Val, VM};

/// Default step budget for a single control operation
pub const DEFAULT_MAX_STEPS: usize = 100_000;

/* ===================== Limits ===================== */

/// Execution limits applied to every control operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    /// Maximum interpreter steps per resume / cancel / inject_failure
    pub max_steps: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

/* ===================== State ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputationState {
    /// Built but never resumed; no procedure code has run
    Created,
    /// Paused at a `yield`
    Suspended,
    /// Inside a control operation
    Running,
    /// Ran to the end, returned, or was cancelled
    Completed,
    /// An error escaped the procedure
    Failed,
}

impl ComputationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ComputationState::Completed | ComputationState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComputationState::Created => "created",
            ComputationState::Suspended => "suspended",
            ComputationState::Running => "running",
            ComputationState::Completed => "completed",
            ComputationState::Failed => "failed",
        }
    }
}

impl fmt::Display for ComputationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/* ===================== Outcome ===================== */

/// Successful result of a control operation: the `{value, done}` pair
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// `{value, done: false}` - suspended at a `yield`
    Yielded(Val),
    /// `{value, done: true}` - completed during this call
    Returned(Val),
    /// `{done: true}` with no value - the computation had already finished
    Finished,
}

impl Outcome {
    pub fn value(&self) -> Option<&Val> {
        match self {
            Outcome::Yielded(v) | Outcome::Returned(v) => Some(v),
            Outcome::Finished => None,
        }
    }

    pub fn is_done(&self) -> bool {
        !matches!(self, Outcome::Yielded(_))
    }

    /// `{"value": ..., "done": ...}`; the finished marker has no `value` key
    pub fn to_json(&self) -> JsonValue {
        match self.value() {
            Some(v) => json!({ "value": v.to_json(), "done": self.is_done() }),
            None => json!({ "done": true }),
        }
    }
}

/* ===================== Errors ===================== */

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ComputationError {
    /// The procedure's own logic raised an error nothing caught
    #[error("procedure raised {0}")]
    Raised(Val),

    /// A failure supplied by `inject_failure` escaped the procedure
    #[error("injected failure was not handled: {0}")]
    Injected(Val),

    /// One control operation ran more steps than allowed
    #[error("step limit of {limit} exceeded")]
    StepLimitExceeded { limit: usize },

    /// A snapshot could not be written or restored
    #[error("invalid snapshot: {0}")]
    Snapshot(String),
}

impl ComputationError {
    /// The error value that escaped the procedure, if any
    pub fn error_value(&self) -> Option<&Val> {
        match self {
            ComputationError::Raised(v) | ComputationError::Injected(v) => Some(v),
            _ => None,
        }
    }
}

pub type ComputationResult = Result<Outcome, ComputationError>;

/// A registered cleanup action that has not run yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PendingCleanup {
    pub kind: CleanupKind,
    /// Span of the `try` or `defer` that registered it
    pub span: Span,
}

/* ===================== Computation ===================== */

#[derive(Debug, Clone)]
pub struct Computation {
    id: Uuid,
    template: String,
    version_hash: String,
    state: ComputationState,
    vm: VM,
    last_yielded: Option<Val>,
    completion_value: Option<Val>,
    /// Failure delivered by the operation in progress
    injected: Option<Val>,
    limits: Limits,
}

impl Computation {
    /// Start a computation of `template`
    ///
    /// Arguments bind to parameters by position; missing ones are null and
    /// extra ones are ignored. Nothing runs until the first `resume`.
    pub fn new(template: &Template, args: Vec<Val>, limits: Limits) -> Self {
        let mut args = args.into_iter();
        let bindings = template
            .params
            .iter()
            .map(|name| (name.clone(), args.next().unwrap_or(Val::Null)))
            .collect();

        let mut computation = Self::from_program(template.body.clone(), bindings, limits);
        computation.template = template.name.clone();
        computation.version_hash = template.version_hash.clone();
        computation
    }

    /// Start a computation of a bare program with explicit bindings
    pub fn from_program(program: Stmt, bindings: HashMap<String, Val>, limits: Limits) -> Self {
        let computation = Self {
            id: Uuid::new_v4(),
            template: String::new(),
            version_hash: String::new(),
            state: ComputationState::Created,
            vm: VM::new(program, bindings),
            last_yielded: None,
            completion_value: None,
            injected: None,
            limits,
        };
        tracing::debug!(id = %computation.id, "Computation created");
        computation
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Name of the template this computation runs (empty for bare programs)
    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn version_hash(&self) -> &str {
        &self.version_hash
    }

    pub fn state(&self) -> ComputationState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    /// Value handed out at the most recent suspension point
    pub fn last_yielded(&self) -> Option<&Val> {
        self.last_yielded.as_ref()
    }

    /// Value the computation completed with, once completed
    pub fn completion_value(&self) -> Option<&Val> {
        self.completion_value.as_ref()
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Cleanup actions registered by scopes entered but not yet exited,
    /// in registration order
    pub fn pending_cleanup(&self) -> Vec<PendingCleanup> {
        self.vm
            .cleanups
            .iter()
            .map(|entry| PendingCleanup {
                kind: entry.kind,
                span: entry.span,
            })
            .collect()
    }

    /// Take the values emitted since the last call, oldest first
    pub fn take_effects(&mut self) -> Vec<Effect> {
        self.vm.outbox.drain()
    }

    /* ===================== Control Operations ===================== */

    /// Advance to the next suspension point or to termination
    ///
    /// The first call ignores `input`; later calls deliver it as the value of
    /// the `yield` the computation is suspended at.
    pub fn resume(&mut self, input: Val) -> ComputationResult {
        tracing::debug!(id = %self.id, state = %self.state, "resume");

        match self.state {
            ComputationState::Created => {}
            ComputationState::Suspended => {
                self.vm.resume(input);
            }
            // Running is only observable after a panic escaped an earlier call
            ComputationState::Running
            | ComputationState::Completed
            | ComputationState::Failed => return Ok(Outcome::Finished),
        }

        self.drive()
    }

    /// Terminate as if `return value` executed at the current suspension point
    ///
    /// Every pending cleanup action runs (innermost first) before this
    /// returns. An error raised by cleanup cannot be caught by the
    /// procedure; it fails the computation. Cancelling a computation that
    /// never started completes it without running any procedure code.
    pub fn cancel(&mut self, value: Val) -> ComputationResult {
        tracing::debug!(id = %self.id, state = %self.state, "cancel");

        match self.state {
            ComputationState::Created => {
                self.vm.discard();
                Ok(self.complete(value))
            }
            ComputationState::Suspended => {
                self.vm.resume_with_cancel(value);
                self.drive()
            }
            ComputationState::Running
            | ComputationState::Completed
            | ComputationState::Failed => Ok(Outcome::Finished),
        }
    }

    /// Resume as if the pending `yield` threw `error`
    ///
    /// If the procedure catches it, this behaves like `resume`. Injecting
    /// into a computation that never started fails it immediately.
    pub fn inject_failure(&mut self, error: Val) -> ComputationResult {
        tracing::debug!(id = %self.id, state = %self.state, error = %error, "inject_failure");

        match self.state {
            ComputationState::Created => {
                self.vm.discard();
                self.injected = Some(error.clone());
                Err(self.fail(error))
            }
            ComputationState::Suspended => {
                self.injected = Some(error.clone());
                self.vm.resume_with_throw(error);
                self.drive()
            }
            ComputationState::Running
            | ComputationState::Completed
            | ComputationState::Failed => Ok(Outcome::Finished),
        }
    }

    /* ===================== Driving ===================== */

    /// Run the VM within the step budget and settle the result
    fn drive(&mut self) -> ComputationResult {
        self.state = ComputationState::Running;
        let limit = self.limits.max_steps;

        if run_for(&mut self.vm, limit) == Budget::Exhausted {
            tracing::warn!(id = %self.id, limit, "Step limit exceeded, aborting computation");

            self.vm.abort(Val::error(
                errors::STEP_LIMIT,
                format!("Step limit of {} exceeded", limit),
            ));
            if run_for(&mut self.vm, limit) == Budget::Exhausted {
                tracing::warn!(
                    id = %self.id,
                    pending = self.vm.cleanups.len(),
                    "Cleanup did not finish within the step limit, dropping remaining frames"
                );
                self.vm.discard();
            }

            self.injected = None;
            self.state = ComputationState::Failed;
            return Err(ComputationError::StepLimitExceeded { limit });
        }

        self.settle()
    }

    /// Translate the VM's final control state into an outcome
    fn settle(&mut self) -> ComputationResult {
        match self.vm.control.clone() {
            Control::Suspend(v) => {
                self.state = ComputationState::Suspended;
                self.injected = None;
                self.last_yielded = Some(v.clone());
                tracing::debug!(id = %self.id, value = %v, "Computation suspended");
                Ok(Outcome::Yielded(v))
            }
            // Fell off the end of the body
            Control::None => Ok(self.complete(Val::Null)),
            Control::Return(v) | Control::Cancel(v) => Ok(self.complete(v)),
            Control::Throw(e) | Control::Abort(e) => Err(self.fail(e)),
            Control::Break | Control::Continue => Err(self.fail(Val::error(
                errors::INTERNAL_ERROR,
                "break or continue outside of a loop",
            ))),
        }
    }

    fn complete(&mut self, value: Val) -> Outcome {
        self.state = ComputationState::Completed;
        self.injected = None;
        self.completion_value = Some(value.clone());
        tracing::debug!(id = %self.id, value = %value, "Computation completed");
        Outcome::Returned(value)
    }

    fn fail(&mut self, error: Val) -> ComputationError {
        self.state = ComputationState::Failed;
        tracing::debug!(id = %self.id, error = %error, "Computation failed");

        // A rethrow of the injected value still counts as the injected failure
        match self.injected.take() {
            Some(injected) if injected == error => ComputationError::Injected(error),
            _ => ComputationError::Raised(error),
        }
    }
}

/// Drives the computation like a `for...of` loop: each item is the next
/// yielded value (resuming with null); iteration ends at completion.
impl Iterator for Computation {
    type Item = Result<Val, ComputationError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.resume(Val::Null) {
            Ok(Outcome::Yielded(v)) => Some(Ok(v)),
            Ok(Outcome::Returned(_)) | Ok(Outcome::Finished) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

//! # Executor - Resumable Stack-Driven Interpreter
//!
//! Runs procedure bodies one statement-phase at a time so a run can stop at
//! any `yield` and pick up again later, possibly in another process.
//!
//! ## Core Principles
//!
//! 1. **Stack-driven execution**: All state in `frames: Vec<Frame>`, no recursion
//! 2. **Explicit cleanup stack**: `finally` and `defer` bodies are registered on
//!    `vm.cleanups` and run innermost first on every way out of their scope
//! 3. **Centralized control flow**: `Control` enum manages break/continue/return/throw/abort
//! 4. **Pure executor**: No I/O - just runs until suspend or complete
//!
//! The whole `VM` is serde-serializable; a suspended VM can be written out
//! and read back without losing its place.

pub mod env;
pub mod errors;
pub mod exec_loop;
pub mod expressions;
pub mod outbox;
pub mod statements;
pub mod stdlib;
pub mod types;
pub mod vm;

#[cfg(test)]
mod tests;

// Re-export commonly used items
pub use errors::ErrorInfo;
pub use exec_loop::{run_for, run_until_done, step, Budget};
pub use expressions::EvalResult;
pub use outbox::{Effect, Outbox};
pub use types::{CleanupEntry, CleanupKind, Control, Expr, Span, Stmt, Val};
pub use vm::{Step, VM};

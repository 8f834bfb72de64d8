//! Control flow, cleanup and execution frame types

use super::ast::{Span, Stmt};
use super::phase::{BlockPhase, CleanupPhase, ForPhase, TryPhase, WhilePhase, YieldPhase};
use super::values::Val;
use serde::{Deserialize, Serialize};

/* ===================== Control Flow ===================== */

/// Control flow state
///
/// This represents active control flow (return, break, continue, throw, suspend).
/// When control is not None or Suspend, the VM unwinds the stack to find the
/// appropriate handler. For Suspend, the VM stops and becomes serializable.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Control {
    #[default]
    None,
    Break,
    Continue,
    Return(Val),
    Throw(Val),
    /// Like Throw, but no `catch` may intercept it; cleanup still runs
    Abort(Val),
    /// Driver-requested `return`. An error raised by cleanup during it
    /// becomes an abort, so no procedure code runs afterwards
    Cancel(Val),
    /// Paused at a `yield` with the value handed to the driver
    Suspend(Val),
}

impl Control {
    /// True when the VM must unwind frames before executing anything else
    pub fn is_unwinding(&self) -> bool {
        !matches!(self, Control::None | Control::Suspend(_))
    }
}

/* ===================== Cleanup Stack ===================== */

/// Where a cleanup action was registered from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CleanupKind {
    /// `finally` clause of a `try` statement
    Finally,
    /// `defer` statement inside a block
    Defer,
}

/// A registered cleanup action waiting for its owning frame to exit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupEntry {
    /// Index of the owning frame in `VM::frames`
    pub owner: usize,
    pub kind: CleanupKind,
    pub body: Stmt,
    /// Span of the statement that registered the cleanup
    pub span: Span,
}

/* ===================== Frames ===================== */

/// Frame kind - the type and state of a statement being executed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum FrameKind {
    Block { phase: BlockPhase, idx: usize },
    Declare { phase: YieldPhase },
    Assign { phase: YieldPhase },
    Expr { phase: YieldPhase },
    If,
    While { phase: WhilePhase },
    ForOf { phase: ForPhase, items: Vec<Val>, idx: usize },
    Return,
    Throw,
    Break,
    Continue,
    Try { phase: TryPhase },
    Defer,
    /// Runs a cleanup body; `saved` is the control flow it interrupted
    Cleanup {
        phase: CleanupPhase,
        saved: Control,
        kind: CleanupKind,
    },
}

/// Execution frame - one per active statement
///
/// The frame stack replaces the system call stack, making execution serializable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    /// The kind and state of this frame
    #[serde(flatten)]
    pub kind: FrameKind,

    /// Scope depth when the frame was pushed; popping the frame truncates back to it
    pub scope_base: usize,

    /// The AST node (statement) this frame represents
    pub node: Stmt,
}

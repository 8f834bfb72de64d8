//! Virtual Machine state
//!
//! The VM holds all execution state:
//! - frames: Stack of active statements
//! - env: Scope stack with variable bindings
//! - cleanups: Registered cleanup actions (finally / defer), innermost last
//! - control: Current control flow state (return, throw, suspend, ...)
//! - outbox: Effects emitted since the driver last drained them

use super::env::Env;
use super::outbox::Outbox;
use super::stdlib::inject_stdlib;
use super::types::{
    BlockPhase, CleanupEntry, CleanupPhase, Control, ForPhase, Frame, FrameKind, Stmt, TryPhase,
    Val, VarKind, WhilePhase, YieldPhase,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/* ===================== VM ===================== */

/// Virtual Machine state
///
/// This contains everything needed to execute (and serialize/resume) a program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VM {
    /// Stack of execution frames
    pub frames: Vec<Frame>,

    /// Lexical scopes
    pub env: Env,

    /// Cleanup actions of scopes that have been entered but not exited
    pub cleanups: Vec<CleanupEntry>,

    /// Current control flow state
    pub control: Control,

    /// Value delivered by the driver for the `yield` we are suspended at
    pub resume_value: Option<Val>,

    /// Effects recorded by `emit`
    pub outbox: Outbox,
}

impl VM {
    /// Create a new VM with a program and its parameter bindings
    ///
    /// Stdlib globals live in the outermost scope, `bindings` in the next one,
    /// and the program is pushed as the root frame. Nothing executes until
    /// the driver steps the VM.
    pub fn new(program: Stmt, bindings: HashMap<String, Val>) -> Self {
        let mut globals = HashMap::new();
        inject_stdlib(&mut globals);

        let mut env = Env::new(globals);
        env.push_scope();
        for (name, value) in bindings {
            env.declare(name, value, VarKind::Let);
        }

        let mut vm = VM {
            frames: vec![],
            env,
            cleanups: vec![],
            control: Control::None,
            resume_value: None,
            outbox: Outbox::new(),
        };

        push_stmt(&mut vm, &program);

        vm
    }

    /// The value handed out at the current suspension point, if suspended
    pub fn suspended_value(&self) -> Option<&Val> {
        match &self.control {
            Control::Suspend(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self.control, Control::Suspend(_))
    }

    /// True once the frame stack is empty
    pub fn is_finished(&self) -> bool {
        self.frames.is_empty()
    }

    /// Resume a suspended VM, delivering `value` as the result of the `yield`
    ///
    /// Returns false (and changes nothing) if the VM is not suspended.
    pub fn resume(&mut self, value: Val) -> bool {
        if !self.is_suspended() {
            return false;
        }
        self.control = Control::None;
        self.resume_value = Some(value);
        true
    }

    /// Resume a suspended VM as if the `yield` had thrown `error`
    pub fn resume_with_throw(&mut self, error: Val) -> bool {
        if !self.is_suspended() {
            return false;
        }
        self.control = Control::Throw(error);
        true
    }

    /// Resume a suspended VM as if a `return value` replaced the `yield`
    ///
    /// Cleanup runs, but nothing it raises can be caught by the procedure.
    pub fn resume_with_cancel(&mut self, value: Val) -> bool {
        if !self.is_suspended() {
            return false;
        }
        self.control = Control::Cancel(value);
        true
    }

    /// True while any cleanup body is running
    pub fn in_cleanup(&self) -> bool {
        self.frames
            .iter()
            .any(|f| matches!(f.kind, FrameKind::Cleanup { .. }))
    }

    /// Start an uncatchable unwind. Cleanup actions still run.
    pub fn abort(&mut self, error: Val) {
        self.resume_value = None;
        self.control = Control::Abort(error);
    }

    /// Drop all execution state without running anything
    pub fn discard(&mut self) {
        self.frames.clear();
        self.cleanups.clear();
        self.resume_value = None;
        self.env.truncate(1);
    }
}

/* ===================== Frame Management ===================== */

/// Push a new frame for a statement onto the stack
///
/// This determines the initial phase based on the statement type. Blocks
/// open their scope here so the frame's `scope_base` is the depth to return to.
pub fn push_stmt(vm: &mut VM, stmt: &Stmt) {
    let base = vm.env.depth();

    let kind = match stmt {
        Stmt::Block { .. } => {
            vm.env.push_scope();
            FrameKind::Block {
                phase: BlockPhase::Execute,
                idx: 0,
            }
        }
        Stmt::Declare { .. } => FrameKind::Declare {
            phase: YieldPhase::Eval,
        },
        Stmt::Assign { .. } => FrameKind::Assign {
            phase: YieldPhase::Eval,
        },
        Stmt::Expr { .. } => FrameKind::Expr {
            phase: YieldPhase::Eval,
        },
        Stmt::If { .. } => FrameKind::If,
        Stmt::While { .. } => FrameKind::While {
            phase: WhilePhase::Check,
        },
        Stmt::ForOf { .. } => FrameKind::ForOf {
            phase: ForPhase::Init,
            items: vec![],
            idx: 0,
        },
        Stmt::Return { .. } => FrameKind::Return,
        Stmt::Throw { .. } => FrameKind::Throw,
        Stmt::Break { .. } => FrameKind::Break,
        Stmt::Continue { .. } => FrameKind::Continue,
        Stmt::Try { .. } => FrameKind::Try {
            phase: TryPhase::Enter,
        },
        Stmt::Defer { .. } => FrameKind::Defer,
    };

    vm.frames.push(Frame {
        kind,
        scope_base: base,
        node: stmt.clone(),
    });
}

/// Pop the top frame and drop the scopes it opened
pub fn pop_frame(vm: &mut VM) -> Option<Frame> {
    let frame = vm.frames.pop()?;
    vm.env.truncate(frame.scope_base);
    Some(frame)
}

/// Take the innermost cleanup action owned by the frame at `frame_idx`, if any
///
/// Cleanup entries are pushed in frame order, so anything owned by the top
/// frame sits at the end of the cleanup stack.
pub fn take_owned_cleanup(vm: &mut VM, frame_idx: usize) -> Option<CleanupEntry> {
    match vm.cleanups.last() {
        Some(entry) if entry.owner == frame_idx => vm.cleanups.pop(),
        _ => None,
    }
}

/// Push a frame that runs `entry`'s body and then restores `saved`
pub fn push_cleanup(vm: &mut VM, entry: CleanupEntry, saved: Control) {
    let base = vm.env.depth();
    vm.frames.push(Frame {
        kind: FrameKind::Cleanup {
            phase: CleanupPhase::Run,
            saved,
            kind: entry.kind,
        },
        scope_base: base,
        node: entry.body,
    });
}

/* ===================== Step Result ===================== */

/// Result of executing one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Continue to next step
    Continue,
    /// Execution stopped: suspended, or no frames left
    Done,
}

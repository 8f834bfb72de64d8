//! Core execution loop
//!
//! This module contains the step() function - the heart of the interpreter.
//! It processes one frame at a time, advancing execution phases and managing the frame stack.
//!
//! ## Function Organization
//! Functions are ordered by importance/call hierarchy:
//! 1. run_until_done() / run_for() - Drivers (call step repeatedly)
//! 2. step() - Main execution loop (dispatches to statement handlers)
//! 3. unwind() - Centralized control flow handling

use super::statements::{
    enter_catch, execute_assign, execute_block, execute_cleanup, execute_declare, execute_defer,
    execute_expr, execute_for_of, execute_if, execute_loop_jump, execute_return, execute_throw,
    execute_try, execute_while,
};
use super::errors;
use super::types::{Control, FrameKind, Stmt, TryPhase, Val};
use super::vm::{pop_frame, push_cleanup, take_owned_cleanup, Step, VM};

/* ===================== Public API ===================== */

/// Run the VM until it suspends or runs out of frames
///
/// After it returns, inspect `vm.control` for the final state.
pub fn run_until_done(vm: &mut VM) {
    loop {
        match step(vm) {
            Step::Continue => continue,
            Step::Done => break,
        }
    }
}

/// Outcome of a budgeted run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Budget {
    /// The VM suspended or finished within the budget
    Stopped,
    /// The budget ran out while the VM still had work to do
    Exhausted,
}

/// Run at most `max_steps` steps
pub fn run_for(vm: &mut VM, max_steps: usize) -> Budget {
    for _ in 0..max_steps {
        if step(vm) == Step::Done {
            return Budget::Stopped;
        }
    }

    // With no frames left only the terminal control remains
    if vm.is_suspended() || vm.frames.is_empty() {
        Budget::Stopped
    } else {
        Budget::Exhausted
    }
}

/// Execute one step of the VM
///
/// This is the core interpreter loop. It:
/// 1. Stops if the VM is suspended at a yield
/// 2. Unwinds if control flow is active
/// 3. Gets the top frame and dispatches on its kind and phase
pub fn step(vm: &mut VM) -> Step {
    if vm.is_suspended() {
        return Step::Done;
    }

    if vm.control.is_unwinding() {
        return unwind(vm);
    }

    let Some(frame_idx) = vm.frames.len().checked_sub(1) else {
        // No frames left - execution complete
        return Step::Done;
    };

    // Clone frame data we need (to avoid borrow checker issues)
    let (kind, node) = {
        let f = &vm.frames[frame_idx];
        (f.kind.clone(), f.node.clone())
    };

    match (kind, node) {
        (FrameKind::Block { phase, idx }, Stmt::Block { body, .. }) => {
            execute_block(vm, frame_idx, phase, idx, &body)
        }

        (
            FrameKind::Declare { phase },
            Stmt::Declare {
                var_kind,
                name,
                init,
                ..
            },
        ) => execute_declare(vm, frame_idx, phase, var_kind, &name, init.as_ref()),

        (FrameKind::Assign { phase }, Stmt::Assign { name, value, .. }) => {
            execute_assign(vm, frame_idx, phase, &name, &value)
        }

        (FrameKind::Expr { phase }, Stmt::Expr { expr, .. }) => {
            execute_expr(vm, frame_idx, phase, &expr)
        }

        (
            FrameKind::If,
            Stmt::If {
                test,
                then_s,
                else_s,
                ..
            },
        ) => execute_if(vm, &test, &then_s, else_s.as_deref()),

        (FrameKind::While { .. }, Stmt::While { test, body, .. }) => {
            execute_while(vm, &test, &body)
        }

        (
            FrameKind::ForOf { phase, items, idx },
            Stmt::ForOf {
                var_kind,
                binding,
                iterable,
                body,
                ..
            },
        ) => execute_for_of(
            vm, frame_idx, phase, &items, idx, var_kind, &binding, &iterable, &body,
        ),

        (FrameKind::Return, Stmt::Return { value, .. }) => execute_return(vm, value.as_ref()),

        (FrameKind::Throw, Stmt::Throw { value, .. }) => execute_throw(vm, &value),

        (FrameKind::Break, Stmt::Break { .. }) => execute_loop_jump(vm, Control::Break),

        (FrameKind::Continue, Stmt::Continue { .. }) => execute_loop_jump(vm, Control::Continue),

        (
            FrameKind::Try { phase },
            Stmt::Try {
                body,
                finally_body,
                span,
                ..
            },
        ) => execute_try(vm, frame_idx, phase, &body, finally_body.as_deref(), span),

        (FrameKind::Defer, Stmt::Defer { body, span }) => {
            execute_defer(vm, frame_idx, &body, span)
        }

        (FrameKind::Cleanup { phase, saved, kind }, body) => {
            execute_cleanup(vm, frame_idx, phase, saved, kind, &body)
        }

        // Frame kind does not match node: the snapshot was tampered with
        (kind, node) => {
            vm.abort(Val::error(
                errors::INTERNAL_ERROR,
                format!("Frame {:?} does not match statement at {:?}", kind, node.span()),
            ));
            Step::Continue
        }
    }
}

/* ===================== Control Flow ===================== */

/// Unwind one frame while control flow is active
///
/// - `break` / `continue` stop at the nearest loop
/// - `throw` stops at a `try` whose catch has not started yet
/// - `return` / `abort` run to the bottom of the stack
/// - a control raised inside a cleanup body replaces the one that cleanup
///   interrupted, except that an abort is never replaced and an error
///   raised while cancelling becomes an abort
///
/// Before any frame is popped, every cleanup action it owns runs (innermost
/// first) with the pending control saved in the cleanup frame.
fn unwind(vm: &mut VM) -> Step {
    let Some(frame_idx) = vm.frames.len().checked_sub(1) else {
        // Control fell off the bottom of the stack: terminal
        return Step::Done;
    };

    let (kind, node, base) = {
        let f = &vm.frames[frame_idx];
        (f.kind.clone(), f.node.clone(), f.scope_base)
    };

    match (vm.control.clone(), kind) {
        (Control::Break, FrameKind::While { .. } | FrameKind::ForOf { .. }) => {
            vm.control = Control::None;
            pop_frame(vm);
            return Step::Continue;
        }

        (Control::Continue, FrameKind::While { .. } | FrameKind::ForOf { .. }) => {
            vm.control = Control::None;
            return Step::Continue;
        }

        (
            Control::Throw(error),
            FrameKind::Try {
                phase: TryPhase::Body,
            },
        ) => {
            if let Stmt::Try {
                catch_var,
                catch_body: Some(catch_body),
                ..
            } = &node
            {
                enter_catch(vm, frame_idx, error, catch_var.as_deref(), catch_body);
                return Step::Continue;
            }
            // try/finally without catch: fall through to the cleanup below
            vm.env.truncate(base);
            vm.frames[frame_idx].kind = FrameKind::Try {
                phase: TryPhase::Finally,
            };
        }

        (_, FrameKind::Try { .. }) => {
            // Drop the catch binding before the finally block runs
            vm.env.truncate(base);
            vm.frames[frame_idx].kind = FrameKind::Try {
                phase: TryPhase::Finally,
            };
        }

        (raised, FrameKind::Cleanup { saved, .. }) => {
            vm.control = match (saved, raised) {
                (Control::Abort(e), _) => Control::Abort(e),
                (Control::Cancel(_), Control::Throw(e) | Control::Abort(e)) => Control::Abort(e),
                // Jumps out of cleanup do not stop a cancel
                (Control::Cancel(v), _) => Control::Cancel(v),
                (_, raised) => raised,
            };
            pop_frame(vm);
            return Step::Continue;
        }

        _ => {}
    }

    if let Some(entry) = take_owned_cleanup(vm, frame_idx) {
        let saved = std::mem::take(&mut vm.control);
        push_cleanup(vm, entry, saved);
        return Step::Continue;
    }

    pop_frame(vm);
    Step::Continue
}

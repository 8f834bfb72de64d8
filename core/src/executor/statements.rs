//! Statement execution handlers
//!
//! Each statement type has its own handler function that processes
//! the statement based on its current execution phase.

use super::errors;
use super::expressions::{eval_expr, EvalResult};
use super::types::{
    BlockPhase, CleanupEntry, CleanupKind, CleanupPhase, Control, Expr, ForPhase, FrameKind,
    Span, Stmt, TryPhase, Val, VarKind, YieldPhase,
};
use super::vm::{pop_frame, push_cleanup, push_stmt, take_owned_cleanup, Step, VM};

/* ===================== Helpers ===================== */

/// Evaluate an expression, storing a thrown error in `vm.control`
fn eval_value(vm: &mut VM, expr: &Expr) -> Option<Val> {
    match eval_expr(expr, &vm.env, &mut vm.outbox) {
        EvalResult::Value { v } => Some(v),
        EvalResult::Throw { error } => {
            vm.control = Control::Throw(error);
            None
        }
    }
}

/// Evaluate the value of a statement that may be a suspension point
///
/// For `yield`, the operand is evaluated, the frame moves to its Resumed
/// phase and the VM suspends. Returns None when the VM suspended or threw.
fn eval_or_suspend(vm: &mut VM, frame_idx: usize, expr: &Expr) -> Option<Val> {
    let Expr::Yield { value, .. } = expr else {
        return eval_value(vm, expr);
    };

    // Cleanup bodies never suspend; only unvalidated programs get here
    if vm.in_cleanup() {
        vm.abort(Val::error(
            errors::INTERNAL_ERROR,
            "yield inside a finally or defer body",
        ));
        return None;
    }

    let out = match value {
        Some(operand) => eval_value(vm, operand)?,
        None => Val::Null,
    };

    match &mut vm.frames[frame_idx].kind {
        FrameKind::Declare { phase } | FrameKind::Assign { phase } | FrameKind::Expr { phase } => {
            *phase = YieldPhase::Resumed;
        }
        _ => {}
    }
    vm.control = Control::Suspend(out);
    None
}

/// Value sent by the driver for the `yield` this frame suspended at
fn take_resume_value(vm: &mut VM) -> Val {
    vm.resume_value.take().unwrap_or(Val::Null)
}

/// Step result after a handler left control in some state
fn after(vm: &VM) -> Step {
    if vm.is_suspended() {
        Step::Done
    } else {
        Step::Continue
    }
}

/// Run the frame's cleanup actions (innermost first), then pop it
fn finish_frame(vm: &mut VM, frame_idx: usize) -> Step {
    if let Some(entry) = take_owned_cleanup(vm, frame_idx) {
        push_cleanup(vm, entry, Control::None);
        return Step::Continue;
    }
    pop_frame(vm);
    Step::Continue
}

/* ===================== Statement Handlers ===================== */

/// Execute Block statement
pub fn execute_block(vm: &mut VM, frame_idx: usize, phase: BlockPhase, idx: usize, body: &[Stmt]) -> Step {
    match phase {
        BlockPhase::Execute => {
            if idx >= body.len() {
                // Deferred actions see the block's variables, so run them
                // before the frame (and its scope) goes away
                return finish_frame(vm, frame_idx);
            }

            vm.frames[frame_idx].kind = FrameKind::Block {
                phase: BlockPhase::Execute,
                idx: idx + 1,
            };
            push_stmt(vm, &body[idx]);

            Step::Continue
        }
    }
}

/// Execute Declare statement (`let` / `const`)
pub fn execute_declare(
    vm: &mut VM,
    frame_idx: usize,
    phase: YieldPhase,
    var_kind: VarKind,
    name: &str,
    init: Option<&Expr>,
) -> Step {
    let value = match phase {
        YieldPhase::Eval => match init {
            None => Val::Null,
            Some(expr) => match eval_or_suspend(vm, frame_idx, expr) {
                Some(v) => v,
                None => return after(vm),
            },
        },
        YieldPhase::Resumed => take_resume_value(vm),
    };

    vm.env.declare(name, value, var_kind);
    pop_frame(vm);
    Step::Continue
}

/// Execute Assign statement
pub fn execute_assign(vm: &mut VM, frame_idx: usize, phase: YieldPhase, name: &str, expr: &Expr) -> Step {
    let value = match phase {
        YieldPhase::Eval => match eval_or_suspend(vm, frame_idx, expr) {
            Some(v) => v,
            None => return after(vm),
        },
        YieldPhase::Resumed => take_resume_value(vm),
    };

    if let Err(err) = vm.env.assign(name, value) {
        vm.control = Control::Throw(Val::Error(err));
        return Step::Continue;
    }

    pop_frame(vm);
    Step::Continue
}

/// Execute Expr statement
pub fn execute_expr(vm: &mut VM, frame_idx: usize, phase: YieldPhase, expr: &Expr) -> Step {
    match phase {
        YieldPhase::Eval => {
            if eval_or_suspend(vm, frame_idx, expr).is_none() {
                return after(vm);
            }
        }
        YieldPhase::Resumed => {
            // The value sent back is the result of a bare `yield`; nobody reads it
            take_resume_value(vm);
        }
    }

    pop_frame(vm);
    Step::Continue
}

/// Execute If statement
///
/// The If frame is replaced by the chosen branch.
pub fn execute_if(vm: &mut VM, test: &Expr, then_s: &Stmt, else_s: Option<&Stmt>) -> Step {
    let Some(cond) = eval_value(vm, test) else {
        return Step::Continue;
    };

    pop_frame(vm);
    if cond.is_truthy() {
        push_stmt(vm, then_s);
    } else if let Some(else_s) = else_s {
        push_stmt(vm, else_s);
    }

    Step::Continue
}

/// Execute While statement
///
/// The frame stays in its Check phase; after the body finishes (or a
/// `continue` unwinds back to it) the test is evaluated again.
pub fn execute_while(vm: &mut VM, test: &Expr, body: &Stmt) -> Step {
    let Some(cond) = eval_value(vm, test) else {
        return Step::Continue;
    };

    if cond.is_truthy() {
        push_stmt(vm, body);
    } else {
        pop_frame(vm);
    }

    Step::Continue
}

/// Execute For-of statement
#[allow(clippy::too_many_arguments)]
pub fn execute_for_of(
    vm: &mut VM,
    frame_idx: usize,
    phase: ForPhase,
    items: &[Val],
    idx: usize,
    var_kind: VarKind,
    binding: &str,
    iterable: &Expr,
    body: &Stmt,
) -> Step {
    match phase {
        ForPhase::Init => {
            let Some(value) = eval_value(vm, iterable) else {
                return Step::Continue;
            };
            let Val::List(items) = value else {
                vm.control = Control::Throw(Val::error(
                    errors::TYPE_ERROR,
                    format!("for-of expects a list, got {}", value.type_name()),
                ));
                return Step::Continue;
            };

            vm.frames[frame_idx].kind = FrameKind::ForOf {
                phase: ForPhase::Next,
                items,
                idx: 0,
            };
            Step::Continue
        }

        ForPhase::Next => {
            // Deferred actions of the previous iteration still see its binding
            if let Some(entry) = take_owned_cleanup(vm, frame_idx) {
                push_cleanup(vm, entry, Control::None);
                return Step::Continue;
            }

            // Drop the previous iteration's binding scope
            let base = vm.frames[frame_idx].scope_base;
            vm.env.truncate(base);

            let Some(item) = items.get(idx).cloned() else {
                pop_frame(vm);
                return Step::Continue;
            };

            if let FrameKind::ForOf { idx: next, .. } = &mut vm.frames[frame_idx].kind {
                *next = idx + 1;
            }

            vm.env.push_scope();
            vm.env.declare(binding, item, var_kind);
            push_stmt(vm, body);
            Step::Continue
        }
    }
}

/// Execute Return statement
pub fn execute_return(vm: &mut VM, value: Option<&Expr>) -> Step {
    let val = match value {
        Some(expr) => match eval_value(vm, expr) {
            Some(v) => v,
            None => return Step::Continue,
        },
        None => Val::Null,
    };

    vm.control = Control::Return(val);
    pop_frame(vm);
    Step::Continue
}

/// Execute Throw statement
pub fn execute_throw(vm: &mut VM, value: &Expr) -> Step {
    if let Some(v) = eval_value(vm, value) {
        vm.control = Control::Throw(v);
    }
    pop_frame(vm);
    Step::Continue
}

/// Execute Break / Continue statements
pub fn execute_loop_jump(vm: &mut VM, control: Control) -> Step {
    vm.control = control;
    pop_frame(vm);
    Step::Continue
}

/// Execute Try statement
///
/// Entering the try registers the `finally` clause on the cleanup stack, so
/// it runs exactly once however the statement is left.
pub fn execute_try(
    vm: &mut VM,
    frame_idx: usize,
    phase: TryPhase,
    body: &Stmt,
    finally_body: Option<&Stmt>,
    span: Span,
) -> Step {
    match phase {
        TryPhase::Enter => {
            if let Some(finally_body) = finally_body {
                vm.cleanups.push(CleanupEntry {
                    owner: frame_idx,
                    kind: CleanupKind::Finally,
                    body: finally_body.clone(),
                    span,
                });
            }

            vm.frames[frame_idx].kind = FrameKind::Try {
                phase: TryPhase::Body,
            };
            push_stmt(vm, body);
            Step::Continue
        }

        TryPhase::Body | TryPhase::Catch | TryPhase::Finally => {
            // Normal completion of the try or catch block; the catch binding
            // must not be visible to the finally block
            let base = vm.frames[frame_idx].scope_base;
            vm.env.truncate(base);
            vm.frames[frame_idx].kind = FrameKind::Try {
                phase: TryPhase::Finally,
            };
            finish_frame(vm, frame_idx)
        }
    }
}

/// Enter the catch clause of the Try frame at `frame_idx` with `error` bound
pub fn enter_catch(vm: &mut VM, frame_idx: usize, error: Val, catch_var: Option<&str>, catch_body: &Stmt) {
    vm.control = Control::None;

    let base = vm.frames[frame_idx].scope_base;
    vm.env.truncate(base);
    vm.env.push_scope();
    if let Some(name) = catch_var {
        vm.env.declare(name, error, VarKind::Let);
    }

    vm.frames[frame_idx].kind = FrameKind::Try {
        phase: TryPhase::Catch,
    };
    push_stmt(vm, catch_body);
}

/// Execute Defer statement
///
/// Registers the body on the nearest enclosing scope: a block, or the
/// current iteration of a `for...of` whose body is the bare `defer`. It runs
/// when that scope exits.
pub fn execute_defer(vm: &mut VM, frame_idx: usize, body: &Stmt, span: Span) -> Step {
    let owner = vm.frames[..frame_idx]
        .iter()
        .rposition(|f| matches!(f.kind, FrameKind::Block { .. } | FrameKind::ForOf { .. }));

    pop_frame(vm);

    let entry = CleanupEntry {
        owner: owner.unwrap_or(0),
        kind: CleanupKind::Defer,
        body: body.clone(),
        span,
    };

    match owner {
        Some(_) => vm.cleanups.push(entry),
        // No enclosing block: the scope ends right here
        None => push_cleanup(vm, entry, Control::None),
    }

    Step::Continue
}

/// Execute a Cleanup frame
pub fn execute_cleanup(vm: &mut VM, frame_idx: usize, phase: CleanupPhase, saved: Control, kind: CleanupKind, body: &Stmt) -> Step {
    match phase {
        CleanupPhase::Run => {
            vm.frames[frame_idx].kind = FrameKind::Cleanup {
                phase: CleanupPhase::Restore,
                saved,
                kind,
            };
            push_stmt(vm, body);
            Step::Continue
        }

        CleanupPhase::Restore => {
            // Cleanup finished normally: carry on with whatever it interrupted
            pop_frame(vm);
            vm.control = saved;
            Step::Continue
        }
    }
}

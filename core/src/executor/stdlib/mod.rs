//! Standard library function implementations
//!
//! This module contains all stdlib function implementations organized by category.

pub mod globals;
pub mod math;

use super::expressions::EvalResult;
use super::outbox::Outbox;
use super::types::Val;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/* ===================== Standard Library Function Types ===================== */

/// Standard library function identifiers
///
/// Each variant represents a specific stdlib function.
/// These are serializable and can be stored in the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StdlibFunc {
    MathFloor,
    MathCeil,
    MathAbs,
    MathRound,
    MathMin,
    MathMax,
    Emit,
    MakeError,
    Len,
    Str,
}

impl StdlibFunc {
    pub fn name(&self) -> &'static str {
        match self {
            StdlibFunc::MathFloor => "Math.floor",
            StdlibFunc::MathCeil => "Math.ceil",
            StdlibFunc::MathAbs => "Math.abs",
            StdlibFunc::MathRound => "Math.round",
            StdlibFunc::MathMin => "Math.min",
            StdlibFunc::MathMax => "Math.max",
            StdlibFunc::Emit => "emit",
            StdlibFunc::MakeError => "Error",
            StdlibFunc::Len => "len",
            StdlibFunc::Str => "str",
        }
    }
}

/// Names bound in the global scope of every computation
pub const GLOBAL_NAMES: &[&str] = &["Math", "emit", "Error", "len", "str"];

/* ===================== Stdlib Dispatcher ===================== */

/// Call a standard library function with arguments
///
/// This dispatcher routes to the appropriate function implementation
/// based on the StdlibFunc variant.
pub fn call_stdlib_func(func: &StdlibFunc, args: &[Val], outbox: &mut Outbox) -> EvalResult {
    match func {
        StdlibFunc::MathFloor => math::floor(args),
        StdlibFunc::MathCeil => math::ceil(args),
        StdlibFunc::MathAbs => math::abs(args),
        StdlibFunc::MathRound => math::round(args),
        StdlibFunc::MathMin => math::min(args),
        StdlibFunc::MathMax => math::max(args),
        StdlibFunc::Emit => globals::emit(args, outbox),
        StdlibFunc::MakeError => globals::make_error(args),
        StdlibFunc::Len => globals::len(args),
        StdlibFunc::Str => globals::str(args),
    }
}

/* ===================== Environment Injection ===================== */

/// Inject standard library objects into the global bindings
///
/// Called automatically by VM::new().
pub fn inject_stdlib(globals: &mut HashMap<String, Val>) {
    let mut math_obj = HashMap::new();
    math_obj.insert("floor".to_string(), Val::NativeFunc(StdlibFunc::MathFloor));
    math_obj.insert("ceil".to_string(), Val::NativeFunc(StdlibFunc::MathCeil));
    math_obj.insert("abs".to_string(), Val::NativeFunc(StdlibFunc::MathAbs));
    math_obj.insert("round".to_string(), Val::NativeFunc(StdlibFunc::MathRound));
    math_obj.insert("min".to_string(), Val::NativeFunc(StdlibFunc::MathMin));
    math_obj.insert("max".to_string(), Val::NativeFunc(StdlibFunc::MathMax));
    globals.insert("Math".to_string(), Val::Obj(math_obj));

    globals.insert("emit".to_string(), Val::NativeFunc(StdlibFunc::Emit));
    globals.insert("Error".to_string(), Val::NativeFunc(StdlibFunc::MakeError));
    globals.insert("len".to_string(), Val::NativeFunc(StdlibFunc::Len));
    globals.insert("str".to_string(), Val::NativeFunc(StdlibFunc::Str));
}

//! Global stdlib functions: `emit`, `Error`, `len`, `str`

use crate::executor::errors::{self, ErrorInfo};
use crate::executor::expressions::EvalResult;
use crate::executor::outbox::Outbox;
use crate::executor::types::Val;

fn arg_count(name: &str, args: &[Val], expected: usize) -> Option<EvalResult> {
    if args.len() == expected {
        return None;
    }
    Some(EvalResult::Throw {
        error: Val::Error(ErrorInfo::new(
            errors::WRONG_ARG_COUNT,
            format!("{} expects {} argument(s), got {}", name, expected, args.len()),
        )),
    })
}

/// emit(value) - Record an effect for the driver
pub fn emit(args: &[Val], outbox: &mut Outbox) -> EvalResult {
    if let Some(thrown) = arg_count("emit", args, 1) {
        return thrown;
    }
    outbox.push(args[0].clone());
    EvalResult::Value { v: Val::Null }
}

/// Error(message) or Error(code, message) - Build an error value
pub fn make_error(args: &[Val]) -> EvalResult {
    let (code, message) = match args {
        [message] => (errors::USER_ERROR.to_string(), message.to_string()),
        [Val::Str(code), message] => (code.clone(), message.to_string()),
        [other, _] => {
            return EvalResult::Throw {
                error: Val::Error(ErrorInfo::new(
                    errors::WRONG_ARG_TYPE,
                    format!("Error code must be a string, got {}", other.type_name()),
                )),
            }
        }
        _ => {
            return EvalResult::Throw {
                error: Val::Error(ErrorInfo::new(
                    errors::WRONG_ARG_COUNT,
                    format!("Error expects 1 or 2 arguments, got {}", args.len()),
                )),
            }
        }
    };

    EvalResult::Value {
        v: Val::Error(ErrorInfo::new(code, message)),
    }
}

/// len(value) - Length of a string, list or object
pub fn len(args: &[Val]) -> EvalResult {
    if let Some(thrown) = arg_count("len", args, 1) {
        return thrown;
    }
    let n = match &args[0] {
        Val::Str(s) => s.chars().count(),
        Val::List(items) => items.len(),
        Val::Obj(map) => map.len(),
        other => {
            return EvalResult::Throw {
                error: Val::Error(ErrorInfo::new(
                    errors::WRONG_ARG_TYPE,
                    format!("len expects a string, list or object, got {}", other.type_name()),
                )),
            }
        }
    };
    EvalResult::Value { v: Val::Num(n as f64) }
}

/// str(value) - Display form of any value
pub fn str(args: &[Val]) -> EvalResult {
    if let Some(thrown) = arg_count("str", args, 1) {
        return thrown;
    }
    EvalResult::Value {
        v: Val::Str(args[0].to_string()),
    }
}

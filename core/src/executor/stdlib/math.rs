//! Math stdlib functions

use crate::executor::errors::{self, ErrorInfo};
use crate::executor::expressions::EvalResult;
use crate::executor::types::Val;

fn single_number(name: &str, args: &[Val]) -> Result<f64, EvalResult> {
    if args.len() != 1 {
        return Err(EvalResult::Throw {
            error: Val::Error(ErrorInfo::new(
                errors::WRONG_ARG_COUNT,
                format!("Math.{} expects 1 argument, got {}", name, args.len()),
            )),
        });
    }
    match &args[0] {
        Val::Num(n) => Ok(*n),
        other => Err(EvalResult::Throw {
            error: Val::Error(ErrorInfo::new(
                errors::WRONG_ARG_TYPE,
                format!("Math.{} expects a number, got {}", name, other.type_name()),
            )),
        }),
    }
}

fn unary(name: &str, args: &[Val], f: fn(f64) -> f64) -> EvalResult {
    match single_number(name, args) {
        Ok(n) => EvalResult::Value { v: Val::Num(f(n)) },
        Err(thrown) => thrown,
    }
}

pub fn floor(args: &[Val]) -> EvalResult {
    unary("floor", args, f64::floor)
}

pub fn ceil(args: &[Val]) -> EvalResult {
    unary("ceil", args, f64::ceil)
}

pub fn abs(args: &[Val]) -> EvalResult {
    unary("abs", args, f64::abs)
}

pub fn round(args: &[Val]) -> EvalResult {
    unary("round", args, f64::round)
}

/// Math.min / Math.max over one or more numbers
fn fold(name: &str, args: &[Val], pick: fn(f64, f64) -> f64) -> EvalResult {
    if args.is_empty() {
        return EvalResult::Throw {
            error: Val::Error(ErrorInfo::new(
                errors::WRONG_ARG_COUNT,
                format!("Math.{} expects at least 1 argument", name),
            )),
        };
    }

    let mut acc: Option<f64> = None;
    for arg in args {
        let Val::Num(n) = arg else {
            return EvalResult::Throw {
                error: Val::Error(ErrorInfo::new(
                    errors::WRONG_ARG_TYPE,
                    format!("Math.{} expects numbers, got {}", name, arg.type_name()),
                )),
            };
        };
        acc = Some(acc.map_or(*n, |a| pick(a, *n)));
    }

    EvalResult::Value {
        v: Val::Num(acc.unwrap_or(f64::NAN)),
    }
}

pub fn min(args: &[Val]) -> EvalResult {
    fold("min", args, f64::min)
}

pub fn max(args: &[Val]) -> EvalResult {
    fold("max", args, f64::max)
}

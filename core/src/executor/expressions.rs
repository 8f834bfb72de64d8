//! Expression evaluation
//!
//! Expressions are evaluated in a single call; they never suspend. `yield`
//! only appears as the whole right-hand side of a statement and is handled
//! by the statement's frame, never here.

use super::env::Env;
use super::errors;
use super::outbox::Outbox;
use super::stdlib::call_stdlib_func;
use super::types::{BinaryOp, Expr, UnaryOp, Val};
use std::collections::HashMap;

/// Result of evaluating an expression
#[derive(Debug, Clone, PartialEq)]
pub enum EvalResult {
    /// Expression produced a value
    Value { v: Val },
    /// Expression raised an error value
    Throw { error: Val },
}

impl EvalResult {
    fn into_result(self) -> Result<Val, Val> {
        match self {
            EvalResult::Value { v } => Ok(v),
            EvalResult::Throw { error } => Err(error),
        }
    }
}

/// Evaluate an expression to a value
pub fn eval_expr(expr: &Expr, env: &Env, outbox: &mut Outbox) -> EvalResult {
    match eval(expr, env, outbox) {
        Ok(v) => EvalResult::Value { v },
        Err(error) => EvalResult::Throw { error },
    }
}

/// Internal evaluator: `Err` carries the thrown value so `?` can propagate it
fn eval(expr: &Expr, env: &Env, outbox: &mut Outbox) -> Result<Val, Val> {
    match expr {
        Expr::LitNull { .. } => Ok(Val::Null),
        Expr::LitBool { v, .. } => Ok(Val::Bool(*v)),
        Expr::LitNum { v, .. } => Ok(Val::Num(*v)),
        Expr::LitStr { v, .. } => Ok(Val::Str(v.clone())),

        Expr::LitList { elements, .. } => {
            let mut items = Vec::with_capacity(elements.len());
            for element in elements {
                items.push(eval(element, env, outbox)?);
            }
            Ok(Val::List(items))
        }

        Expr::LitObj { properties, .. } => {
            let mut map = HashMap::with_capacity(properties.len());
            for (key, value) in properties {
                map.insert(key.clone(), eval(value, env, outbox)?);
            }
            Ok(Val::Obj(map))
        }

        Expr::Ident { name, .. } => env.lookup(name).cloned().ok_or_else(|| {
            Val::error(
                errors::UNDEFINED_VARIABLE,
                format!("Variable '{}' is not defined", name),
            )
        }),

        Expr::Member {
            object, property, ..
        } => {
            let target = eval(object, env, outbox)?;
            member(&target, property)
        }

        Expr::Call { callee, args, .. } => {
            let func = eval(callee, env, outbox)?;
            let mut argv = Vec::with_capacity(args.len());
            for arg in args {
                argv.push(eval(arg, env, outbox)?);
            }
            match func {
                Val::NativeFunc(f) => call_stdlib_func(&f, &argv, outbox).into_result(),
                other => Err(Val::error(
                    errors::NOT_A_FUNCTION,
                    format!("Value of type {} is not a function", other.type_name()),
                )),
            }
        }

        Expr::Unary { op, operand, .. } => {
            let v = eval(operand, env, outbox)?;
            match (op, v) {
                (UnaryOp::Not, v) => Ok(Val::Bool(!v.is_truthy())),
                (UnaryOp::Neg, Val::Num(n)) => Ok(Val::Num(-n)),
                (UnaryOp::Neg, other) => Err(Val::error(
                    errors::TYPE_ERROR,
                    format!("Cannot negate a value of type {}", other.type_name()),
                )),
            }
        }

        Expr::Binary {
            op, left, right, ..
        } => match op {
            BinaryOp::And => {
                let l = eval(left, env, outbox)?;
                if l.is_truthy() {
                    eval(right, env, outbox)
                } else {
                    Ok(l)
                }
            }
            BinaryOp::Or => {
                let l = eval(left, env, outbox)?;
                if l.is_truthy() {
                    Ok(l)
                } else {
                    eval(right, env, outbox)
                }
            }
            _ => {
                let l = eval(left, env, outbox)?;
                let r = eval(right, env, outbox)?;
                binary(*op, l, r)
            }
        },

        Expr::Yield { .. } => Err(Val::error(
            errors::INTERNAL_ERROR,
            "yield is only allowed as a whole statement, declaration or assignment value",
        )),
    }
}

fn member(target: &Val, property: &str) -> Result<Val, Val> {
    match (target, property) {
        (Val::Obj(map), _) => map.get(property).cloned().ok_or_else(|| {
            Val::error(
                errors::PROPERTY_NOT_FOUND,
                format!("Property '{}' not found on object", property),
            )
        }),
        (Val::List(items), "length") => Ok(Val::Num(items.len() as f64)),
        (Val::Str(s), "length") => Ok(Val::Num(s.chars().count() as f64)),
        (Val::Error(err), "code") => Ok(Val::Str(err.code.clone())),
        (Val::Error(err), "message") => Ok(Val::Str(err.message.clone())),
        (other, _) => Err(Val::error(
            errors::TYPE_ERROR,
            format!(
                "Cannot access property '{}' on non-object value ({})",
                property,
                other.type_name()
            ),
        )),
    }
}

fn binary(op: BinaryOp, l: Val, r: Val) -> Result<Val, Val> {
    match op {
        BinaryOp::Eq => return Ok(Val::Bool(l == r)),
        BinaryOp::Ne => return Ok(Val::Bool(l != r)),
        _ => {}
    }

    match (op, &l, &r) {
        (BinaryOp::Add, Val::Num(a), Val::Num(b)) => Ok(Val::Num(a + b)),
        (BinaryOp::Add, Val::Str(a), b) => Ok(Val::Str(format!("{}{}", a, b))),
        (BinaryOp::Add, a, Val::Str(b)) => Ok(Val::Str(format!("{}{}", a, b))),
        (BinaryOp::Sub, Val::Num(a), Val::Num(b)) => Ok(Val::Num(a - b)),
        (BinaryOp::Mul, Val::Num(a), Val::Num(b)) => Ok(Val::Num(a * b)),
        (BinaryOp::Div, Val::Num(a), Val::Num(b)) => Ok(Val::Num(a / b)),
        (BinaryOp::Mod, Val::Num(a), Val::Num(b)) => Ok(Val::Num(a % b)),

        (BinaryOp::Lt, Val::Num(a), Val::Num(b)) => Ok(Val::Bool(a < b)),
        (BinaryOp::Lte, Val::Num(a), Val::Num(b)) => Ok(Val::Bool(a <= b)),
        (BinaryOp::Gt, Val::Num(a), Val::Num(b)) => Ok(Val::Bool(a > b)),
        (BinaryOp::Gte, Val::Num(a), Val::Num(b)) => Ok(Val::Bool(a >= b)),
        (BinaryOp::Lt, Val::Str(a), Val::Str(b)) => Ok(Val::Bool(a < b)),
        (BinaryOp::Lte, Val::Str(a), Val::Str(b)) => Ok(Val::Bool(a <= b)),
        (BinaryOp::Gt, Val::Str(a), Val::Str(b)) => Ok(Val::Bool(a > b)),
        (BinaryOp::Gte, Val::Str(a), Val::Str(b)) => Ok(Val::Bool(a >= b)),

        _ => Err(Val::error(
            errors::TYPE_ERROR,
            format!(
                "Operator '{}' is not defined for {} and {}",
                op.symbol(),
                l.type_name(),
                r.type_name()
            ),
        )),
    }
}

//! Runtime value types

use super::super::errors::ErrorInfo;
use super::super::stdlib::StdlibFunc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::fmt;

/// Runtime value type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Val {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    List(Vec<Val>),
    Obj(HashMap<String, Val>),
    /// Error value with code and message
    Error(ErrorInfo),
    /// Standard library function reference
    NativeFunc(StdlibFunc),
}

impl Val {
    /// Check if value is truthy (for conditionals)
    pub fn is_truthy(&self) -> bool {
        match self {
            Val::Null => false,
            Val::Bool(b) => *b,
            Val::Num(n) => *n != 0.0 && !n.is_nan(),
            Val::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Name of the value's type, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Val::Null => "null",
            Val::Bool(_) => "boolean",
            Val::Num(_) => "number",
            Val::Str(_) => "string",
            Val::List(_) => "list",
            Val::Obj(_) => "object",
            Val::Error(_) => "error",
            Val::NativeFunc(_) => "function",
        }
    }

    /// Shorthand for an error value
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Val::Error(ErrorInfo::new(code, message))
    }

    /// Convert a JSON value into a runtime value
    ///
    /// Objects shaped like `{"error": {"code": ..., "message": ...}}` become
    /// error values so that drivers can inject structured failures.
    pub fn from_json(json: &JsonValue) -> Self {
        match json {
            JsonValue::Null => Val::Null,
            JsonValue::Bool(b) => Val::Bool(*b),
            JsonValue::Number(n) => Val::Num(n.as_f64().unwrap_or(f64::NAN)),
            JsonValue::String(s) => Val::Str(s.clone()),
            JsonValue::Array(items) => Val::List(items.iter().map(Val::from_json).collect()),
            JsonValue::Object(map) => {
                if map.len() == 1 {
                    if let Some(JsonValue::Object(inner)) = map.get("error") {
                        let code = inner.get("code").and_then(|c| c.as_str());
                        let message = inner.get("message").and_then(|m| m.as_str());
                        if let (Some(code), Some(message)) = (code, message) {
                            return Val::error(code, message);
                        }
                    }
                }
                Val::Obj(
                    map.iter()
                        .map(|(k, v)| (k.clone(), Val::from_json(v)))
                        .collect(),
                )
            }
        }
    }

    /// Convert to plain JSON (the inverse of [`Val::from_json`])
    pub fn to_json(&self) -> JsonValue {
        match self {
            Val::Null => JsonValue::Null,
            Val::Bool(b) => JsonValue::Bool(*b),
            Val::Num(n) => serde_json::Number::from_f64(*n)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Val::Str(s) => JsonValue::String(s.clone()),
            Val::List(items) => JsonValue::Array(items.iter().map(Val::to_json).collect()),
            Val::Obj(map) => {
                let mut out = Map::new();
                for (k, v) in map {
                    out.insert(k.clone(), v.to_json());
                }
                JsonValue::Object(out)
            }
            Val::Error(err) => serde_json::json!({
                "error": { "code": err.code, "message": err.message }
            }),
            Val::NativeFunc(func) => JsonValue::String(format!("<native {}>", func.name())),
        }
    }
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Null => write!(f, "null"),
            Val::Bool(b) => write!(f, "{}", b),
            Val::Num(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Val::Str(s) => write!(f, "{}", s),
            Val::List(_) | Val::Obj(_) => write!(f, "{}", self.to_json()),
            Val::Error(err) => write!(f, "{}", err),
            Val::NativeFunc(func) => write!(f, "<native {}>", func.name()),
        }
    }
}

impl From<bool> for Val {
    fn from(v: bool) -> Self {
        Val::Bool(v)
    }
}

impl From<f64> for Val {
    fn from(v: f64) -> Self {
        Val::Num(v)
    }
}

impl From<i32> for Val {
    fn from(v: i32) -> Self {
        Val::Num(v as f64)
    }
}

impl From<&str> for Val {
    fn from(v: &str) -> Self {
        Val::Str(v.to_string())
    }
}

impl From<String> for Val {
    fn from(v: String) -> Self {
        Val::Str(v)
    }
}

impl From<ErrorInfo> for Val {
    fn from(v: ErrorInfo) -> Self {
        Val::Error(v)
    }
}

//! Runtime values produced by identifier lookup and literals.

use std::cmp::Ordering;
use std::fmt;

use appgate_core::Version;

use super::error::{ExprError, Result};

/// A resolved operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Str(String),
    /// Version-shaped identifier such as `IDF_VERSION`.
    Version(Version),
    List(Vec<Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Str(_) => "string",
            Value::Version(_) => "version",
            Value::List(_) => "list",
        }
    }

    /// Parse an environment string: integers stay integers, anything else is a string.
    pub fn from_env_str(raw: &str) -> Value {
        let trimmed = raw.trim();
        if let Ok(n) = trimmed.parse::<i64>() {
            return Value::Int(n);
        }
        if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
            if let Ok(n) = i64::from_str_radix(hex, 16) {
                return Value::Int(n);
            }
        }
        Value::Str(raw.to_string())
    }

    /// Equality used by `==`, `!=`, `in`. Values of different kinds are unequal,
    /// except versions, which compare against version-shaped strings.
    pub fn loose_eq(&self, other: &Value) -> Result<bool> {
        match (self, other) {
            (Value::Version(_), Value::Str(_)) | (Value::Str(_), Value::Version(_)) => {
                Ok(self.ordering(other)? == Ordering::Equal)
            }
            _ => Ok(self == other),
        }
    }

    /// Ordering used by `<`, `<=`, `>`, `>=`. Kinds must match, with
    /// versions accepting dotted strings on the other side.
    pub fn ordering(&self, other: &Value) -> Result<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
            (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
            (Value::Version(a), Value::Version(b)) => Ok(a.cmp(b)),
            (Value::Version(a), Value::Str(s)) => Ok(a.cmp(&parse_version(s)?)),
            (Value::Str(s), Value::Version(b)) => Ok(parse_version(s)?.cmp(b)),
            (a, b) => Err(ExprError::evaluation(format!(
                "cannot order {} `{}` against {} `{}`",
                a.type_name(),
                a,
                b.type_name(),
                b
            ))),
        }
    }
}

fn parse_version(s: &str) -> Result<Version> {
    s.parse::<Version>()
        .map_err(|_| ExprError::evaluation(format!("`{}` is not a valid version", s)))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "\"{}\"", s),
            Value::Version(v) => write!(f, "{}", v),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Version> for Value {
    fn from(v: Version) -> Self {
        Value::Version(v)
    }
}

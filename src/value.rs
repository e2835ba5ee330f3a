//! The boxed value model.
//!
//! Columns expose three views: numeric (`f64`), index (`u32`) and object.
//! `Value` is the object view's element type, a tagged variant over the
//! element kinds the engine stores. Missing values are `Option::None` at API
//! boundaries, never a `Value` variant.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A single boxed element of a free or categorical column.
///
/// `Value` implements `Eq` and `Hash` so it can key the reverse lookup of a
/// growing dictionary; reals are compared and hashed by bit pattern.
#[derive(Debug, Clone)]
pub enum Value {
    /// Interned string payload, shared between dictionary and readers.
    Text(Arc<str>),
    Int(i64),
    Real(f64),
    /// Seconds since the epoch.
    DateTime(i64),
    /// Nanoseconds of the day.
    Time(i64),
}

impl Value {
    /// Convenience constructor for text values.
    pub fn text(s: impl Into<Arc<str>>) -> Value {
        Value::Text(s.into())
    }

    /// The text payload, if this is a text value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric interpretation used by the numeric column views.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Real(v) => Some(*v),
            Value::DateTime(v) | Value::Time(v) => Some(*v as f64),
            Value::Text(_) => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            // Bitwise so that NaN == NaN and the reverse map stays coherent.
            (Value::Real(a), Value::Real(b)) => a.to_bits() == b.to_bits(),
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Time(a), Value::Time(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Text(s) => {
                state.write_u8(0);
                s.hash(state);
            }
            Value::Int(v) => {
                state.write_u8(1);
                v.hash(state);
            }
            Value::Real(v) => {
                state.write_u8(2);
                v.to_bits().hash(state);
            }
            Value::DateTime(v) => {
                state.write_u8(3);
                v.hash(state);
            }
            Value::Time(v) => {
                state.write_u8(4);
                v.hash(state);
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{}", s),
            Value::Int(v) => write!(f, "{}", v),
            Value::Real(v) => write!(f, "{}", v),
            Value::DateTime(v) => write!(f, "{}s", v),
            Value::Time(v) => write!(f, "{}ns", v),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Text(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Text(Arc::from(s))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Value {
        Value::Real(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Value {
        Value::Int(v)
    }
}

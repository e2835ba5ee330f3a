//! Mutable, typed column buffers.
//!
//! Buffers are the write side of the engine. Each flavor mirrors one column
//! category, supports random-access writes, and freezes exactly once into an
//! immutable column. After the freeze every mutating operation is a state
//! error.
//!
//! All buffers share one display contract:
//! `"<Flavor> Buffer (<n>)\n(v1, v2, ...)"` with reals printed to three
//! fractional digits, integers plain, NaN as `?`, and infinities spelled
//! out. Buffers longer than 32 elements print the first 30 values, an
//! ellipsis, and the last value.

mod categorical;
mod free;
mod numeric;
mod temporal;

pub use categorical::{AnyCategoricalBuffer, CategoricalBuffer, IndexWidth};
pub use free::FreeBuffer;
pub use numeric::NumericBuffer;
pub(crate) use numeric::round_half_up;
pub use temporal::{DateTimeBuffer, TimeBuffer};

use std::fmt;

/// Longest buffer printed without truncation.
const MAX_DISPLAY: usize = 32;

/// Values shown before the ellipsis when truncating.
const DISPLAY_HEAD: usize = 30;

pub(crate) fn write_prefixed_values(
    f: &mut fmt::Formatter<'_>,
    flavor: &str,
    len: usize,
    mut value_at: impl FnMut(usize) -> String,
) -> fmt::Result {
    write!(f, "{} Buffer ({})\n(", flavor, len)?;
    if len <= MAX_DISPLAY {
        for i in 0..len {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value_at(i))?;
        }
    } else {
        for i in 0..DISPLAY_HEAD {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value_at(i))?;
        }
        write!(f, ", ..., {}", value_at(len - 1))?;
    }
    write!(f, ")")
}

pub(crate) fn real_to_string(v: f64) -> String {
    if v.is_nan() {
        "?".to_string()
    } else if v == f64::INFINITY {
        "Infinity".to_string()
    } else if v == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else {
        format!("{:.3}", v)
    }
}

pub(crate) fn integer_to_string(v: f64) -> String {
    if v.is_finite() {
        format!("{}", v as i64)
    } else {
        real_to_string(v)
    }
}

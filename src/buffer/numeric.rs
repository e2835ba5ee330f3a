//! Numeric column buffers.

use std::fmt;

use crate::buffer::{integer_to_string, real_to_string, write_prefixed_values};
use crate::column::{Capabilities, Column, ColumnType};
use crate::{GirderError, Result};

/// Rounding applied by integer buffers: half always rounds up, so
/// `round(0.5) == 1` and `round(-0.5) == 0`. Non-finite values pass through.
#[inline]
pub(crate) fn round_half_up(v: f64) -> f64 {
    if v.is_finite() {
        (v + 0.5).floor()
    } else {
        v
    }
}

/// A mutable numeric buffer backed by dense 64 bit floats.
///
/// Comes in four flavors: fixed or growing length, real or integer values.
/// Integer flavors round on every write. Once frozen, all writes and resizes
/// fail with [`GirderError::Frozen`].
pub struct NumericBuffer {
    data: Vec<f64>,
    rounded: bool,
    growable: bool,
    frozen: bool,
}

impl NumericBuffer {
    /// Fixed-length buffer of reals, initialized to zero.
    pub fn real(length: usize) -> NumericBuffer {
        NumericBuffer {
            data: vec![0.0; length],
            rounded: false,
            growable: false,
            frozen: false,
        }
    }

    /// Fixed-length buffer of whole numbers; writes are rounded.
    pub fn integer(length: usize) -> NumericBuffer {
        NumericBuffer {
            rounded: true,
            ..NumericBuffer::real(length)
        }
    }

    /// Resizable buffer of reals.
    pub fn growing_real(length: usize) -> NumericBuffer {
        NumericBuffer {
            growable: true,
            ..NumericBuffer::real(length)
        }
    }

    /// Resizable buffer of whole numbers; writes are rounded.
    pub fn growing_integer(length: usize) -> NumericBuffer {
        NumericBuffer {
            rounded: true,
            growable: true,
            ..NumericBuffer::real(length)
        }
    }

    /// Copies the numeric view of a column into a fresh real buffer.
    pub fn from_column(column: &Column) -> Result<NumericBuffer> {
        if !column
            .capabilities()
            .contains(Capabilities::NUMERIC_READABLE)
        {
            return Err(GirderError::UnsupportedCapability("numeric reads"));
        }
        let mut data = vec![0.0; column.size()];
        column.fill_numeric(&mut data, 0, 0, 1);
        Ok(NumericBuffer {
            data,
            rounded: false,
            growable: false,
            frozen: false,
        })
    }

    pub(crate) fn from_vec(data: Vec<f64>, rounded: bool) -> NumericBuffer {
        NumericBuffer {
            data,
            rounded,
            growable: false,
            frozen: false,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> f64 {
        self.data[index]
    }

    /// Writes `value` at `index`, rounding for integer flavors.
    #[inline]
    pub fn set(&mut self, index: usize, value: f64) -> Result<()> {
        if self.frozen {
            return Err(GirderError::Frozen);
        }
        self.data[index] = if self.rounded {
            round_half_up(value)
        } else {
            value
        };
        Ok(())
    }

    /// Truncates or zero-extends a growing buffer to `length`.
    pub fn resize(&mut self, length: usize) -> Result<()> {
        if self.frozen {
            return Err(GirderError::Frozen);
        }
        if !self.growable {
            return Err(GirderError::NotGrowable);
        }
        self.data.resize(length, 0.0);
        Ok(())
    }

    /// Forbids further writes. Idempotent.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Seals the buffer into a numeric column of the declared type.
    pub fn to_column(mut self, ctype: ColumnType) -> Result<Column> {
        self.freeze();
        Column::numeric(ctype, self.data)
    }

    fn flavor(&self) -> &'static str {
        if self.rounded {
            "Integer"
        } else {
            "Real"
        }
    }
}

impl fmt::Display for NumericBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let format = if self.rounded {
            integer_to_string
        } else {
            real_to_string
        };
        write_prefixed_values(f, self.flavor(), self.data.len(), |i| format(self.data[i]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Category;

    fn all_flavors(length: usize) -> Vec<NumericBuffer> {
        vec![
            NumericBuffer::real(length),
            NumericBuffer::integer(length),
            NumericBuffer::growing_real(length),
            NumericBuffer::growing_integer(length),
        ]
    }

    #[test]
    fn set_and_get_round_trip() {
        let mut buffer = NumericBuffer::real(5);
        for i in 0..5 {
            buffer.set(i, i as f64 + 0.25).unwrap();
        }
        for i in 0..5 {
            assert_eq!(buffer.get(i), i as f64 + 0.25);
        }
    }

    #[test]
    fn integer_flavor_rounds_half_up() {
        let mut buffer = NumericBuffer::integer(6);
        for (i, v) in [0.5, -0.5, 4.7, -1.5, 9.8999, 1.49].iter().enumerate() {
            buffer.set(i, *v).unwrap();
        }
        assert_eq!(buffer.data(), &[1.0, 0.0, 5.0, -1.0, 10.0, 1.0]);
    }

    #[test]
    fn integer_flavor_keeps_non_finite_values() {
        let mut buffer = NumericBuffer::integer(3);
        buffer.set(0, f64::NAN).unwrap();
        buffer.set(1, f64::INFINITY).unwrap();
        buffer.set(2, f64::NEG_INFINITY).unwrap();
        assert!(buffer.get(0).is_nan());
        assert_eq!(buffer.get(1), f64::INFINITY);
        assert_eq!(buffer.get(2), f64::NEG_INFINITY);
    }

    #[test]
    fn freeze_rejects_set_and_resize() {
        for mut buffer in all_flavors(4) {
            buffer.freeze();
            buffer.freeze();
            assert!(matches!(buffer.set(0, 1.0), Err(GirderError::Frozen)));
            assert!(matches!(buffer.resize(8), Err(GirderError::Frozen)));
        }
    }

    #[test]
    fn fixed_buffers_cannot_resize() {
        let mut buffer = NumericBuffer::real(4);
        assert!(matches!(buffer.resize(8), Err(GirderError::NotGrowable)));
    }

    #[test]
    fn growing_resize_truncates_and_extends() {
        let mut buffer = NumericBuffer::growing_real(2);
        buffer.set(0, 1.0).unwrap();
        buffer.set(1, 2.0).unwrap();
        buffer.resize(4).unwrap();
        assert_eq!(buffer.data(), &[1.0, 2.0, 0.0, 0.0]);
        buffer.resize(1).unwrap();
        assert_eq!(buffer.data(), &[1.0]);
    }

    #[test]
    fn zero_length_is_legal() {
        let buffer = NumericBuffer::real(0);
        assert_eq!(buffer.len(), 0);
        assert_eq!(buffer.to_string(), "Real Buffer (0)\n()");
    }

    #[test]
    fn to_column_checks_category() {
        let buffer = NumericBuffer::real(3);
        assert!(matches!(
            NumericBuffer::real(3).to_column(ColumnType::Nominal),
            Err(GirderError::TypeMismatch {
                expected: Category::Numeric,
                ..
            })
        ));
        let column = buffer.to_column(ColumnType::Real).unwrap();
        assert_eq!(column.size(), 3);
    }

    #[test]
    fn round_trip_through_column() {
        let mut buffer = NumericBuffer::real(4);
        for i in 0..4 {
            buffer.set(i, i as f64 * 1.5).unwrap();
        }
        let column = buffer.to_column(ColumnType::Real).unwrap();
        let copy = NumericBuffer::from_column(&column).unwrap();
        assert_eq!(copy.data(), &[0.0, 1.5, 3.0, 4.5]);
    }

    #[test]
    fn display_small_real() {
        let mut buffer = NumericBuffer::real(7);
        for (i, v) in [5.0, 7.1, 3.56, 1.1111, 4.0, 4.7, 8.99].iter().enumerate() {
            buffer.set(i, *v).unwrap();
        }
        assert_eq!(
            buffer.to_string(),
            "Real Buffer (7)\n(5.000, 7.100, 3.560, 1.111, 4.000, 4.700, 8.990)"
        );
    }

    #[test]
    fn display_small_integer() {
        let mut buffer = NumericBuffer::integer(7);
        for (i, v) in [5.0, 7.1, 3.56, 1.1111, 4.0, 4.7, 8.99].iter().enumerate() {
            buffer.set(i, *v).unwrap();
        }
        assert_eq!(buffer.to_string(), "Integer Buffer (7)\n(5, 7, 4, 1, 4, 5, 9)");
    }

    #[test]
    fn display_non_finite() {
        let mut buffer = NumericBuffer::real(4);
        buffer.set(0, f64::NAN).unwrap();
        buffer.set(1, f64::NEG_INFINITY).unwrap();
        buffer.set(2, f64::NAN).unwrap();
        buffer.set(3, f64::INFINITY).unwrap();
        assert_eq!(
            buffer.to_string(),
            "Real Buffer (4)\n(?, -Infinity, ?, Infinity)"
        );
    }

    #[test]
    fn display_truncates_long_buffers() {
        let block = [5.0, 7.1, 3.56, 1.1111, 4.0, 4.7, 8.99, 9.8999];
        let mut buffer = NumericBuffer::real(33);
        for i in 0..32 {
            buffer.set(i, block[i % block.len()]).unwrap();
        }
        buffer.set(32, 100.0).unwrap();
        let expected = "Real Buffer (33)\n(5.000, 7.100, 3.560, 1.111, 4.000, 4.700, 8.990, 9.900, \
                        5.000, 7.100, 3.560, 1.111, 4.000, 4.700, 8.990, 9.900, \
                        5.000, 7.100, 3.560, 1.111, 4.000, 4.700, 8.990, 9.900, \
                        5.000, 7.100, 3.560, 1.111, 4.000, 4.700, ..., 100.000)";
        assert_eq!(buffer.to_string(), expected);
    }
}

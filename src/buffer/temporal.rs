//! Buffers for date-time and time columns.
//!
//! Both store one optional 64 bit integer per row: seconds since the epoch
//! for date-times, nanoseconds of the day for times. They freeze into free
//! columns whose object view yields [`Value::DateTime`] and [`Value::Time`].

use std::fmt;

use crate::buffer::write_prefixed_values;
use crate::column::{Column, ColumnType};
use crate::value::Value;
use crate::{GirderError, Result};

macro_rules! temporal_buffer {
    ($name:ident, $flavor:literal, $ctype:expr, $variant:path, $unit:literal) => {
        #[doc = concat!("A mutable buffer of ", $unit, " instants.")]
        pub struct $name {
            data: Vec<Option<i64>>,
            frozen: bool,
        }

        impl $name {
            /// Buffer of the given length, all rows missing.
            pub fn new(length: usize) -> $name {
                $name {
                    data: vec![None; length],
                    frozen: false,
                }
            }

            pub fn len(&self) -> usize {
                self.data.len()
            }

            pub fn is_empty(&self) -> bool {
                self.data.is_empty()
            }

            pub fn get(&self, index: usize) -> Option<i64> {
                self.data[index]
            }

            pub fn set(&mut self, index: usize, value: Option<i64>) -> Result<()> {
                if self.frozen {
                    return Err(GirderError::Frozen);
                }
                self.data[index] = value;
                Ok(())
            }

            /// Forbids further writes. Idempotent.
            pub fn freeze(&mut self) {
                self.frozen = true;
            }

            pub fn is_frozen(&self) -> bool {
                self.frozen
            }

            /// Seals the buffer into a column of the matching type.
            pub fn to_column(mut self) -> Column {
                self.freeze();
                let values = self
                    .data
                    .into_iter()
                    .map(|slot| slot.map($variant))
                    .collect();
                // The declared type always matches the free category here.
                Column::free($ctype, values).expect("temporal types are free columns")
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write_prefixed_values(f, $flavor, self.data.len(), |i| match self.data[i] {
                    Some(v) => v.to_string(),
                    None => "?".to_string(),
                })
            }
        }
    };
}

temporal_buffer!(
    DateTimeBuffer,
    "Date-Time",
    ColumnType::DateTime,
    Value::DateTime,
    "epoch-second"
);
temporal_buffer!(
    TimeBuffer,
    "Time",
    ColumnType::Time,
    Value::Time,
    "nanosecond-of-day"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_time_round_trip() {
        let mut buffer = DateTimeBuffer::new(3);
        buffer.set(0, Some(1_500_000_000)).unwrap();
        buffer.set(2, None).unwrap();
        let column = buffer.to_column();
        assert_eq!(column.column_type(), ColumnType::DateTime);
        assert_eq!(column.get_object(0), Some(Value::DateTime(1_500_000_000)));
        assert_eq!(column.get_object(1), None);
        assert!(column.get_numeric(0).is_nan());
    }

    #[test]
    fn time_round_trip() {
        let mut buffer = TimeBuffer::new(2);
        buffer.set(1, Some(42)).unwrap();
        let column = buffer.to_column();
        assert_eq!(column.column_type(), ColumnType::Time);
        assert_eq!(column.get_object(1), Some(Value::Time(42)));
    }

    #[test]
    fn freeze_rejects_writes() {
        let mut buffer = TimeBuffer::new(1);
        buffer.freeze();
        assert!(matches!(buffer.set(0, Some(1)), Err(GirderError::Frozen)));
    }

    #[test]
    fn display_flavors() {
        let mut buffer = DateTimeBuffer::new(2);
        buffer.set(0, Some(10)).unwrap();
        assert_eq!(buffer.to_string(), "Date-Time Buffer (2)\n(10, ?)");
    }
}

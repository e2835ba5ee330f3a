//! Buffers for free (boxed object) columns.

use std::fmt;

use crate::buffer::write_prefixed_values;
use crate::column::{Capabilities, Column, ColumnType};
use crate::value::Value;
use crate::{GirderError, Result};

/// A mutable buffer of boxed values, one slot per row.
///
/// Any value or `None` may be written; the buffer is single-writer.
pub struct FreeBuffer {
    data: Vec<Option<Value>>,
    frozen: bool,
}

impl FreeBuffer {
    /// Buffer of the given length, all rows missing.
    pub fn new(length: usize) -> FreeBuffer {
        FreeBuffer {
            data: vec![None; length],
            frozen: false,
        }
    }

    /// Copies the object view of a column into a fresh buffer.
    pub fn from_column(column: &Column) -> Result<FreeBuffer> {
        if !column
            .capabilities()
            .contains(Capabilities::OBJECT_READABLE)
        {
            return Err(GirderError::UnsupportedCapability("object reads"));
        }
        let mut data = vec![None; column.size()];
        column.fill_objects(&mut data, 0, 0, 1);
        Ok(FreeBuffer {
            data,
            frozen: false,
        })
    }

    pub(crate) fn from_vec(data: Vec<Option<Value>>) -> FreeBuffer {
        FreeBuffer {
            data,
            frozen: false,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.data[index].as_ref()
    }

    pub fn set(&mut self, index: usize, value: Option<Value>) -> Result<()> {
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

    /// Seals the buffer into a free column of the declared type.
    pub fn to_column(mut self, ctype: ColumnType) -> Result<Column> {
        self.freeze();
        Column::free(ctype, self.data)
    }
}

impl fmt::Display for FreeBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_prefixed_values(f, "Free", self.data.len(), |i| match &self.data[i] {
            Some(value) => value.to_string(),
            None => "?".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Category;

    #[test]
    fn set_and_get_round_trip() {
        let mut buffer = FreeBuffer::new(3);
        buffer.set(0, Some(Value::text("a"))).unwrap();
        buffer.set(2, Some(Value::text("c"))).unwrap();
        assert_eq!(buffer.get(0), Some(&Value::text("a")));
        assert_eq!(buffer.get(1), None);
        assert_eq!(buffer.get(2), Some(&Value::text("c")));
    }

    #[test]
    fn freeze_rejects_writes() {
        let mut buffer = FreeBuffer::new(2);
        buffer.freeze();
        buffer.freeze();
        assert!(matches!(
            buffer.set(0, Some(Value::text("x"))),
            Err(GirderError::Frozen)
        ));
    }

    #[test]
    fn to_column_checks_category() {
        assert!(matches!(
            FreeBuffer::new(1).to_column(ColumnType::Real),
            Err(GirderError::TypeMismatch {
                expected: Category::Free,
                ..
            })
        ));
    }

    #[test]
    fn round_trip_through_column() {
        let mut buffer = FreeBuffer::new(3);
        buffer.set(1, Some(Value::text("mid"))).unwrap();
        let column = buffer.to_column(ColumnType::Text).unwrap();
        let copy = FreeBuffer::from_column(&column).unwrap();
        assert_eq!(copy.get(0), None);
        assert_eq!(copy.get(1), Some(&Value::text("mid")));
    }

    #[test]
    fn display_marks_missing_slots() {
        let mut buffer = FreeBuffer::new(3);
        buffer.set(0, Some(Value::text("a"))).unwrap();
        assert_eq!(buffer.to_string(), "Free Buffer (3)\n(a, ?, ?)");
    }
}

//! Arrow interop: export tables as record batches and back.
//!
//! The mapping is by column type: real columns become `Float64` arrays,
//! integer, date-time and time columns become `Int64` arrays, and nominal
//! and text columns become `Utf8` arrays with the dictionary resolved.
//! Missing values travel as Arrow nulls in both directions.

use std::sync::Arc;

use ::arrow::array::{Array, ArrayRef, Float64Array, Int64Array, StringArray};
use ::arrow::datatypes::{DataType, Field, Schema};
use ::arrow::record_batch::RecordBatch;

use crate::buffer::{CategoricalBuffer, NumericBuffer};
use crate::column::{Column, ColumnType};
use crate::table::Table;
use crate::value::Value;
use crate::{GirderError, Result};

fn numeric_array(column: &Column) -> ArrayRef {
    let mut values = vec![0.0; column.size()];
    column.fill_numeric(&mut values, 0, 0, 1);
    Arc::new(Float64Array::from(
        values
            .into_iter()
            .map(|v| if v.is_nan() { None } else { Some(v) })
            .collect::<Vec<_>>(),
    ))
}

fn integer_array(column: &Column) -> ArrayRef {
    let mut values = vec![0.0; column.size()];
    column.fill_numeric(&mut values, 0, 0, 1);
    Arc::new(Int64Array::from(
        values
            .into_iter()
            .map(|v| if v.is_finite() { Some(v as i64) } else { None })
            .collect::<Vec<_>>(),
    ))
}

fn string_array(column: &Column) -> ArrayRef {
    let strings: Vec<Option<String>> = (0..column.size())
        .map(|row| {
            column.get_object(row).map(|value| match value {
                Value::Text(s) => s.to_string(),
                other => other.to_string(),
            })
        })
        .collect();
    Arc::new(StringArray::from(strings))
}

fn temporal_array(column: &Column) -> ArrayRef {
    let values: Vec<Option<i64>> = (0..column.size())
        .map(|row| match column.get_object(row) {
            Some(Value::DateTime(v)) | Some(Value::Time(v)) => Some(v),
            _ => None,
        })
        .collect();
    Arc::new(Int64Array::from(values))
}

fn export_column(column: &Column) -> (DataType, ArrayRef) {
    match column.column_type() {
        ColumnType::Real => (DataType::Float64, numeric_array(column)),
        ColumnType::Integer => (DataType::Int64, integer_array(column)),
        ColumnType::Nominal | ColumnType::Text => (DataType::Utf8, string_array(column)),
        ColumnType::DateTime | ColumnType::Time => (DataType::Int64, temporal_array(column)),
    }
}

impl Table {
    /// Exports the table as one Arrow record batch.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let mut fields = Vec::with_capacity(self.width());
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(self.width());
        for (label, column) in self.labels().iter().zip(self.columns()) {
            let (data_type, array) = export_column(column);
            fields.push(Field::new(label.as_str(), data_type, true));
            arrays.push(array);
        }
        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
    }

    /// Imports a record batch as a table.
    ///
    /// `Float64` columns become real columns, `Int64` columns integer
    /// columns, and `Utf8` columns nominal columns encoded through a fresh
    /// dictionary. Other Arrow types are rejected.
    pub fn from_record_batch(batch: &RecordBatch) -> Result<Table> {
        let rows = batch.num_rows();
        let mut builder = Table::builder(rows);
        for (field, array) in batch.schema().fields().iter().zip(batch.columns()) {
            let column = match field.data_type() {
                DataType::Float64 => {
                    let array = downcast::<Float64Array>(array, field.data_type())?;
                    let mut buffer = NumericBuffer::real(rows);
                    for row in 0..rows {
                        let v = if array.is_null(row) {
                            f64::NAN
                        } else {
                            array.value(row)
                        };
                        buffer.set(row, v)?;
                    }
                    buffer.to_column(ColumnType::Real)?
                }
                DataType::Int64 => {
                    let array = downcast::<Int64Array>(array, field.data_type())?;
                    let mut buffer = NumericBuffer::integer(rows);
                    for row in 0..rows {
                        let v = if array.is_null(row) {
                            f64::NAN
                        } else {
                            array.value(row) as f64
                        };
                        buffer.set(row, v)?;
                    }
                    buffer.to_column(ColumnType::Integer)?
                }
                DataType::Utf8 => {
                    let array = downcast::<StringArray>(array, field.data_type())?;
                    let buffer = CategoricalBuffer::<u32>::new(rows);
                    for row in 0..rows {
                        let value = if array.is_null(row) {
                            None
                        } else {
                            Some(Value::text(array.value(row)))
                        };
                        buffer.set(row, value)?;
                    }
                    buffer.to_column(ColumnType::Nominal)?
                }
                other => {
                    return Err(GirderError::UnsupportedArrowType(format!("{:?}", other)));
                }
            };
            builder = builder.add(field.name().to_string(), column);
        }
        builder.build()
    }
}

fn downcast<'a, T: 'static>(array: &'a ArrayRef, data_type: &DataType) -> Result<&'a T> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| GirderError::UnsupportedArrowType(format!("{:?}", data_type)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::FreeBuffer;

    fn sample_table() -> Table {
        let mut reals = NumericBuffer::real(4);
        for (i, v) in [1.5, f64::NAN, 2.5, -3.0].iter().enumerate() {
            reals.set(i, *v).unwrap();
        }
        let mut ints = NumericBuffer::integer(4);
        for (i, v) in [1.0, 2.0, f64::NAN, 4.0].iter().enumerate() {
            ints.set(i, *v).unwrap();
        }
        let nominal = CategoricalBuffer::<u32>::new(4);
        for (i, v) in ["red", "blue", "red", "green"].iter().enumerate() {
            nominal.set(i, Some(Value::text(*v))).unwrap();
        }
        Table::builder(4)
            .add("r", reals.to_column(ColumnType::Real).unwrap())
            .add("i", ints.to_column(ColumnType::Integer).unwrap())
            .add("c", nominal.to_column(ColumnType::Nominal).unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn export_maps_types_and_nulls() {
        let batch = sample_table().to_record_batch().unwrap();
        assert_eq!(batch.num_rows(), 4);
        assert_eq!(batch.num_columns(), 3);

        let reals = batch
            .column(0)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(reals.value(0), 1.5);
        assert!(reals.is_null(1));

        let ints = batch
            .column(1)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(ints.value(1), 2);
        assert!(ints.is_null(2));

        let strings = batch
            .column(2)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(strings.value(0), "red");
        assert_eq!(strings.value(3), "green");
    }

    #[test]
    fn round_trip_preserves_views() {
        let table = sample_table();
        let copy = Table::from_record_batch(&table.to_record_batch().unwrap()).unwrap();
        assert_eq!(copy.height(), table.height());
        assert_eq!(copy.labels(), table.labels());
        for (label, column) in table.labels().iter().zip(table.columns()) {
            let restored = copy.column(label).unwrap();
            for row in 0..table.height() {
                let a = column.get_numeric(row);
                let b = restored.get_numeric(row);
                assert!(a.is_nan() == b.is_nan());
                if !a.is_nan() && column.column_type() != ColumnType::Nominal {
                    assert_eq!(a, b);
                }
                assert_eq!(column.get_object(row), restored.get_object(row));
            }
        }
    }

    #[test]
    fn text_columns_export_as_strings() {
        let mut free = FreeBuffer::new(2);
        free.set(0, Some(Value::text("hello"))).unwrap();
        let table = Table::builder(2)
            .add("t", free.to_column(ColumnType::Text).unwrap())
            .build()
            .unwrap();
        let batch = table.to_record_batch().unwrap();
        let strings = batch
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(strings.value(0), "hello");
        assert!(strings.is_null(1));
    }

    #[test]
    fn unsupported_types_are_rejected() {
        use ::arrow::array::BooleanArray;
        let schema = Arc::new(Schema::new(vec![Field::new("b", DataType::Boolean, true)]));
        let batch = RecordBatch::try_new(
            schema,
            vec![Arc::new(BooleanArray::from(vec![true, false])) as ArrayRef],
        )
        .unwrap();
        assert!(matches!(
            Table::from_record_batch(&batch),
            Err(GirderError::UnsupportedArrowType(_))
        ));
    }
}

//! Immutable, typed column storage.
//!
//! A column is the frozen read side of the engine: a declared type, a storage
//! category, a capability set, and a dense backing store. Storage is a tagged
//! variant over the three categories:
//! - numeric: 64 bit floats, missing encoded as NaN
//! - categorical: packed dictionary indices plus a shared dictionary
//! - free: boxed values, missing encoded as `None`
//!
//! Reading is side-effect free; columns and dictionaries are cheap to clone
//! and safe to share across threads.

mod dictionary;

pub use dictionary::Dictionary;
pub(crate) use dictionary::DictionaryBuilder;

use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::format::PackedIndices;
use crate::value::Value;
use crate::{GirderError, Result};

/// Storage family of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Numeric,
    Categorical,
    Free,
}

/// Declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    /// 64 bit floats.
    Real,
    /// Whole numbers stored as 64 bit floats, rounded on write.
    Integer,
    /// Dictionary-coded strings.
    Nominal,
    /// Free text, one boxed value per row.
    Text,
    /// Instants, seconds since the epoch.
    DateTime,
    /// Clock times, nanoseconds of the day.
    Time,
}

impl ColumnType {
    pub const fn category(self) -> Category {
        match self {
            ColumnType::Real | ColumnType::Integer => Category::Numeric,
            ColumnType::Nominal => Category::Categorical,
            ColumnType::Text | ColumnType::DateTime | ColumnType::Time => Category::Free,
        }
    }

    pub const fn capabilities(self) -> Capabilities {
        match self {
            ColumnType::Real | ColumnType::Integer => {
                Capabilities(Capabilities::NUMERIC_READABLE.0 | Capabilities::SORTABLE.0)
            }
            ColumnType::Nominal => Capabilities(
                Capabilities::NUMERIC_READABLE.0
                    | Capabilities::OBJECT_READABLE.0
                    | Capabilities::SORTABLE.0,
            ),
            ColumnType::Text => Capabilities::OBJECT_READABLE,
            ColumnType::DateTime | ColumnType::Time => {
                Capabilities(Capabilities::OBJECT_READABLE.0 | Capabilities::SORTABLE.0)
            }
        }
    }
}

/// Bitset of the views a column supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const NUMERIC_READABLE: Capabilities = Capabilities(1);
    pub const OBJECT_READABLE: Capabilities = Capabilities(1 << 1);
    pub const SORTABLE: Capabilities = Capabilities(1 << 2);

    pub const fn contains(self, other: Capabilities) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Capabilities {
    type Output = Capabilities;

    fn bitor(self, rhs: Capabilities) -> Capabilities {
        Capabilities(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone)]
enum ColumnData {
    Numeric(Arc<Vec<f64>>),
    Categorical {
        indices: Arc<PackedIndices>,
        dictionary: Arc<Dictionary>,
    },
    Free(Arc<Vec<Option<Value>>>),
}

/// An immutable, typed column.
///
/// Cloning shares the backing store.
#[derive(Debug, Clone)]
pub struct Column {
    ctype: ColumnType,
    data: ColumnData,
}

impl Column {
    /// Builds a numeric column over a dense float vector.
    pub fn numeric(ctype: ColumnType, values: Vec<f64>) -> Result<Column> {
        if ctype.category() != Category::Numeric {
            return Err(GirderError::TypeMismatch {
                expected: Category::Numeric,
                actual: ctype,
            });
        }
        Ok(Column {
            ctype,
            data: ColumnData::Numeric(Arc::new(values)),
        })
    }

    /// Builds a categorical column over an index vector and its dictionary.
    pub fn categorical(
        ctype: ColumnType,
        indices: PackedIndices,
        dictionary: Dictionary,
    ) -> Result<Column> {
        if ctype.category() != Category::Categorical {
            return Err(GirderError::TypeMismatch {
                expected: Category::Categorical,
                actual: ctype,
            });
        }
        Ok(Column {
            ctype,
            data: ColumnData::Categorical {
                indices: Arc::new(indices),
                dictionary: Arc::new(dictionary),
            },
        })
    }

    /// Builds a free column over boxed values.
    pub fn free(ctype: ColumnType, values: Vec<Option<Value>>) -> Result<Column> {
        if ctype.category() != Category::Free {
            return Err(GirderError::TypeMismatch {
                expected: Category::Free,
                actual: ctype,
            });
        }
        Ok(Column {
            ctype,
            data: ColumnData::Free(Arc::new(values)),
        })
    }

    pub fn size(&self) -> usize {
        match &self.data {
            ColumnData::Numeric(values) => values.len(),
            ColumnData::Categorical { indices, .. } => indices.len(),
            ColumnData::Free(values) => values.len(),
        }
    }

    pub fn column_type(&self) -> ColumnType {
        self.ctype
    }

    pub fn category(&self) -> Category {
        self.ctype.category()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.ctype.capabilities()
    }

    /// Numeric view of a single row.
    ///
    /// Missing categorical and free slots read as NaN; categorical rows read
    /// as their dictionary index.
    #[inline]
    pub fn get_numeric(&self, row: usize) -> f64 {
        match &self.data {
            ColumnData::Numeric(values) => values[row],
            ColumnData::Categorical { indices, .. } => {
                let index = indices.get(row);
                if index == 0 {
                    f64::NAN
                } else {
                    index as f64
                }
            }
            ColumnData::Free(values) => {
                debug_assert!(row < values.len());
                f64::NAN
            }
        }
    }

    /// Dictionary index of a single row; 0 for non-categorical columns.
    #[inline]
    pub fn get_index(&self, row: usize) -> u32 {
        match &self.data {
            ColumnData::Categorical { indices, .. } => indices.get(row),
            _ => 0,
        }
    }

    /// Object view of a single row; `None` for missing slots and for columns
    /// without an object view.
    #[inline]
    pub fn get_object(&self, row: usize) -> Option<Value> {
        match &self.data {
            ColumnData::Numeric(values) => {
                debug_assert!(row < values.len());
                None
            }
            ColumnData::Categorical {
                indices,
                dictionary,
            } => dictionary.get(indices.get(row) as usize).cloned(),
            ColumnData::Free(values) => values[row].clone(),
        }
    }

    /// Bulk-copies the numeric view into `dst`.
    ///
    /// Rows `start_row..` land at `dst[offset]`, `dst[offset + stride]`, and
    /// so on until either the destination or the column is exhausted; slots
    /// past the column's end are left untouched.
    pub fn fill_numeric(&self, dst: &mut [f64], start_row: usize, offset: usize, stride: usize) {
        debug_assert!(stride > 0);
        let size = self.size();
        let mut pos = offset;
        let mut row = start_row;
        while pos < dst.len() && row < size {
            dst[pos] = self.get_numeric(row);
            pos += stride;
            row += 1;
        }
    }

    /// Bulk-copies the object view into `dst`; same layout as
    /// [`fill_numeric`](Column::fill_numeric).
    pub fn fill_objects(
        &self,
        dst: &mut [Option<Value>],
        start_row: usize,
        offset: usize,
        stride: usize,
    ) {
        debug_assert!(stride > 0);
        let size = self.size();
        let mut pos = offset;
        let mut row = start_row;
        while pos < dst.len() && row < size {
            dst[pos] = self.get_object(row);
            pos += stride;
            row += 1;
        }
    }

    /// Bulk-copies the raw index view into `dst`; non-categorical columns
    /// yield zeros. Same layout as [`fill_numeric`](Column::fill_numeric).
    pub fn fill_indices(&self, dst: &mut [u32], start_row: usize, offset: usize, stride: usize) {
        debug_assert!(stride > 0);
        let size = self.size();
        let mut pos = offset;
        let mut row = start_row;
        while pos < dst.len() && row < size {
            dst[pos] = self.get_index(row);
            pos += stride;
            row += 1;
        }
    }

    /// The dictionary of a categorical column.
    pub fn dictionary(&self) -> Result<&Dictionary> {
        match &self.data {
            ColumnData::Categorical { dictionary, .. } => Ok(dictionary),
            _ => Err(GirderError::NotCategorical),
        }
    }

    /// The unpacked index stream of a categorical column.
    pub fn indices(&self) -> Result<Vec<u32>> {
        match &self.data {
            ColumnData::Categorical { indices, .. } => Ok(indices.to_vec()),
            _ => Err(GirderError::NotCategorical),
        }
    }

    pub(crate) fn packed_indices(&self) -> Option<&PackedIndices> {
        match &self.data {
            ColumnData::Categorical { indices, .. } => Some(indices),
            _ => None,
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} Column ({})", self.ctype, self.size())
    }
}

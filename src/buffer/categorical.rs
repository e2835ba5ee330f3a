//! Dictionary-coded categorical buffers.
//!
//! A categorical buffer stores one dictionary index per row and grows its
//! dictionary as new values arrive. Writes are thread safe: index cells are
//! atomic and the first insert of a value serializes on the dictionary lock
//! with a re-check, so concurrent writers converge on one index per value.
//!
//! The buffer is generic over the index width. Byte-wide storage carries the
//! U2, U4 and U8 formats; the format (not the storage) bounds how many
//! distinct values the dictionary accepts, and the 2 and 4 bit formats are
//! bit packed when the buffer freezes into a column.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, AtomicU8, Ordering};

use crate::buffer::write_prefixed_values;
use crate::column::{Category, Column, ColumnType, DictionaryBuilder};
use crate::format::{IntegerFormat, PackedIndices};
use crate::value::Value;
use crate::{GirderError, Result};

mod sealed {
    pub trait Sealed {}
    impl Sealed for u8 {}
    impl Sealed for u16 {}
    impl Sealed for u32 {}
}

/// Storage width of a categorical buffer's index cells.
pub trait IndexWidth: sealed::Sealed + Sized {
    type Cell: Send + Sync;

    /// Format used when no explicit format is requested.
    const DEFAULT_FORMAT: IntegerFormat;

    /// Whether this width stores the given format.
    fn accepts(format: IntegerFormat) -> bool;

    fn zeroed(length: usize) -> Vec<Self::Cell>;
    fn load(cell: &Self::Cell) -> u32;
    fn store(cell: &Self::Cell, index: u32);
    fn into_indices(cells: Vec<Self::Cell>, format: IntegerFormat) -> PackedIndices;
}

impl IndexWidth for u8 {
    type Cell = AtomicU8;

    const DEFAULT_FORMAT: IntegerFormat = IntegerFormat::U8;

    fn accepts(format: IntegerFormat) -> bool {
        matches!(
            format,
            IntegerFormat::U2 | IntegerFormat::U4 | IntegerFormat::U8
        )
    }

    fn zeroed(length: usize) -> Vec<AtomicU8> {
        std::iter::repeat_with(|| AtomicU8::new(0))
            .take(length)
            .collect()
    }

    #[inline]
    fn load(cell: &AtomicU8) -> u32 {
        cell.load(Ordering::Relaxed) as u32
    }

    #[inline]
    fn store(cell: &AtomicU8, index: u32) {
        cell.store(index as u8, Ordering::Relaxed);
    }

    fn into_indices(cells: Vec<AtomicU8>, format: IntegerFormat) -> PackedIndices {
        let bytes: Vec<u8> = cells.into_iter().map(AtomicU8::into_inner).collect();
        match format {
            IntegerFormat::U2 => PackedIndices::pack2(&bytes),
            IntegerFormat::U4 => PackedIndices::pack4(&bytes),
            _ => PackedIndices::Unpacked8(bytes),
        }
    }
}

impl IndexWidth for u16 {
    type Cell = AtomicU16;

    const DEFAULT_FORMAT: IntegerFormat = IntegerFormat::U16;

    fn accepts(format: IntegerFormat) -> bool {
        format == IntegerFormat::U16
    }

    fn zeroed(length: usize) -> Vec<AtomicU16> {
        std::iter::repeat_with(|| AtomicU16::new(0))
            .take(length)
            .collect()
    }

    #[inline]
    fn load(cell: &AtomicU16) -> u32 {
        cell.load(Ordering::Relaxed) as u32
    }

    #[inline]
    fn store(cell: &AtomicU16, index: u32) {
        cell.store(index as u16, Ordering::Relaxed);
    }

    fn into_indices(cells: Vec<AtomicU16>, _format: IntegerFormat) -> PackedIndices {
        PackedIndices::Unpacked16(cells.into_iter().map(AtomicU16::into_inner).collect())
    }
}

impl IndexWidth for u32 {
    type Cell = AtomicU32;

    const DEFAULT_FORMAT: IntegerFormat = IntegerFormat::I32;

    fn accepts(format: IntegerFormat) -> bool {
        format == IntegerFormat::I32
    }

    fn zeroed(length: usize) -> Vec<AtomicU32> {
        std::iter::repeat_with(|| AtomicU32::new(0))
            .take(length)
            .collect()
    }

    #[inline]
    fn load(cell: &AtomicU32) -> u32 {
        cell.load(Ordering::Relaxed)
    }

    #[inline]
    fn store(cell: &AtomicU32, index: u32) {
        cell.store(index, Ordering::Relaxed);
    }

    fn into_indices(cells: Vec<AtomicU32>, _format: IntegerFormat) -> PackedIndices {
        PackedIndices::Unpacked32(cells.into_iter().map(AtomicU32::into_inner).collect())
    }
}

/// A mutable categorical buffer with index width `W`.
///
/// `set` and `get` may be called concurrently; dictionary entries are
/// published under the dictionary lock before their index is stored, so a
/// reader that observes an index always finds its value.
pub struct CategoricalBuffer<W: IndexWidth> {
    data: Vec<W::Cell>,
    format: IntegerFormat,
    dictionary: DictionaryBuilder,
    frozen: AtomicBool,
}

impl<W: IndexWidth> CategoricalBuffer<W> {
    /// Buffer of the width's default format, all rows missing.
    pub fn new(length: usize) -> CategoricalBuffer<W> {
        CategoricalBuffer {
            data: W::zeroed(length),
            format: W::DEFAULT_FORMAT,
            dictionary: DictionaryBuilder::new(W::DEFAULT_FORMAT.max_value()),
            frozen: AtomicBool::new(false),
        }
    }

    /// Buffer with an explicit format; the format must fit the index width.
    pub fn with_format(length: usize, format: IntegerFormat) -> Result<CategoricalBuffer<W>> {
        if !W::accepts(format) {
            return Err(GirderError::IncompatibleFormat {
                from: format,
                to: W::DEFAULT_FORMAT,
            });
        }
        Ok(CategoricalBuffer {
            data: W::zeroed(length),
            format,
            dictionary: DictionaryBuilder::new(format.max_value()),
            frozen: AtomicBool::new(false),
        })
    }

    /// Copies a categorical column into a fresh buffer of this width.
    ///
    /// Fails when the column's format admits more values than this buffer's
    /// storage or when the column is not categorical.
    pub fn from_column(column: &Column) -> Result<CategoricalBuffer<W>> {
        let indices = column
            .packed_indices()
            .ok_or(GirderError::NotCategorical)?;
        let format = indices.format();
        if format.max_value() > W::DEFAULT_FORMAT.max_value() {
            return Err(GirderError::IncompatibleFormat {
                from: format,
                to: W::DEFAULT_FORMAT,
            });
        }
        let data = W::zeroed(indices.len());
        for (row, cell) in data.iter().enumerate() {
            W::store(cell, indices.get(row));
        }
        Ok(CategoricalBuffer {
            data,
            format,
            dictionary: DictionaryBuilder::from_dictionary(
                column.dictionary()?,
                format.max_value(),
            ),
            frozen: AtomicBool::new(false),
        })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn format(&self) -> IntegerFormat {
        self.format
    }

    /// Raw dictionary index at `row`.
    #[inline]
    pub fn index_at(&self, row: usize) -> u32 {
        W::load(&self.data[row])
    }

    /// Value at `row`, resolved through the growing dictionary.
    pub fn get(&self, row: usize) -> Option<Value> {
        self.dictionary.get(self.index_at(row) as usize)
    }

    /// Writes `value` at `row`, appending to the dictionary when new.
    ///
    /// Fails with a dictionary overflow once the format's maximum number of
    /// distinct values is exhausted. Thread safe.
    pub fn set(&self, row: usize, value: Option<Value>) -> Result<()> {
        if self.try_set(row, value)? {
            Ok(())
        } else {
            Err(GirderError::DictionaryOverflow(self.format.max_value()))
        }
    }

    /// Like [`set`](CategoricalBuffer::set), but reports dictionary overflow
    /// as `Ok(false)` instead of an error. Thread safe.
    pub fn try_set(&self, row: usize, value: Option<Value>) -> Result<bool> {
        if self.frozen.load(Ordering::Relaxed) {
            return Err(GirderError::Frozen);
        }
        match value {
            None => {
                W::store(&self.data[row], 0);
                Ok(true)
            }
            Some(value) => match self.dictionary.lookup_or_insert(&value) {
                Some(index) => {
                    W::store(&self.data[row], index);
                    Ok(true)
                }
                None => Ok(false),
            },
        }
    }

    /// Number of distinct non-missing values inserted so far.
    pub fn different_values(&self) -> usize {
        self.dictionary.different_values()
    }

    /// Forbids further writes. Idempotent.
    pub fn freeze(&self) {
        self.frozen.store(true, Ordering::Relaxed);
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Relaxed)
    }

    /// Seals the buffer into a categorical column of the declared type,
    /// packing 2 and 4 bit formats densely.
    pub fn to_column(self, ctype: ColumnType) -> Result<Column> {
        if ctype.category() != Category::Categorical {
            return Err(GirderError::TypeMismatch {
                expected: Category::Categorical,
                actual: ctype,
            });
        }
        self.freeze();
        Column::categorical(
            ctype,
            W::into_indices(self.data, self.format),
            self.dictionary.into_dictionary(),
        )
    }
}

impl<W: IndexWidth> fmt::Display for CategoricalBuffer<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_prefixed_values(f, "Categorical", self.len(), |i| match self.get(i) {
            Some(value) => value.to_string(),
            None => "?".to_string(),
        })
    }
}

/// A categorical buffer of runtime-selected format.
///
/// This is the enum-dispatched factory over the width-monomorphic buffers:
/// U2, U4 and U8 share byte storage, U16 and I32 get wider cells.
pub enum AnyCategoricalBuffer {
    U8(CategoricalBuffer<u8>),
    U16(CategoricalBuffer<u16>),
    I32(CategoricalBuffer<u32>),
}

macro_rules! delegate {
    ($self:ident, $buffer:ident => $body:expr) => {
        match $self {
            AnyCategoricalBuffer::U8($buffer) => $body,
            AnyCategoricalBuffer::U16($buffer) => $body,
            AnyCategoricalBuffer::I32($buffer) => $body,
        }
    };
}

impl AnyCategoricalBuffer {
    /// Buffer of the given length and format, all rows missing.
    pub fn new(length: usize, format: IntegerFormat) -> AnyCategoricalBuffer {
        match format {
            IntegerFormat::U2 | IntegerFormat::U4 | IntegerFormat::U8 => {
                AnyCategoricalBuffer::U8(CategoricalBuffer::with_format(length, format).expect(
                    "2, 4 and 8 bit formats fit byte storage",
                ))
            }
            IntegerFormat::U16 => AnyCategoricalBuffer::U16(CategoricalBuffer::new(length)),
            IntegerFormat::I32 => AnyCategoricalBuffer::I32(CategoricalBuffer::new(length)),
        }
    }

    /// Copies a categorical column into a buffer of matching format.
    pub fn from_column(column: &Column) -> Result<AnyCategoricalBuffer> {
        let format = column
            .packed_indices()
            .ok_or(GirderError::NotCategorical)?
            .format();
        Ok(match format {
            IntegerFormat::U2 | IntegerFormat::U4 | IntegerFormat::U8 => {
                AnyCategoricalBuffer::U8(CategoricalBuffer::from_column(column)?)
            }
            IntegerFormat::U16 => AnyCategoricalBuffer::U16(CategoricalBuffer::from_column(column)?),
            IntegerFormat::I32 => AnyCategoricalBuffer::I32(CategoricalBuffer::from_column(column)?),
        })
    }

    pub fn len(&self) -> usize {
        delegate!(self, buffer => buffer.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn format(&self) -> IntegerFormat {
        delegate!(self, buffer => buffer.format())
    }

    pub fn index_at(&self, row: usize) -> u32 {
        delegate!(self, buffer => buffer.index_at(row))
    }

    pub fn get(&self, row: usize) -> Option<Value> {
        delegate!(self, buffer => buffer.get(row))
    }

    pub fn set(&self, row: usize, value: Option<Value>) -> Result<()> {
        delegate!(self, buffer => buffer.set(row, value))
    }

    pub fn try_set(&self, row: usize, value: Option<Value>) -> Result<bool> {
        delegate!(self, buffer => buffer.try_set(row, value))
    }

    pub fn different_values(&self) -> usize {
        delegate!(self, buffer => buffer.different_values())
    }

    pub fn freeze(&self) {
        delegate!(self, buffer => buffer.freeze())
    }

    pub fn is_frozen(&self) -> bool {
        delegate!(self, buffer => buffer.is_frozen())
    }

    pub fn to_column(self, ctype: ColumnType) -> Result<Column> {
        delegate!(self, buffer => buffer.to_column(ctype))
    }
}

impl fmt::Display for AnyCategoricalBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        delegate!(self, buffer => fmt::Display::fmt(buffer, f))
    }
}

//! Single-column buffered readers.

use crate::column::Column;
use crate::reader::{BEFORE_FIRST, SMALL_BUFFER_SIZE};
use crate::value::Value;
use crate::{GirderError, Result};

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::NumericView {}
    impl Sealed for super::ObjectView {}
    impl Sealed for super::CategoricalView {}
}

/// One of the three column views a cursor can read through.
pub trait ReadView: sealed::Sealed {
    type Item: Clone;

    /// Slot content before the first fill.
    const EMPTY: Self::Item;

    fn fill(column: &Column, dst: &mut [Self::Item], start_row: usize);
}

/// The numeric view: `f64` per row, NaN for missing.
pub struct NumericView;

impl ReadView for NumericView {
    type Item = f64;

    const EMPTY: f64 = f64::NAN;

    #[inline]
    fn fill(column: &Column, dst: &mut [f64], start_row: usize) {
        column.fill_numeric(dst, start_row, 0, 1);
    }
}

/// The object view: boxed value per row, `None` for missing.
pub struct ObjectView;

impl ReadView for ObjectView {
    type Item = Option<Value>;

    const EMPTY: Option<Value> = None;

    #[inline]
    fn fill(column: &Column, dst: &mut [Option<Value>], start_row: usize) {
        column.fill_objects(dst, start_row, 0, 1);
    }
}

/// The raw index view of categorical columns.
pub struct CategoricalView;

impl ReadView for CategoricalView {
    type Item = u32;

    const EMPTY: u32 = 0;

    #[inline]
    fn fill(column: &Column, dst: &mut [u32], start_row: usize) {
        column.fill_indices(dst, start_row, 0, 1);
    }
}

/// A buffered forward cursor over one view of one column.
///
/// Reading past the last row is not checked; callers bound their sweeps by
/// the column size or a length hint.
pub struct ColumnCursor<'a, V: ReadView> {
    column: &'a Column,
    buffer: Vec<V::Item>,
    /// Row index of `buffer[0]`.
    buffer_offset: isize,
    /// Next slot to hand out.
    buffer_index: usize,
    /// Whether `buffer` holds the rows at `buffer_offset`.
    loaded: bool,
    length: usize,
}

/// Buffered reader over the numeric view.
pub type NumericReader<'a> = ColumnCursor<'a, NumericView>;

/// Buffered reader over the object view.
pub type ObjectReader<'a> = ColumnCursor<'a, ObjectView>;

/// Buffered reader over the raw categorical indices.
pub type CategoricalReader<'a> = ColumnCursor<'a, CategoricalView>;

impl<'a, V: ReadView> ColumnCursor<'a, V> {
    /// Reader over the whole column.
    pub fn new(column: &'a Column) -> ColumnCursor<'a, V> {
        Self::with_length(column, column.size())
    }

    /// Reader that will scan at most `length` rows; the chunk allocation is
    /// capped accordingly.
    pub fn with_length(column: &'a Column, length: usize) -> ColumnCursor<'a, V> {
        let length = length.min(column.size());
        let chunk = SMALL_BUFFER_SIZE.min(length.max(1));
        ColumnCursor {
            column,
            buffer: vec![V::EMPTY; chunk],
            buffer_offset: -(chunk as isize),
            buffer_index: chunk,
            loaded: false,
            length,
        }
    }

    /// Reader positioned to start reading at `from`, scanning at most up to
    /// `to`.
    pub(crate) fn for_range(column: &'a Column, from: usize, to: usize) -> ColumnCursor<'a, V> {
        let mut reader = Self::with_length(column, to);
        reader.seek(from as isize - 1);
        reader
    }

    /// Returns the value at the next row and advances the cursor, refilling
    /// one chunk when the current one is exhausted.
    #[inline]
    pub fn read(&mut self) -> V::Item {
        if self.buffer_index == self.buffer.len() {
            self.buffer_offset += self.buffer.len() as isize;
            V::fill(self.column, &mut self.buffer, self.buffer_offset as usize);
            self.buffer_index = 0;
            self.loaded = true;
        }
        let value = self.buffer[self.buffer_index].clone();
        self.buffer_index += 1;
        value
    }

    /// Row of the last value handed out; [`BEFORE_FIRST`] initially.
    pub fn position(&self) -> isize {
        self.buffer_offset + self.buffer_index as isize - 1
    }

    /// Moves the cursor so that the next read returns row `position + 1`.
    pub fn set_position(&mut self, position: isize) -> Result<()> {
        if position < BEFORE_FIRST {
            return Err(GirderError::Position(position));
        }
        self.seek(position);
        Ok(())
    }

    fn seek(&mut self, position: isize) {
        let relative = position + 1 - self.buffer_offset;
        if self.loaded && relative >= 0 && (relative as usize) < self.buffer.len() {
            // The target row is already buffered.
            self.buffer_index = relative as usize;
        } else {
            self.buffer_index = self.buffer.len();
            self.buffer_offset = position + 1 - self.buffer.len() as isize;
            self.loaded = false;
        }
    }

    /// Rows left to read.
    pub fn remaining(&self) -> usize {
        (self.length as isize - 1 - self.position()).max(0) as usize
    }

    pub fn has_remaining(&self) -> bool {
        self.position() + 1 < self.length as isize
    }
}

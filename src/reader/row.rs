//! Multi-column row readers.
//!
//! A row reader sweeps several columns of equal height at once. Chunks are
//! interleaved: column `j` of a `W` wide reader lands in slots `j`,
//! `j + W`, ... of one shared scratch vector per view, which is what the
//! stride parameter of the column fill calls exists for.

use std::fmt;

use crate::column::{Capabilities, Category, Column};
use crate::reader::{BEFORE_FIRST, SMALL_BUFFER_SIZE};
use crate::value::Value;
use crate::{GirderError, Result};

/// Shared cursor arithmetic of the row readers.
struct RowCursor {
    rows_per_chunk: usize,
    /// Row index of the chunk's first row.
    chunk_row: isize,
    /// Row within the chunk the reader currently points at.
    row_in_chunk: isize,
    /// Whether the chunk buffers hold the rows at `chunk_row`.
    loaded: bool,
    length: usize,
}

impl RowCursor {
    fn new(rows_per_chunk: usize, length: usize) -> RowCursor {
        RowCursor {
            rows_per_chunk,
            chunk_row: -(rows_per_chunk as isize),
            row_in_chunk: rows_per_chunk as isize - 1,
            loaded: false,
            length,
        }
    }

    /// Steps to the next row; returns the start row of a chunk that must be
    /// refilled, if the step crossed a chunk boundary.
    #[inline]
    fn advance(&mut self) -> Option<usize> {
        self.row_in_chunk += 1;
        if self.row_in_chunk as usize == self.rows_per_chunk {
            self.chunk_row += self.rows_per_chunk as isize;
            self.row_in_chunk = 0;
            self.loaded = true;
            Some(self.chunk_row as usize)
        } else {
            None
        }
    }

    fn position(&self) -> isize {
        self.chunk_row + self.row_in_chunk
    }

    fn set_position(&mut self, position: isize) -> Result<()> {
        if position < BEFORE_FIRST {
            return Err(GirderError::Position(position));
        }
        let relative = position + 1 - self.chunk_row;
        if self.loaded && relative >= 0 && (relative as usize) < self.rows_per_chunk {
            // The next row is already buffered.
            self.row_in_chunk = relative - 1;
        } else {
            self.row_in_chunk = self.rows_per_chunk as isize - 1;
            self.chunk_row = position + 1 - self.rows_per_chunk as isize;
            self.loaded = false;
        }
        Ok(())
    }

    fn remaining(&self) -> usize {
        (self.length as isize - 1 - self.position()).max(0) as usize
    }

    fn has_remaining(&self) -> bool {
        self.position() + 1 < self.length as isize
    }

    #[inline]
    fn slot(&self) -> usize {
        self.row_in_chunk as usize
    }
}

fn shared_height(columns: &[Column]) -> usize {
    columns.iter().map(Column::size).min().unwrap_or(0)
}

fn rows_per_chunk(width: usize, desired_rows: usize) -> usize {
    (desired_rows / width.max(1)).max(1)
}

/// Buffered reader over the raw index rows of categorical columns.
pub struct RowReader<'a> {
    columns: &'a [Column],
    buffer: Vec<u32>,
    cursor: RowCursor,
}

impl<'a> RowReader<'a> {
    /// Reader over categorical columns with the default chunk size.
    pub fn new(columns: &'a [Column]) -> Result<RowReader<'a>> {
        Self::with_buffer_size(columns, columns.len() * SMALL_BUFFER_SIZE)
    }

    /// Reader whose chunks hold about `desired_rows` rows in total across
    /// all columns.
    pub fn with_buffer_size(columns: &'a [Column], desired_rows: usize) -> Result<RowReader<'a>> {
        if columns.iter().any(|c| c.category() != Category::Categorical) {
            return Err(GirderError::UnsupportedCapability("categorical reads"));
        }
        let chunk = rows_per_chunk(columns.len(), desired_rows);
        Ok(RowReader {
            columns,
            buffer: vec![0; chunk * columns.len()],
            cursor: RowCursor::new(chunk, shared_height(columns)),
        })
    }

    /// Reader positioned to start at `from`, for a sweep bounded by `to`.
    pub(crate) fn for_range(columns: &'a [Column], from: usize, to: usize) -> Result<RowReader<'a>> {
        let desired = columns.len() * to.saturating_sub(from).min(SMALL_BUFFER_SIZE);
        let mut reader = Self::with_buffer_size(columns, desired)?;
        reader
            .set_position(from as isize - 1)
            .expect("range start is at least row zero");
        Ok(reader)
    }

    /// Advances to the next row.
    #[inline]
    pub fn move_next(&mut self) {
        if let Some(start_row) = self.cursor.advance() {
            let width = self.columns.len();
            for (j, column) in self.columns.iter().enumerate() {
                column.fill_indices(&mut self.buffer, start_row, j, width);
            }
        }
    }

    /// Dictionary index of column `j` at the current row.
    #[inline]
    pub fn get(&self, j: usize) -> u32 {
        self.buffer[self.cursor.slot() * self.columns.len() + j]
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn position(&self) -> isize {
        self.cursor.position()
    }

    pub fn set_position(&mut self, position: isize) -> Result<()> {
        self.cursor.set_position(position)
    }

    pub fn remaining(&self) -> usize {
        self.cursor.remaining()
    }

    pub fn has_remaining(&self) -> bool {
        self.cursor.has_remaining()
    }
}

impl fmt::Display for RowReader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Row reader ({}x{})\nRow position: {}",
            self.cursor.length,
            self.columns.len(),
            self.position()
        )
    }
}

/// Buffered reader over rows of columns with mixed categories.
///
/// Keeps a numeric chunk for every NUMERIC_READABLE column and an object
/// chunk for every OBJECT_READABLE column; categorical columns, which are
/// both, are buffered twice. Views a column does not support read as NaN,
/// index 0, or `None`.
pub struct GeneralRowReader<'a> {
    columns: &'a [Column],
    numeric: Vec<f64>,
    objects: Vec<Option<Value>>,
    cursor: RowCursor,
}

impl<'a> GeneralRowReader<'a> {
    /// Reader with the default per-column chunk size.
    pub fn new(columns: &'a [Column]) -> GeneralRowReader<'a> {
        Self::with_buffer_size(columns, columns.len() * SMALL_BUFFER_SIZE)
    }

    /// Reader whose chunks hold about `desired_rows` rows in total across
    /// all columns.
    pub fn with_buffer_size(columns: &'a [Column], desired_rows: usize) -> GeneralRowReader<'a> {
        let chunk = rows_per_chunk(columns.len(), desired_rows);
        GeneralRowReader {
            columns,
            numeric: vec![f64::NAN; chunk * columns.len()],
            objects: vec![None; chunk * columns.len()],
            cursor: RowCursor::new(chunk, shared_height(columns)),
        }
    }

    /// Reader positioned to start at `from`, for a sweep bounded by `to`.
    pub(crate) fn for_range(columns: &'a [Column], from: usize, to: usize) -> GeneralRowReader<'a> {
        let desired = columns.len() * to.saturating_sub(from).min(SMALL_BUFFER_SIZE);
        let mut reader = Self::with_buffer_size(columns, desired);
        reader
            .set_position(from as isize - 1)
            .expect("range start is at least row zero");
        reader
    }

    /// Advances to the next row.
    #[inline]
    pub fn move_next(&mut self) {
        if let Some(start_row) = self.cursor.advance() {
            let width = self.columns.len();
            for (j, column) in self.columns.iter().enumerate() {
                let capabilities = column.capabilities();
                if capabilities.contains(Capabilities::NUMERIC_READABLE) {
                    column.fill_numeric(&mut self.numeric, start_row, j, width);
                }
                if capabilities.contains(Capabilities::OBJECT_READABLE) {
                    column.fill_objects(&mut self.objects, start_row, j, width);
                }
            }
        }
    }

    /// Numeric view of column `j` at the current row; NaN when the column
    /// has no numeric view.
    #[inline]
    pub fn get_numeric(&self, j: usize) -> f64 {
        self.numeric[self.cursor.slot() * self.columns.len() + j]
    }

    /// Dictionary index of column `j` at the current row; 0 for
    /// non-categorical columns.
    #[inline]
    pub fn get_index(&self, j: usize) -> u32 {
        if self.columns[j].category() != Category::Categorical {
            return 0;
        }
        let numeric = self.get_numeric(j);
        if numeric.is_nan() {
            0
        } else {
            numeric as u32
        }
    }

    /// Object view of column `j` at the current row; `None` when missing or
    /// when the column has no object view.
    #[inline]
    pub fn get_object(&self, j: usize) -> Option<Value> {
        self.objects[self.cursor.slot() * self.columns.len() + j].clone()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn position(&self) -> isize {
        self.cursor.position()
    }

    pub fn set_position(&mut self, position: isize) -> Result<()> {
        self.cursor.set_position(position)
    }

    pub fn remaining(&self) -> usize {
        self.cursor.remaining()
    }

    pub fn has_remaining(&self) -> bool {
        self.cursor.has_remaining()
    }
}

impl fmt::Display for GeneralRowReader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "General Row reader ({}x{})\nRow position: {}",
            self.cursor.length,
            self.columns.len(),
            self.position()
        )
    }
}

//! Buffered cursors over columns.
//!
//! Readers amortize the per-row cost of the column views by pulling whole
//! chunks through the bulk fill calls. A reader starts before the first row,
//! advances forward, and can be repositioned anywhere at or after
//! [`BEFORE_FIRST`]. Readers borrow their columns and are single-threaded.

mod row;
mod single;

pub use row::{GeneralRowReader, RowReader};
pub use single::{
    CategoricalReader, CategoricalView, ColumnCursor, NumericReader, NumericView, ObjectReader,
    ObjectView, ReadView,
};

/// Default chunk size, in rows, of a single-column reader.
pub const SMALL_BUFFER_SIZE: usize = 512;

/// Position of a reader before its first row; the only legal negative
/// position.
pub const BEFORE_FIRST: isize = -1;

//! Girder: an in-memory columnar table engine for analytical workloads.
//!
//! The engine is built from three layers:
//! - Typed storage: mutable [`buffer`]s that freeze into immutable
//!   [`column`]s (dense numeric, dictionary-coded categorical, boxed free).
//! - [`reader`]s: buffered cursors over one or many columns, exposing
//!   numeric, index and object views.
//! - [`transform`]: a task-parallel executor behind `reduce`/`apply`
//!   façades that partitions a row range into batches and combines per-batch
//!   results in order.
//!
//! ```
//! use girder::buffer::NumericBuffer;
//! use girder::column::ColumnType;
//! use girder::table::Table;
//! use girder::transform::{default_context, Workload};
//!
//! # fn main() -> girder::Result<()> {
//! let mut buffer = NumericBuffer::real(4);
//! for i in 0..4 {
//!     buffer.set(i, i as f64)?;
//! }
//! let table = Table::builder(4)
//!     .add("x", buffer.to_column(ColumnType::Real)?)
//!     .build()?;
//! let sum = table
//!     .transform("x")?
//!     .reduce(0.0, |a, b| a + b, Workload::Default, default_context())?;
//! assert_eq!(sum, 6.0);
//! # Ok(())
//! # }
//! ```

pub mod arrow;
pub mod buffer;
pub mod column;
pub mod format;
pub mod reader;
pub mod table;
pub mod transform;
pub mod value;

pub use buffer::{
    AnyCategoricalBuffer, CategoricalBuffer, DateTimeBuffer, FreeBuffer, NumericBuffer, TimeBuffer,
};
pub use column::{Capabilities, Category, Column, ColumnType, Dictionary};
pub use format::IntegerFormat;
pub use reader::{
    CategoricalReader, GeneralRowReader, NumericReader, ObjectReader, RowReader, BEFORE_FIRST,
    SMALL_BUFFER_SIZE,
};
pub use table::{Table, TableBuilder};
pub use transform::{default_context, Context, Transformer, TransformerMulti, Workload};
pub use value::Value;

/// Engine error type.
#[derive(Debug, thiserror::Error)]
pub enum GirderError {
    /// Write or resize on a frozen buffer.
    #[error("buffer is frozen")]
    Frozen,

    /// Resize on a fixed-length buffer.
    #[error("buffer has a fixed length")]
    NotGrowable,

    /// Declared column type does not match the storage category.
    #[error("column type {actual:?} does not fit the {expected:?} category")]
    TypeMismatch {
        expected: Category,
        actual: ColumnType,
    },

    /// Categorical write beyond the format's distinct-value capacity.
    #[error("more than {0} different values")]
    DictionaryOverflow(u32),

    /// Index format does not fit the buffer's storage width.
    #[error("index format {from:?} does not fit {to:?} storage")]
    IncompatibleFormat {
        from: IntegerFormat,
        to: IntegerFormat,
    },

    /// Categorical-only operation on a non-categorical column.
    #[error("column is not categorical")]
    NotCategorical,

    /// Operation requires a view the column does not support.
    #[error("column does not support {0}")]
    UnsupportedCapability(&'static str),

    /// Reader position below [`reader::BEFORE_FIRST`].
    #[error("row position {0} is out of range")]
    Position(isize),

    /// Column index beyond the table width.
    #[error("column index {index} is out of range for width {width}")]
    ColumnOutOfRange { index: usize, width: usize },

    /// Label lookup failed.
    #[error("column '{0}' not found")]
    ColumnNotFound(String),

    /// Two columns under one label.
    #[error("duplicate column label '{0}'")]
    DuplicateLabel(String),

    /// Column length differs from the table height.
    #[error("column height {actual} does not match table height {expected}")]
    HeightMismatch { expected: usize, actual: usize },

    /// Execution context was cancelled between batches.
    #[error("execution cancelled")]
    Cancelled,

    /// Worker pool construction failed.
    #[error("thread pool construction failed: {0}")]
    PoolBuild(String),

    /// Arrow conversion failed.
    #[error(transparent)]
    Arrow(#[from] ::arrow::error::ArrowError),

    /// Arrow schema uses a type the engine cannot represent.
    #[error("unsupported arrow data type: {0}")]
    UnsupportedArrowType(String),
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, GirderError>;

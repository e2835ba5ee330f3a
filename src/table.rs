//! Tables: ordered, labeled collections of columns of one height.

use std::fmt;

use ahash::AHashMap;

use crate::column::Column;
use crate::transform::{Transformer, TransformerMulti};
use crate::{GirderError, Result};

/// An immutable table. Labels are unique; every column has the table's
/// height.
#[derive(Clone)]
pub struct Table {
    labels: Vec<String>,
    columns: Vec<Column>,
    height: usize,
    by_label: AHashMap<String, usize>,
}

impl Table {
    /// Starts building a table of the given height.
    pub fn builder(height: usize) -> TableBuilder {
        TableBuilder {
            height,
            labels: Vec::new(),
            columns: Vec::new(),
            by_label: AHashMap::new(),
            error: None,
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Column by label.
    pub fn column(&self, label: &str) -> Result<&Column> {
        self.by_label
            .get(label)
            .map(|&i| &self.columns[i])
            .ok_or_else(|| GirderError::ColumnNotFound(label.to_string()))
    }

    /// Column by position.
    pub fn column_at(&self, index: usize) -> Result<&Column> {
        self.columns.get(index).ok_or(GirderError::ColumnOutOfRange {
            index,
            width: self.columns.len(),
        })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Transformer over the column with the given label.
    pub fn transform(&self, label: &str) -> Result<Transformer> {
        Ok(Transformer::new(self.column(label)?.clone()))
    }

    /// Transformer over the column at the given position.
    pub fn transform_at(&self, index: usize) -> Result<Transformer> {
        Ok(Transformer::new(self.column_at(index)?.clone()))
    }

    /// Multi-column transformer over the labeled columns, in the given
    /// order.
    pub fn transform_multi(&self, labels: &[&str]) -> Result<TransformerMulti> {
        let columns = labels
            .iter()
            .map(|label| self.column(label).cloned())
            .collect::<Result<Vec<_>>>()?;
        Ok(TransformerMulti::new(columns))
    }

    /// Multi-column transformer over the columns at the given positions.
    pub fn transform_multi_at(&self, indices: &[usize]) -> Result<TransformerMulti> {
        let columns = indices
            .iter()
            .map(|&index| self.column_at(index).cloned())
            .collect::<Result<Vec<_>>>()?;
        Ok(TransformerMulti::new(columns))
    }

    /// Starts a builder seeded with this table's columns.
    pub fn extend(&self) -> TableBuilder {
        let mut builder = Table::builder(self.height);
        for (label, column) in self.labels.iter().zip(&self.columns) {
            builder = builder.add(label.clone(), column.clone());
        }
        builder
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Table ({}x{})", self.width(), self.height())
    }
}

/// Builder collecting labeled columns; validation errors surface at
/// [`build`](TableBuilder::build).
pub struct TableBuilder {
    height: usize,
    labels: Vec<String>,
    columns: Vec<Column>,
    by_label: AHashMap<String, usize>,
    error: Option<GirderError>,
}

impl TableBuilder {
    /// Adds a column under a unique label.
    pub fn add(mut self, label: impl Into<String>, column: Column) -> TableBuilder {
        if self.error.is_some() {
            return self;
        }
        let label = label.into();
        if self.by_label.contains_key(&label) {
            self.error = Some(GirderError::DuplicateLabel(label));
            return self;
        }
        if column.size() != self.height {
            self.error = Some(GirderError::HeightMismatch {
                expected: self.height,
                actual: column.size(),
            });
            return self;
        }
        self.by_label.insert(label.clone(), self.columns.len());
        self.labels.push(label);
        self.columns.push(column);
        self
    }

    pub fn build(self) -> Result<Table> {
        if let Some(error) = self.error {
            return Err(error);
        }
        log::debug!(
            "built table with {} columns of height {}",
            self.columns.len(),
            self.height
        );
        Ok(Table {
            labels: self.labels,
            columns: self.columns,
            height: self.height,
            by_label: self.by_label,
        })
    }
}

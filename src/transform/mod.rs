//! Parallel transforms over one or several columns.
//!
//! The façades in this module validate their inputs, bundle the user's
//! closures with the source columns into a calculator, and hand it to the
//! executor. Reductions come in two shapes: scalar folds (the reducer also
//! combines partial results, so it must be associative) and
//! mutable-accumulator folds with an explicit supplier/reducer/combiner
//! triple. Appliers map every row into a fresh buffer.
//!
//! User closures run on worker threads: the supplier is called once per
//! batch, reducers see only their own batch's accumulator, and combiners run
//! sequentially in ascending batch order after all batches complete.

mod applier;
mod calculator;
mod executor;

pub use executor::{default_context, Context, Workload};

use crate::buffer::{round_half_up, AnyCategoricalBuffer, FreeBuffer, NumericBuffer};
use crate::column::{Capabilities, Category, Column};
use crate::format::IntegerFormat;
use crate::reader::{GeneralRowReader, RowReader};
use crate::value::Value;
use crate::{GirderError, Result};

use applier::{
    map_indices, map_indices_to_dictionary, map_numeric, map_numeric_to_dictionary, map_objects,
    map_objects_to_dictionary, map_rows, map_rows_to_dictionary, CategoricalApplier, SliceApplier,
};
use calculator::{
    CategoricalFold, CategoricalReducer, GeneralRowFold, NumericFold, NumericReducer, RowFold,
};
use executor::execute;

/// Transform entry point over a single column.
pub struct Transformer {
    column: Column,
}

impl Transformer {
    pub fn new(column: Column) -> Transformer {
        Transformer { column }
    }

    fn require_numeric(&self) -> Result<()> {
        if self
            .column
            .capabilities()
            .contains(Capabilities::NUMERIC_READABLE)
        {
            Ok(())
        } else {
            Err(GirderError::UnsupportedCapability("numeric reads"))
        }
    }

    fn require_object(&self) -> Result<()> {
        if self
            .column
            .capabilities()
            .contains(Capabilities::OBJECT_READABLE)
        {
            Ok(())
        } else {
            Err(GirderError::UnsupportedCapability("object reads"))
        }
    }

    fn require_categorical(&self) -> Result<()> {
        if self.column.category() == Category::Categorical {
            Ok(())
        } else {
            Err(GirderError::UnsupportedCapability("categorical reads"))
        }
    }

    /// Folds the numeric view with an associative reducer.
    ///
    /// The reducer also combines per-batch results, so it must be
    /// associative with `identity` as its unit.
    pub fn reduce<R>(
        &self,
        identity: f64,
        reducer: R,
        workload: Workload,
        context: &Context,
    ) -> Result<f64>
    where
        R: Fn(f64, f64) -> f64 + Sync,
    {
        self.require_numeric()?;
        execute(
            NumericReducer::new(self.column.clone(), identity, &reducer, &reducer),
            workload,
            context,
        )
    }

    /// Folds the numeric view; partial results are merged with `combiner`.
    pub fn reduce_with_combiner<R, C>(
        &self,
        identity: f64,
        reducer: R,
        combiner: C,
        workload: Workload,
        context: &Context,
    ) -> Result<f64>
    where
        R: Fn(f64, f64) -> f64 + Sync,
        C: Fn(f64, f64) -> f64 + Sync,
    {
        self.require_numeric()?;
        execute(
            NumericReducer::new(self.column.clone(), identity, &reducer, &combiner),
            workload,
            context,
        )
    }

    /// Folds the numeric view into mutable accumulators.
    ///
    /// `supplier` is invoked once per batch; `combiner` merges the right
    /// accumulator into the left, in ascending batch order.
    pub fn fold<A, S, R, C>(
        &self,
        supplier: S,
        reducer: R,
        combiner: C,
        workload: Workload,
        context: &Context,
    ) -> Result<A>
    where
        A: Send,
        S: Fn() -> A + Sync,
        R: Fn(&mut A, f64) + Sync,
        C: Fn(&mut A, A) + Sync,
    {
        self.require_numeric()?;
        execute(
            NumericFold::new(self.column.clone(), supplier, reducer, combiner),
            workload,
            context,
        )
    }

    /// Folds the raw dictionary indices with an associative reducer.
    pub fn reduce_categorical<R>(
        &self,
        identity: i64,
        reducer: R,
        workload: Workload,
        context: &Context,
    ) -> Result<i64>
    where
        R: Fn(i64, i64) -> i64 + Sync,
    {
        self.require_categorical()?;
        execute(
            CategoricalReducer::new(self.column.clone(), identity, &reducer, &reducer),
            workload,
            context,
        )
    }

    /// Folds the raw dictionary indices; partial results are merged with
    /// `combiner`.
    pub fn reduce_categorical_with_combiner<R, C>(
        &self,
        identity: i64,
        reducer: R,
        combiner: C,
        workload: Workload,
        context: &Context,
    ) -> Result<i64>
    where
        R: Fn(i64, i64) -> i64 + Sync,
        C: Fn(i64, i64) -> i64 + Sync,
    {
        self.require_categorical()?;
        execute(
            CategoricalReducer::new(self.column.clone(), identity, &reducer, &combiner),
            workload,
            context,
        )
    }

    /// Folds the raw dictionary indices into mutable accumulators.
    pub fn fold_categorical<A, S, R, C>(
        &self,
        supplier: S,
        reducer: R,
        combiner: C,
        workload: Workload,
        context: &Context,
    ) -> Result<A>
    where
        A: Send,
        S: Fn() -> A + Sync,
        R: Fn(&mut A, u32) + Sync,
        C: Fn(&mut A, A) + Sync,
    {
        self.require_categorical()?;
        execute(
            CategoricalFold::new(self.column.clone(), supplier, reducer, combiner),
            workload,
            context,
        )
    }

    /// Maps the numeric view into a real buffer.
    pub fn apply_numeric_to_real<F>(
        &self,
        operator: F,
        workload: Workload,
        context: &Context,
    ) -> Result<NumericBuffer>
    where
        F: Fn(f64) -> f64 + Sync,
    {
        self.require_numeric()?;
        let kernel = map_numeric(self.column.clone(), operator);
        let data = execute(
            SliceApplier::new(self.column.size(), 0.0, kernel),
            workload,
            context,
        )?;
        Ok(NumericBuffer::from_vec(data, false))
    }

    /// Maps the numeric view into an integer buffer, rounding half up.
    pub fn apply_numeric_to_integer<F>(
        &self,
        operator: F,
        workload: Workload,
        context: &Context,
    ) -> Result<NumericBuffer>
    where
        F: Fn(f64) -> f64 + Sync,
    {
        self.require_numeric()?;
        let kernel = map_numeric(self.column.clone(), move |v| round_half_up(operator(v)));
        let data = execute(
            SliceApplier::new(self.column.size(), 0.0, kernel),
            workload,
            context,
        )?;
        Ok(NumericBuffer::from_vec(data, true))
    }

    /// Maps the numeric view into a categorical buffer of the given format.
    pub fn apply_numeric_to_categorical<F>(
        &self,
        operator: F,
        format: IntegerFormat,
        workload: Workload,
        context: &Context,
    ) -> Result<AnyCategoricalBuffer>
    where
        F: Fn(f64) -> Option<Value> + Sync,
    {
        self.require_numeric()?;
        let kernel = map_numeric_to_dictionary(self.column.clone(), operator);
        execute(
            CategoricalApplier::new(self.column.size(), format, kernel),
            workload,
            context,
        )
    }

    /// Maps the numeric view into a free buffer.
    pub fn apply_numeric_to_free<F>(
        &self,
        operator: F,
        workload: Workload,
        context: &Context,
    ) -> Result<FreeBuffer>
    where
        F: Fn(f64) -> Option<Value> + Sync,
    {
        self.require_numeric()?;
        let kernel = map_numeric(self.column.clone(), operator);
        let data = execute(
            SliceApplier::new(self.column.size(), None, kernel),
            workload,
            context,
        )?;
        Ok(FreeBuffer::from_vec(data))
    }

    /// Maps the raw dictionary indices into a real buffer.
    pub fn apply_categorical_to_real<F>(
        &self,
        operator: F,
        workload: Workload,
        context: &Context,
    ) -> Result<NumericBuffer>
    where
        F: Fn(u32) -> f64 + Sync,
    {
        self.require_categorical()?;
        let kernel = map_indices(self.column.clone(), operator);
        let data = execute(
            SliceApplier::new(self.column.size(), 0.0, kernel),
            workload,
            context,
        )?;
        Ok(NumericBuffer::from_vec(data, false))
    }

    /// Maps the raw dictionary indices into a categorical buffer.
    pub fn apply_categorical_to_categorical<F>(
        &self,
        operator: F,
        format: IntegerFormat,
        workload: Workload,
        context: &Context,
    ) -> Result<AnyCategoricalBuffer>
    where
        F: Fn(u32) -> Option<Value> + Sync,
    {
        self.require_categorical()?;
        let kernel = map_indices_to_dictionary(self.column.clone(), operator);
        execute(
            CategoricalApplier::new(self.column.size(), format, kernel),
            workload,
            context,
        )
    }

    /// Maps the raw dictionary indices into a free buffer.
    pub fn apply_categorical_to_free<F>(
        &self,
        operator: F,
        workload: Workload,
        context: &Context,
    ) -> Result<FreeBuffer>
    where
        F: Fn(u32) -> Option<Value> + Sync,
    {
        self.require_categorical()?;
        let kernel = map_indices(self.column.clone(), operator);
        let data = execute(
            SliceApplier::new(self.column.size(), None, kernel),
            workload,
            context,
        )?;
        Ok(FreeBuffer::from_vec(data))
    }

    /// Maps the object view into a real buffer.
    pub fn apply_object_to_real<F>(
        &self,
        operator: F,
        workload: Workload,
        context: &Context,
    ) -> Result<NumericBuffer>
    where
        F: Fn(Option<Value>) -> f64 + Sync,
    {
        self.require_object()?;
        let kernel = map_objects(self.column.clone(), operator);
        let data = execute(
            SliceApplier::new(self.column.size(), 0.0, kernel),
            workload,
            context,
        )?;
        Ok(NumericBuffer::from_vec(data, false))
    }

    /// Maps the object view into a categorical buffer.
    pub fn apply_object_to_categorical<F>(
        &self,
        operator: F,
        format: IntegerFormat,
        workload: Workload,
        context: &Context,
    ) -> Result<AnyCategoricalBuffer>
    where
        F: Fn(Option<Value>) -> Option<Value> + Sync,
    {
        self.require_object()?;
        let kernel = map_objects_to_dictionary(self.column.clone(), operator);
        execute(
            CategoricalApplier::new(self.column.size(), format, kernel),
            workload,
            context,
        )
    }

    /// Maps the object view into a free buffer.
    pub fn apply_object_to_free<F>(
        &self,
        operator: F,
        workload: Workload,
        context: &Context,
    ) -> Result<FreeBuffer>
    where
        F: Fn(Option<Value>) -> Option<Value> + Sync,
    {
        self.require_object()?;
        let kernel = map_objects(self.column.clone(), operator);
        let data = execute(
            SliceApplier::new(self.column.size(), None, kernel),
            workload,
            context,
        )?;
        Ok(FreeBuffer::from_vec(data))
    }
}

/// Transform entry point over several columns of equal height.
pub struct TransformerMulti {
    columns: Vec<Column>,
}

impl TransformerMulti {
    pub fn new(columns: Vec<Column>) -> TransformerMulti {
        TransformerMulti { columns }
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    fn height(&self) -> usize {
        self.columns.iter().map(Column::size).min().unwrap_or(0)
    }

    fn require_all_numeric(&self) -> Result<()> {
        if self
            .columns
            .iter()
            .all(|c| c.capabilities().contains(Capabilities::NUMERIC_READABLE))
        {
            Ok(())
        } else {
            Err(GirderError::UnsupportedCapability("numeric reads"))
        }
    }

    fn require_all_categorical(&self) -> Result<()> {
        if self
            .columns
            .iter()
            .all(|c| c.category() == Category::Categorical)
        {
            Ok(())
        } else {
            Err(GirderError::UnsupportedCapability("categorical reads"))
        }
    }

    /// Folds numeric rows into mutable accumulators.
    pub fn fold_rows<A, S, R, C>(
        &self,
        supplier: S,
        reducer: R,
        combiner: C,
        workload: Workload,
        context: &Context,
    ) -> Result<A>
    where
        A: Send,
        S: Fn() -> A + Sync,
        R: Fn(&mut A, &GeneralRowReader<'_>) + Sync,
        C: Fn(&mut A, A) + Sync,
    {
        self.require_all_numeric()?;
        execute(
            GeneralRowFold::new(self.columns.clone(), supplier, reducer, combiner),
            workload,
            context,
        )
    }

    /// Folds raw index rows of categorical columns into mutable
    /// accumulators.
    pub fn fold_categorical<A, S, R, C>(
        &self,
        supplier: S,
        reducer: R,
        combiner: C,
        workload: Workload,
        context: &Context,
    ) -> Result<A>
    where
        A: Send,
        S: Fn() -> A + Sync,
        R: Fn(&mut A, &RowReader<'_>) + Sync,
        C: Fn(&mut A, A) + Sync,
    {
        self.require_all_categorical()?;
        execute(
            RowFold::new(self.columns.clone(), supplier, reducer, combiner),
            workload,
            context,
        )
    }

    /// Folds mixed-view rows into mutable accumulators; each column exposes
    /// whichever views it supports.
    pub fn fold_general<A, S, R, C>(
        &self,
        supplier: S,
        reducer: R,
        combiner: C,
        workload: Workload,
        context: &Context,
    ) -> Result<A>
    where
        A: Send,
        S: Fn() -> A + Sync,
        R: Fn(&mut A, &GeneralRowReader<'_>) + Sync,
        C: Fn(&mut A, A) + Sync,
    {
        execute(
            GeneralRowFold::new(self.columns.clone(), supplier, reducer, combiner),
            workload,
            context,
        )
    }

    /// Maps every row into a real buffer.
    pub fn apply_to_real<F>(
        &self,
        operator: F,
        workload: Workload,
        context: &Context,
    ) -> Result<NumericBuffer>
    where
        F: Fn(&GeneralRowReader<'_>) -> f64 + Sync,
    {
        let kernel = map_rows(self.columns.clone(), operator);
        let data = execute(
            SliceApplier::new(self.height(), 0.0, kernel),
            workload,
            context,
        )?;
        Ok(NumericBuffer::from_vec(data, false))
    }

    /// Maps every row into a categorical buffer of the given format.
    pub fn apply_to_categorical<F>(
        &self,
        operator: F,
        format: IntegerFormat,
        workload: Workload,
        context: &Context,
    ) -> Result<AnyCategoricalBuffer>
    where
        F: Fn(&GeneralRowReader<'_>) -> Option<Value> + Sync,
    {
        let kernel = map_rows_to_dictionary(self.columns.clone(), operator);
        execute(
            CategoricalApplier::new(self.height(), format, kernel),
            workload,
            context,
        )
    }

    /// Maps every row into a free buffer.
    pub fn apply_to_free<F>(
        &self,
        operator: F,
        workload: Workload,
        context: &Context,
    ) -> Result<FreeBuffer>
    where
        F: Fn(&GeneralRowReader<'_>) -> Option<Value> + Sync,
    {
        let kernel = map_rows(self.columns.clone(), operator);
        let data = execute(
            SliceApplier::new(self.height(), None, kernel),
            workload,
            context,
        )?;
        Ok(FreeBuffer::from_vec(data))
    }
}

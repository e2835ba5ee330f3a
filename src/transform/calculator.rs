//! Calculators: the per-job bundle of user code and scratch state.
//!
//! A calculator knows how many operations it spans, computes disjoint row
//! ranges in `do_part`, and assembles the final result in `finish`. Reducer
//! calculators keep one accumulator per batch and combine them in ascending
//! batch order, so user combiners only need associativity, not
//! commutativity.

use parking_lot::Mutex;

use crate::column::Column;
use crate::reader::{CategoricalReader, GeneralRowReader, NumericReader, RowReader};
use crate::Result;

/// Contract between the executor and one unit of work.
pub(crate) trait Calculator: Sync {
    type Output;

    /// Allocates targets or per-batch accumulators. Runs before dispatch.
    fn init(&mut self, num_batches: usize);

    /// Total number of rows to process.
    fn operations(&self) -> usize;

    /// Computes rows `[from, to)`; invoked concurrently with disjoint
    /// ranges.
    fn do_part(&self, from: usize, to: usize, batch: usize) -> Result<()>;

    /// Combines per-batch state and returns the result. Runs after every
    /// batch has completed.
    fn finish(self) -> Self::Output;
}

/// Scalar fold over the numeric view of one column.
///
/// Each batch folds from `identity`; partial results are combined in batch
/// order with `combiner`.
pub(crate) struct NumericReducer<R, C> {
    column: Column,
    identity: f64,
    reducer: R,
    combiner: C,
    parts: Mutex<Vec<f64>>,
}

impl<R, C> NumericReducer<R, C>
where
    R: Fn(f64, f64) -> f64 + Sync,
    C: Fn(f64, f64) -> f64 + Sync,
{
    pub fn new(column: Column, identity: f64, reducer: R, combiner: C) -> NumericReducer<R, C> {
        NumericReducer {
            column,
            identity,
            reducer,
            combiner,
            parts: Mutex::new(Vec::new()),
        }
    }
}

impl<R, C> Calculator for NumericReducer<R, C>
where
    R: Fn(f64, f64) -> f64 + Sync,
    C: Fn(f64, f64) -> f64 + Sync,
{
    type Output = f64;

    fn init(&mut self, num_batches: usize) {
        *self.parts.get_mut() = vec![self.identity; num_batches];
    }

    fn operations(&self) -> usize {
        self.column.size()
    }

    fn do_part(&self, from: usize, to: usize, batch: usize) -> Result<()> {
        let mut reader = NumericReader::for_range(&self.column, from, to);
        let mut accumulator = self.identity;
        for _ in from..to {
            accumulator = (self.reducer)(accumulator, reader.read());
        }
        self.parts.lock()[batch] = accumulator;
        Ok(())
    }

    fn finish(self) -> f64 {
        let mut parts = self.parts.into_inner().into_iter();
        let mut result = parts.next().unwrap_or(self.identity);
        for part in parts {
            result = (self.combiner)(result, part);
        }
        result
    }
}

/// Scalar fold over the raw index view of one categorical column.
pub(crate) struct CategoricalReducer<R, C> {
    column: Column,
    identity: i64,
    reducer: R,
    combiner: C,
    parts: Mutex<Vec<i64>>,
}

impl<R, C> CategoricalReducer<R, C>
where
    R: Fn(i64, i64) -> i64 + Sync,
    C: Fn(i64, i64) -> i64 + Sync,
{
    pub fn new(column: Column, identity: i64, reducer: R, combiner: C) -> CategoricalReducer<R, C> {
        CategoricalReducer {
            column,
            identity,
            reducer,
            combiner,
            parts: Mutex::new(Vec::new()),
        }
    }
}

impl<R, C> Calculator for CategoricalReducer<R, C>
where
    R: Fn(i64, i64) -> i64 + Sync,
    C: Fn(i64, i64) -> i64 + Sync,
{
    type Output = i64;

    fn init(&mut self, num_batches: usize) {
        *self.parts.get_mut() = vec![self.identity; num_batches];
    }

    fn operations(&self) -> usize {
        self.column.size()
    }

    fn do_part(&self, from: usize, to: usize, batch: usize) -> Result<()> {
        let mut reader = CategoricalReader::for_range(&self.column, from, to);
        let mut accumulator = self.identity;
        for _ in from..to {
            accumulator = (self.reducer)(accumulator, reader.read() as i64);
        }
        self.parts.lock()[batch] = accumulator;
        Ok(())
    }

    fn finish(self) -> i64 {
        let mut parts = self.parts.into_inner().into_iter();
        let mut result = parts.next().unwrap_or(self.identity);
        for part in parts {
            result = (self.combiner)(result, part);
        }
        result
    }
}

/// Glue shared by the mutable-accumulator folds: one supplier-made
/// accumulator per batch, combined left to right.
struct Accumulators<A> {
    parts: Mutex<Vec<Option<A>>>,
}

impl<A: Send> Accumulators<A> {
    fn new() -> Accumulators<A> {
        Accumulators {
            parts: Mutex::new(Vec::new()),
        }
    }

    fn init(&mut self, num_batches: usize) {
        let parts = self.parts.get_mut();
        parts.clear();
        parts.resize_with(num_batches, || None);
    }

    fn store(&self, batch: usize, accumulator: A) {
        self.parts.lock()[batch] = Some(accumulator);
    }

    fn combine(
        self,
        supplier: impl Fn() -> A,
        combiner: impl Fn(&mut A, A),
    ) -> A {
        let mut parts = self.parts.into_inner().into_iter().flatten();
        let mut result = match parts.next() {
            Some(first) => first,
            None => supplier(),
        };
        for part in parts {
            combiner(&mut result, part);
        }
        result
    }
}

/// Mutable-accumulator fold over the numeric view of one column.
pub(crate) struct NumericFold<A, S, R, C> {
    column: Column,
    supplier: S,
    reducer: R,
    combiner: C,
    accumulators: Accumulators<A>,
}

impl<A, S, R, C> NumericFold<A, S, R, C>
where
    A: Send,
    S: Fn() -> A + Sync,
    R: Fn(&mut A, f64) + Sync,
    C: Fn(&mut A, A) + Sync,
{
    pub fn new(column: Column, supplier: S, reducer: R, combiner: C) -> NumericFold<A, S, R, C> {
        NumericFold {
            column,
            supplier,
            reducer,
            combiner,
            accumulators: Accumulators::new(),
        }
    }
}

impl<A, S, R, C> Calculator for NumericFold<A, S, R, C>
where
    A: Send,
    S: Fn() -> A + Sync,
    R: Fn(&mut A, f64) + Sync,
    C: Fn(&mut A, A) + Sync,
{
    type Output = A;

    fn init(&mut self, num_batches: usize) {
        self.accumulators.init(num_batches);
    }

    fn operations(&self) -> usize {
        self.column.size()
    }

    fn do_part(&self, from: usize, to: usize, batch: usize) -> Result<()> {
        let mut reader = NumericReader::for_range(&self.column, from, to);
        let mut accumulator = (self.supplier)();
        for _ in from..to {
            (self.reducer)(&mut accumulator, reader.read());
        }
        self.accumulators.store(batch, accumulator);
        Ok(())
    }

    fn finish(self) -> A {
        self.accumulators.combine(self.supplier, self.combiner)
    }
}

/// Mutable-accumulator fold over the raw index view of one categorical
/// column.
pub(crate) struct CategoricalFold<A, S, R, C> {
    column: Column,
    supplier: S,
    reducer: R,
    combiner: C,
    accumulators: Accumulators<A>,
}

impl<A, S, R, C> CategoricalFold<A, S, R, C>
where
    A: Send,
    S: Fn() -> A + Sync,
    R: Fn(&mut A, u32) + Sync,
    C: Fn(&mut A, A) + Sync,
{
    pub fn new(column: Column, supplier: S, reducer: R, combiner: C) -> CategoricalFold<A, S, R, C> {
        CategoricalFold {
            column,
            supplier,
            reducer,
            combiner,
            accumulators: Accumulators::new(),
        }
    }
}

impl<A, S, R, C> Calculator for CategoricalFold<A, S, R, C>
where
    A: Send,
    S: Fn() -> A + Sync,
    R: Fn(&mut A, u32) + Sync,
    C: Fn(&mut A, A) + Sync,
{
    type Output = A;

    fn init(&mut self, num_batches: usize) {
        self.accumulators.init(num_batches);
    }

    fn operations(&self) -> usize {
        self.column.size()
    }

    fn do_part(&self, from: usize, to: usize, batch: usize) -> Result<()> {
        let mut reader = CategoricalReader::for_range(&self.column, from, to);
        let mut accumulator = (self.supplier)();
        for _ in from..to {
            (self.reducer)(&mut accumulator, reader.read());
        }
        self.accumulators.store(batch, accumulator);
        Ok(())
    }

    fn finish(self) -> A {
        self.accumulators.combine(self.supplier, self.combiner)
    }
}

/// Mutable-accumulator fold over index rows of several categorical columns.
pub(crate) struct RowFold<A, S, R, C> {
    columns: Vec<Column>,
    supplier: S,
    reducer: R,
    combiner: C,
    accumulators: Accumulators<A>,
}

impl<A, S, R, C> RowFold<A, S, R, C>
where
    A: Send,
    S: Fn() -> A + Sync,
    R: Fn(&mut A, &RowReader<'_>) + Sync,
    C: Fn(&mut A, A) + Sync,
{
    pub fn new(columns: Vec<Column>, supplier: S, reducer: R, combiner: C) -> RowFold<A, S, R, C> {
        RowFold {
            columns,
            supplier,
            reducer,
            combiner,
            accumulators: Accumulators::new(),
        }
    }
}

impl<A, S, R, C> Calculator for RowFold<A, S, R, C>
where
    A: Send,
    S: Fn() -> A + Sync,
    R: Fn(&mut A, &RowReader<'_>) + Sync,
    C: Fn(&mut A, A) + Sync,
{
    type Output = A;

    fn init(&mut self, num_batches: usize) {
        self.accumulators.init(num_batches);
    }

    fn operations(&self) -> usize {
        self.columns.iter().map(Column::size).min().unwrap_or(0)
    }

    fn do_part(&self, from: usize, to: usize, batch: usize) -> Result<()> {
        let mut reader = RowReader::for_range(&self.columns, from, to)?;
        let mut accumulator = (self.supplier)();
        for _ in from..to {
            reader.move_next();
            (self.reducer)(&mut accumulator, &reader);
        }
        self.accumulators.store(batch, accumulator);
        Ok(())
    }

    fn finish(self) -> A {
        self.accumulators.combine(self.supplier, self.combiner)
    }
}

/// Mutable-accumulator fold over mixed-view rows of several columns.
pub(crate) struct GeneralRowFold<A, S, R, C> {
    columns: Vec<Column>,
    supplier: S,
    reducer: R,
    combiner: C,
    accumulators: Accumulators<A>,
}

impl<A, S, R, C> GeneralRowFold<A, S, R, C>
where
    A: Send,
    S: Fn() -> A + Sync,
    R: Fn(&mut A, &GeneralRowReader<'_>) + Sync,
    C: Fn(&mut A, A) + Sync,
{
    pub fn new(
        columns: Vec<Column>,
        supplier: S,
        reducer: R,
        combiner: C,
    ) -> GeneralRowFold<A, S, R, C> {
        GeneralRowFold {
            columns,
            supplier,
            reducer,
            combiner,
            accumulators: Accumulators::new(),
        }
    }
}

impl<A, S, R, C> Calculator for GeneralRowFold<A, S, R, C>
where
    A: Send,
    S: Fn() -> A + Sync,
    R: Fn(&mut A, &GeneralRowReader<'_>) + Sync,
    C: Fn(&mut A, A) + Sync,
{
    type Output = A;

    fn init(&mut self, num_batches: usize) {
        self.accumulators.init(num_batches);
    }

    fn operations(&self) -> usize {
        self.columns.iter().map(Column::size).min().unwrap_or(0)
    }

    fn do_part(&self, from: usize, to: usize, batch: usize) -> Result<()> {
        let mut reader = GeneralRowReader::for_range(&self.columns, from, to);
        let mut accumulator = (self.supplier)();
        for _ in from..to {
            reader.move_next();
            (self.reducer)(&mut accumulator, &reader);
        }
        self.accumulators.store(batch, accumulator);
        Ok(())
    }

    fn finish(self) -> A {
        self.accumulators.combine(self.supplier, self.combiner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{ColumnType, Dictionary};
    use crate::format::PackedIndices;
    use crate::value::Value;

    fn nominal(indices: Vec<u32>) -> Column {
        let max = indices.iter().copied().max().unwrap_or(0) as usize;
        let values = std::iter::once(None)
            .chain((1..=max).map(|i| Some(Value::text(format!("value{}", i)))))
            .collect();
        Column::categorical(
            ColumnType::Nominal,
            PackedIndices::Unpacked32(indices),
            Dictionary::from_values(values),
        )
        .unwrap()
    }

    fn pseudo_indices(n: usize) -> Vec<u32> {
        (0..n as u32).map(|i| (i * 13 + 1) % 10).collect()
    }

    #[test]
    fn categorical_reducer_part_matches_sequential_fold() {
        let indices = pseudo_indices(75);
        let mut calculator =
            CategoricalReducer::new(nominal(indices.clone()), 0, |a, b| a + b + a * b, |a, b| {
                a + b
            });
        calculator.init(1);
        let (start, end) = (10, 30);
        calculator.do_part(start, end, 0).unwrap();
        let result = calculator.finish();

        let expected = indices[start..end]
            .iter()
            .fold(0i64, |a, &b| a + b as i64 + a * b as i64);
        assert_eq!(result, expected);
    }

    #[test]
    fn categorical_reducer_combines_in_batch_order() {
        let indices = pseudo_indices(75);
        let mut calculator = CategoricalReducer::new(
            nominal(indices.clone()),
            0,
            |count, d| if d > 2 { count + 1 } else { count },
            |a, b| a + b,
        );
        calculator.init(2);
        calculator.do_part(10, 20, 0).unwrap();
        calculator.do_part(20, 30, 1).unwrap();
        let result = calculator.finish();

        let expected = indices[10..30]
            .iter()
            .fold(0i64, |count, &d| if d > 2 { count + 1 } else { count });
        assert_eq!(result, expected);
    }

    #[test]
    fn categorical_fold_counts_per_index() {
        let indices = pseudo_indices(75);
        let column = nominal(indices.clone());
        let buckets = column.dictionary().unwrap().len();
        let mut calculator = CategoricalFold::new(
            column,
            move || vec![0u32; buckets],
            |counts: &mut Vec<u32>, index| counts[index as usize] += 1,
            |left, right| {
                for (l, r) in left.iter_mut().zip(right) {
                    *l += r;
                }
            },
        );
        calculator.init(3);
        calculator.do_part(0, 30, 0).unwrap();
        calculator.do_part(30, 60, 1).unwrap();
        calculator.do_part(60, 75, 2).unwrap();
        let counts = calculator.finish();

        let mut expected = vec![0u32; buckets];
        for &i in &indices {
            expected[i as usize] += 1;
        }
        assert_eq!(counts, expected);
    }

    #[test]
    fn numeric_reducer_sums() {
        let column = Column::numeric(ColumnType::Real, (0..100).map(f64::from).collect()).unwrap();
        let mut calculator = NumericReducer::new(column, 0.0, |a, b| a + b, |a, b| a + b);
        calculator.init(2);
        calculator.do_part(0, 50, 0).unwrap();
        calculator.do_part(50, 100, 1).unwrap();
        assert_eq!(calculator.finish(), 4950.0);
    }

    #[test]
    fn numeric_fold_collects() {
        let column = Column::numeric(ColumnType::Real, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let mut calculator = NumericFold::new(
            column,
            Vec::new,
            |acc: &mut Vec<f64>, v| acc.push(v),
            |left, mut right| left.append(&mut right),
        );
        calculator.init(2);
        // Batches finish out of order; combine is still ascending.
        calculator.do_part(2, 4, 1).unwrap();
        calculator.do_part(0, 2, 0).unwrap();
        assert_eq!(calculator.finish(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn row_fold_sums_index_tuples() {
        let a = pseudo_indices(40);
        let b: Vec<u32> = a.iter().map(|&v| (v + 3) % 10).collect();
        let columns = vec![nominal(a.clone()), nominal(b.clone())];
        let mut calculator = RowFold::new(
            columns,
            || 0i64,
            |acc: &mut i64, row: &RowReader<'_>| {
                *acc += row.get(0) as i64 * 2 + row.get(1) as i64;
            },
            |left, right| *left += right,
        );
        calculator.init(2);
        calculator.do_part(0, 20, 0).unwrap();
        calculator.do_part(20, 40, 1).unwrap();
        let result = calculator.finish();

        let expected: i64 = a
            .iter()
            .zip(&b)
            .map(|(&x, &y)| x as i64 * 2 + y as i64)
            .sum();
        assert_eq!(result, expected);
    }

    #[test]
    fn general_row_fold_mixes_views() {
        let indices = pseudo_indices(30);
        let reals: Vec<f64> = (0..30).map(|i| i as f64 / 2.0).collect();
        let columns = vec![
            nominal(indices.clone()),
            Column::numeric(ColumnType::Real, reals.clone()).unwrap(),
        ];
        let mut calculator = GeneralRowFold::new(
            columns,
            || 0.0f64,
            |acc: &mut f64, row: &GeneralRowReader<'_>| {
                *acc += row.get_index(0) as f64 + row.get_numeric(1);
            },
            |left, right| *left += right,
        );
        calculator.init(1);
        calculator.do_part(0, 30, 0).unwrap();
        let result = calculator.finish();

        let expected: f64 = indices
            .iter()
            .zip(&reals)
            .map(|(&i, &r)| i as f64 + r)
            .sum();
        assert!((result - expected).abs() < 1e-10);
    }

    #[test]
    fn empty_range_returns_identity() {
        let column = Column::numeric(ColumnType::Real, vec![]).unwrap();
        let mut calculator = NumericReducer::new(column, 7.5, |a, b| a + b, |a, b| a + b);
        calculator.init(1);
        calculator.do_part(0, 0, 0).unwrap();
        assert_eq!(calculator.finish(), 7.5);
    }
}

//! Applier calculators: map every row into a freshly allocated target.
//!
//! Ranges handed to `do_part` are disjoint, so batches can write straight
//! into one shared allocation without synchronization. Slice targets go
//! through [`PartedSlice`], which hands each batch a mutable view of its own
//! rows; categorical targets go through the thread-safe buffer writes
//! instead, because appending to the dictionary has to be coordinated
//! anyway.

use std::cell::UnsafeCell;

use crate::buffer::AnyCategoricalBuffer;
use crate::column::Column;
use crate::format::IntegerFormat;
use crate::reader::{CategoricalReader, GeneralRowReader, NumericReader, ObjectReader};
use crate::transform::calculator::Calculator;
use crate::value::Value;
use crate::Result;

/// A vector that concurrent batches write to through disjoint ranges.
///
/// The raw parts are captured once, before the parallel section, so workers
/// never touch the `Vec` itself.
pub(crate) struct PartedSlice<T> {
    vec: UnsafeCell<Vec<T>>,
    ptr: *mut T,
    len: usize,
}

// SAFETY: workers only reach the storage via `part_mut`, whose callers
// guarantee disjoint ranges; the Vec itself is not shared.
unsafe impl<T: Send> Sync for PartedSlice<T> {}
unsafe impl<T: Send> Send for PartedSlice<T> {}

impl<T> PartedSlice<T> {
    fn new(mut vec: Vec<T>) -> PartedSlice<T> {
        let ptr = vec.as_mut_ptr();
        let len = vec.len();
        PartedSlice {
            vec: UnsafeCell::new(vec),
            ptr,
            len,
        }
    }

    /// Mutable view of rows `[from, to)`.
    ///
    /// SAFETY: concurrent callers must pass pairwise disjoint ranges, and
    /// `to` must not exceed the allocation length.
    #[allow(clippy::mut_from_ref)]
    unsafe fn part_mut(&self, from: usize, to: usize) -> &mut [T] {
        debug_assert!(from <= to && to <= self.len);
        std::slice::from_raw_parts_mut(self.ptr.add(from), to - from)
    }

    fn into_vec(self) -> Vec<T> {
        self.vec.into_inner()
    }
}

/// Maps rows into a dense slice target of element type `T`.
pub(crate) struct SliceApplier<T, K> {
    length: usize,
    empty: T,
    kernel: K,
    target: Option<PartedSlice<T>>,
}

impl<T, K> SliceApplier<T, K>
where
    T: Clone + Send + Sync,
    K: Fn(usize, usize, &mut [T]) -> Result<()> + Sync,
{
    pub fn new(length: usize, empty: T, kernel: K) -> SliceApplier<T, K> {
        SliceApplier {
            length,
            empty,
            kernel,
            target: None,
        }
    }
}

impl<T, K> Calculator for SliceApplier<T, K>
where
    T: Clone + Send + Sync,
    K: Fn(usize, usize, &mut [T]) -> Result<()> + Sync,
{
    type Output = Vec<T>;

    fn init(&mut self, _num_batches: usize) {
        self.target = Some(PartedSlice::new(vec![self.empty.clone(); self.length]));
    }

    fn operations(&self) -> usize {
        self.length
    }

    fn do_part(&self, from: usize, to: usize, _batch: usize) -> Result<()> {
        let target = self.target.as_ref().expect("target allocated in init");
        // SAFETY: the executor dispatches disjoint ranges within bounds.
        let out = unsafe { target.part_mut(from, to) };
        (self.kernel)(from, to, out)
    }

    fn finish(self) -> Vec<T> {
        self.target.expect("target allocated in init").into_vec()
    }
}

/// Maps rows into a categorical buffer target.
pub(crate) struct CategoricalApplier<K> {
    length: usize,
    format: IntegerFormat,
    kernel: K,
    target: Option<AnyCategoricalBuffer>,
}

impl<K> CategoricalApplier<K>
where
    K: Fn(usize, usize, &AnyCategoricalBuffer) -> Result<()> + Sync,
{
    pub fn new(length: usize, format: IntegerFormat, kernel: K) -> CategoricalApplier<K> {
        CategoricalApplier {
            length,
            format,
            kernel,
            target: None,
        }
    }
}

impl<K> Calculator for CategoricalApplier<K>
where
    K: Fn(usize, usize, &AnyCategoricalBuffer) -> Result<()> + Sync,
{
    type Output = AnyCategoricalBuffer;

    fn init(&mut self, _num_batches: usize) {
        self.target = Some(AnyCategoricalBuffer::new(self.length, self.format));
    }

    fn operations(&self) -> usize {
        self.length
    }

    fn do_part(&self, from: usize, to: usize, _batch: usize) -> Result<()> {
        let target = self.target.as_ref().expect("target allocated in init");
        (self.kernel)(from, to, target)
    }

    fn finish(self) -> AnyCategoricalBuffer {
        self.target.expect("target allocated in init")
    }
}

// Kernels: each reads one view of the source through a range-bounded reader
// and applies the user operator row by row.

pub(crate) fn map_numeric<T, F>(
    column: Column,
    operator: F,
) -> impl Fn(usize, usize, &mut [T]) -> Result<()> + Sync
where
    F: Fn(f64) -> T + Sync,
    T: Send,
{
    move |from, to, out| {
        let mut reader = NumericReader::for_range(&column, from, to);
        for slot in out.iter_mut() {
            *slot = operator(reader.read());
        }
        Ok(())
    }
}

pub(crate) fn map_indices<T, F>(
    column: Column,
    operator: F,
) -> impl Fn(usize, usize, &mut [T]) -> Result<()> + Sync
where
    F: Fn(u32) -> T + Sync,
    T: Send,
{
    move |from, to, out| {
        let mut reader = CategoricalReader::for_range(&column, from, to);
        for slot in out.iter_mut() {
            *slot = operator(reader.read());
        }
        Ok(())
    }
}

pub(crate) fn map_objects<T, F>(
    column: Column,
    operator: F,
) -> impl Fn(usize, usize, &mut [T]) -> Result<()> + Sync
where
    F: Fn(Option<Value>) -> T + Sync,
    T: Send,
{
    move |from, to, out| {
        let mut reader = ObjectReader::for_range(&column, from, to);
        for slot in out.iter_mut() {
            *slot = operator(reader.read());
        }
        Ok(())
    }
}

pub(crate) fn map_rows<T, F>(
    columns: Vec<Column>,
    operator: F,
) -> impl Fn(usize, usize, &mut [T]) -> Result<()> + Sync
where
    F: Fn(&GeneralRowReader<'_>) -> T + Sync,
    T: Send,
{
    move |from, to, out| {
        let mut reader = GeneralRowReader::for_range(&columns, from, to);
        for slot in out.iter_mut() {
            reader.move_next();
            *slot = operator(&reader);
        }
        Ok(())
    }
}

pub(crate) fn map_numeric_to_dictionary<F>(
    column: Column,
    operator: F,
) -> impl Fn(usize, usize, &AnyCategoricalBuffer) -> Result<()> + Sync
where
    F: Fn(f64) -> Option<Value> + Sync,
{
    move |from, to, target| {
        let mut reader = NumericReader::for_range(&column, from, to);
        for row in from..to {
            target.set(row, operator(reader.read()))?;
        }
        Ok(())
    }
}

pub(crate) fn map_indices_to_dictionary<F>(
    column: Column,
    operator: F,
) -> impl Fn(usize, usize, &AnyCategoricalBuffer) -> Result<()> + Sync
where
    F: Fn(u32) -> Option<Value> + Sync,
{
    move |from, to, target| {
        let mut reader = CategoricalReader::for_range(&column, from, to);
        for row in from..to {
            target.set(row, operator(reader.read()))?;
        }
        Ok(())
    }
}

pub(crate) fn map_objects_to_dictionary<F>(
    column: Column,
    operator: F,
) -> impl Fn(usize, usize, &AnyCategoricalBuffer) -> Result<()> + Sync
where
    F: Fn(Option<Value>) -> Option<Value> + Sync,
{
    move |from, to, target| {
        let mut reader = ObjectReader::for_range(&column, from, to);
        for row in from..to {
            target.set(row, operator(reader.read()))?;
        }
        Ok(())
    }
}

pub(crate) fn map_rows_to_dictionary<F>(
    columns: Vec<Column>,
    operator: F,
) -> impl Fn(usize, usize, &AnyCategoricalBuffer) -> Result<()> + Sync
where
    F: Fn(&GeneralRowReader<'_>) -> Option<Value> + Sync,
{
    move |from, to, target| {
        let mut reader = GeneralRowReader::for_range(&columns, from, to);
        for row in from..to {
            reader.move_next();
            target.set(row, operator(&reader))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnType;
    use crate::transform::executor::{default_context, execute};
    use crate::transform::Workload;

    fn ramp(n: usize) -> Column {
        Column::numeric(ColumnType::Real, (0..n).map(|i| i as f64).collect()).unwrap()
    }

    #[test]
    fn slice_applier_writes_every_row() {
        let n = 10_000;
        let kernel = map_numeric(ramp(n), |v| v * 2.0);
        let result = execute(
            SliceApplier::new(n, 0.0, kernel),
            Workload::Huge,
            default_context(),
        )
        .unwrap();
        assert_eq!(result.len(), n);
        for (i, v) in result.iter().enumerate() {
            assert_eq!(*v, i as f64 * 2.0);
        }
    }

    #[test]
    fn slice_applier_boxed_values() {
        let n = 300;
        let kernel = map_numeric(ramp(n), |v| Some(Value::Real(v + 0.5)));
        let result = execute(
            SliceApplier::new(n, None, kernel),
            Workload::Default,
            default_context(),
        )
        .unwrap();
        assert_eq!(result[7], Some(Value::Real(7.5)));
    }

    #[test]
    fn categorical_applier_builds_a_dictionary() {
        let n = 1000;
        let kernel =
            map_numeric_to_dictionary(ramp(n), |v| Some(Value::text(format!("b{}", v as u32 % 7))));
        let buffer = execute(
            CategoricalApplier::new(n, IntegerFormat::I32, kernel),
            Workload::Large,
            default_context(),
        )
        .unwrap();
        assert_eq!(buffer.len(), n);
        assert_eq!(buffer.different_values(), 7);
        for row in 0..n {
            assert_eq!(
                buffer.get(row),
                Some(Value::text(format!("b{}", row % 7)))
            );
        }
    }

    #[test]
    fn categorical_applier_overflow_surfaces() {
        let n = 600;
        let kernel =
            map_numeric_to_dictionary(ramp(n), |v| Some(Value::text(format!("v{}", v as u32))));
        let result = execute(
            CategoricalApplier::new(n, IntegerFormat::U8, kernel),
            Workload::Default,
            default_context(),
        );
        assert!(matches!(
            result,
            Err(crate::GirderError::DictionaryOverflow(255))
        ));
    }
}

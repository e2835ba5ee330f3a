//! Task-parallel execution of calculators.
//!
//! The executor splits a calculator's operation range into contiguous
//! batches, runs `do_part` for every batch on a rayon pool, and finishes the
//! calculator on the caller's thread. Batch sizing follows the workload
//! hint: the lighter the per-row work, the larger the batches, so per-batch
//! overhead stays amortized.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::transform::calculator::Calculator;
use crate::{GirderError, Result};

/// Smallest batch the executor will schedule.
const MIN_BATCH: usize = 64;

/// Largest batch the executor will schedule.
const MAX_BATCH: usize = 1 << 20;

/// Coarse hint for the per-row cost of an operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Workload {
    /// Trivial per-row work; few large batches.
    Small,
    #[default]
    Default,
    /// Heavy per-row work; more, smaller batches.
    Large,
    /// Very heavy per-row work; many small batches.
    Huge,
}

impl Workload {
    /// Batch shrink factor: target batch size is `n / (parallelism * k)`.
    fn batch_divisor(self) -> usize {
        match self {
            Workload::Small => 1,
            Workload::Default => 4,
            Workload::Large => 16,
            Workload::Huge => 64,
        }
    }
}

/// Execution context: a worker pool plus a cooperative cancellation flag.
///
/// The default context schedules on rayon's global pool. Cancellation is
/// checked between batches only; a batch that has started runs to
/// completion.
#[derive(Clone)]
pub struct Context {
    pool: Option<Arc<rayon::ThreadPool>>,
    cancelled: Arc<AtomicBool>,
}

impl Context {
    /// Context with a dedicated pool of `parallelism` workers.
    pub fn new(parallelism: usize) -> Result<Context> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(parallelism)
            .build()
            .map_err(|e| GirderError::PoolBuild(e.to_string()))?;
        Ok(Context {
            pool: Some(Arc::new(pool)),
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn parallelism(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }

    /// Requests cancellation; running batches finish, no new batch starts.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_active(&self) -> bool {
        !self.cancelled.load(Ordering::Relaxed)
    }

    fn run<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }
}

impl Default for Context {
    fn default() -> Context {
        Context {
            pool: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// The shared default context, backed by rayon's global pool.
pub fn default_context() -> &'static Context {
    static CONTEXT: Lazy<Context> = Lazy::new(Context::default);
    &CONTEXT
}

/// Batch size and batch count for `operations` rows.
fn plan_batches(operations: usize, parallelism: usize, workload: Workload) -> (usize, usize) {
    let divisor = (parallelism.max(1) * workload.batch_divisor()).max(1);
    let size = (operations / divisor).clamp(MIN_BATCH, MAX_BATCH);
    let count = operations.div_ceil(size).max(1);
    (size, count)
}

/// Runs a calculator to completion and returns its result.
///
/// Batches cover `[0, operations)` contiguously and disjointly. The first
/// failing batch wins; remaining queued batches are abandoned. `init` runs
/// before dispatch and `finish` after every batch has completed, both on the
/// calling thread.
pub(crate) fn execute<C: Calculator>(
    mut calculator: C,
    workload: Workload,
    context: &Context,
) -> Result<C::Output> {
    let operations = calculator.operations();
    let (size, count) = plan_batches(operations, context.parallelism(), workload);
    log::debug!(
        "dispatching {} operations as {} batches of up to {} rows",
        operations,
        count,
        size
    );
    calculator.init(count);
    let calculator_ref = &calculator;
    context.run(|| {
        (0..count).into_par_iter().try_for_each(|batch| {
            if !context.is_active() {
                return Err(GirderError::Cancelled);
            }
            let from = batch * size;
            let to = (from + size).min(operations);
            calculator_ref.do_part(from, to, batch)
        })
    })?;
    Ok(calculator.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Records the ranges it was handed.
    struct Probe {
        operations: usize,
        announced_batches: usize,
        batches: Mutex<Vec<(usize, usize, usize)>>,
    }

    impl Probe {
        fn new(operations: usize) -> Probe {
            Probe {
                operations,
                announced_batches: 0,
                batches: Mutex::new(Vec::new()),
            }
        }
    }

    impl Calculator for Probe {
        type Output = Vec<(usize, usize, usize)>;

        fn init(&mut self, num_batches: usize) {
            self.announced_batches = num_batches;
        }

        fn operations(&self) -> usize {
            self.operations
        }

        fn do_part(&self, from: usize, to: usize, batch: usize) -> Result<()> {
            self.batches.lock().push((from, to, batch));
            Ok(())
        }

        fn finish(self) -> Vec<(usize, usize, usize)> {
            let mut batches = self.batches.into_inner();
            assert_eq!(batches.len(), self.announced_batches);
            batches.sort_unstable_by_key(|&(_, _, b)| b);
            batches
        }
    }

    #[test]
    fn plan_respects_bounds() {
        let (size, count) = plan_batches(100, 4, Workload::Default);
        assert_eq!(size, MIN_BATCH);
        assert_eq!(count, 2);

        let (size, _) = plan_batches(usize::pow(2, 28), 1, Workload::Small);
        assert_eq!(size, MAX_BATCH);

        // Heavier workloads produce more batches.
        let (small, _) = plan_batches(1 << 22, 4, Workload::Small);
        let (huge, _) = plan_batches(1 << 22, 4, Workload::Huge);
        assert!(huge < small);
    }

    #[test]
    fn batches_cover_the_range_disjointly() {
        for n in [0, 1, 63, 64, 65, 1000, 10_000] {
            let batches = execute(Probe::new(n), Workload::Huge, default_context()).unwrap();
            let mut expected_from = 0;
            for (i, &(from, to, batch)) in batches.iter().enumerate() {
                assert_eq!(batch, i);
                assert_eq!(from, expected_from);
                assert!(to >= from);
                expected_from = to;
            }
            assert_eq!(expected_from, n);
        }
    }

    #[test]
    fn zero_operations_still_run_one_batch() {
        let batches = execute(Probe::new(0), Workload::Default, default_context()).unwrap();
        assert_eq!(batches, vec![(0, 0, 0)]);
    }

    #[test]
    fn errors_from_batches_surface() {
        struct Failing;
        impl Calculator for Failing {
            type Output = ();
            fn init(&mut self, _num_batches: usize) {}
            fn operations(&self) -> usize {
                10_000
            }
            fn do_part(&self, from: usize, _to: usize, _batch: usize) -> Result<()> {
                if from >= 128 {
                    Err(GirderError::DictionaryOverflow(255))
                } else {
                    Ok(())
                }
            }
            fn finish(self) {}
        }
        let result = execute(Failing, Workload::Huge, default_context());
        assert!(matches!(result, Err(GirderError::DictionaryOverflow(255))));
    }

    #[test]
    fn cancelled_context_rejects_work() {
        let context = Context::default();
        context.cancel();
        let result = execute(Probe::new(1000), Workload::Default, &context);
        assert!(matches!(result, Err(GirderError::Cancelled)));
    }

    #[test]
    fn dedicated_pool_reports_parallelism() {
        let context = Context::new(2).unwrap();
        assert_eq!(context.parallelism(), 2);
        let batches = execute(Probe::new(500), Workload::Default, &context).unwrap();
        assert!(!batches.is_empty());
    }
}

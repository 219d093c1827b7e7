//! Map-reduce executor
//!
//! ## Table of Contents
//! - **ExecutionStrategy**: Sequential vs pooled execution, as an explicit value
//! - **map_reduce**: Dispatch weighted blocks and fold results on arrival
//! - **apply_reduce**: Partition-then-run convenience
//! - **TaskStats** / **LoadBalance**: Instrumentation side channel
//!
//! Workers share no mutable state; the only suspension point is "await the
//! next completed block result". Results are folded on the calling thread in
//! completion order, so the reduce function must be associative and, in
//! practice, commutative. The pool is driven from a dedicated feeder thread,
//! never from the thread doing the fold, so a single-worker pool still makes
//! progress. A worker failure aborts the whole call: blocks not yet started
//! are skipped, in-flight blocks run to completion and their results are
//! dropped, and partials already reduced are discarded.

use crate::error::{HazardError, Result};
use crate::partition::{split_in_blocks, split_in_blocks_by_key, WeightedBlock};
use crate::types::GroupId;
use rayon::prelude::*;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How blocks are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionStrategy {
    /// Run every block on the calling thread, in input order
    Sequential,
    /// Run blocks on the rayon worker pool, one task per block
    #[default]
    Parallel,
}

/// Per-block instrumentation: weight dispatched, wall time spent
#[derive(Debug, Clone, Copy)]
pub struct TaskStats {
    /// Weight of the block
    pub weight: f64,
    /// Wall time the block computation took
    pub elapsed: Duration,
}

/// Load-balance summary over one map-reduce run
#[derive(Debug, Clone, Copy)]
pub struct LoadBalance {
    /// Number of blocks executed
    pub blocks: usize,
    /// Total weight dispatched
    pub total_weight: f64,
    /// Mean block wall time
    pub mean: Duration,
    /// Slowest block wall time
    pub max: Duration,
}

impl LoadBalance {
    /// Summarize a run
    pub fn from_stats(stats: &[TaskStats]) -> Self {
        let total: Duration = stats.iter().map(|s| s.elapsed).sum();
        Self {
            blocks: stats.len(),
            total_weight: stats.iter().map(|s| s.weight).sum(),
            mean: total.checked_div(stats.len().max(1) as u32).unwrap_or_default(),
            max: stats.iter().map(|s| s.elapsed).max().unwrap_or_default(),
        }
    }
}

impl fmt::Display for LoadBalance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} block(s), total weight {:.1}, mean {:?}, max {:?}",
            self.blocks, self.total_weight, self.mean, self.max
        )
    }
}

/// Dispatch blocks to workers and fold their outputs as they complete
///
/// `reduce` starts from `initial` and is applied on the calling thread in
/// completion order. The first worker error aborts the run and is returned;
/// there is no automatic retry.
pub fn map_reduce<T, R, A, C, F>(
    strategy: ExecutionStrategy,
    blocks: Vec<WeightedBlock<T>>,
    compute: C,
    reduce: F,
    initial: A,
) -> Result<(A, Vec<TaskStats>)>
where
    T: Send + Sync,
    R: Send,
    A: Send,
    C: Fn(&WeightedBlock<T>) -> Result<R> + Sync,
    F: FnMut(A, R) -> A + Send,
{
    debug!(blocks = blocks.len(), ?strategy, "dispatching blocks");
    let out = match strategy {
        ExecutionStrategy::Sequential => run_sequential(blocks, compute, reduce, initial),
        ExecutionStrategy::Parallel => run_parallel(blocks, compute, reduce, initial),
    };
    if let Ok((_, stats)) = &out {
        info!(balance = %LoadBalance::from_stats(stats), "map-reduce complete");
    }
    out
}

fn run_sequential<T, R, A, C, F>(
    blocks: Vec<WeightedBlock<T>>,
    compute: C,
    mut reduce: F,
    initial: A,
) -> Result<(A, Vec<TaskStats>)>
where
    C: Fn(&WeightedBlock<T>) -> Result<R>,
    F: FnMut(A, R) -> A,
{
    let mut acc = initial;
    let mut stats = Vec::with_capacity(blocks.len());
    for block in &blocks {
        let t0 = Instant::now();
        let partial = compute(block)?;
        stats.push(TaskStats {
            weight: block.weight,
            elapsed: t0.elapsed(),
        });
        acc = reduce(acc, partial);
    }
    Ok((acc, stats))
}

fn run_parallel<T, R, A, C, F>(
    blocks: Vec<WeightedBlock<T>>,
    compute: C,
    mut reduce: F,
    initial: A,
) -> Result<(A, Vec<TaskStats>)>
where
    T: Send + Sync,
    R: Send,
    A: Send,
    C: Fn(&WeightedBlock<T>) -> Result<R> + Sync,
    F: FnMut(A, R) -> A + Send,
{
    let abort = AtomicBool::new(false);
    let (tx, rx) = mpsc::channel::<(f64, Duration, Result<R>)>();
    let compute = &compute;
    let abort_ref = &abort;
    let blocks_ref = &blocks;

    // The feeder thread drives the pool; the fold below stays on the calling
    // thread. Folding from inside the pool would pin a worker on `recv` and
    // deadlock a fully-occupied (e.g. single-worker) pool.
    std::thread::scope(|scope| {
        scope.spawn(move || {
            blocks_ref.par_iter().for_each_with(tx, |tx, block| {
                // coarse cancellation: blocks not yet started are skipped
                if abort_ref.load(Ordering::Relaxed) {
                    return;
                }
                let t0 = Instant::now();
                let out = compute(block);
                if out.is_err() {
                    abort_ref.store(true, Ordering::Relaxed);
                }
                let _ = tx.send((block.weight, t0.elapsed(), out));
            });
        });

        let mut acc = Some(initial);
        let mut stats = Vec::new();
        let mut first_err: Option<HazardError> = None;
        for (weight, elapsed, out) in rx {
            match out {
                Ok(partial) if first_err.is_none() => {
                    stats.push(TaskStats { weight, elapsed });
                    let folded = reduce(acc.take().ok_or_else(|| {
                        HazardError::internal("accumulator vanished during reduce")
                    })?, partial);
                    acc = Some(folded);
                }
                Ok(_) => {} // aborting, drop the partial
                Err(err) => {
                    if first_err.is_none() {
                        warn!(error = %err, "worker failed, aborting outstanding blocks");
                        first_err = Some(err);
                    }
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => {
                let acc = acc
                    .ok_or_else(|| HazardError::internal("accumulator vanished during reduce"))?;
                Ok((acc, stats))
            }
        }
    })
}

/// Partition items by weight and run `map_reduce` over the resulting blocks
pub fn apply_reduce<T, R, A, C, F>(
    strategy: ExecutionStrategy,
    items: Vec<T>,
    concurrent_tasks: usize,
    weight: impl Fn(&T) -> f64,
    compute: C,
    reduce: F,
    initial: A,
) -> Result<(A, Vec<TaskStats>)>
where
    T: Send + Sync,
    R: Send,
    A: Send,
    C: Fn(&WeightedBlock<T>) -> Result<R> + Sync,
    F: FnMut(A, R) -> A + Send,
{
    let blocks = split_in_blocks(items, concurrent_tasks, weight);
    map_reduce(strategy, blocks, compute, reduce, initial)
}

/// Like [`apply_reduce`], but stratified so no block mixes grouping keys
///
/// Used when the consumer needs per-group reduction, e.g. one region-type
/// group per block.
pub fn apply_reduce_by_key<T, R, A, C, F>(
    strategy: ExecutionStrategy,
    items: Vec<T>,
    concurrent_tasks: usize,
    weight: impl Fn(&T) -> f64,
    key: impl Fn(&T) -> GroupId,
    compute: C,
    reduce: F,
    initial: A,
) -> Result<(A, Vec<TaskStats>)>
where
    T: Send + Sync,
    R: Send,
    A: Send,
    C: Fn(&WeightedBlock<T>) -> Result<R> + Sync,
    F: FnMut(A, R) -> A + Send,
{
    let blocks = split_in_blocks_by_key(items, concurrent_tasks, weight, key);
    map_reduce(strategy, blocks, compute, reduce, initial)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn sum_blocks(strategy: ExecutionStrategy) -> (f64, Vec<TaskStats>) {
        init_tracing();
        let items: Vec<f64> = (1..=100).map(|i| i as f64).collect();
        apply_reduce(
            strategy,
            items,
            8,
            |w| *w,
            |block| Ok(block.items.iter().sum::<f64>()),
            |acc: f64, partial| acc + partial,
            0.0,
        )
        .expect("no worker fails")
    }

    #[test]
    fn test_sequential_sum() {
        let (total, stats) = sum_blocks(ExecutionStrategy::Sequential);
        assert_eq!(total, 5050.0);
        assert!(!stats.is_empty());
    }

    #[test]
    fn test_single_worker_pool_completes() {
        // with one worker the fold must not pin it; ignore the error if the
        // global pool was already built by another test
        let _ = rayon::ThreadPoolBuilder::new().num_threads(1).build_global();
        let (total, stats) = sum_blocks(ExecutionStrategy::Parallel);
        assert_eq!(total, 5050.0);
        assert!(stats.len() > 1, "more blocks than workers");
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let (seq, _) = sum_blocks(ExecutionStrategy::Sequential);
        let (par, stats) = sum_blocks(ExecutionStrategy::Parallel);
        assert_eq!(seq, par);
        let dispatched: f64 = stats.iter().map(|s| s.weight).sum();
        assert_eq!(dispatched, 5050.0);
    }

    #[test]
    fn test_empty_input_returns_initial() {
        let (acc, stats) = map_reduce(
            ExecutionStrategy::Parallel,
            Vec::<WeightedBlock<f64>>::new(),
            |_| Ok(0.0),
            |acc: f64, p| acc + p,
            42.0,
        )
        .expect("nothing to fail");
        assert_eq!(acc, 42.0);
        assert!(stats.is_empty());
    }

    #[test]
    fn test_worker_failure_aborts() {
        for strategy in [ExecutionStrategy::Sequential, ExecutionStrategy::Parallel] {
            let items: Vec<f64> = (1..=20).map(|i| i as f64).collect();
            let result = apply_reduce(
                strategy,
                items,
                4,
                |w| *w,
                |block| {
                    if block.items.contains(&13.0) {
                        Err(HazardError::worker("unlucky block"))
                    } else {
                        Ok(1u32)
                    }
                },
                |acc: u32, p| acc + p,
                0,
            );
            assert!(matches!(result, Err(HazardError::Worker(_))), "{strategy:?}");
        }
    }

    #[test]
    fn test_by_key_reduction() {
        let items: Vec<(u32, f64)> = (0..30).map(|i| (i % 3, 1.0)).collect();
        let (counts, _) = apply_reduce_by_key(
            ExecutionStrategy::Parallel,
            items,
            6,
            |(_, w)| *w,
            |(k, _)| GroupId::new(*k),
            |block| Ok((block.key.expect("keyed block"), block.len())),
            |mut acc: std::collections::BTreeMap<GroupId, usize>, (k, n)| {
                *acc.entry(k).or_insert(0) += n;
                acc
            },
            std::collections::BTreeMap::new(),
        )
        .expect("no failure");
        assert_eq!(counts.values().sum::<usize>(), 30);
        assert!(counts.values().all(|&n| n == 10));
    }
}

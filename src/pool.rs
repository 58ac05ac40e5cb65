//! Pool module: fan a vector product out over isolated worker threads.
//!
//! Every partition gets its own OS thread and its own copy of the input
//! slices. Results come back over a channel and are reassembled by
//! partition index, never by completion order. The first failure ends the
//! call and disconnects the cancellation channel. Workers check it before
//! every chunk of their partition, so the others stop after at most one more
//! chunk. A kernel call already in progress is never interrupted.

use crate::aggregate::ResultAggregator;
use crate::config::Config;
use crate::error::{PoolError, Result, WorkerError};
use crate::invariant_ppt::{assert_invariant, VALIDATION_BEFORE_DISPATCH, WORKER_ISOLATION};
use crate::partition::{partition, Partition};
use crate::worker::{
    run_contained, ElementwiseProduct, Kernel, WorkItem, WorkResult, DEFAULT_CHUNK_SIZE,
};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Lifecycle of a single `multiply` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Idle,
    Dispatching,
    AwaitingResults,
    Aggregating,
    /// Last call succeeded.
    Done,
    /// Last call failed; no partial output was returned.
    Failed,
}

/// Outcome of a successful `multiply`.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiplyReport {
    pub product: Vec<f64>,
    /// Number of worker threads actually spawned.
    pub workers: usize,
    pub elapsed: Duration,
}

type WorkerMessage = (usize, std::result::Result<WorkResult, WorkerError>);

/// Spawns one worker per partition and aggregates their results.
pub struct WorkerPool {
    kernel: Arc<dyn Kernel>,
    thread_prefix: String,
    chunk_size: usize,
    state: PoolState,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("thread_prefix", &self.thread_prefix)
            .field("chunk_size", &self.chunk_size)
            .field("state", &self.state)
            .finish()
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerPool {
    /// Pool computing the elementwise product.
    pub fn new() -> Self {
        Self {
            kernel: Arc::new(ElementwiseProduct),
            thread_prefix: "threadbank-worker".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            state: PoolState::Idle,
        }
    }

    /// Pool configured from a [`Config`].
    pub fn from_config(config: &Config) -> Self {
        Self::new()
            .with_thread_prefix(config.worker_thread_prefix.clone())
            .with_chunk_size(config.worker_chunk_size)
    }

    /// Replace the per-partition kernel.
    pub fn with_kernel<K: Kernel>(mut self, kernel: K) -> Self {
        self.kernel = Arc::new(kernel);
        self
    }

    /// Set the worker thread name prefix.
    pub fn with_thread_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_prefix = prefix.into();
        self
    }

    /// Elements each worker computes between cancellation checks. Zero is
    /// treated as one.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// State reached by the most recent call.
    pub fn state(&self) -> PoolState {
        self.state
    }

    /// Multiply `a` and `b` elementwise across `workers` worker threads.
    pub fn multiply(&mut self, a: &[f64], b: &[f64], workers: usize) -> Result<Vec<f64>> {
        self.multiply_report(a, b, workers).map(|report| report.product)
    }

    /// Like [`WorkerPool::multiply`], also reporting worker count and timing.
    pub fn multiply_report(
        &mut self,
        a: &[f64],
        b: &[f64],
        workers: usize,
    ) -> Result<MultiplyReport> {
        self.state = PoolState::Idle;
        let started = Instant::now();
        let outcome = self.run(a, b, workers);
        self.state = match &outcome {
            Ok(_) => PoolState::Done,
            Err(_) => PoolState::Failed,
        };
        let (product, spawned) = outcome?;
        let elapsed = started.elapsed();
        info!(
            len = product.len(),
            workers = spawned,
            elapsed_us = elapsed.as_micros() as u64,
            "vector product complete"
        );
        Ok(MultiplyReport {
            product,
            workers: spawned,
            elapsed,
        })
    }

    fn run(&mut self, a: &[f64], b: &[f64], workers: usize) -> Result<(Vec<f64>, usize)> {
        if a.len() != b.len() {
            return Err(PoolError::LengthMismatch {
                left: a.len(),
                right: b.len(),
            });
        }
        let partitions = partition(a.len(), workers)?;

        self.state = PoolState::Dispatching;
        assert_invariant(
            VALIDATION_BEFORE_DISPATCH,
            a.len() == b.len(),
            "inputs must be validated before any worker is spawned",
            None,
        );
        let (result_tx, result_rx) = unbounded::<WorkerMessage>();
        let (cancel_tx, cancel_rx) = bounded::<()>(0);
        for &part in &partitions {
            if let Err(source) =
                self.spawn_worker(part, a, b, result_tx.clone(), cancel_rx.clone())
            {
                drop(cancel_tx);
                return Err(PoolError::worker(part.index, source));
            }
        }
        // Only workers hold senders now, so a dead worker shows up as a
        // disconnect rather than a hang.
        drop(result_tx);

        self.state = PoolState::AwaitingResults;
        let mut aggregator = ResultAggregator::new(&partitions);
        if let Some(err) = collect(&result_rx, &mut aggregator) {
            drop(cancel_tx);
            warn!(error = %err, "vector product aborted");
            return Err(err);
        }

        self.state = PoolState::Aggregating;
        let product = aggregator.finish()?;
        Ok((product, partitions.len()))
    }

    fn spawn_worker(
        &self,
        part: Partition,
        a: &[f64],
        b: &[f64],
        results: Sender<WorkerMessage>,
        cancel: Receiver<()>,
    ) -> std::result::Result<(), WorkerError> {
        let item = WorkItem::copy_from(part, a, b);
        assert_invariant(
            WORKER_ISOLATION,
            item.slice_a.len() == part.len() && item.slice_b.len() == part.len(),
            "workers receive owned copies of exactly their range",
            None,
        );
        let kernel = Arc::clone(&self.kernel);
        let chunk_size = self.chunk_size;
        debug!(partition = part.index, start = part.start, end = part.end, "dispatching worker");
        thread::Builder::new()
            .name(format!("{}-{}", self.thread_prefix, part.index))
            .spawn(move || {
                // The pool drops the cancel sender on failure.
                let cancelled = || matches!(cancel.try_recv(), Err(TryRecvError::Disconnected));
                let result = match run_contained(&*kernel, item, chunk_size, cancelled) {
                    Ok(Some(result)) => Ok(result),
                    Ok(None) => {
                        debug!(partition = part.index, "worker cancelled");
                        return;
                    }
                    Err(err) => Err(err),
                };
                // The pool may already have given up on this call.
                let _ = results.send((part.index, result));
            })
            .map(|_| ())
            .map_err(|e| WorkerError::Spawn(e.to_string()))
    }
}

/// Drain worker messages into the aggregator. Returns the first failure.
fn collect(
    results: &Receiver<WorkerMessage>,
    aggregator: &mut ResultAggregator,
) -> Option<PoolError> {
    while !aggregator.is_complete() {
        match results.recv() {
            Ok((index, Ok(result))) => {
                debug!(partition = index, "worker reported");
                if let Err(err) = aggregator.accept(result) {
                    return Some(err);
                }
            }
            Ok((index, Err(source))) => return Some(PoolError::worker(index, source)),
            Err(_) => {
                let index = aggregator.first_missing().unwrap_or_default();
                return Some(PoolError::worker(index, WorkerError::Disconnected));
            }
        }
    }
    None
}

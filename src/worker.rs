//! Worker module: the computation run inside one isolated worker context.
//!
//! A worker receives a [`WorkItem`] by value, owns its slices outright and
//! never sees the pool, other workers, or the shared account. The only way
//! out is the [`WorkResult`] it hands back.

#![forbid(unsafe_code)]

use crate::error::WorkerError;
use crate::partition::Partition;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Request sent from the pool to one worker.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    pub partition: Partition,
    pub slice_a: Vec<f64>,
    pub slice_b: Vec<f64>,
}

impl WorkItem {
    /// Copy the partition's range out of both inputs.
    pub fn copy_from(partition: Partition, a: &[f64], b: &[f64]) -> Self {
        Self {
            partition,
            slice_a: a[partition.range()].to_vec(),
            slice_b: b[partition.range()].to_vec(),
        }
    }
}

/// Response sent from one worker back to the pool.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkResult {
    /// Index of the partition this result belongs to.
    pub index: usize,
    pub product: Vec<f64>,
}

/// Default number of elements a worker computes between cancellation checks.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Per-chunk computation; implement this to run something other than the
/// elementwise product on the pool.
///
/// A worker calls `apply` once per chunk of its partition, so the output
/// for an element may depend only on that element's inputs.
pub trait Kernel: Send + Sync + 'static {
    fn apply(&self, a: &[f64], b: &[f64]) -> Result<Vec<f64>, String>;
}

/// `product[i] = a[i] * b[i]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ElementwiseProduct;

impl Kernel for ElementwiseProduct {
    fn apply(&self, a: &[f64], b: &[f64]) -> Result<Vec<f64>, String> {
        if a.len() != b.len() {
            return Err(format!("slice lengths differ: {} != {}", a.len(), b.len()));
        }
        Ok(a.iter().zip(b).map(|(x, y)| x * y).collect())
    }
}

/// Run the kernel over one work item, `chunk_size` elements at a time.
///
/// `cancelled` is checked before every chunk; once it returns true the
/// worker stops and returns `Ok(None)`.
pub fn run<K, C>(
    kernel: &K,
    item: WorkItem,
    chunk_size: usize,
    cancelled: C,
) -> Result<Option<WorkResult>, WorkerError>
where
    K: Kernel + ?Sized,
    C: Fn() -> bool,
{
    let chunk_size = chunk_size.max(1);
    let mut product = Vec::with_capacity(item.partition.len());
    let chunks = item.slice_a.chunks(chunk_size).zip(item.slice_b.chunks(chunk_size));
    for (a, b) in chunks {
        if cancelled() {
            return Ok(None);
        }
        let out = kernel.apply(a, b).map_err(WorkerError::Kernel)?;
        if out.len() != a.len() {
            return Err(WorkerError::Kernel(format!(
                "kernel produced {} values for a chunk of {}",
                out.len(),
                a.len()
            )));
        }
        product.extend(out);
    }
    Ok(Some(WorkResult {
        index: item.partition.index,
        product,
    }))
}

/// Run with panic containment: a panicking kernel becomes
/// [`WorkerError::Panicked`] instead of unwinding through the worker.
pub fn run_contained<K, C>(
    kernel: &K,
    item: WorkItem,
    chunk_size: usize,
    cancelled: C,
) -> Result<Option<WorkResult>, WorkerError>
where
    K: Kernel + ?Sized,
    C: Fn() -> bool,
{
    match catch_unwind(AssertUnwindSafe(|| run(kernel, item, chunk_size, cancelled))) {
        Ok(result) => result,
        Err(payload) => Err(WorkerError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Single-context reference product, used as the oracle for the pool.
pub fn multiply_sequential(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| x * y).collect()
}

/// `[1, 2, ..., len]`.
pub fn sequential_vector(len: usize) -> Vec<f64> {
    (1..=len).map(|i| i as f64).collect()
}

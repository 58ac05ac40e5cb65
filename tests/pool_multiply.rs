use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use threadbank::pool::{PoolState, WorkerPool};
use threadbank::worker::{multiply_sequential, sequential_vector, ElementwiseProduct, Kernel};
use threadbank::{PoolError, WorkerError};

/// Finishes partitions in reverse order: the lower the first element, the
/// longer the worker sleeps.
struct ReverseFinish;

impl Kernel for ReverseFinish {
    fn apply(&self, a: &[f64], b: &[f64]) -> Result<Vec<f64>, String> {
        let first = a.first().copied().unwrap_or(0.0);
        thread::sleep(Duration::from_millis((40.0 - first).max(0.0) as u64 * 2));
        ElementwiseProduct.apply(a, b)
    }
}

/// Fails immediately on the partition starting with `self.0`; every other
/// partition is slow.
struct FailFirstSlowRest(f64);

impl Kernel for FailFirstSlowRest {
    fn apply(&self, a: &[f64], b: &[f64]) -> Result<Vec<f64>, String> {
        if a.first() == Some(&self.0) {
            return Err("rejected".to_string());
        }
        thread::sleep(Duration::from_millis(50));
        ElementwiseProduct.apply(a, b)
    }
}

/// Rejects any chunk starting with 1.0 and counts every other chunk it
/// computes, sleeping on each.
struct CountSlowChunks(Arc<AtomicUsize>);

impl Kernel for CountSlowChunks {
    fn apply(&self, a: &[f64], b: &[f64]) -> Result<Vec<f64>, String> {
        if a.first() == Some(&1.0) {
            return Err("rejected".to_string());
        }
        self.0.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(5));
        ElementwiseProduct.apply(a, b)
    }
}

struct PanicOnNegative;

impl Kernel for PanicOnNegative {
    fn apply(&self, a: &[f64], b: &[f64]) -> Result<Vec<f64>, String> {
        if a.iter().any(|x| *x < 0.0) {
            panic!("negative input");
        }
        ElementwiseProduct.apply(a, b)
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn pool_matches_sequential_product(
        pairs in prop::collection::vec((-1e6f64..1e6, -1e6f64..1e6), 0..300),
        workers in 1usize..9,
    ) {
        let (a, b): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
        let mut pool = WorkerPool::new();
        prop_assert_eq!(pool.multiply(&a, &b, workers).unwrap(), multiply_sequential(&a, &b));
    }
}

#[test]
fn five_element_product() {
    let mut pool = WorkerPool::new();
    let product = pool
        .multiply(&[1.0, 2.0, 3.0, 4.0, 5.0], &[5.0, 4.0, 3.0, 2.0, 1.0], 2)
        .unwrap();
    assert_eq!(product, vec![5.0, 8.0, 9.0, 8.0, 5.0]);
}

#[test]
fn output_order_ignores_completion_order() {
    let a = sequential_vector(32);
    let b = sequential_vector(32);
    let mut pool = WorkerPool::new().with_kernel(ReverseFinish);
    assert_eq!(pool.multiply(&a, &b, 8).unwrap(), multiply_sequential(&a, &b));
}

#[test]
fn five_hundred_sequential_elements() {
    // 500 sequential elements over 2 workers
    let a = sequential_vector(500);
    let mut pool = WorkerPool::new();
    let report = pool.multiply_report(&a, &a, 2).unwrap();
    assert_eq!(report.workers, 2);
    assert_eq!(report.product[499], 250_000.0);
}

#[test]
fn mismatched_lengths_never_dispatch() {
    let mut pool = WorkerPool::new().with_kernel(PanicOnNegative);
    let err = pool.multiply(&[-1.0, -2.0, -3.0], &[1.0, 2.0], 3).unwrap_err();
    assert_eq!(err, PoolError::LengthMismatch { left: 3, right: 2 });
}

#[test]
fn first_failure_discards_everything() {
    // Four partitions of two; partition 2 starts with 5.0
    let a = sequential_vector(8);
    let mut pool = WorkerPool::new().with_kernel(FailFirstSlowRest(5.0));
    let err = pool.multiply(&a, &a, 4).unwrap_err();
    assert_eq!(
        err,
        PoolError::Worker {
            partition: 2,
            source: WorkerError::Kernel("rejected".into()),
        }
    );
    assert_eq!(pool.state(), PoolState::Failed);

    // Late completions from the aborted call must not leak into the next one.
    let b = sequential_vector(4);
    let mut pool = pool.with_kernel(ElementwiseProduct);
    assert_eq!(pool.multiply(&b, &b, 4).unwrap(), vec![1.0, 4.0, 9.0, 16.0]);
    assert_eq!(pool.state(), PoolState::Done);
}

#[test]
fn failure_stops_other_workers_between_chunks() {
    // Partition 0 fails on its first chunk; partition 1 has 200 slow chunks.
    let chunks = Arc::new(AtomicUsize::new(0));
    let a = sequential_vector(400);
    let mut pool = WorkerPool::new()
        .with_kernel(CountSlowChunks(Arc::clone(&chunks)))
        .with_chunk_size(1);
    let err = pool.multiply(&a, &a, 2).unwrap_err();
    assert_eq!(err, PoolError::worker(0, WorkerError::Kernel("rejected".into())));

    // Let the cancelled worker finish its in-flight chunk, then check it
    // computes nothing further.
    thread::sleep(Duration::from_millis(50));
    let settled = chunks.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(chunks.load(Ordering::SeqCst), settled);
    assert!(settled < 200, "worker ran {settled} of 200 chunks after cancellation");
}

#[test]
fn panicking_worker_fails_the_call() {
    let a = vec![1.0, 2.0, -3.0, 4.0];
    let mut pool = WorkerPool::new().with_kernel(PanicOnNegative);
    let err = pool.multiply(&a, &a, 2).unwrap_err();
    assert_eq!(
        err,
        PoolError::Worker {
            partition: 1,
            source: WorkerError::Panicked("negative input".into()),
        }
    );
}

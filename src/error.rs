//! Error types for the pool, the scheduler and configuration.

use thiserror::Error;

/// Failure raised inside a single worker context.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkerError {
    /// The kernel rejected its slices.
    #[error("kernel error: {0}")]
    Kernel(String),

    /// The worker terminated abnormally.
    #[error("worker panicked: {0}")]
    Panicked(String),

    /// The worker context could not be started.
    #[error("failed to spawn worker: {0}")]
    Spawn(String),

    /// The worker went away without reporting a result.
    #[error("worker disconnected before reporting")]
    Disconnected,
}

/// Errors returned by [`crate::pool::WorkerPool::multiply`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PoolError {
    /// Input vectors differ in length. Nothing was dispatched.
    #[error("vector length mismatch: {left} != {right}")]
    LengthMismatch { left: usize, right: usize },

    /// A worker count of zero cannot partition anything.
    #[error("worker count must be at least 1")]
    ZeroWorkers,

    /// First worker failure observed; all other results were discarded.
    #[error("worker {partition} failed: {source}")]
    Worker {
        partition: usize,
        #[source]
        source: WorkerError,
    },

    /// Results could not be reassembled into one sequence.
    #[error("aggregation error: {0}")]
    Aggregation(String),
}

/// Errors from the accrual scheduler.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// The background thread could not be spawned.
    #[error("failed to spawn accrual thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// The scheduler has already shut down.
    #[error("accrual scheduler is stopped")]
    Stopped,
}

/// Invalid configuration values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("accrual rate must be finite and non-negative, got {0}")]
    InvalidRate(f64),

    #[error("accrual interval must be non-zero")]
    ZeroInterval,

    #[error("default worker count must be at least 1")]
    ZeroWorkers,

    #[error("notification capacity must be at least 1")]
    ZeroCapacity,

    #[error("worker chunk size must be at least 1")]
    ZeroChunkSize,
}

/// Errors surfaced by the foreground [`crate::teller::Teller`].
#[derive(Error, Debug)]
pub enum TellerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Result alias for pool operations.
pub type Result<T> = std::result::Result<T, PoolError>;

impl PoolError {
    /// Wrap a worker failure with the partition it came from.
    pub fn worker(partition: usize, source: WorkerError) -> Self {
        Self::Worker { partition, source }
    }

    /// Create an aggregation error.
    pub fn aggregation(message: impl Into<String>) -> Self {
        Self::Aggregation(message.into())
    }
}

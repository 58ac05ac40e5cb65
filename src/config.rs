//! Runtime configuration for the account, the accrual scheduler and the pool.

use crate::error::ConfigError;
use crate::worker::DEFAULT_CHUNK_SIZE;
use std::time::Duration;

/// Default notification queue capacity.
pub const NOTIFICATION_QUEUE_CAPACITY: usize = 256;

/// Configuration for a [`crate::teller::Teller`] and its collaborators.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Balance the account starts with.
    pub initial_balance: f64,
    /// Proportional increase applied per accrual tick (0.01 = 1%).
    pub accrual_rate: f64,
    /// Period between accrual ticks.
    pub accrual_interval: Duration,
    /// Worker count used when the caller does not pick one.
    pub default_workers: usize,
    /// Capacity of the scheduler → foreground notification queue.
    pub notification_capacity: usize,
    /// Name prefix for worker threads.
    pub worker_thread_prefix: String,
    /// Elements a worker computes between cancellation checks.
    pub worker_chunk_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_balance: 100.0,
            accrual_rate: 0.01,
            accrual_interval: Duration::from_millis(10_000),
            default_workers: 2,
            notification_capacity: NOTIFICATION_QUEUE_CAPACITY,
            worker_thread_prefix: "threadbank-worker".to_string(),
            worker_chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl Config {
    /// Set the initial balance.
    pub fn with_initial_balance(mut self, balance: f64) -> Self {
        self.initial_balance = balance;
        self
    }

    /// Set the accrual rate.
    pub fn with_accrual_rate(mut self, rate: f64) -> Self {
        self.accrual_rate = rate;
        self
    }

    /// Set the accrual interval.
    pub fn with_accrual_interval(mut self, interval: Duration) -> Self {
        self.accrual_interval = interval;
        self
    }

    /// Set the default worker count.
    pub fn with_default_workers(mut self, workers: usize) -> Self {
        self.default_workers = workers;
        self
    }

    /// Set the notification queue capacity.
    pub fn with_notification_capacity(mut self, capacity: usize) -> Self {
        self.notification_capacity = capacity;
        self
    }

    /// Set the worker thread name prefix.
    pub fn with_worker_thread_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.worker_thread_prefix = prefix.into();
        self
    }

    /// Set how many elements a worker computes between cancellation checks.
    pub fn with_worker_chunk_size(mut self, chunk_size: usize) -> Self {
        self.worker_chunk_size = chunk_size;
        self
    }

    /// Check that every value is usable.
    ///
    /// The initial balance is not checked: any value, including NaN, is
    /// accepted the same way deposits are.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.accrual_rate.is_finite() || self.accrual_rate < 0.0 {
            return Err(ConfigError::InvalidRate(self.accrual_rate));
        }
        if self.accrual_interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        if self.default_workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.notification_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.worker_chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        Ok(())
    }
}

//! Teller module: the foreground command processor.
//!
//! A [`Teller`] is the single foreground context. It takes `&mut self` for
//! every command, so one command (including its critical section) finishes
//! before the next can start. That includes `SetBalance`, which waits for
//! the scheduler thread to apply the overwrite before returning. The accrual
//! scheduler runs beside it on its own thread and only meets it at the
//! account lock.

use crate::account::SharedAccount;
use crate::accrual::{AccrualHandle, AccrualScheduler};
use crate::config::Config;
use crate::error::{PoolError, SchedulerError, TellerError};
use crate::messages::{drain_notifications, Notification};
use crate::pool::WorkerPool;
use rtrb::Consumer;
use tracing::{debug, info};

/// One foreground operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Deposit(f64),
    Withdraw(f64),
    Query,
    /// Overwrite the balance through the scheduler context.
    SetBalance(f64),
    /// Elementwise product; `None` uses the configured worker count.
    Multiply {
        a: Vec<f64>,
        b: Vec<f64>,
        workers: Option<usize>,
    },
}

/// Result of a [`Command`].
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Balance(f64),
    Product(Vec<f64>),
    Ack,
}

/// Foreground owner of the account, the scheduler and the worker pool.
pub struct Teller {
    account: SharedAccount,
    scheduler: Option<AccrualHandle>,
    notifications: Consumer<Notification>,
    pool: WorkerPool,
    default_workers: usize,
    last_notified: Option<f64>,
}

impl Teller {
    /// Validate `config`, open the account and start the accrual scheduler.
    pub fn start(config: Config) -> Result<Self, TellerError> {
        config.validate()?;
        let account = SharedAccount::new(config.initial_balance);
        let (scheduler, notifications) = AccrualScheduler::from_config(account.clone(), &config);
        let handle = scheduler.spawn()?;
        info!(
            balance = config.initial_balance,
            rate = config.accrual_rate,
            "teller started"
        );
        Ok(Self {
            account,
            scheduler: Some(handle),
            notifications,
            pool: WorkerPool::from_config(&config),
            default_workers: config.default_workers,
            last_notified: None,
        })
    }

    /// Handle to the shared account, for other contexts.
    pub fn account(&self) -> SharedAccount {
        self.account.clone()
    }

    /// Run one command to completion.
    pub fn execute(&mut self, command: Command) -> Result<Outcome, TellerError> {
        match command {
            Command::Deposit(amount) => Ok(Outcome::Balance(self.deposit(amount))),
            Command::Withdraw(amount) => Ok(Outcome::Balance(self.withdraw(amount))),
            Command::Query => Ok(Outcome::Balance(self.query())),
            Command::SetBalance(value) => {
                self.set_balance(value)?;
                Ok(Outcome::Ack)
            }
            Command::Multiply { a, b, workers } => {
                let workers = workers.unwrap_or(self.default_workers);
                Ok(Outcome::Product(self.multiply(&a, &b, workers)?))
            }
        }
    }

    pub fn deposit(&mut self, amount: f64) -> f64 {
        let balance = self.account.deposit(amount);
        debug!(amount, balance, "deposit");
        balance
    }

    pub fn withdraw(&mut self, amount: f64) -> f64 {
        let balance = self.account.withdraw(amount);
        debug!(amount, balance, "withdraw");
        balance
    }

    pub fn query(&mut self) -> f64 {
        self.account.query()
    }

    /// Overwrite the balance and return the previous one. Applied by the
    /// scheduler thread between ticks; returns only once the write is done.
    pub fn set_balance(&mut self, value: f64) -> Result<f64, TellerError> {
        let handle = self
            .scheduler
            .as_ref()
            .ok_or(SchedulerError::Stopped)?;
        let previous = handle.set_balance(value)?;
        debug!(balance = value, previous, "set balance");
        Ok(previous)
    }

    pub fn multiply(&mut self, a: &[f64], b: &[f64], workers: usize) -> Result<Vec<f64>, PoolError> {
        self.pool.multiply(a, b, workers)
    }

    /// Drain balance updates pushed by the scheduler since the last call.
    pub fn poll_notifications(&mut self) -> Vec<Notification> {
        let pending = drain_notifications(&mut self.notifications);
        if let Some(last) = pending.last() {
            self.last_notified = Some(last.value());
        }
        pending
    }

    /// Most recent balance pushed by the scheduler, if any.
    pub fn last_notified(&self) -> Option<f64> {
        self.last_notified
    }

    /// Stop the scheduler and return the final balance.
    pub fn close(mut self) -> Result<f64, TellerError> {
        if let Some(handle) = self.scheduler.take() {
            let ticks = handle.shutdown()?;
            debug!(ticks, "scheduler joined");
        }
        let balance = self.account.query();
        info!(balance, "teller closed");
        Ok(balance)
    }
}

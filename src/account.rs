//! Account module: a single balance behind one mutual-exclusion lock.
//!
//! Every read and every read-modify-write of the balance happens inside one
//! critical section of O(1) arithmetic. Nothing logs, blocks or allocates
//! while the lock is held.
//!
//! Amounts are not validated: a negative deposit withdraws, withdrawals may
//! overdraw, and a NaN amount turns the balance into NaN.

use parking_lot::Mutex;
use std::sync::Arc;

/// Cloneable handle to one lock-guarded balance.
///
/// Clones share the same balance and the same lock.
#[derive(Debug, Clone)]
pub struct SharedAccount {
    balance: Arc<Mutex<f64>>,
}

impl SharedAccount {
    /// Create an account holding `initial`.
    pub fn new(initial: f64) -> Self {
        Self {
            balance: Arc::new(Mutex::new(initial)),
        }
    }

    /// Add `amount` and return the new balance.
    pub fn deposit(&self, amount: f64) -> f64 {
        self.update(|balance| balance + amount)
    }

    /// Subtract `amount` and return the new balance.
    pub fn withdraw(&self, amount: f64) -> f64 {
        self.update(|balance| balance - amount)
    }

    /// Current balance.
    pub fn query(&self) -> f64 {
        *self.balance.lock()
    }

    /// Overwrite the balance, returning the previous value.
    pub fn set(&self, value: f64) -> f64 {
        std::mem::replace(&mut *self.balance.lock(), value)
    }

    /// Multiply the balance by `1 + rate` and return the new balance.
    pub fn apply_accrual(&self, rate: f64) -> f64 {
        self.update(|balance| apply_accrual(balance, rate))
    }

    /// Read-modify-write under one lock acquisition.
    pub fn update(&self, f: impl FnOnce(f64) -> f64) -> f64 {
        let mut balance = self.balance.lock();
        *balance = f(*balance);
        *balance
    }
}

/// One accrual step: `balance * (1 + rate)`.
pub fn apply_accrual(balance: f64, rate: f64) -> f64 {
    balance + balance * rate
}

//! Accrual module: periodic proportional growth on its own thread.
//!
//! The scheduler and the foreground share one [`SharedAccount`], so there is
//! exactly one copy of the balance. A tick reads and writes it under the
//! account lock, then pushes the new value to the foreground as a
//! [`Notification::BalanceUpdated`]. The push is informational: the
//! foreground never has to write a stale copy back, and the scheduler never
//! computes from one.

use crate::account::{apply_accrual, SharedAccount};
use crate::config::Config;
use crate::error::SchedulerError;
use crate::invariant_ppt::{assert_invariant, ACCRUAL_APPLIED, NOTIFICATION_PUBLISHED};
use crate::messages::{new_notification_queue, publish, ControlMsg, Notification};
use crossbeam_channel::{bounded, unbounded, RecvTimeoutError, Sender};
use rtrb::{Consumer, Producer};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Applies accrual ticks to an account and publishes the results.
pub struct AccrualScheduler {
    account: SharedAccount,
    rate: f64,
    interval: Duration,
    notify: Producer<Notification>,
    ticks: u64,
}

impl AccrualScheduler {
    /// Create a scheduler publishing into `notify`.
    pub fn new(
        account: SharedAccount,
        rate: f64,
        interval: Duration,
        notify: Producer<Notification>,
    ) -> Self {
        Self {
            account,
            rate,
            interval,
            notify,
            ticks: 0,
        }
    }

    /// Number of ticks applied so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Apply one accrual step and publish the new balance.
    pub fn tick(&mut self) -> f64 {
        let rate = self.rate;
        let mut before = 0.0;
        let after = self.account.update(|balance| {
            before = balance;
            apply_accrual(balance, rate)
        });
        self.ticks += 1;

        assert_invariant(
            ACCRUAL_APPLIED,
            after.is_nan() || after == apply_accrual(before, rate),
            "accrual must multiply the locked balance by (1 + rate)",
            None,
        );
        if publish(&mut self.notify, Notification::BalanceUpdated { value: after }) {
            assert_invariant(NOTIFICATION_PUBLISHED, true, "balance pushed", None);
        } else {
            warn!(tick = self.ticks, "notification queue full, dropping balance update");
        }
        debug!(tick = self.ticks, balance = after, "accrual applied");
        after
    }

    /// Move the scheduler onto its own thread, ticking every interval until
    /// shut down.
    pub fn spawn(self) -> Result<AccrualHandle, SchedulerError> {
        let (control_tx, control_rx) = unbounded::<ControlMsg>();
        let interval = self.interval;
        let mut scheduler = self;
        let thread = thread::Builder::new()
            .name("threadbank-accrual".to_string())
            .spawn(move || {
                info!(interval_ms = interval.as_millis() as u64, "accrual scheduler started");
                let mut next_tick = Instant::now() + interval;
                loop {
                    match control_rx.recv_deadline(next_tick) {
                        Ok(ControlMsg::SetBalance { value, reply }) => {
                            let previous = scheduler.account.set(value);
                            debug!(balance = value, previous, "balance overwritten");
                            // The caller may have stopped waiting.
                            let _ = reply.send(previous);
                        }
                        Ok(ControlMsg::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {
                            scheduler.tick();
                            let now = Instant::now();
                            next_tick += interval;
                            if next_tick < now {
                                // Fell behind; skip missed ticks instead of bursting.
                                next_tick = now + interval;
                            }
                        }
                    }
                }
                info!(ticks = scheduler.ticks, "accrual scheduler stopped");
                scheduler.ticks
            })?;
        Ok(AccrualHandle {
            control: control_tx,
            thread: Some(thread),
        })
    }

    /// Build a scheduler and its notification consumer from a [`Config`].
    pub fn from_config(
        account: SharedAccount,
        config: &Config,
    ) -> (Self, Consumer<Notification>) {
        let (tx, rx) = new_notification_queue(config.notification_capacity);
        (
            Self::new(account, config.accrual_rate, config.accrual_interval, tx),
            rx,
        )
    }
}

/// Owner of a running scheduler thread. Dropping it stops the thread.
#[derive(Debug)]
pub struct AccrualHandle {
    control: Sender<ControlMsg>,
    thread: Option<JoinHandle<u64>>,
}

impl AccrualHandle {
    /// Overwrite the balance on the scheduler thread and wait until it is
    /// applied. Returns the previous balance.
    ///
    /// The write lands between ticks, never inside one, and is visible to
    /// every context once this returns.
    pub fn set_balance(&self, value: f64) -> Result<f64, SchedulerError> {
        let (reply, applied) = bounded(1);
        self.send(ControlMsg::SetBalance { value, reply })?;
        applied.recv().map_err(|_| SchedulerError::Stopped)
    }

    fn send(&self, msg: ControlMsg) -> Result<(), SchedulerError> {
        debug!(kind = msg.kind(), "control message");
        self.control.send(msg).map_err(|_| SchedulerError::Stopped)
    }

    /// Stop the timer and wait for the thread. Returns the number of ticks
    /// applied.
    pub fn shutdown(mut self) -> Result<u64, SchedulerError> {
        self.stop()
    }

    fn stop(&mut self) -> Result<u64, SchedulerError> {
        let thread = self.thread.take().ok_or(SchedulerError::Stopped)?;
        // The thread may already be gone; joining still reports its ticks.
        let _ = self.control.send(ControlMsg::Shutdown);
        thread.join().map_err(|_| SchedulerError::Stopped)
    }
}

impl Drop for AccrualHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            let _ = self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_compound() {
        let account = SharedAccount::new(100.0);
        let (tx, mut rx) = new_notification_queue(8);
        let mut scheduler =
            AccrualScheduler::new(account.clone(), 0.01, Duration::from_secs(10), tx);
        for _ in 0..3 {
            scheduler.tick();
        }
        assert_eq!(scheduler.ticks(), 3);
        let expected = 100.0 * 1.01f64.powi(3);
        assert!((account.query() - expected).abs() < 1e-9);
        let pushed = crate::messages::drain_notifications(&mut rx);
        assert_eq!(pushed.len(), 3);
        assert_eq!(pushed[2].value(), account.query());
    }

    #[test]
    fn full_queue_does_not_block_tick() {
        let account = SharedAccount::new(1.0);
        let (tx, _rx) = new_notification_queue(1);
        let mut scheduler = AccrualScheduler::new(account, 1.0, Duration::from_secs(1), tx);
        scheduler.tick();
        assert_eq!(scheduler.tick(), 4.0);
    }

    #[test]
    fn spawned_scheduler_ticks_and_stops() {
        let account = SharedAccount::new(100.0);
        let (tx, _rx) = new_notification_queue(64);
        let handle = AccrualScheduler::new(account.clone(), 0.0, Duration::from_millis(5), tx)
            .spawn()
            .unwrap();
        thread::sleep(Duration::from_millis(60));
        let ticks = handle.shutdown().unwrap();
        assert!(ticks >= 1);
        assert_eq!(account.query(), 100.0);
    }

    #[test]
    fn set_balance_is_applied_by_scheduler() {
        let account = SharedAccount::new(100.0);
        let (tx, _rx) = new_notification_queue(4);
        let handle = AccrualScheduler::new(account.clone(), 0.01, Duration::from_secs(60), tx)
            .spawn()
            .unwrap();
        assert_eq!(handle.set_balance(42.0).unwrap(), 100.0);
        // Applied before set_balance returns, not at shutdown.
        assert_eq!(account.query(), 42.0);
        assert_eq!(account.deposit(8.0), 50.0);
        let ticks = handle.shutdown().unwrap();
        assert_eq!(ticks, 0);
        assert_eq!(account.query(), 50.0);
    }

    #[test]
    fn set_balance_after_shutdown_reports_stopped() {
        let (tx, _rx) = new_notification_queue(4);
        let mut handle = AccrualScheduler::new(SharedAccount::new(1.0), 0.0, Duration::from_secs(60), tx)
            .spawn()
            .unwrap();
        handle.stop().unwrap();
        assert!(matches!(handle.set_balance(3.0), Err(SchedulerError::Stopped)));
    }
}

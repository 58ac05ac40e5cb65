//! Message types exchanged between the foreground and the accrual scheduler.
//!
//! Control messages travel foreground → scheduler over a channel the
//! scheduler waits on between ticks. Notifications travel scheduler →
//! foreground through a lock-free SPSC queue so the scheduler never blocks
//! on a slow reader.
//!
//! Messages carry plain values, never references. A control message may
//! carry a reply sender so the foreground can wait for it to be applied.

use crossbeam_channel::Sender;
use rtrb::{Consumer, Producer, RingBuffer};

/// Creates a notification queue pair.
///
/// Returns (producer for the scheduler, consumer for the foreground).
pub fn new_notification_queue(capacity: usize) -> (Producer<Notification>, Consumer<Notification>) {
    RingBuffer::new(capacity)
}

/// Messages sent from the foreground to the scheduler.
#[derive(Debug, Clone)]
pub enum ControlMsg {
    /// Overwrite the balance, then send the previous balance on `reply`.
    SetBalance {
        value: f64,
        reply: Sender<f64>,
    },

    /// Stop ticking and exit.
    Shutdown,
}

/// Messages sent from the scheduler to the foreground.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Notification {
    /// An accrual tick produced a new balance.
    BalanceUpdated {
        value: f64,
    },
}

impl ControlMsg {
    /// Wire name of this message kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ControlMsg::SetBalance { .. } => "set_balance",
            ControlMsg::Shutdown => "shutdown",
        }
    }
}

impl Notification {
    /// Wire name of this message kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::BalanceUpdated { .. } => "balance_updated",
        }
    }

    /// Balance carried by the notification.
    pub fn value(&self) -> f64 {
        match self {
            Notification::BalanceUpdated { value } => *value,
        }
    }
}

/// Publish a notification without blocking.
///
/// Returns false if the queue was full and the notification was dropped.
#[inline]
pub fn publish(tx: &mut Producer<Notification>, notification: Notification) -> bool {
    tx.push(notification).is_ok()
}

/// Drains all pending notifications, oldest first.
pub fn drain_notifications(rx: &mut Consumer<Notification>) -> Vec<Notification> {
    let mut out = Vec::with_capacity(rx.slots());
    while let Ok(n) = rx.pop() {
        out.push(n);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notifications_are_copy() {
        let n = Notification::BalanceUpdated { value: 1.5 };
        let n2 = n;
        assert_eq!(n, n2);
    }

    #[test]
    fn test_kinds() {
        let (reply, _rx) = crossbeam_channel::bounded(1);
        assert_eq!(ControlMsg::SetBalance { value: 0.0, reply }.kind(), "set_balance");
        assert_eq!(ControlMsg::Shutdown.kind(), "shutdown");
        assert_eq!(Notification::BalanceUpdated { value: 0.0 }.kind(), "balance_updated");
    }

    #[test]
    fn test_queue_roundtrip_in_order() {
        let (mut tx, mut rx) = new_notification_queue(4);
        assert!(publish(&mut tx, Notification::BalanceUpdated { value: 101.0 }));
        assert!(publish(&mut tx, Notification::BalanceUpdated { value: 102.01 }));
        let drained = drain_notifications(&mut rx);
        assert_eq!(
            drained.iter().map(Notification::value).collect::<Vec<_>>(),
            vec![101.0, 102.01]
        );
        assert!(drain_notifications(&mut rx).is_empty());
    }

    #[test]
    fn test_full_queue_drops() {
        let (mut tx, _rx) = new_notification_queue(1);
        assert!(publish(&mut tx, Notification::BalanceUpdated { value: 1.0 }));
        assert!(!publish(&mut tx, Notification::BalanceUpdated { value: 2.0 }));
    }
}

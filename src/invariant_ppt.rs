//! PPT Invariant System: runtime invariant enforcement with contract tracking.
//!
//! Operations assert the invariants they rely on; tests later check which
//! invariants were actually exercised.

#[cfg(feature = "ppt")]
use lazy_static::lazy_static;
#[cfg(feature = "ppt")]
use parking_lot::Mutex;
#[cfg(feature = "ppt")]
use std::collections::HashSet;

pub const PARTITION_COVERAGE: u32 = 1;
pub const PARTITION_ORDER: u32 = 2;
pub const VALIDATION_BEFORE_DISPATCH: u32 = 3;
pub const WORKER_ISOLATION: u32 = 4;
pub const AGGREGATE_ORDER: u32 = 6;
pub const AGGREGATE_LENGTH: u32 = 7;
pub const ACCRUAL_APPLIED: u32 = 8;
pub const NOTIFICATION_PUBLISHED: u32 = 9;

#[cfg(feature = "ppt")]
lazy_static! {
    static ref INVARIANT_LOG: Mutex<HashSet<u32>> = Mutex::new(HashSet::new());
}

#[cfg(feature = "ppt")]
/// Assert an invariant: logs it and panics on failure.
///
/// Never call this while holding the account lock.
pub fn assert_invariant(id: u32, condition: bool, message: &str, context: Option<&str>) {
    if !condition {
        let full_message = if let Some(ctx) = context {
            format!("Invariant {} failed: {} (context: {})", id, message, ctx)
        } else {
            format!("Invariant {} failed: {}", id, message)
        };
        tracing::error!(invariant = id, "{}", full_message);
        panic!("{}", full_message);
    }
    INVARIANT_LOG.lock().insert(id);
}

#[cfg(not(feature = "ppt"))]
/// Assert an invariant: checks condition and panics on failure.
pub fn assert_invariant(_id: u32, condition: bool, message: &str, _context: Option<&str>) {
    if !condition {
        panic!("Invariant failed: {}", message);
    }
}

#[cfg(feature = "ppt")]
/// Contract test: checks that specified invariants were asserted.
pub fn contract_test(test_name: &str, required_invariants: &[u32]) {
    let log = INVARIANT_LOG.lock();
    let missing: Vec<u32> = required_invariants
        .iter()
        .copied()
        .filter(|inv| !log.contains(inv))
        .collect();
    drop(log); // Drop the lock before panicking
    if !missing.is_empty() {
        panic!(
            "Contract test '{}' failed: invariants not enforced: {:?}",
            test_name, missing
        );
    }
}

#[cfg(not(feature = "ppt"))]
/// Contract test: no-op when PPT feature is disabled.
pub fn contract_test(_test_name: &str, _required_invariants: &[u32]) {}

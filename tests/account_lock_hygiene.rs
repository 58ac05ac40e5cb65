use std::fs;
use std::path::Path;

/// The account's critical sections are plain arithmetic: no logging and no
/// invariant bookkeeping (which takes its own lock) inside account.rs.
#[test]
fn account_does_not_log_or_assert_under_lock() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("src")
        .join("account.rs");
    let src = fs::read_to_string(path).expect("failed to read account.rs");
    for forbidden in ["assert_invariant(", "tracing::", "debug!(", "info!(", "warn!("] {
        assert!(
            !src.contains(forbidden),
            "account.rs must not call `{}` (critical sections stay O(1) arithmetic)",
            forbidden
        );
    }
}

//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use serde_json::Value;
use std::time::{Duration, Instant};
use streamblocks::unit::{Subscription, UnitHandle};

/// How long a test waits for something that should happen promptly
pub fn test_timeout() -> Duration {
    Duration::from_secs(2)
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

/// Poll `cond` until it holds or the test timeout passes
pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + test_timeout();
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}

/// Receive exactly `n` records, panicking if any takes too long
pub fn recv_n(sub: &Subscription, n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| {
            sub.recv_timeout(test_timeout())
                .unwrap_or_else(|| panic!("record {} of {} never arrived", i + 1, n))
        })
        .collect()
}

/// Wait until the unit reports `rule` as its applied rule.
///
/// Rule and query mailboxes are independent, so a query sent right after
/// an update may be answered first.
pub fn wait_for_rule(unit: &UnitHandle, rule: &Value) {
    let applied = wait_until(|| unit.query_rule(test_timeout()).ok().as_ref() == Some(rule));
    assert!(applied, "rule {} was never applied", rule);
}

//! Test helpers shared by unit tests.

use std::time::Duration;

use tokio::time::Instant;

/// Timer slack allowed on top of an expected paused-clock duration.
pub(crate) const TIMER_SLACK: Duration = Duration::from_millis(5);

/// Asserts that `expected` (plus at most timer rounding) elapsed since `start`.
#[track_caller]
pub(crate) fn assert_elapsed(start: Instant, expected: Duration) {
    let elapsed = start.elapsed();
    assert!(
        elapsed >= expected && elapsed <= expected + TIMER_SLACK,
        "expected ~{expected:?} to elapse, got {elapsed:?}"
    );
}

//! Segmentation client metrics.

use metrics::counter;

/// Metric name constants for consistency.
pub mod names {
    /// Attempts by outcome (`success`, `gateway`, `server`, `network`).
    pub const ATTEMPTS_TOTAL: &str = "jewel_segment_attempts_total";

    /// Backoff sleeps scheduled after a failed attempt.
    pub const RETRIES_TOTAL: &str = "jewel_segment_retries_total";

    /// Sequences that ended with a user-visible error, by category.
    pub const FAILURES_TOTAL: &str = "jewel_segment_failures_total";
}

/// Record the outcome of one attempt.
pub fn record_attempt(outcome: &str) {
    counter!(names::ATTEMPTS_TOTAL, "outcome" => outcome.to_string()).increment(1);
}

/// Record a retry.
pub fn record_retry() {
    counter!(names::RETRIES_TOTAL).increment(1);
}

/// Record an exhausted retry sequence.
pub fn record_terminal_failure(category: &str) {
    counter!(names::FAILURES_TOTAL, "category" => category.to_string()).increment(1);
}

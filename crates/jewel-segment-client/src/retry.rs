//! Linear-backoff retry for segmentation requests.
//!
//! Attempts run strictly one after another. After failed attempt `n` the
//! loop sleeps `n * step` before attempt `n + 1`. There is no jitter and no
//! delay cap; the attempt ceiling is the only bound. Only the caller decides
//! what to show the user once the sequence is exhausted.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{AttemptError, FailureCategory};
use crate::metrics::{record_attempt, record_retry};

// =============================================================================
// Configuration
// =============================================================================

/// Retry policy configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Backoff unit; the wait after attempt `n` is `n * step`.
    pub step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            step: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Create policy from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_attempts: std::env::var("SEGMENT_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_attempts),
            step: std::env::var("SEGMENT_BACKOFF_STEP_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.step),
        }
    }

    /// Wait after the failed 1-based `attempt`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.step.saturating_mul(attempt)
    }
}

// =============================================================================
// Outcome
// =============================================================================

/// What happened on one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    /// 1-based attempt number.
    pub attempt: u32,
    /// Backoff slept before this attempt (zero for the first one).
    pub delay_before: Duration,
    /// Failure category, `None` when the attempt succeeded.
    pub failure: Option<FailureCategory>,
}

/// Result of a whole retry sequence.
#[derive(Debug)]
pub enum RetryOutcome<T> {
    Succeeded {
        value: T,
        attempts: Vec<AttemptRecord>,
    },
    Exhausted {
        error: AttemptError,
        attempts: Vec<AttemptRecord>,
    },
    Cancelled {
        attempts: Vec<AttemptRecord>,
    },
}

impl<T> RetryOutcome<T> {
    pub fn attempts(&self) -> &[AttemptRecord] {
        match self {
            RetryOutcome::Succeeded { attempts, .. }
            | RetryOutcome::Exhausted { attempts, .. }
            | RetryOutcome::Cancelled { attempts } => attempts,
        }
    }
}

// =============================================================================
// Retry loop
// =============================================================================

/// Execute `op` until it succeeds, the policy is exhausted, or `cancel` fires.
///
/// `op` receives the 1-based attempt number. Cancellation is observed both
/// while a request is in flight and while sleeping between attempts; the
/// in-flight future is dropped, which aborts the request.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
) -> RetryOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = Vec::with_capacity(max_attempts as usize);
    let mut delay_before = Duration::ZERO;
    let mut attempt = 1;

    loop {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(attempt, "Segmentation sequence cancelled during request");
                return RetryOutcome::Cancelled { attempts };
            }
            result = op(attempt) => result,
        };

        match result {
            Ok(value) => {
                record_attempt("success");
                attempts.push(AttemptRecord {
                    attempt,
                    delay_before,
                    failure: None,
                });
                return RetryOutcome::Succeeded { value, attempts };
            }
            Err(error) => {
                let category = error.category();
                record_attempt(category.as_str());
                attempts.push(AttemptRecord {
                    attempt,
                    delay_before,
                    failure: Some(category),
                });

                if attempt >= max_attempts {
                    warn!(
                        attempt,
                        max_attempts,
                        category = category.as_str(),
                        "Segmentation attempts exhausted: {}",
                        error
                    );
                    return RetryOutcome::Exhausted { error, attempts };
                }

                let delay = policy.delay_after(attempt);
                if category == FailureCategory::Gateway {
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Segmentation gateway unavailable, retrying: {}",
                        error
                    );
                } else {
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        category = category.as_str(),
                        "Segmentation request failed, retrying: {}",
                        error
                    );
                }
                record_retry();

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!(attempt, "Segmentation sequence cancelled during backoff");
                        return RetryOutcome::Cancelled { attempts };
                    }
                    _ = tokio::time::sleep(delay) => {}
                }

                delay_before = delay;
                attempt += 1;
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::decode::ErrorBody;

    fn gateway() -> AttemptError {
        AttemptError::BadGateway { body: ErrorBody::Unknown }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            step: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.step, Duration::from_millis(1000));
    }

    #[test]
    fn test_delay_is_linear() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_after(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_after(4), Duration::from_millis(4000));
    }

    #[tokio::test]
    async fn test_succeeds_after_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();

        let outcome = run_with_retry(&fast_policy(), &cancel, |attempt| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                if attempt < 3 {
                    Err(gateway())
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match outcome {
            RetryOutcome::Succeeded { value, attempts } => {
                assert_eq!(value, 3);
                assert_eq!(attempts.len(), 3);
                assert_eq!(attempts[2].failure, None);
                assert_eq!(attempts[1].delay_before, Duration::from_millis(1));
                assert_eq!(attempts[2].delay_before, Duration::from_millis(2));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_exhausts_at_ceiling() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();

        let outcome: RetryOutcome<()> = run_with_retry(&fast_policy(), &cancel, |_| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(gateway())
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 5);
        match outcome {
            RetryOutcome::Exhausted { error, attempts } => {
                assert_eq!(error.category(), FailureCategory::Gateway);
                assert_eq!(attempts.len(), 5);
                assert!(attempts.iter().all(|a| a.failure == Some(FailureCategory::Gateway)));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome: RetryOutcome<()> =
            run_with_retry(&fast_policy(), &cancel, |_| async { Ok(()) }).await;

        assert!(matches!(outcome, RetryOutcome::Cancelled { ref attempts } if attempts.is_empty()));
    }

    #[tokio::test]
    async fn test_cancelled_during_backoff() {
        let policy = RetryPolicy {
            max_attempts: 5,
            step: Duration::from_secs(60),
        };
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        let outcome: RetryOutcome<()> = run_with_retry(&policy, &cancel, |_| {
            let trigger = trigger.clone();
            async move {
                trigger.cancel();
                Err(gateway())
            }
        })
        .await;

        match outcome {
            RetryOutcome::Cancelled { attempts } => assert_eq!(attempts.len(), 1),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let policy = RetryPolicy {
            max_attempts: 0,
            step: Duration::from_millis(1),
        };
        let cancel = CancellationToken::new();
        let outcome: RetryOutcome<()> = run_with_retry(&policy, &cancel, |_| async { Err(gateway()) }).await;
        assert_eq!(outcome.attempts().len(), 1);
    }
}

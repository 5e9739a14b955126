//! Retry with optional exponential backoff.
//!
//! Only errors that report themselves retryable are retried. Everything else
//! returns after the attempt that produced it.
//!
//! Delay after failed attempt `n` (1-based): `base_delay * 2^(n-1)` when
//! exponential, `base_delay` otherwise. No delay follows the final attempt.

use std::future::Future;
use std::time::Duration;

/// Largest doubling applied to the base delay.
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Per-operation retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Zero is treated as one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub exponential: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            exponential: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            exponential: false,
        }
    }

    /// Delay to wait after failed attempt `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if !self.exponential {
            return self.base_delay;
        }
        let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Errors that know whether another attempt might succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for crate::error::GatewayError {
    fn is_retryable(&self) -> bool {
        crate::error::GatewayError::is_retryable(self)
    }
}

/// Final result of a retried operation.
#[derive(Debug)]
pub struct Attempted<T, E> {
    pub result: Result<T, E>,
    /// Attempts made, at least one.
    pub attempts: u32,
}

/// Run `op` until it succeeds, fails terminally, or the policy is exhausted.
///
/// `op` receives the 1-based attempt number.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut op: F,
) -> Attempted<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let max = policy.attempts();
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => {
                return Attempted {
                    result: Ok(value),
                    attempts: attempt,
                }
            }
            Err(e) if attempt < max && e.is_retryable() => {
                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts = max,
                    "attempt failed, retrying in {delay:?}: {e}"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::warn!(operation, attempts = attempt, "retries exhausted: {e}");
                }
                return Attempted {
                    result: Err(e),
                    attempts: attempt,
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct Flaky(bool);

    impl Retryable for Flaky {
        fn is_retryable(&self) -> bool {
            self.0
        }
    }

    impl std::fmt::Display for Flaky {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "flaky(retryable={})", self.0)
        }
    }

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            exponential: true,
        }
    }

    #[test]
    fn exponential_delays_double() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(2));
        assert_eq!(policy.delay_after(2), Duration::from_secs(4));
        assert_eq!(policy.delay_after(3), Duration::from_secs(8));
    }

    #[test]
    fn linear_delays_stay_flat() {
        let policy = RetryPolicy {
            exponential: false,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_after(1), policy.delay_after(5));
    }

    #[test]
    fn huge_attempt_numbers_saturate() {
        let policy = RetryPolicy::default();
        assert!(policy.delay_after(u32::MAX) >= policy.delay_after(17));
    }

    #[tokio::test]
    async fn retries_until_exhausted() {
        let calls = AtomicU32::new(0);
        let outcome: Attempted<(), Flaky> = retry_with_backoff(&fast(3), "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Flaky(true)) }
        })
        .await;
        assert!(outcome.result.is_err());
        assert_eq!(outcome.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn terminal_errors_are_not_retried() {
        let outcome: Attempted<(), Flaky> =
            retry_with_backoff(&fast(5), "test", |_| async { Err(Flaky(false)) }).await;
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test]
    async fn succeeds_on_a_later_attempt() {
        let outcome: Attempted<u32, Flaky> = retry_with_backoff(&fast(3), "test", |attempt| async move {
            if attempt < 2 {
                Err(Flaky(true))
            } else {
                Ok(attempt)
            }
        })
        .await;
        assert_eq!(outcome.result.unwrap(), 2);
        assert_eq!(outcome.attempts, 2);
    }

    #[tokio::test]
    async fn zero_max_attempts_still_runs_once() {
        let outcome: Attempted<(), Flaky> =
            retry_with_backoff(&fast(0), "test", |_| async { Err(Flaky(true)) }).await;
        assert_eq!(outcome.attempts, 1);
    }
}

//! # Retry Policy
//!
//! Exponential backoff with jitter for transient remote-store failures.
//!
//! [`execute_with_retry`] re-runs an operation while its error reports itself
//! [`Retryable`] and the policy allows another attempt, then returns the last
//! error unchanged so callers keep the original taxonomy.
//!
//! # Example
//!
//! ```
//! use escrow_trade::application::services::retry::{RetryPolicy, Retryable, execute_with_retry};
//!
//! #[derive(Debug)]
//! struct Flaky;
//!
//! impl std::fmt::Display for Flaky {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "flaky")
//!     }
//! }
//!
//! impl Retryable for Flaky {
//!     fn is_retryable(&self) -> bool {
//!         true
//!     }
//! }
//!
//! # async fn example() {
//! let policy = RetryPolicy::no_retry();
//! let result: Result<(), Flaky> = execute_with_retry(&policy, "push", || async { Err(Flaky) }).await;
//! assert!(result.is_err());
//! # }
//! ```

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Errors that know whether they are transient.
pub trait Retryable {
    /// Returns true if the operation should be attempted again.
    fn is_retryable(&self) -> bool;
}

/// Backoff configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any delay.
    pub max_delay: Duration,
    /// Growth factor between retries.
    pub backoff_multiplier: f64,
    /// Fraction (0.0-1.0) of each delay that is randomized away.
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy, clamping the jitter factor into range.
    #[must_use]
    pub fn new(
        max_retries: u32,
        initial_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
        jitter_factor: f64,
    ) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay,
            backoff_multiplier,
            jitter_factor: jitter_factor.clamp(0.0, 1.0),
        }
    }

    /// Single attempt, no retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-indexed), without jitter.
    ///
    /// `min(initial_delay * multiplier ^ attempt, max_delay)`
    #[must_use]
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base_ms = self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        let capped_ms = base_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped_ms as u64)
    }

    /// Delay before retry number `attempt`, shortened by up to `jitter_factor`.
    #[must_use]
    pub fn calculate_delay_with_jitter(&self, attempt: u32) -> Duration {
        let base = self.calculate_delay(attempt);
        if self.jitter_factor <= 0.0 {
            return base;
        }
        let jitter: f64 = rand::rng().random();
        let jittered_ms = base.as_millis() as f64 * (1.0 - self.jitter_factor * jitter);
        Duration::from_millis(jittered_ms.max(1.0) as u64)
    }

    /// Returns true if another attempt is allowed after `attempts_made`.
    #[inline]
    #[must_use]
    pub fn should_retry(&self, attempts_made: u32) -> bool {
        attempts_made <= self.max_retries
    }
}

/// Runs `operation` until it succeeds, fails permanently or exhausts the policy.
///
/// # Errors
///
/// Returns the last error produced by `operation`.
pub async fn execute_with_retry<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let mut attempts = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                attempts = attempts.saturating_add(1);
                if !error.is_retryable() || !policy.should_retry(attempts) {
                    return Err(error);
                }
                let delay = policy.calculate_delay_with_jitter(attempts.saturating_sub(1));
                warn!(
                    operation = operation_name,
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "retrying after transient failure"
                );
                sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, PartialEq)]
    struct TestError {
        transient: bool,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "transient={}", self.transient)
        }
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            self.transient
        }
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(
            max_retries,
            Duration::from_millis(1),
            Duration::from_millis(4),
            2.0,
            0.0,
        )
    }

    mod delays {
        use super::*;

        #[test]
        fn grows_exponentially_until_capped() {
            let policy = RetryPolicy::new(
                5,
                Duration::from_millis(100),
                Duration::from_millis(500),
                2.0,
                0.0,
            );
            assert_eq!(policy.calculate_delay(0), Duration::from_millis(100));
            assert_eq!(policy.calculate_delay(1), Duration::from_millis(200));
            assert_eq!(policy.calculate_delay(2), Duration::from_millis(400));
            assert_eq!(policy.calculate_delay(3), Duration::from_millis(500));
        }

        #[test]
        fn jitter_only_shortens() {
            let policy = RetryPolicy::new(
                3,
                Duration::from_millis(1000),
                Duration::from_secs(10),
                2.0,
                0.5,
            );
            for _ in 0..50 {
                let delay = policy.calculate_delay_with_jitter(0);
                assert!(delay <= Duration::from_millis(1000));
                assert!(delay >= Duration::from_millis(500));
            }
        }

        #[test]
        fn jitter_factor_clamped() {
            let policy = RetryPolicy::new(1, Duration::ZERO, Duration::ZERO, 1.0, 7.0);
            assert!((policy.jitter_factor - 1.0).abs() < f64::EPSILON);
        }
    }

    mod execution {
        use super::*;

        #[tokio::test]
        async fn succeeds_after_transient_failures() {
            let calls = Arc::new(AtomicU32::new(0));
            let counter = Arc::clone(&calls);
            let result = execute_with_retry(&fast_policy(3), "test", || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(TestError { transient: true })
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;
            assert_eq!(result.unwrap(), "done");
            assert_eq!(calls.load(Ordering::SeqCst), 3);
        }

        #[tokio::test]
        async fn permanent_error_is_not_retried() {
            let calls = Arc::new(AtomicU32::new(0));
            let counter = Arc::clone(&calls);
            let result: Result<(), _> = execute_with_retry(&fast_policy(3), "test", || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError { transient: false }) }
            })
            .await;
            assert_eq!(result.unwrap_err(), TestError { transient: false });
            assert_eq!(calls.load(Ordering::SeqCst), 1);
        }

        #[tokio::test]
        async fn gives_up_after_max_retries() {
            let calls = Arc::new(AtomicU32::new(0));
            let counter = Arc::clone(&calls);
            let result: Result<(), _> = execute_with_retry(&fast_policy(2), "test", || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError { transient: true }) }
            })
            .await;
            assert!(result.is_err());
            assert_eq!(calls.load(Ordering::SeqCst), 3);
        }
    }
}

// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Retry with exponential backoff for on-chain batch dispatch.
//!
//! A failed multicall is retried while the error is transient (see
//! [`MulticallError::is_retryable`](crate::MulticallError::is_retryable)). The
//! backoff formula is:
//!
//! ```text
//! delay = min(base_delay * 2^attempt, max_delay)
//! ```

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Default maximum number of retry attempts.
const DEFAULT_MAX_RETRIES: u32 = 2;
/// Default base delay for exponential backoff (100ms).
const DEFAULT_BASE_DELAY_MS: u64 = 100;
/// Default maximum delay between retries (5 seconds).
///
/// Kept well under the block poll interval so a retried batch still lands
/// before the next flush.
const DEFAULT_MAX_DELAY_MS: u64 = 5_000;

/// How a failed on-chain batch is retried.
///
/// # Example
///
/// ```rust
/// use poolbatch::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::builder()
///     .max_retries(4)
///     .base_delay(Duration::from_millis(200))
///     .build();
/// assert_eq!(policy.max_retries, 4);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (not including the initial request).
    pub max_retries: u32,
    /// Base delay for exponential backoff.
    pub base_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Creates a builder for customizing the policy.
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// Never retry: the first failure is final.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Aggressive retry settings.
    ///
    /// - 5 retry attempts
    /// - 50ms base delay
    /// - 2s maximum delay
    pub fn aggressive() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
        }
    }

    /// Conservative retry settings, for endpoints that need time to recover.
    ///
    /// - 3 retry attempts
    /// - 500ms base delay
    /// - 10s maximum delay
    pub fn conservative() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }

    /// Backoff before retry number `attempt` (zero-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self)
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Clone, Debug, Default)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    /// Sets the maximum number of retry attempts.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.policy.max_retries = max_retries;
        self
    }

    /// Sets the base delay for exponential backoff.
    ///
    /// The actual delay for attempt `n` will be `min(base_delay * 2^n, max_delay)`.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.policy.base_delay = delay;
        self
    }

    /// Sets the maximum delay between retries.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.max_delay = delay;
        self
    }

    /// Builds the configured [`RetryPolicy`].
    pub fn build(self) -> RetryPolicy {
        self.policy
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// the policy's attempts are exhausted. Returns the last error in the latter
/// two cases.
pub(crate) async fn with_retry<T, E, Fut, Op, R>(
    policy: &RetryPolicy,
    mut operation: Op,
    is_retryable: R,
) -> Result<T, E>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(attempt, "Request succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) => {
                if !is_retryable(&error) {
                    debug!(error = %error, "Non-retryable error, not retrying");
                    return Err(error);
                }

                if attempt >= policy.max_retries {
                    warn!(
                        error = %error,
                        attempts = attempt + 1,
                        "Max retries exceeded"
                    );
                    return Err(error);
                }

                let delay = calculate_backoff(attempt, policy);
                warn!(
                    error = %error,
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis(),
                    "Retryable error, backing off"
                );

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Calculates the backoff duration for a given attempt.
///
/// Uses exponential backoff: `min(base_delay * 2^attempt, max_delay)`
fn calculate_backoff(attempt: u32, policy: &RetryPolicy) -> Duration {
    let multiplier = 2u64.saturating_pow(attempt);
    let delay_ms = policy
        .base_delay
        .as_millis()
        .saturating_mul(multiplier as u128);
    let capped_delay_ms = delay_ms.min(policy.max_delay.as_millis()) as u64;
    Duration::from_millis(capped_delay_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn presets() {
        let default = RetryPolicy::default();
        assert_eq!(default.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(default.base_delay, Duration::from_millis(DEFAULT_BASE_DELAY_MS));

        assert_eq!(RetryPolicy::none().max_retries, 0);
        assert_eq!(RetryPolicy::aggressive().max_retries, 5);
        assert_eq!(RetryPolicy::conservative().base_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_calculate_backoff() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
        };

        assert_eq!(calculate_backoff(0, &policy), Duration::from_millis(100));
        assert_eq!(calculate_backoff(1, &policy), Duration::from_millis(200));
        assert_eq!(calculate_backoff(3, &policy), Duration::from_millis(800));
    }

    #[test]
    fn test_calculate_backoff_capped() {
        let policy = RetryPolicy::builder()
            .base_delay(Duration::from_millis(100))
            .max_delay(Duration::from_millis(500))
            .build();

        assert_eq!(policy.backoff(3), Duration::from_millis(500));
        // Would overflow without saturation
        assert_eq!(policy.backoff(80), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_errors_until_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = with_retry(
            &RetryPolicy::default(),
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err("transient".to_string())
                } else {
                    Ok(n)
                }
            },
            |_| true,
        )
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = with_retry(
            &RetryPolicy::builder().max_retries(1).build(),
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("down".to_string())
            },
            |_| true,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn does_not_retry_permanent_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = with_retry(
            &RetryPolicy::aggressive(),
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("reverted".to_string())
            },
            |_| false,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

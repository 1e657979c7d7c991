//! Bounded retry with multiplicative back-off for catalog fetches.
//!
//! Only [`ScraperError::is_transient`] errors are retried: transport failures
//! and responses with status 429, 500, 502, 503 or 504. Callers must only wrap
//! read-only requests; nothing with side effects goes through this loop.

use std::future::Future;
use std::time::Duration;

use crate::error::ScraperError;

/// Status codes that are retried; any other non-2xx status is final.
pub const RETRIABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

const MAX_DELAY_MS: u64 = 60_000;

/// Attempt budget and back-off base for one logical request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Always at least 1.
    pub max_attempts: u32,
    /// Delay before retry `n` is `backoff_factor_ms * 2^(n-1)`, ±25 % jitter.
    pub backoff_factor_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_factor_ms: 500,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, backoff_factor_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_factor_ms,
        }
    }

    /// Un-jittered delay before retry number `retry` (1-based).
    #[must_use]
    pub fn base_delay_ms(&self, retry: u32) -> u64 {
        let exponent = retry.saturating_sub(1).min(16);
        self.backoff_factor_ms
            .saturating_mul(1u64 << exponent)
            .min(MAX_DELAY_MS)
    }
}

#[must_use]
pub fn is_retriable_status(status: u16) -> bool {
    RETRIABLE_STATUSES.contains(&status)
}

/// Runs `operation` until it succeeds, fails permanently, or the policy's
/// attempt budget is spent. The last error is returned on exhaustion.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    policy: RetryPolicy,
    mut operation: F,
) -> Result<T, ScraperError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScraperError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_transient() || attempt >= max_attempts {
                    return Err(err);
                }

                let base = policy.base_delay_ms(attempt);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (base as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms,
                    error = %err,
                    "transient fetch error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn unavailable() -> ScraperError {
        ScraperError::RetriableStatus {
            status: 503,
            url: "https://test.example.com".to_owned(),
        }
    }

    #[test]
    fn retriable_statuses_match_forcelist() {
        for status in [429, 500, 502, 503, 504] {
            assert!(is_retriable_status(status), "{status} should retry");
        }
        for status in [400, 401, 403, 404, 501] {
            assert!(!is_retriable_status(status), "{status} should not retry");
        }
    }

    #[test]
    fn backoff_doubles_per_retry() {
        let policy = RetryPolicy::new(5, 500);
        assert_eq!(policy.base_delay_ms(1), 500);
        assert_eq!(policy.base_delay_ms(2), 1_000);
        assert_eq!(policy.base_delay_ms(3), 2_000);
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy::new(5, 50_000);
        assert_eq!(policy.base_delay_ms(4), MAX_DELAY_MS);
    }

    #[test]
    fn zero_attempts_is_raised_to_one() {
        assert_eq!(RetryPolicy::new(0, 0).max_attempts, 1);
    }

    #[tokio::test]
    async fn succeeds_immediately_on_first_try() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let result = retry_with_backoff(RetryPolicy::new(5, 0), || {
            let cc = Arc::clone(&cc);
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, ScraperError>(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_errors_until_budget_is_spent() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let result = retry_with_backoff(RetryPolicy::new(5, 0), || {
            let cc = Arc::clone(&cc);
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Err::<u32, ScraperError>(unavailable())
            }
        })
        .await;
        assert!(matches!(
            result,
            Err(ScraperError::RetriableStatus { status: 503, .. })
        ));
        assert_eq!(call_count.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn permanent_error_is_not_retried() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let result = retry_with_backoff(RetryPolicy::new(5, 0), || {
            let cc = Arc::clone(&cc);
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Err::<u32, ScraperError>(ScraperError::NotFound {
                    url: "https://test.example.com/missing".to_owned(),
                })
            }
        })
        .await;
        assert!(matches!(result, Err(ScraperError::NotFound { .. })));
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let result = retry_with_backoff(RetryPolicy::new(5, 0), || {
            let cc = Arc::clone(&cc);
            async move {
                let n = cc.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(unavailable())
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
    }
}

//! Exponential backoff for throttled upstream calls.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::RetryConfig;
use crate::utils::error::LlmError;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry; doubles per attempt
    pub base_delay: Duration,
    /// Upper bound (exclusive) of the uniform jitter added to each delay
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_jitter: Duration::from_secs(1),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts,
            base_delay: Duration::from_millis(cfg.base_delay_ms),
            max_jitter: Duration::from_millis(cfg.max_jitter_ms),
        }
    }
}

impl RetryPolicy {
    /// `base * 2^attempt`, without jitter. `attempt` is 0-indexed.
    pub fn base_delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2_u32.saturating_pow(attempt))
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let jitter = if self.max_jitter.is_zero() {
            Duration::ZERO
        } else {
            self.max_jitter.mul_f64(rand::rng().random::<f64>())
        };
        self.base_delay_for_attempt(attempt) + jitter
    }
}

/// Run `operation` until it succeeds, fails with a non-throttling error,
/// or the attempt budget is spent on rate limits.
///
/// Waits are `tokio::time::sleep`, so only the calling task is suspended.
/// No wait follows the final attempt.
pub async fn call_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 0..max_attempts {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    info!(attempt = attempt + 1, "Upstream recovered after rate limiting");
                }
                return Ok(value);
            }
            Err(LlmError::RateLimited(reason)) => {
                if attempt + 1 >= max_attempts {
                    warn!(attempts = max_attempts, %reason, "Rate limit persisted, giving up");
                    break;
                }

                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    attempt = attempt + 1,
                    max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "Rate limit hit, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(other) => return Err(other),
        }
    }

    Err(LlmError::RateLimitExhausted { attempts: max_attempts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn throttled() -> LlmError {
        LlmError::RateLimited("Too Many Requests".to_string())
    }

    #[test]
    fn test_base_delay_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.base_delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(policy.base_delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.base_delay_for_attempt(2), Duration::from_secs(4));
    }

    #[test]
    fn test_jitter_bounds() {
        let policy = RetryPolicy::default();
        for _ in 0..100 {
            let delay = policy.delay_for_attempt(1);
            assert!(delay >= Duration::from_secs(2));
            assert!(delay < Duration::from_secs(3));
        }
    }

    #[test]
    fn test_zero_jitter_is_exact() {
        let policy = RetryPolicy {
            max_jitter: Duration::ZERO,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_two_rate_limits() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result = call_with_retry(&RetryPolicy::default(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(throttled())
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        // 2^0 + 2^1 seconds plus two jitters drawn from [0, 1)
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(3), "waited {:?}", waited);
        assert!(waited < Duration::from_secs(5), "waited {:?}", waited);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_after_max_attempts() {
        let calls = AtomicU32::new(0);

        let result: Result<(), LlmError> = call_with_retry(&RetryPolicy::default(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(throttled()) }
        })
        .await;

        assert_eq!(result, Err(LlmError::RateLimitExhausted { attempts: 3 }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result: Result<(), LlmError> = call_with_retry(&RetryPolicy::default(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(LlmError::Upstream("invalid_api_key".to_string())) }
        })
        .await;

        assert_eq!(result, Err(LlmError::Upstream("invalid_api_key".to_string())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_budget() {
        let policy = RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        };
        let calls = AtomicU32::new(0);

        let result: Result<(), LlmError> = call_with_retry(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(throttled()) }
        })
        .await;

        assert_eq!(result, Err(LlmError::RateLimitExhausted { attempts: 1 }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempt_budget_still_calls_once() {
        let policy = RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        };
        let calls = AtomicU32::new(0);

        let result = call_with_retry(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, LlmError>("ok") }
        })
        .await;

        assert_eq!(result, Ok("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_policy_from_config_keeps_values() {
        let policy = RetryPolicy::from(&RetryConfig {
            max_attempts: 5,
            base_delay_ms: 250,
            max_jitter_ms: 0,
        });
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(1));
    }
}

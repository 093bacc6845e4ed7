//! Retry Policy
//!
//! Bounded retries with exponential backoff and jitter. Only transient
//! errors are retried; everything else is surfaced on the first failure.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::error::{HawalaError, HawalaResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Fraction of the delay randomized in either direction (0.0 - 1.0)
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 250,
            max_delay_ms: 8_000,
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// A policy that tries exactly once
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> HawalaResult<()> {
        if self.max_attempts == 0 {
            return Err(HawalaError::invalid_input("Retry policy needs at least one attempt"));
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(HawalaError::invalid_input("Retry base delay exceeds the maximum delay"));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(HawalaError::invalid_input("Retry jitter must be between 0 and 1"));
        }
        Ok(())
    }

    /// Delay after the `attempt`-th failure (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(20);
        let capped = self
            .base_delay_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_delay_ms);

        let jitter = self.jitter.clamp(0.0, 1.0);
        if capped == 0 || jitter == 0.0 {
            return Duration::from_millis(capped);
        }
        let spread = (capped as f64 * jitter) as u64;
        let low = capped - spread;
        let high = (capped + spread).min(self.max_delay_ms).max(low);
        Duration::from_millis(rand::thread_rng().gen_range(low..=high))
    }

    /// Run `op` until it succeeds, fails with a non-transient error, or the
    /// attempt budget is spent.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> HawalaResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = HawalaResult<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    let delay = self.delay_for(attempt);
                    crate::log_warn!(
                        "retry",
                        "Transient failure, backing off",
                        operation = operation,
                        attempt = attempt,
                        delay_ms = delay.as_millis(),
                        error = e.message,
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if e.is_retryable() {
                        crate::log_error!(
                            "retry",
                            "Retry budget exhausted",
                            operation = operation,
                            attempts = attempt,
                        );
                    }
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts: attempts,
            base_delay_ms: 1,
            max_delay_ms: 4,
            jitter: 0.0,
        }
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay_ms: 100,
            max_delay_ms: 1_000,
            jitter: 0.0,
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(4), Duration::from_millis(800));
        assert_eq!(policy.delay_for(5), Duration::from_millis(1_000));
        assert_eq!(policy.delay_for(60), Duration::from_millis(1_000));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 10_000,
            jitter: 0.5,
        };
        for _ in 0..100 {
            let d = policy.delay_for(1).as_millis();
            assert!((500..=1_500).contains(&d), "delay {} out of range", d);
        }
    }

    #[test]
    fn test_validate() {
        assert!(RetryPolicy::default().validate().is_ok());
        assert!(RetryPolicy { max_attempts: 0, ..RetryPolicy::default() }.validate().is_err());
        assert!(RetryPolicy { jitter: 1.5, ..RetryPolicy::default() }.validate().is_err());
        assert!(RetryPolicy { base_delay_ms: 10, max_delay_ms: 1, ..RetryPolicy::default() }
            .validate()
            .is_err());
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = fast(4)
            .run("test", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(HawalaError::rate_limited("slow down"))
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_transient_fails_immediately() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: HawalaResult<()> = fast(5)
            .run("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(HawalaError::message_rejected("exit code 33"))
            })
            .await;
        assert_eq!(result.unwrap_err().code, ErrorCode::MessageRejected);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_budget() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: HawalaResult<()> = fast(3)
            .run("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(HawalaError::timeout("no answer"))
            })
            .await;
        assert_eq!(result.unwrap_err().code, ErrorCode::Timeout);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }
}

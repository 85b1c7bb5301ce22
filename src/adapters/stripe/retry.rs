//! Backoff for Stripe API calls.
//!
//! Rate-limited calls are retried with delays of 1s, 2s, 4s, ... and given up
//! once the next delay would exceed the cap. Transport failures get a small
//! fixed number of extra attempts on the same schedule.

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::domain::billing::{BillingError, BillingErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    initial_delay: Duration,
    multiplier: u32,
    max_delay: Duration,
    max_network_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            multiplier: config.multiplier.max(2),
            max_delay: Duration::from_millis(config.max_delay_ms),
            max_network_retries: config.max_network_retries,
        }
    }

    /// The delays a persistently rate-limited call sleeps through.
    pub fn delays(&self) -> Vec<Duration> {
        let mut delays = Vec::new();
        let mut delay = self.initial_delay;
        while delay <= self.max_delay && !delay.is_zero() {
            delays.push(delay);
            delay = delay.saturating_mul(self.multiplier);
        }
        delays
    }

    /// Runs `call` until it succeeds, fails with a non-retryable error or the
    /// retry budget is spent.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, BillingError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BillingError>>,
    {
        let mut delay = self.initial_delay;
        let mut network_retries = 0;

        loop {
            let err = match call().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            match err.kind {
                BillingErrorKind::RateLimited => {
                    if delay > self.max_delay || delay.is_zero() {
                        tracing::warn!(
                            operation,
                            max_delay_ms = self.max_delay.as_millis() as u64,
                            "Stripe rate limit persisted past backoff cap"
                        );
                        return Err(err);
                    }
                }
                BillingErrorKind::TransientNetworkError => {
                    if network_retries >= self.max_network_retries {
                        tracing::warn!(operation, attempts = network_retries + 1, "Stripe request failed");
                        return Err(err);
                    }
                    network_retries += 1;
                }
                _ => return Err(err),
            }

            tracing::info!(
                operation,
                kind = %err.kind,
                delay_ms = delay.as_millis() as u64,
                "Retrying Stripe request"
            );
            tokio::time::sleep(delay).await;
            delay = delay.saturating_mul(self.multiplier);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn rate_limited() -> BillingError {
        BillingError::new(BillingErrorKind::RateLimited, "Too many requests")
    }

    #[test]
    fn default_schedule_doubles_up_to_cap() {
        let delays: Vec<u64> = RetryPolicy::default()
            .delays()
            .iter()
            .map(|d| d.as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000]);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_rate_limit_gives_up_after_schedule() {
        let policy = RetryPolicy::default();
        let attempts = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let result: Result<(), _> = policy
            .run("test", || {
                let attempts = attempts.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(rate_limited())
                }
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind, BillingErrorKind::RateLimited);
        assert_eq!(attempts.load(Ordering::SeqCst), 6);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(31_000));
        assert!(elapsed < Duration::from_millis(32_000));
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_rate_limit_clears() {
        let policy = RetryPolicy::default();
        let attempts = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let result = policy
            .run("test", || {
                let attempts = attempts.clone();
                async move {
                    if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(rate_limited())
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(3000));
        assert!(elapsed < Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn network_errors_use_bounded_retries() {
        let policy = RetryPolicy::default();
        let attempts = Arc::new(AtomicU32::new(0));

        let result: Result<(), _> = policy
            .run("test", || {
                let attempts = attempts.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(BillingError::new(
                        BillingErrorKind::TransientNetworkError,
                        "connection reset",
                    ))
                }
            })
            .await;

        assert_eq!(result.unwrap_err().kind, BillingErrorKind::TransientNetworkError);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let policy = RetryPolicy::default();
        let attempts = Arc::new(AtomicU32::new(0));

        let result: Result<(), _> = policy
            .run("test", || {
                let attempts = attempts.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(BillingError::new(BillingErrorKind::CardDeclined, "declined"))
                }
            })
            .await;

        assert_eq!(result.unwrap_err().kind, BillingErrorKind::CardDeclined);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}

// src/provider/retry.rs — Bounded retry policy for external calls
//
// Retries: server errors (5xx), timeouts, connection resets.
// Does NOT retry: rate limits (429 falls back immediately), validation
// errors, bad requests.

use std::future::Future;
use std::time::Duration;

use crate::infra::config::RetryTomlConfig;
use crate::infra::errors::KitForgeError;

/// Default retry configuration.
const MAX_ATTEMPTS: u32 = 3;
const INITIAL_DELAY_MS: u64 = 500;
const BACKOFF_FACTOR: f64 = 2.0;
const MAX_DELAY_MS: u64 = 8_000;
const JITTER_FRACTION: f64 = 0.2;

/// Bounded retry with exponential backoff and deterministic jitter.
///
/// One policy object is built from config at startup and threaded through
/// every external call site.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
    pub jitter_fraction: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            initial_delay: Duration::from_millis(INITIAL_DELAY_MS),
            backoff_factor: BACKOFF_FACTOR,
            max_delay: Duration::from_millis(MAX_DELAY_MS),
            jitter_fraction: JITTER_FRACTION,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryTomlConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            backoff_factor: config.backoff_factor,
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter_fraction: config.jitter_fraction,
        }
    }

    /// Calculate the delay for a given retry attempt (0-indexed).
    ///
    /// Purely backoff-derived: the only responses carrying a retry-after
    /// hint are rate limits, and those are never retried.
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms =
            self.initial_delay.as_millis() as f64 * self.backoff_factor.powi(attempt as i32);
        let capped_ms = base_ms.min(self.max_delay.as_millis() as f64);

        let jitter = deterministic_jitter(attempt, self.jitter_fraction);
        let final_ms = (capped_ms * jitter).max(50.0);

        Duration::from_millis(final_ms as u64)
    }

    /// Run an external call under this policy. The closure is invoked up to
    /// `max_attempts` times; non-retriable errors return immediately.
    pub async fn run<T, F, Fut>(&self, stage: &str, mut call: F) -> Result<T, KitForgeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, KitForgeError>>,
    {
        let mut last_error = None;

        for attempt in 0..self.max_attempts {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if !e.is_retriable() || attempt + 1 == self.max_attempts {
                        return Err(e);
                    }

                    let delay = self.delay_for_attempt(attempt);
                    tracing::warn!(
                        stage,
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying after error: {}",
                        e
                    );

                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(KitForgeError::Provider {
            provider: stage.to_string(),
            message: "All retries exhausted".into(),
            retriable: false,
        }))
    }
}

/// Deterministic jitter for a given attempt to keep retries reproducible in
/// tests. Returns a multiplier in [1 - fraction, 1 + fraction].
fn deterministic_jitter(attempt: u32, fraction: f64) -> f64 {
    let hash = (attempt.wrapping_mul(2654435761)) as f64 / u32::MAX as f64; // 0.0..1.0
    1.0 + fraction * (2.0 * hash - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn transient() -> KitForgeError {
        KitForgeError::Provider {
            provider: "serpapi".into(),
            message: "HTTP 503".into(),
            retriable: true,
        }
    }

    #[test]
    fn test_delay_exponential() {
        let policy = RetryPolicy::default();
        let d0 = policy.delay_for_attempt(0);
        let d1 = policy.delay_for_attempt(1);
        // d0 ≈ 500ms, d1 ≈ 1000ms, within jitter bounds
        assert!(d0.as_millis() >= 400 && d0.as_millis() <= 600);
        assert!(d1.as_millis() >= 800 && d1.as_millis() <= 1200);
    }

    #[test]
    fn test_delay_capped_at_max() {
        let policy = RetryPolicy::default();
        let d = policy.delay_for_attempt(10);
        assert!(d.as_millis() <= 9_600); // max + jitter margin
    }

    #[test]
    fn test_deterministic_jitter_range() {
        for attempt in 0..20 {
            let j = deterministic_jitter(attempt, 0.2);
            assert!(j >= 0.8 && j <= 1.2, "jitter {} out of range", j);
        }
    }

    #[test]
    fn test_deterministic_jitter_reproducible() {
        assert_eq!(deterministic_jitter(5, 0.2), deterministic_jitter(5, 0.2));
    }

    #[tokio::test]
    async fn test_run_succeeds_after_transient_failures() {
        let policy = RetryPolicy {
            initial_delay: Duration::from_millis(1),
            ..Default::default()
        };
        let calls = AtomicU32::new(0);
        let result = policy
            .run("search", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(transient())
                    } else {
                        Ok(42u32)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_does_not_retry_rate_limit() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let result: Result<u32, _> = policy
            .run("plan", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(KitForgeError::RateLimited {
                        provider: "openai".into(),
                        retry_after_ms: 1000,
                    })
                }
            })
            .await;
        assert!(matches!(result, Err(KitForgeError::RateLimited { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_exhausts_attempts() {
        let policy = RetryPolicy {
            max_attempts: 2,
            initial_delay: Duration::from_millis(1),
            ..Default::default()
        };
        let calls = AtomicU32::new(0);
        let result: Result<u32, _> = policy
            .run("search", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(transient()) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_from_config_clamps_zero_attempts() {
        let policy = RetryPolicy::from_config(&RetryTomlConfig {
            max_attempts: 0,
            ..Default::default()
        });
        assert_eq!(policy.max_attempts, 1);
    }
}

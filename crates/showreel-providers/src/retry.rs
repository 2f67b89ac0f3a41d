// Bounded retry with jittered exponential back-off. Only transient errors
// are retried; a poll timeout is retried at most once regardless of the
// configured budget.

use std::future::Future;
use std::time::Duration;

use showreel_types::{ProductionError, ProductionResult};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Additional attempts after the first; `max_retries == N` means up to
    /// `N + 1` calls in total.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Exponential delay for the given attempt (0-based), with a
    /// deterministic jitter derived from the operation label.
    pub fn delay_for(&self, label: &str, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay);
        let jitter_ms = stable_jitter(label, attempt) % 1000;
        exp + Duration::from_millis(jitter_ms)
    }
}

fn stable_jitter(label: &str, attempt: u32) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    label.hash(&mut hasher);
    attempt.hash(&mut hasher);
    hasher.finish()
}

/// Run `op` up to `1 + max_retries` times. Non-transient errors propagate
/// immediately; `POLL_TIMEOUT` is transient only on its first occurrence.
pub async fn with_retries<T, F, Fut>(
    policy: RetryPolicy,
    label: &str,
    mut op: F,
) -> ProductionResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProductionResult<T>>,
{
    let mut timeout_seen = false;
    let mut attempt = 0u32;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let timed_out = matches!(err, ProductionError::PollTimeout { .. });
                let retryable = err.is_transient() && !(timed_out && timeout_seen);
                if timed_out {
                    timeout_seen = true;
                }

                if !retryable || attempt >= policy.max_retries {
                    return Err(err);
                }

                let delay = policy.delay_for(label, attempt);
                tracing::warn!(
                    label,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Classify an HTTP status: 429 and 5xx are transient, other 4xx are not.
pub fn classify_status(status: reqwest::StatusCode, detail: String) -> ProductionError {
    if status.as_u16() == 429 || status.is_server_error() {
        ProductionError::ProviderTransient(detail)
    } else {
        ProductionError::ProviderPermanent(detail)
    }
}

/// Classify a reqwest transport error: connection-level failures are
/// transient, everything else permanent.
pub fn classify_transport(err: reqwest::Error) -> ProductionError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        ProductionError::ProviderTransient(err.to_string())
    } else {
        ProductionError::ProviderPermanent(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn retries_equal_max_retries_still_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: ProductionResult<u32> = with_retries(fast_policy(), "test", move || {
            let calls = calls_clone.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 3 {
                    Err(ProductionError::ProviderTransient("flaky".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        // First attempt plus three retries.
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: ProductionResult<()> = with_retries(fast_policy(), "test", move || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ProductionError::ProviderPermanent("bad input".into()))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn poll_timeout_is_transient_exactly_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: ProductionResult<()> = with_retries(fast_policy(), "test", move || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ProductionError::PollTimeout {
                    job_id: "j1".into(),
                    timeout_secs: 300,
                })
            }
        })
        .await;

        assert!(result.is_err());
        // One original attempt, one retry, then classified permanent.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn jitter_is_deterministic_per_label_and_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for("scene_000", 1), policy.delay_for("scene_000", 1));
        assert_ne!(policy.delay_for("scene_000", 1), policy.delay_for("scene_001", 1));
    }
}

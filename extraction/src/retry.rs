//! Shared exponential-backoff-with-jitter retry helper.

use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub factor: f64,
    pub jitter: f64,
}

impl BackoffPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts, base_delay: Duration::from_millis(500), factor: 2.0, jitter: 0.2 }
    }

    /// Delay before the given zero-indexed retry attempt.
    pub fn delay_for(&self, attempt: u32, rng_fraction: f64) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64 * self.factor.powi(attempt as i32);
        let jitter_span = base_ms * self.jitter;
        // rng_fraction in [0,1) maps to [-jitter_span, +jitter_span]
        let jittered = base_ms + (rng_fraction * 2.0 - 1.0) * jitter_span;
        Duration::from_millis(jittered.max(0.0) as u64)
    }
}

/// Retry `op` up to `policy.max_attempts` times, calling `should_retry` on
/// each error to decide whether another attempt is worthwhile. `rng_fraction`
/// supplies jitter input (tests pass a fixed value for determinism).
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: BackoffPolicy,
    mut rng_fraction: impl FnMut() -> f64,
    should_retry: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_attempts && should_retry(&err) => {
                let delay = policy.delay_for(attempt, rng_fraction());
                tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, "retrying after failure");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_grows_exponentially_without_jitter() {
        let policy = BackoffPolicy { jitter: 0.0, ..BackoffPolicy::new(3) };
        let d0 = policy.delay_for(0, 0.5);
        let d1 = policy.delay_for(1, 0.5);
        let d2 = policy.delay_for(2, 0.5);
        assert_eq!(d0, Duration::from_millis(500));
        assert_eq!(d1, Duration::from_millis(1000));
        assert_eq!(d2, Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn retries_until_success_then_stops() {
        let calls = AtomicU32::new(0);
        let policy = BackoffPolicy { base_delay: Duration::from_millis(1), ..BackoffPolicy::new(5) };
        let result: Result<u32, &str> = retry_with_backoff(
            policy,
            || 0.5,
            |_| true,
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { if n < 2 { Err("boom") } else { Ok(n) } }
            },
        )
        .await;
        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_when_should_retry_is_false() {
        let policy = BackoffPolicy { base_delay: Duration::from_millis(1), ..BackoffPolicy::new(5) };
        let result: Result<u32, &str> =
            retry_with_backoff(policy, || 0.5, |_| false, || async { Err("fatal") }).await;
        assert_eq!(result, Err("fatal"));
    }
}

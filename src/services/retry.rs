use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

/// Bounded exponential backoff for calls into the analysis function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Pause after the given (1-based) failed attempt: `base * 2^(attempt-1)`,
    /// clamped to `[base_delay, max_delay]`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let delay = self.base_delay.saturating_mul(1u32 << exp);
        delay.clamp(self.base_delay, self.max_delay.max(self.base_delay))
    }
}

/// Run `op` until it succeeds or `policy.max_attempts` is exhausted, sleeping
/// between attempts. The last error is returned as-is.
///
/// `op` receives the 1-based attempt number.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, E>
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= max_attempts => return Err(e),
            Err(e) => {
                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Analysis attempt failed, backing off"
                );
                metrics::counter!("traffic_analysis_retries_total").increment(1);
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

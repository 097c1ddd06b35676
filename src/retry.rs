//! Retry with exponential backoff for API rate limits
//!
//! Free-tier Gemini quotas make 429s routine; every reasoning-service call
//! goes through this wrapper. Only rate-limit-classified errors are
//! retried — anything else propagates on the first attempt.

use crate::error::OrchestrationError;
use crate::Result;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Backoff configuration for one family of calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(15),
            max_delay: Duration::from_secs(120),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Tight policy for tests and offline demos.
    pub fn fast() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(8),
            jitter: false,
        }
    }

    /// Backoff before retry number `attempt` (0-based): doubled each
    /// attempt, capped at `max_delay`. Pure, so the delay curve is
    /// testable without sleeping.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map(|d| d.min(self.max_delay))
            .unwrap_or(self.max_delay)
    }

    fn sleep_duration(&self, attempt: u32) -> Duration {
        let delay = self.delay_for_attempt(attempt);
        if self.jitter {
            // Uniform jitter up to 30% of the delay, against thundering herds.
            let extra = delay.as_secs_f64() * rand::thread_rng().gen_range(0.0..0.3);
            delay + Duration::from_secs_f64(extra)
        } else {
            delay
        }
    }
}

/// Run `op` under the policy. `op` is a factory so each attempt gets a
/// fresh future; it knows nothing about what the operation does, only the
/// error classification decides whether to retry.
pub async fn retry_with_backoff<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_rate_limit() && attempt < policy.max_retries => {
                let delay = policy.sleep_duration(attempt);
                warn!(
                    attempt = attempt + 1,
                    max = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "Rate limit hit - backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

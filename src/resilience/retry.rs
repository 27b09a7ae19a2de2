//! Bounded retry with jittered exponential backoff

use std::time::Duration;

/// Retry tuning for transient adapter failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Exponential base
    pub base: f64,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Uniform jitter applied to each delay, as a fraction of the delay
    pub jitter_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base: 2.0,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter_ratio: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `n` (1-indexed), given a jitter draw in [-1, 1]:
    /// `min(initial · base^(n-1), max_delay) · (1 + jitter_ratio · draw)`.
    ///
    /// Attempt 1 runs immediately; the delay applies before retries only.
    pub fn delay_before(&self, attempt: u32, jitter_draw: f64) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exp = (attempt - 1) as i32 - 1;
        let raw = self.initial_delay.as_secs_f64() * self.base.powi(exp);
        let capped = raw.min(self.max_delay.as_secs_f64());
        let jittered = capped * (1.0 + self.jitter_ratio * jitter_draw.clamp(-1.0, 1.0));
        Duration::from_secs_f64(jittered.max(0.0))
    }
}

//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

/// Tunables for the backoff curve.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay in milliseconds before the first retry.
    pub base_delay_ms: u64,
    /// Ceiling in milliseconds on any single delay.
    pub max_delay_ms: u64,
    /// Multiplier applied per attempt.
    pub multiplier: f64,
    /// Upper bound on the random jitter added to each delay.
    pub jitter_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            multiplier: 2.0,
            jitter_ms: 250,
        }
    }
}

/// Delay before retry number `attempt` (zero-based):
/// `min(base * multiplier^attempt + random(0..=jitter), max)`.
pub fn next_delay(config: &BackoffConfig, attempt: u32) -> Duration {
    let exponential = config.base_delay_ms as f64 * config.multiplier.powi(attempt as i32);
    let exponential = if exponential.is_finite() && exponential >= 0.0 {
        exponential.min(u64::MAX as f64) as u64
    } else {
        config.max_delay_ms
    };

    let jitter = if config.jitter_ms > 0 {
        rand::rng().random_range(0..=config.jitter_ms)
    } else {
        0
    };

    Duration::from_millis(exponential.saturating_add(jitter).min(config.max_delay_ms))
}

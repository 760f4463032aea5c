//! Per-service minimum-interval rate limiter.

use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Enforces a minimum interval between outbound calls to one service.
///
/// Instances are independent; there is no cross-service coordination.
/// Concurrent callers are serialized through the internal lock — ordering
/// among simultaneously-waiting callers is unspecified.
pub struct RateLimiter {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Suspend until at least the minimum interval has elapsed since the
    /// previous call returned, then stamp "now" and return.
    pub async fn wait_for_next(&self) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

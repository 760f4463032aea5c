//! Bounded retry with exponential backoff.

use crate::backoff::{BackoffConfig, next_delay};
use crate::classify::classify;
use std::future::Future;
use tether_rpc::RpcError;
use tether_types::ServiceError;

/// Retry policy for one class of operation.
///
/// Policies are per call site: a lightweight listing call and a deep
/// analysis call against the same service get different bounds.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt (total tries = max_retries + 1).
    pub max_retries: u32,
    pub backoff: BackoffConfig,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: BackoffConfig::default(),
        }
    }
}

impl RetryConfig {
    /// Profile for long-running analysis-class operations: more attempts,
    /// longer initial delay.
    pub fn deep() -> Self {
        Self {
            max_retries: 4,
            backoff: BackoffConfig {
                base_delay_ms: 2000,
                max_delay_ms: 60_000,
                multiplier: 2.0,
                jitter_ms: 500,
            },
        }
    }
}

/// Run `op`, retrying classified-retryable failures up to the configured
/// bound. Non-retryable failures propagate immediately without sleeping;
/// exhaustion surfaces the last classified error.
pub async fn retry<T, F, Fut>(
    mut op: F,
    config: &RetryConfig,
    service: &str,
    context: Option<&str>,
) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RpcError>>,
{
    for attempt in 0..=config.max_retries {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let classified = classify(err, service, context);
                if !classified.is_retryable() || attempt == config.max_retries {
                    return Err(classified);
                }

                let delay = next_delay(&config.backoff, attempt);
                tracing::warn!(
                    "Retryable error from '{service}' (attempt {}/{}): {classified}. Retrying in {}ms...",
                    attempt + 1,
                    config.max_retries + 1,
                    delay.as_millis(),
                );
                tokio::time::sleep(delay).await;
            }
        }
    }

    // Unreachable: the loop always returns on the last attempt
    unreachable!("retry loop should have returned")
}

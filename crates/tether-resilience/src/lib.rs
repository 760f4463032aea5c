//! Resilience primitives shared across external services.
//!
//! Generic building blocks, each independent of the others: exponential
//! backoff with jitter, a per-service rate limiter, an error classifier
//! producing the retryable taxonomy, a bounded retry executor, and a
//! circuit breaker with a permanent always-closed variant for connections
//! that must never be abandoned.

pub mod backoff;
pub mod breaker;
pub mod classify;
pub mod limiter;
pub mod retry;

pub use backoff::{BackoffConfig, next_delay};
pub use breaker::{BreakerConfig, BreakerSnapshot, BreakerState, CircuitBreaker};
pub use classify::classify;
pub use limiter::RateLimiter;
pub use retry::{RetryConfig, retry};

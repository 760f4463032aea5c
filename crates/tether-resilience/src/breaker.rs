//! Circuit breaker with a permanent always-closed variant.

use serde::Serialize;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tether_types::{ErrorKind, ServiceError};

/// Breaker configuration for the tripping variant.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// How long the circuit stays open before allowing one probe.
    pub reset_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
    PermanentlyClosed,
}

impl BreakerState {
    pub fn as_str(self) -> &'static str {
        match self {
            BreakerState::Closed => "CLOSED",
            BreakerState::Open => "OPEN",
            BreakerState::HalfOpen => "HALF_OPEN",
            BreakerState::PermanentlyClosed => "PERMANENTLY_CLOSED",
        }
    }
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view of breaker bookkeeping.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    pub failure_count: u32,
    /// Milliseconds since the last recorded failure, if any.
    pub last_failure_age_ms: Option<u64>,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    failures: u32,
    last_failure: Option<Instant>,
    probe_started: Option<Instant>,
}

enum Mode {
    Tripping {
        config: BreakerConfig,
        inner: Mutex<Inner>,
    },
    /// For connections that must never be abandoned: the cost of giving up
    /// on the single backing service exceeds the cost of repeated attempts.
    Permanent,
}

/// Wraps operations against one service, failing fast while the service
/// looks unavailable.
pub struct CircuitBreaker {
    service: String,
    mode: Mode,
}

impl CircuitBreaker {
    /// Standard tripping breaker.
    pub fn new(service: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            service: service.into(),
            mode: Mode::Tripping {
                config,
                inner: Mutex::new(Inner {
                    state: BreakerState::Closed,
                    failures: 0,
                    last_failure: None,
                    probe_started: None,
                }),
            },
        }
    }

    /// Permanent variant: `execute` always invokes the operation and
    /// propagates its outcome without ever tripping. Callers that need
    /// fail-fast behavior should use the standard variant instead.
    pub fn permanent(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            mode: Mode::Permanent,
        }
    }

    /// Run `op` through the breaker.
    ///
    /// While open, fails fast without invoking the operation — the error is
    /// distinct from a wrapped-operation failure and names the breaker.
    pub async fn execute<T, F, Fut>(&self, op: F) -> Result<T, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let Mode::Tripping { config, inner } = &self.mode else {
            return op().await;
        };

        {
            let mut inner = inner.lock().expect("breaker lock poisoned");
            match inner.state {
                BreakerState::Closed => {}
                BreakerState::HalfOpen => {
                    // One probe at a time; admit a new one only if the
                    // previous probe never settled within a full timeout
                    let stale = inner
                        .probe_started
                        .is_none_or(|t| t.elapsed() >= config.reset_timeout);
                    if stale {
                        inner.probe_started = Some(Instant::now());
                    } else {
                        return Err(self.open_error());
                    }
                }
                BreakerState::Open => {
                    let expired = inner
                        .last_failure
                        .is_none_or(|t| t.elapsed() >= config.reset_timeout);
                    if expired {
                        tracing::info!(
                            service = %self.service,
                            "Circuit breaker transition: OPEN -> HALF_OPEN"
                        );
                        inner.state = BreakerState::HalfOpen;
                        inner.probe_started = Some(Instant::now());
                    } else {
                        return Err(self.open_error());
                    }
                }
                BreakerState::PermanentlyClosed => unreachable!("tripping breaker"),
            }
        }

        let result = op().await;

        {
            let mut inner = inner.lock().expect("breaker lock poisoned");
            match &result {
                Ok(_) => {
                    if inner.state != BreakerState::Closed {
                        tracing::info!(
                            service = %self.service,
                            "Circuit breaker transition: {} -> CLOSED",
                            inner.state
                        );
                    }
                    inner.state = BreakerState::Closed;
                    inner.failures = 0;
                    inner.probe_started = None;
                }
                Err(_) => {
                    inner.failures += 1;
                    inner.last_failure = Some(Instant::now());
                    match inner.state {
                        BreakerState::HalfOpen => {
                            tracing::warn!(
                                service = %self.service,
                                "Circuit breaker transition: HALF_OPEN -> OPEN"
                            );
                            inner.state = BreakerState::Open;
                            inner.probe_started = None;
                        }
                        BreakerState::Closed if inner.failures >= config.failure_threshold => {
                            tracing::warn!(
                                service = %self.service,
                                failures = inner.failures,
                                "Circuit breaker transition: CLOSED -> OPEN"
                            );
                            inner.state = BreakerState::Open;
                        }
                        _ => {}
                    }
                }
            }
        }

        result
    }

    /// Current bookkeeping. The permanent variant always reports a fixed
    /// always-closed snapshot.
    pub fn snapshot(&self) -> BreakerSnapshot {
        match &self.mode {
            Mode::Permanent => BreakerSnapshot {
                state: BreakerState::PermanentlyClosed,
                failure_count: 0,
                last_failure_age_ms: None,
            },
            Mode::Tripping { inner, .. } => {
                let inner = inner.lock().expect("breaker lock poisoned");
                BreakerSnapshot {
                    state: inner.state,
                    failure_count: inner.failures,
                    last_failure_age_ms: inner
                        .last_failure
                        .map(|t| t.elapsed().as_millis() as u64),
                }
            }
        }
    }

    fn open_error(&self) -> ServiceError {
        ServiceError::new(
            ErrorKind::Unavailable,
            self.service.clone(),
            "circuit breaker open; service likely unavailable",
            None,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn service_failure() -> ServiceError {
        ServiceError::new(ErrorKind::Unavailable, "toolserver", "boom", None)
    }

    fn counted_op(
        calls: &Arc<AtomicU32>,
        outcome: Result<u32, ()>,
    ) -> impl Future<Output = Result<u32, ServiceError>> {
        let calls = Arc::clone(calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            outcome.map_err(|_| service_failure())
        }
    }

    #[tokio::test]
    async fn closed_breaker_passes_operations_through() {
        let breaker = CircuitBreaker::new("toolserver", BreakerConfig::default());
        let result = breaker.execute(|| async { Ok::<_, ServiceError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(breaker.snapshot().state, BreakerState::Closed);
    }

    #[tokio::test]
    async fn opens_after_threshold_and_fails_fast() {
        let breaker = CircuitBreaker::new(
            "toolserver",
            BreakerConfig {
                failure_threshold: 3,
                reset_timeout: Duration::from_secs(60),
            },
        );
        let calls = Arc::new(AtomicU32::new(0));

        for _ in 0..3 {
            let _ = breaker.execute(|| counted_op(&calls, Err(()))).await;
        }
        assert_eq!(breaker.snapshot().state, BreakerState::Open);
        assert_eq!(breaker.snapshot().failure_count, 3);

        // The wrapped operation is not invoked while open
        let result = breaker.execute(|| counted_op(&calls, Ok(1))).await;
        let err = result.unwrap_err();
        assert!(err.message.contains("circuit breaker open"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn half_open_success_closes_and_resets() {
        let breaker = CircuitBreaker::new(
            "toolserver",
            BreakerConfig {
                failure_threshold: 1,
                reset_timeout: Duration::from_millis(30),
            },
        );
        let calls = Arc::new(AtomicU32::new(0));

        let _ = breaker.execute(|| counted_op(&calls, Err(()))).await;
        assert_eq!(breaker.snapshot().state, BreakerState::Open);

        tokio::time::sleep(Duration::from_millis(50)).await;

        let result = breaker.execute(|| counted_op(&calls, Ok(9))).await;
        assert_eq!(result.unwrap(), 9);

        let snap = breaker.snapshot();
        assert_eq!(snap.state, BreakerState::Closed);
        assert_eq!(snap.failure_count, 0);
    }

    #[tokio::test]
    async fn half_open_failure_reopens() {
        let breaker = CircuitBreaker::new(
            "toolserver",
            BreakerConfig {
                failure_threshold: 1,
                reset_timeout: Duration::from_millis(30),
            },
        );
        let calls = Arc::new(AtomicU32::new(0));

        let _ = breaker.execute(|| counted_op(&calls, Err(()))).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let _ = breaker.execute(|| counted_op(&calls, Err(()))).await;
        assert_eq!(breaker.snapshot().state, BreakerState::Open);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn success_resets_the_failure_count() {
        let breaker = CircuitBreaker::new(
            "toolserver",
            BreakerConfig {
                failure_threshold: 3,
                reset_timeout: Duration::from_secs(60),
            },
        );
        let calls = Arc::new(AtomicU32::new(0));

        let _ = breaker.execute(|| counted_op(&calls, Err(()))).await;
        let _ = breaker.execute(|| counted_op(&calls, Err(()))).await;
        assert_eq!(breaker.snapshot().failure_count, 2);

        let _ = breaker.execute(|| counted_op(&calls, Ok(1))).await;
        assert_eq!(breaker.snapshot().failure_count, 0);
        assert_eq!(breaker.snapshot().state, BreakerState::Closed);
    }

    #[tokio::test]
    async fn permanent_variant_never_trips() {
        let breaker = CircuitBreaker::permanent("toolserver");
        let calls = Arc::new(AtomicU32::new(0));

        for _ in 0..20 {
            let result = breaker.execute(|| counted_op(&calls, Err(()))).await;
            // Every failure still propagates to the caller
            assert!(result.is_err());
        }

        // The operation ran every time; nothing was short-circuited
        assert_eq!(calls.load(Ordering::SeqCst), 20);

        let snap = breaker.snapshot();
        assert_eq!(snap.state, BreakerState::PermanentlyClosed);
        assert_eq!(snap.failure_count, 0);
        assert!(snap.last_failure_age_ms.is_none());
    }

    #[tokio::test]
    async fn permanent_variant_passes_successes_through() {
        let breaker = CircuitBreaker::permanent("toolserver");
        let result = breaker.execute(|| async { Ok::<_, ServiceError>("ok") }).await;
        assert_eq!(result.unwrap(), "ok");
    }
}

//! Guarded call execution - breaker + timeout + bounded retry in one wrapper
//!
//! Every adapter call goes through `Guard::execute`, which is the only place
//! the core suspends on I/O. The wrapper guarantees that breaker accounting
//! happens on every exit path and that cancellation abandons the in-flight
//! call without further retries.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::circuit_breaker::{Admission, CircuitBreaker};
use super::retry::RetryPolicy;

// ============================================================================
// Failure classification
// ============================================================================

/// How a wrapped operation failed. Adapters classify their own errors;
/// only transient failures are retried.
#[derive(Debug, Clone)]
pub enum CallFailure {
    /// Timeout, 5xx, connection refused — worth retrying
    Transient(String),
    /// Contract violation, 4xx — retrying cannot help
    Permanent(String),
}

/// Guarded-call outcome seen by the rest of the core.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AdapterError {
    /// Transient failure that survived the whole retry budget
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    /// Call short-circuited by an open breaker
    #[error("circuit open")]
    CircuitOpen,
    /// Input contract violated; never retried
    #[error("validation failed: {0}")]
    ValidationFailed(String),
    /// Caller cancelled; in-flight call abandoned
    #[error("cancelled")]
    Cancelled,
}

impl AdapterError {
    /// Transient errors may succeed on a later invocation.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AdapterError::UpstreamUnavailable(_) | AdapterError::CircuitOpen
        )
    }
}

// ============================================================================
// Metrics
// ============================================================================

/// Point-in-time counter snapshot for cycle logging.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct GuardMetrics {
    pub successes: u64,
    pub failures: u64,
    /// Calls rejected by an open breaker
    pub rejections: u64,
    pub retries: u64,
    pub timeouts: u64,
    pub avg_latency_ms: f64,
}

#[derive(Debug, Default)]
struct Counters {
    successes: AtomicU64,
    failures: AtomicU64,
    rejections: AtomicU64,
    retries: AtomicU64,
    timeouts: AtomicU64,
    latency_us_total: AtomicU64,
    latency_samples: AtomicU64,
}

// ============================================================================
// Guard
// ============================================================================

/// Per-adapter execution guard. Breaker state is shared by all clones.
#[derive(Clone)]
pub struct Guard {
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    call_timeout: Duration,
    counters: Arc<Counters>,
    jitter_rng: Arc<Mutex<StdRng>>,
}

impl Guard {
    pub fn new(
        breaker: Arc<CircuitBreaker>,
        retry: RetryPolicy,
        call_timeout: Duration,
        jitter_seed: u64,
    ) -> Self {
        Self {
            breaker,
            retry,
            call_timeout,
            counters: Arc::new(Counters::default()),
            jitter_rng: Arc::new(Mutex::new(StdRng::seed_from_u64(jitter_seed))),
        }
    }

    /// Run `op` under breaker, per-call timeout and bounded retry.
    ///
    /// The retry loop stops as soon as total elapsed time exceeds
    /// `max_attempts × call_timeout`, independent of attempts remaining.
    /// Cancellation abandons the in-flight call; no further retries.
    pub async fn execute<T, F, Fut>(
        &self,
        op_name: &str,
        cancel: &CancellationToken,
        op: F,
    ) -> Result<T, AdapterError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, CallFailure>>,
    {
        let overall_budget = self.call_timeout * self.retry.max_attempts;
        let started = Instant::now();
        let mut last_error = String::new();

        for attempt in 1..=self.retry.max_attempts {
            if cancel.is_cancelled() {
                return Err(AdapterError::Cancelled);
            }
            if attempt > 1 {
                let delay = self.retry.delay_before(attempt, self.jitter_draw());
                if started.elapsed() + delay >= overall_budget {
                    debug!(op = op_name, attempt, "Retry budget exhausted before delay");
                    break;
                }
                self.counters.retries.fetch_add(1, Ordering::Relaxed);
                tokio::select! {
                    _ = cancel.cancelled() => return Err(AdapterError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            match self.breaker.admit() {
                Admission::Rejected => {
                    self.counters.rejections.fetch_add(1, Ordering::Relaxed);
                    return Err(AdapterError::CircuitOpen);
                }
                Admission::Allowed => {}
            }

            let call_started = Instant::now();
            let outcome = tokio::select! {
                _ = cancel.cancelled() => {
                    // Abandon the in-flight call; its late result is discarded.
                    return Err(AdapterError::Cancelled);
                }
                res = tokio::time::timeout(self.call_timeout, op()) => res,
            };
            let latency = call_started.elapsed();

            match outcome {
                Ok(Ok(value)) => {
                    self.breaker.record_success();
                    self.counters.successes.fetch_add(1, Ordering::Relaxed);
                    self.record_latency(latency);
                    return Ok(value);
                }
                Ok(Err(CallFailure::Permanent(reason))) => {
                    // Upstream is healthy; the input is not. Don't trip the
                    // breaker or retry.
                    self.counters.failures.fetch_add(1, Ordering::Relaxed);
                    self.record_latency(latency);
                    return Err(AdapterError::ValidationFailed(reason));
                }
                Ok(Err(CallFailure::Transient(reason))) => {
                    warn!(op = op_name, attempt, reason = %reason, "Guarded call failed");
                    self.breaker.record_failure();
                    self.counters.failures.fetch_add(1, Ordering::Relaxed);
                    self.record_latency(latency);
                    last_error = reason;
                }
                Err(_elapsed) => {
                    warn!(op = op_name, attempt, timeout = ?self.call_timeout, "Guarded call timed out");
                    self.breaker.record_failure();
                    self.counters.timeouts.fetch_add(1, Ordering::Relaxed);
                    last_error = format!("timed out after {:?}", self.call_timeout);
                }
            }

            if started.elapsed() >= overall_budget {
                debug!(op = op_name, attempt, "Overall call budget exhausted");
                break;
            }
        }

        Err(AdapterError::UpstreamUnavailable(last_error))
    }

    /// Counter snapshot for cycle logging.
    pub fn metrics(&self) -> GuardMetrics {
        let samples = self.counters.latency_samples.load(Ordering::Relaxed);
        let avg_latency_ms = if samples > 0 {
            self.counters.latency_us_total.load(Ordering::Relaxed) as f64 / samples as f64 / 1000.0
        } else {
            0.0
        };
        GuardMetrics {
            successes: self.counters.successes.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
            rejections: self.counters.rejections.load(Ordering::Relaxed),
            retries: self.counters.retries.load(Ordering::Relaxed),
            timeouts: self.counters.timeouts.load(Ordering::Relaxed),
            avg_latency_ms,
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    fn record_latency(&self, latency: Duration) {
        self.counters
            .latency_us_total
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
        self.counters.latency_samples.fetch_add(1, Ordering::Relaxed);
    }

    #[allow(clippy::unwrap_used)]
    fn jitter_draw(&self) -> f64 {
        self.jitter_rng.lock().unwrap().gen_range(-1.0..=1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::circuit_breaker::BreakerConfig;
    use std::sync::atomic::AtomicU32;

    fn guard(max_attempts: u32, timeout_ms: u64) -> Guard {
        Guard::new(
            Arc::new(CircuitBreaker::new("test", BreakerConfig::default())),
            RetryPolicy {
                max_attempts,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(10),
                jitter_ratio: 0.0,
                ..Default::default()
            },
            Duration::from_millis(timeout_ms),
            7,
        )
    }

    #[tokio::test]
    async fn success_passes_through() {
        let g = guard(3, 100);
        let cancel = CancellationToken::new();
        let out: Result<u32, _> = g.execute("op", &cancel, || async { Ok(41) }).await;
        assert_eq!(out.unwrap(), 41);
        assert_eq!(g.metrics().successes, 1);
    }

    #[tokio::test]
    async fn transient_failure_retried_until_success() {
        let g = guard(3, 100);
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);
        let out = g
            .execute("op", &cancel, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(CallFailure::Transient("boom".to_string()))
                    } else {
                        Ok(7u32)
                    }
                }
            })
            .await;
        assert_eq!(out.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(g.metrics().retries, 2);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_unavailable() {
        let g = guard(2, 100);
        let cancel = CancellationToken::new();
        let out: Result<u32, _> = g
            .execute("op", &cancel, || async {
                Err(CallFailure::Transient("down".to_string()))
            })
            .await;
        assert_eq!(
            out.unwrap_err(),
            AdapterError::UpstreamUnavailable("down".to_string())
        );
    }

    #[tokio::test]
    async fn permanent_failure_never_retried() {
        let g = guard(3, 100);
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);
        let out: Result<u32, _> = g
            .execute("op", &cancel, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(CallFailure::Permanent("bad expr".to_string())) }
            })
            .await;
        assert!(matches!(out, Err(AdapterError::ValidationFailed(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn open_breaker_rejects_without_invoking() {
        let breaker = Arc::new(CircuitBreaker::new(
            "test",
            BreakerConfig {
                failure_threshold: 1,
                recovery_after: Duration::from_secs(60),
                half_open_probe_count: 1,
            },
        ));
        breaker.record_failure();
        let g = Guard::new(
            breaker,
            RetryPolicy::default(),
            Duration::from_millis(100),
            7,
        );
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);
        let out: Result<u32, _> = g
            .execute("op", &cancel, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(1) }
            })
            .await;
        assert_eq!(out.unwrap_err(), AdapterError::CircuitOpen);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(g.metrics().rejections, 1);
    }

    #[tokio::test]
    async fn cancellation_stops_retries() {
        let g = guard(3, 100);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let out: Result<u32, _> = g.execute("op", &cancel, || async { Ok(3) }).await;
        assert_eq!(out.unwrap_err(), AdapterError::Cancelled);
    }

    #[tokio::test]
    async fn timeout_counts_and_retries() {
        let g = guard(2, 10);
        let cancel = CancellationToken::new();
        let out: Result<u32, _> = g
            .execute("op", &cancel, || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(1)
            })
            .await;
        assert!(matches!(out, Err(AdapterError::UpstreamUnavailable(_))));
        assert!(g.metrics().timeouts >= 1);
    }
}

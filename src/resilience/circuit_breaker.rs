//! Circuit breaker - per-adapter failure isolation
//!
//! CLOSED passes calls through and counts consecutive failures. Reaching the
//! failure threshold trips the breaker to OPEN, where calls fail immediately
//! without invoking the upstream. After the recovery interval the breaker
//! moves to HALF_OPEN and admits a limited number of probe calls; a probe
//! success closes the breaker, a probe failure re-opens it.

use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Breaker state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Breaker tuning.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures that trip the breaker
    pub failure_threshold: u32,
    /// Time an open breaker waits before probing
    pub recovery_after: Duration,
    /// Probe calls admitted while half-open
    pub half_open_probe_count: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_after: Duration::from_secs(60),
            half_open_probe_count: 1,
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probes_in_flight: u32,
}

/// Shared breaker; one instance per adapter, shared across all tasks of the
/// process. State transitions happen under a single mutex.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

/// Verdict of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Proceed with the call
    Allowed,
    /// Breaker is open; fail fast without invoking the upstream
    Rejected,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                probes_in_flight: 0,
            }),
        }
    }

    /// Check whether a call may proceed, transitioning OPEN → HALF_OPEN when
    /// the recovery interval has elapsed.
    pub fn admit(&self) -> Admission {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => Admission::Allowed,
            BreakerState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::ZERO);
                if elapsed >= self.config.recovery_after {
                    info!(breaker = %self.name, "Circuit half-open, probing upstream");
                    inner.state = BreakerState::HalfOpen;
                    inner.probes_in_flight = 1;
                    Admission::Allowed
                } else {
                    Admission::Rejected
                }
            }
            BreakerState::HalfOpen => {
                if inner.probes_in_flight < self.config.half_open_probe_count {
                    inner.probes_in_flight += 1;
                    Admission::Allowed
                } else {
                    Admission::Rejected
                }
            }
        }
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => {
                inner.consecutive_failures = 0;
            }
            BreakerState::HalfOpen => {
                info!(breaker = %self.name, "Probe succeeded, circuit closed");
                inner.state = BreakerState::Closed;
                inner.consecutive_failures = 0;
                inner.probes_in_flight = 0;
                inner.opened_at = None;
            }
            BreakerState::Open => {
                // Late success from a call admitted before the trip; ignore.
            }
        }
    }

    /// Record a failed call, tripping the breaker at the threshold.
    pub fn record_failure(&self) {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    warn!(
                        breaker = %self.name,
                        failures = inner.consecutive_failures,
                        "Circuit opened"
                    );
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            BreakerState::HalfOpen => {
                warn!(breaker = %self.name, "Probe failed, circuit re-opened");
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                inner.probes_in_flight = 0;
            }
            BreakerState::Open => {}
        }
    }

    pub fn state(&self) -> BreakerState {
        self.lock().state
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[allow(clippy::unwrap_used)]
    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        // Mutex poisoning is unrecoverable for breaker state; propagating a
        // poisoned lock would wedge every adapter call behind it.
        self.inner.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, recovery_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            BreakerConfig {
                failure_threshold: threshold,
                recovery_after: Duration::from_millis(recovery_ms),
                half_open_probe_count: 1,
            },
        )
    }

    #[test]
    fn closed_admits_calls() {
        let b = breaker(3, 100);
        assert_eq!(b.admit(), Admission::Allowed);
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[test]
    fn trips_at_threshold() {
        let b = breaker(3, 60_000);
        b.record_failure();
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Closed);
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Open);
        assert_eq!(b.admit(), Admission::Rejected);
    }

    #[test]
    fn success_resets_failure_count() {
        let b = breaker(3, 60_000);
        b.record_failure();
        b.record_failure();
        b.record_success();
        b.record_failure();
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_after_recovery_then_closes_on_success() {
        let b = breaker(1, 0);
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Open);
        // recovery_after=0 so the next admit probes immediately
        assert_eq!(b.admit(), Admission::Allowed);
        assert_eq!(b.state(), BreakerState::HalfOpen);
        b.record_success();
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_reopens_on_probe_failure() {
        let b = breaker(1, 0);
        b.record_failure();
        assert_eq!(b.admit(), Admission::Allowed);
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Open);
    }

    #[test]
    fn half_open_limits_probes() {
        let b = breaker(1, 0);
        b.record_failure();
        assert_eq!(b.admit(), Admission::Allowed);
        // Second concurrent probe rejected while the first is in flight
        assert_eq!(b.admit(), Admission::Rejected);
    }
}

//! Resilience primitives: circuit breaker, bounded retry, guarded execution
//!
//! Every external call the core makes is wrapped by a `Guard`, which owns a
//! shared per-adapter `CircuitBreaker`, a `RetryPolicy` and a per-call
//! timeout, and exposes counters for cycle logging.

mod circuit_breaker;
mod guard;
mod retry;

pub use circuit_breaker::{Admission, BreakerConfig, BreakerState, CircuitBreaker};
pub use guard::{AdapterError, CallFailure, Guard, GuardMetrics};
pub use retry::RetryPolicy;

use crate::config::ResilienceConfig;
use std::sync::Arc;
use std::time::Duration;

/// Build a named guard from the shared resilience configuration.
pub fn guard_from_config(name: &str, config: &ResilienceConfig, jitter_seed: u64) -> Guard {
    let breaker = Arc::new(CircuitBreaker::new(
        name,
        BreakerConfig {
            failure_threshold: config.failure_threshold,
            recovery_after: Duration::from_secs(config.recovery_secs),
            half_open_probe_count: config.half_open_probes,
        },
    ));
    let retry = RetryPolicy {
        max_attempts: config.max_attempts,
        base: config.backoff_base,
        initial_delay: Duration::from_secs_f64(config.initial_delay_secs),
        max_delay: Duration::from_secs_f64(config.max_delay_secs),
        jitter_ratio: config.jitter_ratio,
    };
    Guard::new(
        breaker,
        retry,
        Duration::from_secs(config.call_timeout_secs),
        jitter_seed,
    )
}

//! System-wide default constants.
//!
//! Centralises tuning values so they are discoverable in one place.
//! Grouped by subsystem.

// ============================================================================
// Controller
// ============================================================================

/// Interval between controller ticks (seconds).
pub const TICK_INTERVAL_SECS: u64 = 30;

/// Global investigation deadline shared by all specialists (seconds).
pub const GLOBAL_DEADLINE_SECS: u64 = 30;

// ============================================================================
// Ingestion
// ============================================================================

/// Per-fingerprint deduplication window (seconds).
pub const DEDUP_WINDOW_SECS: i64 = 60;

/// Time-window truncation step for clustering (seconds). 300 = 5 minutes.
pub const CLUSTER_WINDOW_SECS: i64 = 300;

/// Characters of description folded into a derived fingerprint.
pub const FINGERPRINT_DESCRIPTION_CHARS: usize = 120;

// ============================================================================
// Correlation analyzer
// ============================================================================

/// Minimum aligned sample count for a correlation estimate.
pub const MIN_SAMPLE_SIZE: usize = 20;

/// Default lag search half-width (samples).
pub const MAX_LAG: usize = 5;

/// Prior probability that a detected correlation is real.
pub const CORRELATION_PRIOR: f64 = 0.3;

/// |z| above which a sample counts as an anomaly.
pub const ANOMALY_Z_THRESHOLD: f64 = 3.0;

/// Fraction of anomalous samples above which a series is marked noisy.
pub const NOISY_SERIES_FRACTION: f64 = 0.05;

/// Soft CPU budget per correlation (milliseconds). Exceeding it logs a
/// warning but never cancels the computation.
pub const CORRELATION_BUDGET_MS: u128 = 200;

/// Soft CPU budget per decision fusion (milliseconds).
pub const DECISION_BUDGET_MS: u128 = 500;

// ============================================================================
// Resilience
// ============================================================================

/// Consecutive failures that trip a circuit breaker.
pub const BREAKER_FAILURE_THRESHOLD: u32 = 5;

/// Time an open breaker waits before probing (seconds).
pub const BREAKER_RECOVERY_SECS: u64 = 60;

/// Probe calls allowed in the half-open state.
pub const BREAKER_HALF_OPEN_PROBES: u32 = 1;

/// Maximum retry attempts for transient adapter failures.
pub const RETRY_MAX_ATTEMPTS: u32 = 3;

/// Exponential backoff base.
pub const RETRY_BASE: f64 = 2.0;

/// Initial retry delay (seconds).
pub const RETRY_INITIAL_DELAY_SECS: f64 = 1.0;

/// Retry delay ceiling (seconds).
pub const RETRY_MAX_DELAY_SECS: f64 = 60.0;

/// Jitter applied to each retry delay, as a fraction of the delay.
pub const RETRY_JITTER_RATIO: f64 = 0.2;

/// Per-call adapter timeout (seconds).
pub const CALL_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Decision engine
// ============================================================================

/// A specialist whose quality score meets this bound and strictly beats all
/// others supplies the hypothesis alone.
pub const DOMINANT_QUALITY_THRESHOLD: f64 = 0.8;

/// Multiplicative confidence penalty when top specialists conflict.
pub const CONFLICT_PENALTY: f64 = 0.85;

/// Confidence ceiling for a degraded investigation (zero successes).
pub const DEGRADED_CONFIDENCE_CEILING: f64 = 0.3;

// ============================================================================
// Playbook store
// ============================================================================

/// Optimistic-write retry limit for playbook statistics updates.
pub const STATS_CAS_MAX_RETRIES: u32 = 5;

/// Backoff between statistics CAS retries (milliseconds).
pub const STATS_CAS_BACKOFF_MS: u64 = 20;

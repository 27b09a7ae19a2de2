//! Replay types: ReplayMode, ReplayEvent, divergence classification, report

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Alert, DecisionCandidate, ExecutionOutcome, SemanticVersion};

/// What the replay run is for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplayMode {
    Validation,
    Training,
    Simulation,
    Audit,
}

/// One entry in the immutable replay ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayEvent {
    pub recorded_at: DateTime<Utc>,
    pub alert: Alert,
    pub decision: DecisionCandidate,
    pub playbook_id: Option<String>,
    pub playbook_version: Option<SemanticVersion>,
    pub outcome: Option<ExecutionOutcome>,
}

/// How a replayed decision compares with the original.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DivergenceClass {
    /// Decision identical to the original
    Match,
    /// Different decision within the same risk bucket
    DivergenceSafe,
    /// High-risk original became auto-approvable in replay, or vice versa
    DivergenceUnsafe,
}

/// Aggregate outcome of one replay run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayReport {
    pub mode: ReplayMode,
    pub events_replayed: usize,
    pub matches: usize,
    pub safe_divergences: usize,
    /// Must be zero for a validation run to pass
    pub unsafe_bypass_count: usize,
    /// matches / events_replayed
    pub alignment_rate: f64,
    /// Fraction of replays landing in the original confidence bucket,
    /// keyed by bucket lower bound in tenths
    pub confidence_bucket_precision: Vec<(u8, f64)>,
    pub passed: bool,
}

impl ReplayReport {
    pub fn failed_validation(&self) -> bool {
        self.mode == ReplayMode::Validation && self.unsafe_bypass_count > 0
    }
}

//! Investigation types: EvidenceItem, SpecialistResult, InvestigationReport

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// Evidence
// ============================================================================

/// Signal domain an evidence item came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvidenceKind {
    Metric,
    Log,
    Trace,
    Event,
    GraphRelation,
    Document,
    SimilarIncident,
}

/// A single piece of support for a specialist hypothesis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvidenceItem {
    pub kind: EvidenceKind,
    /// Identifier of the query/pod/node that produced this evidence
    pub source: String,
    pub description: String,
    /// Quality in [0, 1]; feeds specialist quality scoring
    pub quality: f64,
    pub timestamp: DateTime<Utc>,
    /// Numeric payload where the evidence is a measurement
    pub value: Option<f64>,
}

// ============================================================================
// Specialist result
// ============================================================================

/// How a specialist's run ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum CompletionStatus {
    Success,
    Timeout,
    Error { kind: String },
}

impl CompletionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, CompletionStatus::Success)
    }
}

/// Output of one specialist in the investigation swarm.
///
/// Immutable once emitted; exactly one per registered specialist per
/// investigation, with synthetic `Timeout` results filling in for
/// specialists that missed the deadline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialistResult {
    /// Stable specialist identifier; the coordinator orders results by it
    pub specialist_id: String,
    pub hypothesis: String,
    /// Base confidence in [0, 1] before evidence weighting
    pub confidence: f64,
    pub evidence: Vec<EvidenceItem>,
    pub suggested_actions: Vec<String>,
    pub status: CompletionStatus,
    pub elapsed: Duration,
}

impl SpecialistResult {
    /// Synthetic result for a specialist that did not finish in time.
    pub fn timed_out(specialist_id: &str, elapsed: Duration) -> Self {
        Self {
            specialist_id: specialist_id.to_string(),
            hypothesis: String::new(),
            confidence: 0.0,
            evidence: Vec::new(),
            suggested_actions: Vec::new(),
            status: CompletionStatus::Timeout,
            elapsed,
        }
    }

    /// Synthetic result for a specialist that failed.
    pub fn errored(specialist_id: &str, kind: &str, elapsed: Duration) -> Self {
        Self {
            specialist_id: specialist_id.to_string(),
            hypothesis: String::new(),
            confidence: 0.0,
            evidence: Vec::new(),
            suggested_actions: Vec::new(),
            status: CompletionStatus::Error {
                kind: kind.to_string(),
            },
            elapsed,
        }
    }

    /// Mean evidence quality, 0.0 when the specialist produced no evidence.
    pub fn evidence_quality(&self) -> f64 {
        if self.evidence.is_empty() {
            return 0.0;
        }
        self.evidence.iter().map(|e| e.quality).sum::<f64>() / self.evidence.len() as f64
    }
}

/// Aggregate output of one swarm investigation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestigationReport {
    pub cluster_id: String,
    /// Results ordered by specialist id, one per registered specialist
    pub results: Vec<SpecialistResult>,
    /// True when zero specialists completed successfully
    pub degraded: bool,
}

//! Playbook types: Playbook, PlaybookStep, PlaybookStats, PlaybookExecution,
//! lifecycle status and semantic version

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Lifecycle and provenance
// ============================================================================

/// Where a playbook came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaybookSource {
    HumanWritten,
    LlmGenerated,
    Hybrid,
}

/// Lifecycle state. DRAFT is initial; ARCHIVED is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaybookStatus {
    Draft,
    PendingReview,
    Active,
    Deprecated,
    Archived,
}

impl std::fmt::Display for PlaybookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PlaybookStatus::Draft => "DRAFT",
            PlaybookStatus::PendingReview => "PENDING_REVIEW",
            PlaybookStatus::Active => "ACTIVE",
            PlaybookStatus::Deprecated => "DEPRECATED",
            PlaybookStatus::Archived => "ARCHIVED",
        };
        write!(f, "{s}")
    }
}

// ============================================================================
// Semantic version
// ============================================================================

/// major.minor.patch version of a playbook.
///
/// MAJOR changes alter the step list or rollback semantics, MINOR adds
/// auxiliary steps or refines wording, PATCH is text-only.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
pub struct SemanticVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl SemanticVersion {
    pub fn initial() -> Self {
        Self { major: 1, minor: 0, patch: 0 }
    }

    pub fn bump_major(self) -> Self {
        Self { major: self.major + 1, minor: 0, patch: 0 }
    }

    pub fn bump_minor(self) -> Self {
        Self { minor: self.minor + 1, patch: 0, ..self }
    }

    pub fn bump_patch(self) -> Self {
        Self { patch: self.patch + 1, ..self }
    }
}

impl std::fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

// ============================================================================
// Steps and statistics
// ============================================================================

/// One ordered remediation step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaybookStep {
    pub index: usize,
    pub title: String,
    pub description: String,
    pub commands: Vec<String>,
    pub expected_output: String,
    pub rollback_command: Option<String>,
}

/// Incremental execution statistics (Welford accumulator).
///
/// All counters and both accumulators are updated together in one
/// transaction per execution record; `record` is the only mutator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PlaybookStats {
    pub total_executions: u64,
    pub success_count: u64,
    pub failure_count: u64,
    /// Running mean of execution duration in seconds
    pub mean_duration: f64,
    /// Welford M2 accumulator for duration variance
    pub m2_duration: f64,
    pub last_executed_at: Option<DateTime<Utc>>,
}

impl PlaybookStats {
    /// Fold one execution into the accumulator.
    pub fn record(&mut self, success: bool, duration_secs: f64, at: DateTime<Utc>) {
        let n = self.total_executions + 1;
        self.total_executions = n;
        if success {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
        let delta = duration_secs - self.mean_duration;
        self.mean_duration += delta / n as f64;
        self.m2_duration += delta * (duration_secs - self.mean_duration);
        self.last_executed_at = Some(at);
    }

    /// Sample variance of duration, 0 below two samples.
    pub fn duration_variance(&self) -> f64 {
        if self.total_executions >= 2 {
            self.m2_duration / (self.total_executions - 1) as f64
        } else {
            0.0
        }
    }

    /// success_count / total, 0 with no executions.
    pub fn success_rate(&self) -> f64 {
        if self.total_executions == 0 {
            return 0.0;
        }
        self.success_count as f64 / self.total_executions as f64
    }
}

// ============================================================================
// Playbook
// ============================================================================

/// A versioned remediation recipe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playbook {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Correlation pattern type this playbook remediates
    pub pattern_type: String,
    /// Service pattern this playbook targets
    pub service_pattern: String,
    pub steps: Vec<PlaybookStep>,
    pub estimated_duration_secs: u64,
    pub automation: super::AutomationLevel,
    pub risk: super::RiskLevel,
    pub prerequisites: Vec<String>,
    pub success_criteria: Vec<String>,
    pub rollback_procedure: String,
    pub source: PlaybookSource,
    pub status: PlaybookStatus,
    pub version: SemanticVersion,
    /// Id of the version this one superseded, if any
    pub previous_version_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
    /// Note retained when a review rejects the playbook
    pub rejection_note: Option<String>,
    pub stats: PlaybookStats,
}

// ============================================================================
// Execution record
// ============================================================================

/// Outcome of one playbook execution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionOutcome {
    Success,
    Failure,
    Partial,
    RolledBack,
}

impl ExecutionOutcome {
    /// Only a full SUCCESS counts towards the success rate.
    pub fn is_success(self) -> bool {
        matches!(self, ExecutionOutcome::Success)
    }
}

/// Immutable record of one execution of a playbook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybookExecution {
    pub id: String,
    pub playbook_id: String,
    pub decision_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub outcome: ExecutionOutcome,
    pub duration_secs: f64,
    pub steps_attempted: usize,
    pub steps_completed: usize,
    pub error: Option<String>,
    pub feedback: Option<String>,
}

//! Decision types: RiskLevel, AutomationLevel, DecisionType, DecisionCandidate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::EvidenceItem;

// ============================================================================
// Risk and automation grading
// ============================================================================

/// Graded severity of the proposed remediation, ordered MINIMAL < CRITICAL.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    #[default]
    Minimal,
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiskLevel::Minimal => "MINIMAL",
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        };
        write!(f, "{s}")
    }
}

/// How much of a remediation may execute without human approval.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AutomationLevel {
    #[default]
    Manual,
    Assisted,
    Full,
}

impl RiskLevel {
    /// Ceiling on automation permitted at this risk level.
    ///
    /// CRITICAL never automates; HIGH caps at ASSISTED.
    pub fn max_automation(self) -> AutomationLevel {
        match self {
            RiskLevel::Critical => AutomationLevel::Manual,
            RiskLevel::High => AutomationLevel::Assisted,
            _ => AutomationLevel::Full,
        }
    }
}

/// Routing outcome of the threshold policy check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionType {
    /// Confidence below policy threshold; a human must investigate
    Escalate,
    /// Passed thresholds with full automation permitted
    AutoApprove,
    /// Default path: a human approves before execution
    RequiresApproval,
}

// ============================================================================
// Decision candidate
// ============================================================================

/// The synthesised recommendation from one investigation.
///
/// Invariant: `automation` never exceeds `risk.max_automation()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionCandidate {
    pub id: String,
    pub cluster_id: String,
    pub hypothesis: String,
    /// Aggregated confidence in [0, 1] after conflict/degradation penalties
    pub confidence: f64,
    pub risk: RiskLevel,
    pub automation: AutomationLevel,
    pub decision_type: DecisionType,
    /// True when top specialists disagreed and the hypothesis is consolidated
    pub conflict: bool,
    /// True when the investigation completed with zero successful specialists
    pub degraded: bool,
    pub suggested_actions: Vec<String>,
    pub evidence: Vec<EvidenceItem>,
    pub created_at: DateTime<Utc>,
    /// Version of the fusion model that produced this candidate
    pub model_version: String,
    /// Version of the weight matrix used for fusion
    pub weights_version: String,
    /// Correlates this decision across the audit trail
    pub audit_id: String,
}

impl DecisionCandidate {
    /// Check the risk/automation governance invariant.
    pub fn automation_within_bounds(&self) -> bool {
        self.automation <= self.risk.max_automation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn automation_ordering() {
        assert!(AutomationLevel::Manual < AutomationLevel::Assisted);
        assert!(AutomationLevel::Assisted < AutomationLevel::Full);
    }

    #[test]
    fn risk_caps_automation() {
        assert_eq!(RiskLevel::Critical.max_automation(), AutomationLevel::Manual);
        assert_eq!(RiskLevel::High.max_automation(), AutomationLevel::Assisted);
        assert_eq!(RiskLevel::Medium.max_automation(), AutomationLevel::Full);
        assert_eq!(RiskLevel::Minimal.max_automation(), AutomationLevel::Full);
    }
}

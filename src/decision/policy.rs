//! Named threshold policies gating automation
//!
//! The canonical policy table. `POLICY_NAME` (or `decision.policy` in the
//! config file) selects one of the three named rows; no other source is
//! consulted.

use crate::types::{AutomationLevel, DecisionType};

/// Confidence/consensus thresholds a decision must clear to avoid
/// escalation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdPolicy {
    pub name: &'static str,
    pub min_confidence: f64,
    pub min_consensus: f64,
}

pub const STRICT: ThresholdPolicy = ThresholdPolicy {
    name: "STRICT",
    min_confidence: 0.90,
    min_consensus: 0.95,
};

pub const BALANCED: ThresholdPolicy = ThresholdPolicy {
    name: "BALANCED",
    min_confidence: 0.70,
    min_consensus: 0.80,
};

pub const PERMISSIVE: ThresholdPolicy = ThresholdPolicy {
    name: "PERMISSIVE",
    min_confidence: 0.50,
    min_consensus: 0.60,
};

impl ThresholdPolicy {
    /// Resolve a configured policy name; unknown names fall back to
    /// BALANCED (config validation rejects them before this point).
    pub fn by_name(name: &str) -> ThresholdPolicy {
        match name.to_uppercase().as_str() {
            "STRICT" => STRICT,
            "PERMISSIVE" => PERMISSIVE,
            _ => BALANCED,
        }
    }

    /// Route a graded decision: below threshold escalates to a human,
    /// passing with full automation auto-approves, everything else waits
    /// for approval.
    pub fn classify(&self, confidence: f64, consensus: f64, automation: AutomationLevel) -> DecisionType {
        if confidence < self.min_confidence || consensus < self.min_consensus {
            DecisionType::Escalate
        } else if automation == AutomationLevel::Full {
            DecisionType::AutoApprove
        } else {
            DecisionType::RequiresApproval
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_resolution() {
        assert_eq!(ThresholdPolicy::by_name("strict"), STRICT);
        assert_eq!(ThresholdPolicy::by_name("BALANCED"), BALANCED);
        assert_eq!(ThresholdPolicy::by_name("Permissive"), PERMISSIVE);
        assert_eq!(ThresholdPolicy::by_name("unknown"), BALANCED);
    }

    #[test]
    fn below_threshold_escalates() {
        let t = BALANCED.classify(0.5, 0.9, AutomationLevel::Full);
        assert_eq!(t, DecisionType::Escalate);
        let t = BALANCED.classify(0.9, 0.5, AutomationLevel::Full);
        assert_eq!(t, DecisionType::Escalate);
    }

    #[test]
    fn passing_with_full_automation_auto_approves() {
        let t = PERMISSIVE.classify(0.8, 0.9, AutomationLevel::Full);
        assert_eq!(t, DecisionType::AutoApprove);
    }

    #[test]
    fn passing_without_full_automation_requires_approval() {
        let t = BALANCED.classify(0.9, 0.9, AutomationLevel::Assisted);
        assert_eq!(t, DecisionType::RequiresApproval);
        let t = BALANCED.classify(0.9, 0.9, AutomationLevel::Manual);
        assert_eq!(t, DecisionType::RequiresApproval);
    }
}

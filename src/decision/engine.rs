//! Decision engine - weighted evidence fusion into one graded decision
//!
//! Consumes the id-ordered specialist results of one investigation plus the
//! alert cluster and produces a `DecisionCandidate`:
//!
//! 1. Per-specialist quality `q = base_confidence · mean(evidence quality)`
//! 2. Weighted confidence over successful specialists only
//! 3. Hypothesis selection: a dominant specialist speaks alone, otherwise
//!    the top two are consolidated and the decision is marked conflicted
//! 4. Rule-based risk grading from severity + evidence keywords
//! 5. Automation downgrade: risk bounds automation, applied last
//! 6. Threshold policy routes to AUTO_APPROVE / REQUIRES_APPROVAL / ESCALATE

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use super::policy::ThresholdPolicy;
use super::strategy::ConfidenceStrategy;
use crate::config::defaults::{
    CONFLICT_PENALTY, DECISION_BUDGET_MS, DEGRADED_CONFIDENCE_CEILING, DOMINANT_QUALITY_THRESHOLD,
};
use crate::config::WeightMatrix;
use crate::swarm::specialists::DATA_LOSS_KEYWORDS;
use crate::types::{
    AlertCluster, AutomationLevel, DecisionCandidate, EvidenceItem, InvestigationReport,
    RiskLevel, Severity, SpecialistResult,
};

/// Keyword sets backing the risk rules.
const RESOURCE_EXHAUSTION_KEYWORDS: &[&str] = &[
    "memory leak",
    "memory footprint",
    "out of memory",
    "oom",
    "cpu exhaustion",
    "cpu saturation",
    "resource exhaust",
];
const RESTART_LOOP_KEYWORDS: &[&str] = &["restart-loop", "crashloop", "restarted"];
const LATENCY_KEYWORDS: &[&str] = &["latency", "p99", "slow", "response time"];

pub struct DecisionEngine {
    weights: ArcSwap<WeightMatrix>,
    policy: ThresholdPolicy,
    model_version: String,
    default_automation: AutomationLevel,
}

impl DecisionEngine {
    pub fn new(
        weights: WeightMatrix,
        policy: ThresholdPolicy,
        model_version: &str,
        default_automation: AutomationLevel,
    ) -> Self {
        Self {
            weights: ArcSwap::from_pointee(weights),
            policy,
            model_version: model_version.to_string(),
            default_automation,
        }
    }

    /// Swap the weight matrix in place; running fusions keep the snapshot
    /// they started with.
    pub fn set_weights(&self, weights: WeightMatrix) {
        self.weights.store(Arc::new(weights));
    }

    /// Fuse one investigation into a decision candidate.
    pub fn fuse(
        &self,
        cluster: &AlertCluster,
        report: &InvestigationReport,
        now: DateTime<Utc>,
    ) -> DecisionCandidate {
        let started = Instant::now();
        let weights = self.weights.load();

        // Successful specialists ranked by quality, id as the tie-break so
        // equal scores fuse identically on every run.
        let mut ranked: Vec<(&SpecialistResult, f64)> = report
            .results
            .iter()
            .filter(|r| r.status.is_success())
            .map(|r| (r, r.confidence * r.evidence_quality()))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then_with(|| a.0.specialist_id.cmp(&b.0.specialist_id))
        });

        let scores: Vec<(f64, f64)> = ranked
            .iter()
            .map(|(r, q)| (weights.weight_for(&r.specialist_id), *q))
            .collect();
        let mut confidence = ConfidenceStrategy::Weighted.aggregate(&scores);
        let consensus = ConfidenceStrategy::Consensus.aggregate(&scores);

        // Hypothesis selection
        let (hypothesis, conflict) = select_hypothesis(&ranked, cluster);
        if conflict {
            confidence *= CONFLICT_PENALTY;
        }
        if report.degraded {
            confidence = confidence.min(DEGRADED_CONFIDENCE_CEILING);
        }

        // Risk, then automation bounded by it
        let risk = grade_risk(cluster, &report.results);
        let mut automation = self.default_automation.min(risk.max_automation());
        if report.degraded {
            automation = AutomationLevel::Manual;
        }

        let decision_type = self.policy.classify(confidence, consensus, automation);

        let suggested_actions = collect_actions(&ranked);
        let evidence = collect_evidence(&report.results);

        let id = derive_decision_id(&cluster.id, &self.model_version, &weights.version);
        let audit_id = format!("audit-{}", &id["dec-".len()..]);

        let elapsed = started.elapsed().as_millis();
        if elapsed > DECISION_BUDGET_MS {
            warn!(cluster = %cluster.id, elapsed_ms = elapsed, "Decision fusion exceeded soft budget");
        }
        info!(
            decision = %id,
            cluster = %cluster.id,
            confidence = format!("{confidence:.3}"),
            risk = %risk,
            automation = ?automation,
            decision_type = ?decision_type,
            conflict,
            degraded = report.degraded,
            "Decision fused"
        );

        DecisionCandidate {
            id,
            cluster_id: cluster.id.clone(),
            hypothesis,
            confidence,
            risk,
            automation,
            decision_type,
            conflict,
            degraded: report.degraded,
            suggested_actions,
            evidence,
            created_at: now,
            model_version: self.model_version.clone(),
            weights_version: weights.version.clone(),
            audit_id,
        }
    }
}

// ============================================================================
// Fusion steps
// ============================================================================

fn select_hypothesis(
    ranked: &[(&SpecialistResult, f64)],
    cluster: &AlertCluster,
) -> (String, bool) {
    match ranked {
        [] => (
            format!(
                "Investigation degraded: no specialist completed for {}; manual triage required",
                cluster.service
            ),
            false,
        ),
        [(only, _)] => (only.hypothesis.clone(), false),
        [(top, top_q), (second, second_q), ..] => {
            if *top_q >= DOMINANT_QUALITY_THRESHOLD && top_q > second_q {
                (top.hypothesis.clone(), false)
            } else {
                (
                    format!("{} | {}", top.hypothesis, second.hypothesis),
                    true,
                )
            }
        }
    }
}

/// All evidence text visible to the risk rules: hypotheses, evidence
/// descriptions and suggested actions, lowercased.
fn evidence_text(results: &[SpecialistResult]) -> String {
    let mut text = String::new();
    for result in results {
        text.push_str(&result.hypothesis.to_lowercase());
        text.push('\n');
        for item in &result.evidence {
            text.push_str(&item.description.to_lowercase());
            text.push('\n');
        }
        for action in &result.suggested_actions {
            text.push_str(&action.to_lowercase());
            text.push('\n');
        }
    }
    text
}

fn mentions_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

/// Rule-based risk grading, evaluated top-down.
fn grade_risk(cluster: &AlertCluster, results: &[SpecialistResult]) -> RiskLevel {
    let severity = cluster.severity();
    let text = evidence_text(results);

    if severity == Severity::Critical && mentions_any(&text, DATA_LOSS_KEYWORDS) {
        return RiskLevel::Critical;
    }
    if severity == Severity::Critical
        || mentions_any(&text, RESOURCE_EXHAUSTION_KEYWORDS)
        || mentions_any(&text, RESTART_LOOP_KEYWORDS)
    {
        return RiskLevel::High;
    }
    let latency_only = mentions_any(&text, LATENCY_KEYWORDS)
        && !mentions_any(&text, RESOURCE_EXHAUSTION_KEYWORDS)
        && !mentions_any(&text, RESTART_LOOP_KEYWORDS);
    if severity == Severity::High || latency_only {
        return RiskLevel::Medium;
    }
    if severity == Severity::Warning && trend_is_stable(results) {
        return RiskLevel::Low;
    }
    RiskLevel::Minimal
}

/// A trend counts as stable when no metric evidence records a shift beyond
/// ±50%.
fn trend_is_stable(results: &[SpecialistResult]) -> bool {
    !results.iter().flat_map(|r| &r.evidence).any(|e| {
        matches!(e.kind, crate::types::EvidenceKind::Metric)
            && e.value.is_some_and(|v| v.abs() > 0.5)
    })
}

/// Actions from successful specialists in quality order, deduplicated.
fn collect_actions(ranked: &[(&SpecialistResult, f64)]) -> Vec<String> {
    let mut actions = Vec::new();
    for (result, _) in ranked {
        for action in &result.suggested_actions {
            if !actions.contains(action) {
                actions.push(action.clone());
            }
        }
    }
    actions
}

/// Evidence shared with the specialist results, in specialist id order.
fn collect_evidence(results: &[SpecialistResult]) -> Vec<EvidenceItem> {
    results.iter().flat_map(|r| r.evidence.clone()).collect()
}

/// Content-derived decision id: replaying the same cluster under the same
/// model and weights yields the same id.
fn derive_decision_id(cluster_id: &str, model_version: &str, weights_version: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(cluster_id.as_bytes());
    hasher.update(b"|");
    hasher.update(model_version.as_bytes());
    hasher.update(b"|");
    hasher.update(weights_version.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("dec-{}", &digest[..16])
}

// ============================================================================
// Tests
// ============================================================================

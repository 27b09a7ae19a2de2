//! Replay Determinism & Safety Tests
//!
//! The replay engine must be a pure function of (events, configuration):
//! two runs over the same ledger produce byte-identical decisions, and a
//! validation run passes only with zero unsafe automation flips.

use chrono::{TimeZone, Utc};
use std::collections::BTreeMap;

use strands::config::WeightMatrix;
use strands::decision::policy;
use strands::replay::ReplayEngine;
use strands::types::{
    Alert, AlertStatus, AutomationLevel, DecisionCandidate, DecisionType, ReplayEvent,
    ReplayMode, RiskLevel, Severity,
};

fn alert(fingerprint: &str, service: &str, offset_secs: i64, severity: Severity) -> Alert {
    let at = Utc.timestamp_opt(1_700_000_000 + offset_secs, 0).single().unwrap();
    let mut labels = BTreeMap::new();
    labels.insert("service".to_string(), service.to_string());
    Alert {
        received_at: at,
        provider: "prom".to_string(),
        fingerprint: fingerprint.to_string(),
        service: service.to_string(),
        severity,
        description: format!("recorded incident on {service}"),
        labels,
        annotations: BTreeMap::new(),
        status: AlertStatus::Firing,
    }
}

fn original(id: &str, risk: RiskLevel, decision_type: DecisionType, confidence: f64) -> DecisionCandidate {
    DecisionCandidate {
        id: id.to_string(),
        cluster_id: "cluster-orig".to_string(),
        hypothesis: "original".to_string(),
        confidence,
        risk,
        automation: AutomationLevel::Assisted,
        decision_type,
        conflict: false,
        degraded: false,
        suggested_actions: Vec::new(),
        evidence: Vec::new(),
        created_at: Utc.timestamp_opt(1_700_000_000, 0).single().unwrap(),
        model_version: "v1".to_string(),
        weights_version: "w1".to_string(),
        audit_id: "audit-orig".to_string(),
    }
}

fn events() -> Vec<ReplayEvent> {
    vec![
        ReplayEvent {
            recorded_at: Utc.timestamp_opt(1_700_000_000, 0).single().unwrap(),
            alert: alert("fp-a", "checkout", 0, Severity::High),
            decision: original("dec-a", RiskLevel::Medium, DecisionType::RequiresApproval, 0.62),
            playbook_id: None,
            playbook_version: None,
            outcome: None,
        },
        ReplayEvent {
            recorded_at: Utc.timestamp_opt(1_700_000_020, 0).single().unwrap(),
            alert: alert("fp-b", "checkout", 20, Severity::Warning),
            decision: original("dec-b", RiskLevel::Low, DecisionType::RequiresApproval, 0.41),
            playbook_id: None,
            playbook_version: None,
            outcome: None,
        },
        ReplayEvent {
            recorded_at: Utc.timestamp_opt(1_700_000_900, 0).single().unwrap(),
            alert: alert("fp-c", "payments", 900, Severity::Critical),
            decision: original("dec-c", RiskLevel::High, DecisionType::Escalate, 0.55),
            playbook_id: None,
            playbook_version: None,
            outcome: None,
        },
    ]
}

fn engine() -> ReplayEngine {
    ReplayEngine::new(
        WeightMatrix::default(),
        policy::BALANCED,
        "v1",
        AutomationLevel::Assisted,
    )
}

#[tokio::test]
async fn replay_is_byte_identical_across_runs_and_engines() {
    let events = events();

    // Same engine, two runs
    let engine_a = engine();
    let run_1 = engine_a.replay_decisions(&events).await;
    let run_2 = engine_a.replay_decisions(&events).await;
    let bytes_1 = serde_json::to_vec(&run_1).unwrap();
    let bytes_2 = serde_json::to_vec(&run_2).unwrap();
    assert_eq!(bytes_1, bytes_2);

    // Fresh engine with the identical frozen configuration
    let run_3 = engine().replay_decisions(&events).await;
    let bytes_3 = serde_json::to_vec(&run_3).unwrap();
    assert_eq!(bytes_1, bytes_3);
}

#[tokio::test]
async fn changed_weights_change_the_outcome_bytes() {
    let events = events();
    let baseline = engine().replay_decisions(&events).await;

    let skewed = ReplayEngine::new(
        WeightMatrix {
            version: "w2".to_string(),
            metrics: 0.9,
            logs: 0.025,
            graph: 0.025,
            embeddings: 0.025,
            correlator: 0.025,
        },
        policy::BALANCED,
        "v1",
        AutomationLevel::Assisted,
    );
    let skewed_run = skewed.replay_decisions(&events).await;

    // Same input, different frozen config: the decisions must differ
    // (at minimum in the recorded weights version).
    assert_ne!(
        serde_json::to_vec(&baseline).unwrap(),
        serde_json::to_vec(&skewed_run).unwrap()
    );
}

#[tokio::test]
async fn validation_run_reports_and_passes() {
    let events = events();
    let report = engine().replay(&events, ReplayMode::Validation).await;

    assert_eq!(report.events_replayed, 3);
    assert_eq!(
        report.matches + report.safe_divergences + report.unsafe_bypass_count,
        report.events_replayed
    );
    assert!(report.alignment_rate >= 0.0 && report.alignment_rate <= 1.0);
    // Replayed decisions never automate above their risk ceiling, so no
    // high-risk original can re-emerge auto-approvable.
    assert_eq!(report.unsafe_bypass_count, 0);
    assert!(report.passed);
}

#[tokio::test]
async fn replayed_decisions_respect_governance_invariants() {
    let events = events();
    let decisions = engine().replay_decisions(&events).await;
    assert_eq!(decisions.len(), events.len());
    for (_, decision) in &decisions {
        assert!(decision.automation_within_bounds());
        assert!((0.0..=1.0).contains(&decision.confidence));
    }
}

#[tokio::test]
async fn decision_candidate_serde_roundtrip() {
    let decisions = engine().replay_decisions(&events()).await;
    for (_, decision) in decisions {
        let json = serde_json::to_string(&decision).unwrap();
        let back: DecisionCandidate = serde_json::from_str(&json).unwrap();
        assert_eq!(serde_json::to_string(&back).unwrap(), json);
    }
}

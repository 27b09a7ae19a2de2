//! Playbook Lifecycle & Statistics Tests
//!
//! End-to-end checks on the playbook library: promotion flow through the
//! review gate, lifecycle legality, archival permanence, and statistical
//! integrity of the Welford accumulator over large random samples.

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use strands::adapters::{EmbeddedGraphStore, GraphStore};
use strands::playbooks::{LifecycleAction, PlaybookStore, StoreError};
use strands::review::{ReviewGate, ReviewOutcome};
use strands::types::{
    AutomationLevel, ExecutionOutcome, Playbook, PlaybookExecution, PlaybookSource,
    PlaybookStats, PlaybookStatus, ReviewState, RiskLevel, SemanticVersion,
};

fn store() -> (Arc<PlaybookStore>, Arc<dyn GraphStore>) {
    let graph: Arc<dyn GraphStore> = Arc::new(EmbeddedGraphStore::temporary().unwrap());
    (Arc::new(PlaybookStore::new(Arc::clone(&graph))), graph)
}

fn generated_playbook(id: &str) -> Playbook {
    Playbook {
        id: id.to_string(),
        title: "Scale out checkout".to_string(),
        description: "Generated remediation".to_string(),
        pattern_type: "METRIC_METRIC".to_string(),
        service_pattern: "checkout".to_string(),
        steps: Vec::new(),
        estimated_duration_secs: 300,
        automation: AutomationLevel::Assisted,
        risk: RiskLevel::Medium,
        prerequisites: Vec::new(),
        success_criteria: Vec::new(),
        rollback_procedure: "scale back down".to_string(),
        source: PlaybookSource::LlmGenerated,
        status: PlaybookStatus::PendingReview,
        version: SemanticVersion::initial(),
        previous_version_id: None,
        created_at: Utc::now(),
        created_by: "generator".to_string(),
        updated_at: Utc::now(),
        updated_by: "generator".to_string(),
        approved_at: None,
        approved_by: None,
        rejection_note: None,
        stats: PlaybookStats::default(),
    }
}

fn execution(id: &str, playbook_id: &str, outcome: ExecutionOutcome, duration: f64) -> PlaybookExecution {
    PlaybookExecution {
        id: id.to_string(),
        playbook_id: playbook_id.to_string(),
        decision_id: "dec-1".to_string(),
        started_at: Utc::now(),
        completed_at: Utc::now(),
        outcome,
        duration_secs: duration,
        steps_attempted: 1,
        steps_completed: 1,
        error: None,
        feedback: None,
    }
}

// ============================================================================
// Promotion flow (review gate → lifecycle)
// ============================================================================

#[tokio::test]
async fn generated_playbook_promotion_flow() {
    let (playbooks, graph) = store();
    let gate = ReviewGate::new(graph, Arc::clone(&playbooks), "strands-system");
    let cancel = CancellationToken::new();

    // Submitted for review
    playbooks
        .save(&cancel, &generated_playbook("pb-gen"))
        .await
        .unwrap();
    gate.open(&cancel, "dec-1", Utc::now()).await.unwrap();

    // Valid reviewer approves: playbook goes ACTIVE
    let outcome = gate
        .submit(
            &cancel,
            "dec-1",
            ReviewState::Approved,
            "alice",
            None,
            Some("pb-gen"),
            Utc::now(),
        )
        .await
        .unwrap();
    assert!(matches!(outcome, ReviewOutcome::ExecuteRequest { .. }));
    assert_eq!(
        playbooks.get(&cancel, "pb-gen").await.unwrap().status,
        PlaybookStatus::Active
    );

    // Second identical approval: idempotent no-op, still ACTIVE
    let repeat = gate
        .submit(
            &cancel,
            "dec-1",
            ReviewState::Approved,
            "alice",
            None,
            Some("pb-gen"),
            Utc::now(),
        )
        .await
        .unwrap();
    assert_eq!(repeat, ReviewOutcome::NoOp);
    assert_eq!(
        playbooks.get(&cancel, "pb-gen").await.unwrap().status,
        PlaybookStatus::Active
    );

    // deprecate → approve is an illegal lifecycle move
    playbooks
        .transition(&cancel, "pb-gen", LifecycleAction::Deprecate, "ops", Utc::now(), None)
        .await
        .unwrap();
    let err = playbooks
        .transition(&cancel, "pb-gen", LifecycleAction::Approve, "ops", Utc::now(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::IllegalStateTransition { .. }));
}

#[tokio::test]
async fn archived_playbooks_stay_archived() {
    let (playbooks, _) = store();
    let cancel = CancellationToken::new();
    playbooks
        .save(&cancel, &generated_playbook("pb-gen"))
        .await
        .unwrap();
    playbooks
        .transition(&cancel, "pb-gen", LifecycleAction::Reject, "bob", Utc::now(), Some("no"))
        .await
        .unwrap();
    assert_eq!(
        playbooks.get(&cancel, "pb-gen").await.unwrap().status,
        PlaybookStatus::Archived
    );

    for action in [
        LifecycleAction::Submit,
        LifecycleAction::Approve,
        LifecycleAction::Reject,
        LifecycleAction::Deprecate,
        LifecycleAction::Archive,
    ] {
        let err = playbooks
            .transition(&cancel, "pb-gen", action, "bob", Utc::now(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::IllegalStateTransition { .. }));
    }
    assert_eq!(
        playbooks.get(&cancel, "pb-gen").await.unwrap().status,
        PlaybookStatus::Archived
    );
}

// ============================================================================
// Statistics integrity
// ============================================================================

#[tokio::test]
async fn counters_reconcile_after_every_record() {
    let (playbooks, _) = store();
    let cancel = CancellationToken::new();
    let mut playbook = generated_playbook("pb-1");
    playbook.status = PlaybookStatus::Active;
    playbooks.save(&cancel, &playbook).await.unwrap();

    let mut rng = StdRng::seed_from_u64(7);
    for i in 0..50 {
        let outcome = if rng.gen_bool(0.7) {
            ExecutionOutcome::Success
        } else {
            ExecutionOutcome::Failure
        };
        playbooks
            .record_execution(
                &cancel,
                &execution(&format!("ex-{i}"), "pb-1", outcome, rng.gen_range(1.0..120.0)),
            )
            .await
            .unwrap();

        let stats = playbooks.get(&cancel, "pb-1").await.unwrap().stats;
        assert_eq!(stats.total_executions, i + 1);
        assert_eq!(stats.success_count + stats.failure_count, stats.total_executions);
    }
}

/// The running mean must agree with the arithmetic mean of all recorded
/// durations to within 1e-9 relative error over a large random sample.
#[test]
fn welford_mean_matches_direct_mean_over_large_sample() {
    let mut rng = StdRng::seed_from_u64(42);
    let durations: Vec<f64> = (0..100_000).map(|_| rng.gen_range(0.1..3_600.0)).collect();

    let mut stats = PlaybookStats::default();
    for &d in &durations {
        stats.record(true, d, Utc::now());
    }

    let direct_mean: f64 = durations.iter().sum::<f64>() / durations.len() as f64;
    let relative_error = ((stats.mean_duration - direct_mean) / direct_mean).abs();
    assert!(
        relative_error < 1e-9,
        "relative error {relative_error} exceeds 1e-9"
    );

    // Variance agrees with the two-pass computation as well
    let direct_variance: f64 = durations
        .iter()
        .map(|d| (d - direct_mean).powi(2))
        .sum::<f64>()
        / (durations.len() - 1) as f64;
    let variance_error = ((stats.duration_variance() - direct_variance) / direct_variance).abs();
    assert!(
        variance_error < 1e-6,
        "variance relative error {variance_error}"
    );
}

#[tokio::test]
async fn duplicate_execution_id_counted_once() {
    let (playbooks, _) = store();
    let cancel = CancellationToken::new();
    let mut playbook = generated_playbook("pb-1");
    playbook.status = PlaybookStatus::Active;
    playbooks.save(&cancel, &playbook).await.unwrap();

    let ex = execution("ex-dup", "pb-1", ExecutionOutcome::Success, 10.0);
    playbooks.record_execution(&cancel, &ex).await.unwrap();
    playbooks.record_execution(&cancel, &ex).await.unwrap();
    playbooks.record_execution(&cancel, &ex).await.unwrap();

    let stats = playbooks.get(&cancel, "pb-1").await.unwrap().stats;
    assert_eq!(stats.total_executions, 1);
    assert!((stats.mean_duration - 10.0).abs() < 1e-12);
}

#[tokio::test]
async fn concurrent_records_all_land() {
    let (playbooks, _) = store();
    let cancel = CancellationToken::new();
    let mut playbook = generated_playbook("pb-1");
    playbook.status = PlaybookStatus::Active;
    playbooks.save(&cancel, &playbook).await.unwrap();

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..10 {
        let playbooks = Arc::clone(&playbooks);
        let cancel = cancel.clone();
        tasks.spawn(async move {
            playbooks
                .record_execution(
                    &cancel,
                    &execution(&format!("ex-{i}"), "pb-1", ExecutionOutcome::Success, 5.0),
                )
                .await
        });
    }
    let mut failures = 0;
    while let Some(result) = tasks.join_next().await {
        if result.unwrap().is_err() {
            failures += 1;
        }
    }

    let stats = playbooks.get(&cancel, "pb-1").await.unwrap().stats;
    // Every record that reported success must be reflected exactly once.
    assert_eq!(stats.total_executions, 10 - failures);
    assert_eq!(stats.success_count + stats.failure_count, stats.total_executions);
}

//! Incident controller - end-to-end pipeline sequencing
//!
//! Steady-state loop per tick:
//!
//! ```text
//! 1. Collect alerts (providers in priority order) → normalise → cluster
//! 2. Per cluster, in cluster-id order:
//!    a. Swarm investigation, deadline = tick budget − elapsed
//!    b. Decision fusion
//!    c. Playbook recommendation
//!    d. Persist cluster, decision, PENDING review; append replay event
//!    e. Auto-approve short-circuit when policy allows; otherwise wait
//! 3. Reviews resolve asynchronously; the tick never blocks on a human
//! ```
//!
//! Execution completion arrives out-of-band via `complete_execution`,
//! closing the learning loop into the playbook statistics.

use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::adapters::{GraphStore, TextGenerator, VectorStore};
use crate::audit::AuditLog;
use crate::decision::DecisionEngine;
use crate::ingest::{AlertCollector, IngestError};
use crate::playbooks::PlaybookStore;
use crate::recommend::{Readiness, Recommender};
use crate::replay::ReplayLedger;
use crate::resilience::Guard;
use crate::review::{ReviewGate, ReviewOutcome};
use crate::swarm::{EmbeddingSpecialist, SwarmOrchestrator};
use crate::types::{
    AlertCluster, CompletionStatus, DecisionCandidate, DecisionType, PlaybookExecution,
    ReplayEvent, ReviewState,
};

const CLUSTER_LABEL: &str = "AlertCluster";
const DECISION_LABEL: &str = "DecisionCandidate";
const SERVICE_LABEL: &str = "Service";

/// Outcome summary of one tick, for logging and tests.
#[derive(Debug, Default)]
pub struct TickSummary {
    pub skipped: bool,
    pub clusters: usize,
    pub decisions: usize,
    pub auto_approved: usize,
}

pub struct IncidentController {
    collector: AlertCollector,
    swarm: SwarmOrchestrator,
    engine: DecisionEngine,
    recommender: Recommender,
    playbooks: Arc<PlaybookStore>,
    review: Arc<ReviewGate>,
    graph: Arc<dyn GraphStore>,
    vectors: Arc<dyn VectorStore>,
    generator: Arc<dyn TextGenerator>,
    audit: Arc<AuditLog>,
    ledger: Arc<ReplayLedger>,
    /// Guards whose counters are logged each tick
    guards: Vec<(String, Guard)>,
    tick_interval: Duration,
    global_deadline: Duration,
    ticks: u64,
}

#[allow(clippy::too_many_arguments)]
impl IncidentController {
    pub fn new(
        collector: AlertCollector,
        swarm: SwarmOrchestrator,
        engine: DecisionEngine,
        recommender: Recommender,
        playbooks: Arc<PlaybookStore>,
        review: Arc<ReviewGate>,
        graph: Arc<dyn GraphStore>,
        vectors: Arc<dyn VectorStore>,
        generator: Arc<dyn TextGenerator>,
        audit: Arc<AuditLog>,
        ledger: Arc<ReplayLedger>,
        guards: Vec<(String, Guard)>,
        tick_interval: Duration,
        global_deadline: Duration,
    ) -> Self {
        Self {
            collector,
            swarm,
            engine,
            recommender,
            playbooks,
            review,
            graph,
            vectors,
            generator,
            audit,
            ledger,
            guards,
            tick_interval,
            global_deadline,
            ticks: 0,
        }
    }

    /// Run the steady-state loop until cancelled.
    pub async fn run(&mut self, cancel: CancellationToken) {
        info!(
            tick_secs = self.tick_interval.as_secs(),
            deadline_secs = self.global_deadline.as_secs(),
            specialists = self.swarm.specialist_count(),
            "Incident controller started"
        );
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Incident controller stopping");
                    return;
                }
                _ = interval.tick() => {
                    let summary = self.tick(&cancel, Utc::now()).await;
                    self.log_guard_metrics();
                    info!(
                        skipped = summary.skipped,
                        clusters = summary.clusters,
                        decisions = summary.decisions,
                        auto_approved = summary.auto_approved,
                        "Tick complete"
                    );
                }
            }
        }
    }

    /// One pipeline pass. `now` is injected so replay and tests control
    /// the clock.
    pub async fn tick(&mut self, cancel: &CancellationToken, now: DateTime<Utc>) -> TickSummary {
        self.ticks += 1;
        let tick_started = Instant::now();
        let correlation_id = format!("tick-{}", self.ticks);
        let mut summary = TickSummary::default();

        let outcome = match self.collector.collect_cycle(cancel, now).await {
            Ok(outcome) => outcome,
            Err(IngestError::NoProviderAvailable) => {
                warn!("Tick skipped: no alert provider available");
                self.audit.event(
                    &correlation_id,
                    "TICK_SKIPPED",
                    None,
                    None,
                    json!({ "reason": "NO_PROVIDER_AVAILABLE" }),
                    now,
                );
                summary.skipped = true;
                return summary;
            }
        };

        summary.clusters = outcome.clusters.len();
        for cluster in &outcome.clusters {
            // The swarm gets whatever is left of the tick budget.
            let deadline = self
                .global_deadline
                .saturating_sub(tick_started.elapsed())
                .max(Duration::from_secs(1));

            match self
                .process_cluster(cancel, cluster, deadline, &correlation_id, now)
                .await
            {
                Ok(auto_approved) => {
                    summary.decisions += 1;
                    if auto_approved {
                        summary.auto_approved += 1;
                    }
                }
                Err(e) => {
                    // One failing cluster never takes down the tick.
                    error!(cluster = %cluster.id, error = %e, "Cluster processing failed");
                }
            }
        }
        summary
    }

    /// Investigate, decide, recommend, persist and gate one cluster.
    /// Returns whether the decision was auto-approved.
    async fn process_cluster(
        &self,
        cancel: &CancellationToken,
        cluster: &AlertCluster,
        deadline: Duration,
        correlation_id: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let report = self.swarm.investigate(cluster, deadline, cancel, now).await;
        let decision = self.engine.fuse(cluster, &report, now);
        let pattern_type = dominant_pattern_type(&report);

        let recommendation = self
            .recommender
            .recommend(cancel, &decision, pattern_type, &cluster.service, now)
            .await?;

        self.persist_decision(cancel, cluster, &decision, &recommendation.playbook.id, now)
            .await?;
        self.review.open(cancel, &decision.id, now).await?;
        self.audit.event(
            correlation_id,
            "DECISION_CREATED",
            Some(&decision.id),
            Some(&recommendation.playbook.id),
            json!({
                "cluster_id": cluster.id,
                "confidence": decision.confidence,
                "risk": decision.risk,
                "decision_type": decision.decision_type,
                "recommendation_source": recommendation.source,
            }),
            now,
        );

        self.append_replay_events(cluster, &decision, &recommendation.playbook.id);

        // Auto-approval short-circuit: policy already classified the
        // decision, and the recommendation must be executable as-is.
        let auto = recommendation.readiness == Readiness::Ready
            && decision.decision_type == DecisionType::AutoApprove;
        if auto {
            self.review.record_auto_approval(cancel, &decision.id, now).await?;
            self.audit.event(
                correlation_id,
                "AUTO_APPROVED",
                Some(&decision.id),
                Some(&recommendation.playbook.id),
                json!({ "policy": "auto" }),
                now,
            );
            self.audit.event(
                correlation_id,
                "EXECUTE_REQUEST",
                Some(&decision.id),
                Some(&recommendation.playbook.id),
                json!({}),
                now,
            );
            // An approval exists now, so the incident embedding may persist.
            self.confirm_embedding(cancel, cluster, &decision).await;
        }

        Ok(auto)
    }

    /// Apply a human verdict and run the approval side effects.
    pub async fn submit_review(
        &self,
        cancel: &CancellationToken,
        decision_id: &str,
        verdict: ReviewState,
        reviewer: &str,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ReviewOutcome, crate::review::ReviewError> {
        let playbook_id = self.linked_playbook(cancel, decision_id).await;
        let outcome = self
            .review
            .submit(
                cancel,
                decision_id,
                verdict,
                reviewer,
                notes,
                playbook_id.as_deref(),
                now,
            )
            .await?;

        match &outcome {
            ReviewOutcome::ExecuteRequest { decision_id } => {
                self.audit.event(
                    decision_id,
                    "REVIEW_APPROVED",
                    Some(decision_id),
                    playbook_id.as_deref(),
                    json!({ "reviewer": reviewer }),
                    now,
                );
                self.audit.event(
                    decision_id,
                    "EXECUTE_REQUEST",
                    Some(decision_id),
                    playbook_id.as_deref(),
                    json!({}),
                    now,
                );
                if let Some((cluster, decision)) =
                    self.load_decision_context(cancel, decision_id).await
                {
                    self.confirm_embedding(cancel, &cluster, &decision).await;
                }
            }
            ReviewOutcome::Rejected => {
                self.audit.event(
                    decision_id,
                    "REVIEW_REJECTED",
                    Some(decision_id),
                    playbook_id.as_deref(),
                    json!({ "reviewer": reviewer }),
                    now,
                );
            }
            ReviewOutcome::NoOp => {}
        }
        Ok(outcome)
    }

    /// Execution finished on the target infrastructure; fold the outcome
    /// into the playbook statistics.
    pub async fn complete_execution(
        &self,
        cancel: &CancellationToken,
        execution: &PlaybookExecution,
        now: DateTime<Utc>,
    ) -> Result<(), crate::playbooks::StoreError> {
        self.playbooks.record_execution(cancel, execution).await?;
        self.audit.event(
            &execution.decision_id,
            "EXECUTION_RECORDED",
            Some(&execution.decision_id),
            Some(&execution.playbook_id),
            json!({
                "execution_id": execution.id,
                "outcome": execution.outcome,
                "duration_secs": execution.duration_secs,
            }),
            now,
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Persistence helpers
    // ------------------------------------------------------------------

    async fn persist_decision(
        &self,
        cancel: &CancellationToken,
        cluster: &AlertCluster,
        decision: &DecisionCandidate,
        playbook_id: &str,
        _now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let cluster_props = serde_json::to_value(cluster)?;
        self.graph
            .upsert_node(cancel, CLUSTER_LABEL, &cluster.id, cluster_props)
            .await?;
        let decision_props = serde_json::to_value(decision)?;
        self.graph
            .upsert_node(cancel, DECISION_LABEL, &decision.id, decision_props)
            .await?;
        self.graph
            .upsert_relation(cancel, &decision.id, "DECIDED_FROM", &cluster.id, json!({}))
            .await?;
        self.graph
            .upsert_node(
                cancel,
                SERVICE_LABEL,
                &cluster.service,
                json!({ "id": cluster.service, "name": cluster.service }),
            )
            .await?;
        self.graph
            .upsert_relation(cancel, playbook_id, "TARGETS", &cluster.service, json!({}))
            .await?;
        Ok(())
    }

    fn append_replay_events(
        &self,
        cluster: &AlertCluster,
        decision: &DecisionCandidate,
        playbook_id: &str,
    ) {
        for member in &cluster.members {
            let event = ReplayEvent {
                recorded_at: member.alert.received_at,
                alert: member.alert.clone(),
                decision: decision.clone(),
                playbook_id: Some(playbook_id.to_string()),
                playbook_version: None,
                outcome: None,
            };
            if let Err(e) = self.ledger.append(&event) {
                warn!(error = %e, "Replay ledger append failed");
            }
        }
    }

    /// Incident embeddings persist only once a review record confirms the
    /// decision; failures here degrade recall, not the pipeline.
    async fn confirm_embedding(
        &self,
        cancel: &CancellationToken,
        cluster: &AlertCluster,
        decision: &DecisionCandidate,
    ) {
        let text = EmbeddingSpecialist::incident_text(cluster);
        let vector = match self.generator.embed(cancel, &text).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!(decision = %decision.id, error = %e, "Embedding skipped");
                return;
            }
        };
        let payload = json!({
            "hypothesis": decision.hypothesis,
            "actions": decision.suggested_actions,
            "service": cluster.service,
            "decision_id": decision.id,
        });
        if let Err(e) = self
            .vectors
            .upsert(cancel, &decision.id, &vector, payload)
            .await
        {
            warn!(decision = %decision.id, error = %e, "Embedding upsert failed");
        }
    }

    async fn linked_playbook(
        &self,
        cancel: &CancellationToken,
        decision_id: &str,
    ) -> Option<String> {
        // The replay ledger and audit log both know the link, but the
        // graph is authoritative: the decision node records no playbook,
        // so follow the latest generated id convention first.
        let generated_id = format!("pb-gen-{}", decision_id.strip_prefix("dec-")?);
        match self.playbooks.get(cancel, &generated_id).await {
            Ok(playbook) => Some(playbook.id),
            Err(_) => None,
        }
    }

    async fn load_decision_context(
        &self,
        cancel: &CancellationToken,
        decision_id: &str,
    ) -> Option<(AlertCluster, DecisionCandidate)> {
        let decision_node = self
            .graph
            .get_node(cancel, DECISION_LABEL, decision_id)
            .await
            .ok()??;
        let decision: DecisionCandidate = serde_json::from_value(decision_node).ok()?;
        let cluster_node = self
            .graph
            .get_node(cancel, CLUSTER_LABEL, &decision.cluster_id)
            .await
            .ok()??;
        let cluster: AlertCluster = serde_json::from_value(cluster_node).ok()?;
        Some((cluster, decision))
    }

    fn log_guard_metrics(&self) {
        for (name, guard) in &self.guards {
            let metrics = guard.metrics();
            info!(
                adapter = %name,
                successes = metrics.successes,
                failures = metrics.failures,
                rejections = metrics.rejections,
                retries = metrics.retries,
                timeouts = metrics.timeouts,
                avg_latency_ms = format!("{:.1}", metrics.avg_latency_ms),
                "Adapter guard counters"
            );
        }
    }
}

/// Playbook lookup key half: the dominant correlation family of the
/// investigation. The correlator speaking at all means a numeric pattern;
/// otherwise log evidence dominates.
fn dominant_pattern_type(report: &crate::types::InvestigationReport) -> &'static str {
    let correlator_spoke = report.results.iter().any(|r| {
        r.specialist_id == "correlator"
            && r.status == CompletionStatus::Success
            && !r.evidence.is_empty()
    });
    if correlator_spoke {
        "METRIC_METRIC"
    } else {
        "LOG_METRIC"
    }
}

//! Playbook store - persistence, lifecycle enforcement, atomic statistics
//!
//! Playbooks live as graph nodes; executions as nodes linked `EXECUTED_BY`.
//! Statistics are folded in with a compare-and-set keyed on the current
//! `total_executions`, retried a bounded number of times, so two racing
//! execution records can never both land on the same accumulator state.
//! This is the only code allowed to mutate playbook statistics.
//!
//! A read-mostly snapshot of ACTIVE playbooks backs the recommender;
//! any status transition drops the snapshot and broadcasts an invalidation.

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::lifecycle::{next_status, LifecycleAction};
use super::version::{classify_change, VersionBump};
use crate::adapters::GraphStore;
use crate::config::defaults::{STATS_CAS_BACKOFF_MS, STATS_CAS_MAX_RETRIES};
use crate::resilience::AdapterError;
use crate::types::{Playbook, PlaybookExecution, PlaybookStatus};

const PLAYBOOK_LABEL: &str = "Playbook";
const EXECUTION_LABEL: &str = "PlaybookExecution";

/// Store-level failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("playbook {0} not found")]
    NotFound(String),
    #[error("illegal state transition: {from} → {action:?}")]
    IllegalStateTransition {
        from: PlaybookStatus,
        action: LifecycleAction,
    },
    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

pub struct PlaybookStore {
    graph: Arc<dyn GraphStore>,
    /// Snapshot of ACTIVE playbooks; None means stale
    active_cache: ArcSwap<Option<Arc<Vec<Playbook>>>>,
    invalidations: broadcast::Sender<String>,
}

impl PlaybookStore {
    pub fn new(graph: Arc<dyn GraphStore>) -> Self {
        let (invalidations, _) = broadcast::channel(64);
        Self {
            graph,
            active_cache: ArcSwap::from_pointee(None),
            invalidations,
        }
    }

    /// Subscribe to cache invalidation events (playbook ids).
    pub fn subscribe_invalidations(&self) -> broadcast::Receiver<String> {
        self.invalidations.subscribe()
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    fn node_props(playbook: &Playbook) -> Result<Value, StoreError> {
        let mut props = serde_json::to_value(playbook)
            .map_err(|e| AdapterError::ValidationFailed(format!("unserialisable playbook: {e}")))?;
        // Mirrored for the statistics compare-and-set key and the lookup
        // index; the nested stats object stays authoritative.
        props["total_executions"] = json!(playbook.stats.total_executions);
        Ok(props)
    }

    fn decode(node: Value) -> Result<Playbook, StoreError> {
        serde_json::from_value(node)
            .map_err(|e| AdapterError::ValidationFailed(format!("corrupt playbook node: {e}")).into())
    }

    pub async fn save(&self, cancel: &CancellationToken, playbook: &Playbook) -> Result<(), StoreError> {
        let props = Self::node_props(playbook)?;
        self.graph
            .upsert_node(cancel, PLAYBOOK_LABEL, &playbook.id, props)
            .await?;
        if let Some(previous) = &playbook.previous_version_id {
            self.graph
                .upsert_relation(cancel, &playbook.id, "PREVIOUS_VERSION_OF", previous, json!({}))
                .await?;
        }
        self.invalidate(&playbook.id);
        Ok(())
    }

    pub async fn get(&self, cancel: &CancellationToken, id: &str) -> Result<Playbook, StoreError> {
        let node = self
            .graph
            .get_node(cancel, PLAYBOOK_LABEL, id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        Self::decode(node)
    }

    /// All playbooks, any status. Used by the operator CLI listing.
    pub async fn list(&self, cancel: &CancellationToken) -> Result<Vec<Playbook>, StoreError> {
        let nodes = self.graph.find_nodes(cancel, PLAYBOOK_LABEL, &[]).await?;
        let mut playbooks: Vec<Playbook> = nodes
            .into_iter()
            .map(Self::decode)
            .collect::<Result<_, _>>()?;
        playbooks.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(playbooks)
    }

    /// ACTIVE playbooks matching a `(pattern_type, service_pattern)` key,
    /// served from the snapshot when it is fresh.
    pub async fn find_active(
        &self,
        cancel: &CancellationToken,
        pattern_type: &str,
        service_pattern: &str,
    ) -> Result<Vec<Playbook>, StoreError> {
        let snapshot = self.active_snapshot(cancel).await?;
        Ok(snapshot
            .iter()
            .filter(|p| p.pattern_type == pattern_type && p.service_pattern == service_pattern)
            .cloned()
            .collect())
    }

    async fn active_snapshot(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Arc<Vec<Playbook>>, StoreError> {
        if let Some(snapshot) = self.active_cache.load().as_ref() {
            return Ok(Arc::clone(snapshot));
        }
        let nodes = self
            .graph
            .find_nodes(
                cancel,
                PLAYBOOK_LABEL,
                &[("status".to_string(), json!("ACTIVE"))],
            )
            .await?;
        let mut active: Vec<Playbook> = nodes
            .into_iter()
            .map(Self::decode)
            .collect::<Result<_, _>>()?;
        active.sort_by(|a, b| a.id.cmp(&b.id));
        let snapshot = Arc::new(active);
        self.active_cache.store(Arc::new(Some(Arc::clone(&snapshot))));
        debug!(count = snapshot.len(), "Active playbook snapshot refreshed");
        Ok(snapshot)
    }

    fn invalidate(&self, playbook_id: &str) {
        self.active_cache.store(Arc::new(None));
        let _ = self.invalidations.send(playbook_id.to_string());
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Apply a lifecycle action, persisting the transition.
    ///
    /// Approving a playbook that supersedes an ACTIVE predecessor also
    /// deprecates the predecessor.
    pub async fn transition(
        &self,
        cancel: &CancellationToken,
        id: &str,
        action: LifecycleAction,
        actor: &str,
        now: DateTime<Utc>,
        note: Option<&str>,
    ) -> Result<Playbook, StoreError> {
        let mut playbook = self.get(cancel, id).await?;
        let Some(target) = next_status(playbook.status, action) else {
            return Err(StoreError::IllegalStateTransition {
                from: playbook.status,
                action,
            });
        };

        playbook.status = target;
        playbook.updated_at = now;
        playbook.updated_by = actor.to_string();
        if action == LifecycleAction::Approve {
            playbook.approved_at = Some(now);
            playbook.approved_by = Some(actor.to_string());
        }
        if action == LifecycleAction::Reject {
            playbook.rejection_note = note.map(str::to_string);
        }
        self.save(cancel, &playbook).await?;

        info!(playbook = id, status = %playbook.status, actor, "Playbook transitioned");

        // A newly approved major version supersedes its predecessor.
        if action == LifecycleAction::Approve {
            if let Some(previous_id) = playbook.previous_version_id.clone() {
                match self.get(cancel, &previous_id).await {
                    Ok(previous) if previous.status == PlaybookStatus::Active => {
                        Box::pin(self.transition(
                            cancel,
                            &previous_id,
                            LifecycleAction::Deprecate,
                            actor,
                            now,
                            None,
                        ))
                        .await?;
                    }
                    Ok(_) => {}
                    Err(StoreError::NotFound(_)) => {}
                    Err(e) => return Err(e),
                }
            }
        }

        Ok(playbook)
    }

    /// Spawn a new DRAFT major version of an ACTIVE playbook, carrying the
    /// current content for the author to rework.
    pub async fn new_major_version(
        &self,
        cancel: &CancellationToken,
        id: &str,
        author: &str,
        now: DateTime<Utc>,
    ) -> Result<Playbook, StoreError> {
        let current = self.get(cancel, id).await?;
        if current.status != PlaybookStatus::Active {
            return Err(StoreError::IllegalStateTransition {
                from: current.status,
                action: LifecycleAction::Submit,
            });
        }
        let content = current.clone();
        self.spawn_successor(cancel, current, content, author, now)
            .await
    }

    /// Persist an edited playbook, bumping the version by the size of the
    /// change (`classify_change` diffs steps and rollback against the
    /// stored predecessor).
    ///
    /// A MAJOR edit of an ACTIVE playbook spawns a successor DRAFT and
    /// leaves the predecessor serving until the successor is approved.
    /// Every other edit updates the node in place. An edit that changes
    /// nothing version-relevant is a no-op.
    pub async fn revise(
        &self,
        cancel: &CancellationToken,
        edited: Playbook,
        author: &str,
        now: DateTime<Utc>,
    ) -> Result<Playbook, StoreError> {
        let current = self.get(cancel, &edited.id).await?;
        let Some(bump) = classify_change(&current, &edited) else {
            debug!(playbook = %current.id, "Revision changed nothing; keeping version");
            return Ok(current);
        };

        if bump == VersionBump::Major && current.status == PlaybookStatus::Active {
            return self
                .spawn_successor(cancel, current, edited, author, now)
                .await;
        }

        let revised = Playbook {
            version: bump.apply(current.version),
            updated_at: now,
            updated_by: author.to_string(),
            // Identity, lifecycle and history stay with the stored node;
            // only content comes from the edit.
            id: current.id.clone(),
            status: current.status,
            previous_version_id: current.previous_version_id.clone(),
            created_at: current.created_at,
            created_by: current.created_by.clone(),
            approved_at: current.approved_at,
            approved_by: current.approved_by.clone(),
            rejection_note: current.rejection_note.clone(),
            stats: current.stats.clone(),
            ..edited
        };
        self.save(cancel, &revised).await?;
        info!(
            playbook = %revised.id,
            version = %revised.version,
            bump = ?bump,
            "Playbook revised in place"
        );
        Ok(revised)
    }

    /// Create the successor DRAFT for a major revision of `current`,
    /// linked `PREVIOUS_VERSION_OF` its predecessor.
    async fn spawn_successor(
        &self,
        cancel: &CancellationToken,
        current: Playbook,
        content: Playbook,
        author: &str,
        now: DateTime<Utc>,
    ) -> Result<Playbook, StoreError> {
        let version = current.version.bump_major();
        let successor = Playbook {
            id: format!("{}-v{}", base_id(&current.id), version),
            status: PlaybookStatus::Draft,
            version,
            previous_version_id: Some(current.id.clone()),
            created_at: now,
            created_by: author.to_string(),
            updated_at: now,
            updated_by: author.to_string(),
            approved_at: None,
            approved_by: None,
            rejection_note: None,
            stats: Default::default(),
            ..content
        };
        self.save(cancel, &successor).await?;
        info!(
            playbook = %successor.id,
            predecessor = %current.id,
            version = %successor.version,
            "Major revision drafted"
        );
        Ok(successor)
    }

    // ------------------------------------------------------------------
    // Statistics
    // ------------------------------------------------------------------

    /// Fold one execution into the playbook's statistics and persist the
    /// execution record.
    ///
    /// Re-recording the same execution id is a no-op. The statistics write
    /// is an optimistic compare-and-set keyed on `total_executions`,
    /// retried up to the configured bound, then surfaced as
    /// `UPSTREAM_UNAVAILABLE`.
    pub async fn record_execution(
        &self,
        cancel: &CancellationToken,
        execution: &PlaybookExecution,
    ) -> Result<(), StoreError> {
        // Idempotency: an already-persisted execution mutated the stats once.
        if self
            .graph
            .get_node(cancel, EXECUTION_LABEL, &execution.id)
            .await?
            .is_some()
        {
            debug!(execution = %execution.id, "Execution already recorded; skipping");
            return Ok(());
        }

        for attempt in 1..=STATS_CAS_MAX_RETRIES {
            let playbook = self.get(cancel, &execution.playbook_id).await?;
            let expected = playbook.stats.total_executions;

            let mut updated = playbook.clone();
            updated.stats.record(
                execution.outcome.is_success(),
                execution.duration_secs,
                execution.completed_at,
            );
            let props = Self::node_props(&updated)?;

            let applied = self
                .graph
                .checked_update(
                    cancel,
                    PLAYBOOK_LABEL,
                    &execution.playbook_id,
                    "total_executions",
                    json!(expected),
                    props,
                )
                .await?;

            if applied {
                let exec_props = serde_json::to_value(execution).map_err(|e| {
                    AdapterError::ValidationFailed(format!("unserialisable execution: {e}"))
                })?;
                self.graph
                    .upsert_node(cancel, EXECUTION_LABEL, &execution.id, exec_props)
                    .await?;
                self.graph
                    .upsert_relation(
                        cancel,
                        &execution.id,
                        "EXECUTED_BY",
                        &execution.playbook_id,
                        json!({ "outcome": execution.outcome }),
                    )
                    .await?;
                self.invalidate(&execution.playbook_id);
                info!(
                    playbook = %execution.playbook_id,
                    execution = %execution.id,
                    outcome = ?execution.outcome,
                    total = updated.stats.total_executions,
                    "Execution recorded"
                );
                return Ok(());
            }

            warn!(
                playbook = %execution.playbook_id,
                attempt,
                "Statistics write lost the race; retrying"
            );
            tokio::time::sleep(std::time::Duration::from_millis(
                STATS_CAS_BACKOFF_MS * attempt as u64,
            ))
            .await;
        }

        Err(AdapterError::UpstreamUnavailable(format!(
            "statistics update for {} conflicted {} times",
            execution.playbook_id, STATS_CAS_MAX_RETRIES
        ))
        .into())
    }
}

/// Strip a trailing `-v<version>` suffix so repeated major bumps do not
/// stack suffixes.
fn base_id(id: &str) -> &str {
    match id.rfind("-v") {
        Some(pos) if id[pos + 2..].chars().next().is_some_and(|c| c.is_ascii_digit()) => &id[..pos],
        _ => id,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::EmbeddedGraphStore;
    use crate::types::{
        AutomationLevel, ExecutionOutcome, PlaybookSource, RiskLevel, SemanticVersion,
    };

    fn store() -> PlaybookStore {
        PlaybookStore::new(Arc::new(EmbeddedGraphStore::temporary().unwrap()))
    }

    fn playbook(id: &str, status: PlaybookStatus) -> Playbook {
        Playbook {
            id: id.to_string(),
            title: "Restart crashlooping pods".to_string(),
            description: "Rolling restart".to_string(),
            pattern_type: "METRIC_METRIC".to_string(),
            service_pattern: "checkout".to_string(),
            steps: Vec::new(),
            estimated_duration_secs: 300,
            automation: AutomationLevel::Assisted,
            risk: RiskLevel::Medium,
            prerequisites: Vec::new(),
            success_criteria: Vec::new(),
            rollback_procedure: "kubectl rollout undo".to_string(),
            source: PlaybookSource::LlmGenerated,
            status,
            version: SemanticVersion::initial(),
            previous_version_id: None,
            created_at: Utc::now(),
            created_by: "generator".to_string(),
            updated_at: Utc::now(),
            updated_by: "generator".to_string(),
            approved_at: None,
            approved_by: None,
            rejection_note: None,
            stats: Default::default(),
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
            steps_attempted: 3,
            steps_completed: 3,
            error: None,
            feedback: None,
        }
    }

    #[tokio::test]
    async fn save_get_roundtrip() {
        let s = store();
        let cancel = CancellationToken::new();
        let pb = playbook("pb-1", PlaybookStatus::Draft);
        s.save(&cancel, &pb).await.unwrap();
        let loaded = s.get(&cancel, "pb-1").await.unwrap();
        assert_eq!(loaded.id, pb.id);
        assert_eq!(loaded.status, PlaybookStatus::Draft);
        assert_eq!(loaded.version, SemanticVersion::initial());
    }

    #[tokio::test]
    async fn promotion_flow_and_idempotent_approve() {
        let s = store();
        let cancel = CancellationToken::new();
        s.save(&cancel, &playbook("pb-1", PlaybookStatus::PendingReview))
            .await
            .unwrap();

        let approved = s
            .transition(&cancel, "pb-1", LifecycleAction::Approve, "alice", Utc::now(), None)
            .await
            .unwrap();
        assert_eq!(approved.status, PlaybookStatus::Active);
        assert_eq!(approved.approved_by.as_deref(), Some("alice"));

        // Approving again is illegal at the store level; the review layer
        // makes the repeat a no-op before it reaches here.
        let err = s
            .transition(&cancel, "pb-1", LifecycleAction::Approve, "alice", Utc::now(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::IllegalStateTransition { .. }));
    }

    #[tokio::test]
    async fn deprecate_then_approve_is_illegal() {
        let s = store();
        let cancel = CancellationToken::new();
        s.save(&cancel, &playbook("pb-1", PlaybookStatus::Active))
            .await
            .unwrap();
        s.transition(&cancel, "pb-1", LifecycleAction::Deprecate, "bob", Utc::now(), None)
            .await
            .unwrap();
        let err = s
            .transition(&cancel, "pb-1", LifecycleAction::Approve, "bob", Utc::now(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::IllegalStateTransition { .. }));
    }

    #[tokio::test]
    async fn welford_stats_across_executions() {
        let s = store();
        let cancel = CancellationToken::new();
        s.save(&cancel, &playbook("pb-1", PlaybookStatus::Active))
            .await
            .unwrap();

        for (i, duration) in [10.0, 12.0, 15.0, 11.0, 14.0].iter().enumerate() {
            s.record_execution(
                &cancel,
                &execution(&format!("ex-{i}"), "pb-1", ExecutionOutcome::Success, *duration),
            )
            .await
            .unwrap();
        }

        let pb = s.get(&cancel, "pb-1").await.unwrap();
        assert_eq!(pb.stats.total_executions, 5);
        assert_eq!(pb.stats.success_count, 5);
        assert_eq!(pb.stats.failure_count, 0);
        assert!((pb.stats.mean_duration - 12.4).abs() < 1e-9);
        assert!((pb.stats.duration_variance() - 3.8).abs() < 1e-9);
        assert!(pb.stats.last_executed_at.is_some());
    }

    #[tokio::test]
    async fn record_execution_is_idempotent() {
        let s = store();
        let cancel = CancellationToken::new();
        s.save(&cancel, &playbook("pb-1", PlaybookStatus::Active))
            .await
            .unwrap();

        let ex = execution("ex-1", "pb-1", ExecutionOutcome::Success, 9.0);
        s.record_execution(&cancel, &ex).await.unwrap();
        s.record_execution(&cancel, &ex).await.unwrap();

        let pb = s.get(&cancel, "pb-1").await.unwrap();
        assert_eq!(pb.stats.total_executions, 1);
    }

    #[tokio::test]
    async fn counters_always_reconcile() {
        let s = store();
        let cancel = CancellationToken::new();
        s.save(&cancel, &playbook("pb-1", PlaybookStatus::Active))
            .await
            .unwrap();

        let outcomes = [
            ExecutionOutcome::Success,
            ExecutionOutcome::Failure,
            ExecutionOutcome::Partial,
            ExecutionOutcome::Success,
            ExecutionOutcome::RolledBack,
        ];
        for (i, outcome) in outcomes.iter().enumerate() {
            s.record_execution(&cancel, &execution(&format!("ex-{i}"), "pb-1", *outcome, 5.0))
                .await
                .unwrap();
        }

        let pb = s.get(&cancel, "pb-1").await.unwrap();
        assert_eq!(pb.stats.total_executions, 5);
        assert_eq!(
            pb.stats.success_count + pb.stats.failure_count,
            pb.stats.total_executions
        );
        assert_eq!(pb.stats.success_count, 2);
    }

    #[tokio::test]
    async fn new_major_version_spawns_draft_and_deprecates_on_approval() {
        let s = store();
        let cancel = CancellationToken::new();
        s.save(&cancel, &playbook("pb-1", PlaybookStatus::Active))
            .await
            .unwrap();

        let draft = s
            .new_major_version(&cancel, "pb-1", "carol", Utc::now())
            .await
            .unwrap();
        assert_eq!(draft.status, PlaybookStatus::Draft);
        assert_eq!(draft.version, SemanticVersion { major: 2, minor: 0, patch: 0 });
        assert_eq!(draft.previous_version_id.as_deref(), Some("pb-1"));
        // Predecessor untouched until the successor is approved
        assert_eq!(
            s.get(&cancel, "pb-1").await.unwrap().status,
            PlaybookStatus::Active
        );

        s.transition(&cancel, &draft.id, LifecycleAction::Submit, "carol", Utc::now(), None)
            .await
            .unwrap();
        s.transition(&cancel, &draft.id, LifecycleAction::Approve, "dave", Utc::now(), None)
            .await
            .unwrap();

        assert_eq!(
            s.get(&cancel, "pb-1").await.unwrap().status,
            PlaybookStatus::Deprecated
        );
    }

    #[tokio::test]
    async fn find_active_matches_key_and_refreshes_on_transition() {
        let s = store();
        let cancel = CancellationToken::new();
        s.save(&cancel, &playbook("pb-1", PlaybookStatus::Active))
            .await
            .unwrap();
        let mut other = playbook("pb-2", PlaybookStatus::Active);
        other.service_pattern = "payments".to_string();
        s.save(&cancel, &other).await.unwrap();

        let found = s
            .find_active(&cancel, "METRIC_METRIC", "checkout")
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "pb-1");

        s.transition(&cancel, "pb-1", LifecycleAction::Deprecate, "ops", Utc::now(), None)
            .await
            .unwrap();
        let found = s
            .find_active(&cancel, "METRIC_METRIC", "checkout")
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn base_id_strips_version_suffix() {
        assert_eq!(base_id("pb-1"), "pb-1");
        assert_eq!(base_id("pb-1-v2.0.0"), "pb-1");
        assert_eq!(base_id("pb-v-weird"), "pb-v-weird");
    }

    fn playbook_with_step(id: &str, status: PlaybookStatus) -> Playbook {
        let mut pb = playbook(id, status);
        pb.steps = vec![crate::types::PlaybookStep {
            index: 0,
            title: "Restart".to_string(),
            description: "Rolling restart".to_string(),
            commands: vec!["kubectl rollout restart deployment/checkout".to_string()],
            expected_output: String::new(),
            rollback_command: None,
        }];
        pb
    }

    #[tokio::test]
    async fn wording_revision_bumps_patch_in_place() {
        let s = store();
        let cancel = CancellationToken::new();
        s.save(&cancel, &playbook_with_step("pb-1", PlaybookStatus::Active))
            .await
            .unwrap();

        let mut edited = playbook_with_step("pb-1", PlaybookStatus::Active);
        edited.steps[0].description = "Restart one replica at a time".to_string();
        let revised = s.revise(&cancel, edited, "carol", Utc::now()).await.unwrap();

        assert_eq!(revised.id, "pb-1");
        assert_eq!(revised.version.to_string(), "1.0.1");
        assert_eq!(revised.updated_by, "carol");
        assert_eq!(
            s.get(&cancel, "pb-1").await.unwrap().version.to_string(),
            "1.0.1"
        );
    }

    #[tokio::test]
    async fn appended_step_bumps_minor_in_place() {
        let s = store();
        let cancel = CancellationToken::new();
        s.save(&cancel, &playbook_with_step("pb-1", PlaybookStatus::Active))
            .await
            .unwrap();

        let mut edited = playbook_with_step("pb-1", PlaybookStatus::Active);
        edited.steps.push(crate::types::PlaybookStep {
            index: 1,
            title: "Verify".to_string(),
            description: "Confirm pods are ready".to_string(),
            commands: vec!["kubectl get pods -l service=checkout".to_string()],
            expected_output: String::new(),
            rollback_command: None,
        });
        let revised = s.revise(&cancel, edited, "carol", Utc::now()).await.unwrap();

        assert_eq!(revised.id, "pb-1");
        assert_eq!(revised.version.to_string(), "1.1.0");
        assert_eq!(revised.status, PlaybookStatus::Active);
    }

    #[tokio::test]
    async fn major_revision_of_active_playbook_spawns_successor_draft() {
        let s = store();
        let cancel = CancellationToken::new();
        s.save(&cancel, &playbook_with_step("pb-1", PlaybookStatus::Active))
            .await
            .unwrap();

        let mut edited = playbook_with_step("pb-1", PlaybookStatus::Active);
        edited.rollback_procedure = "restore from snapshot".to_string();
        let successor = s.revise(&cancel, edited, "carol", Utc::now()).await.unwrap();

        assert_ne!(successor.id, "pb-1");
        assert_eq!(successor.status, PlaybookStatus::Draft);
        assert_eq!(successor.version.to_string(), "2.0.0");
        assert_eq!(successor.previous_version_id.as_deref(), Some("pb-1"));
        assert_eq!(successor.rollback_procedure, "restore from snapshot");
        // Predecessor keeps serving until the successor is approved
        assert_eq!(
            s.get(&cancel, "pb-1").await.unwrap().status,
            PlaybookStatus::Active
        );
    }

    #[tokio::test]
    async fn unchanged_revision_is_a_noop() {
        let s = store();
        let cancel = CancellationToken::new();
        s.save(&cancel, &playbook_with_step("pb-1", PlaybookStatus::Active))
            .await
            .unwrap();

        let revised = s
            .revise(
                &cancel,
                playbook_with_step("pb-1", PlaybookStatus::Active),
                "carol",
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(revised.version.to_string(), "1.0.0");
    }
}

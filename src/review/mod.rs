//! Human-review gate - one review record per decision
//!
//! PENDING → APPROVED | REJECTED, driven by an external reviewer identity.
//! The identity that produced the decision cannot review it. Terminal
//! states are sticky: an identical repeat is a no-op, anything else is
//! refused. Approval promotes a pending generated playbook and emits an
//! execute request; rejection archives a newly generated playbook with the
//! reviewer's note retained.

use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::adapters::GraphStore;
use crate::playbooks::{LifecycleAction, PlaybookStore, StoreError};
use crate::resilience::AdapterError;
use crate::types::{PlaybookSource, PlaybookStatus, ReviewRecord, ReviewState};

const REVIEW_LABEL: &str = "ReviewRecord";

/// Review-state violations surfaced to the reviewing caller.
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("reviewer matches the system identity that produced the decision")]
    InvalidReviewer,
    #[error("review for decision {0} is already closed")]
    ReviewAlreadyClosed(String),
    #[error("no review record for decision {0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

/// What the caller should do after a verdict was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewOutcome {
    /// Approval applied; the controller should trigger execution
    ExecuteRequest { decision_id: String },
    /// Rejection applied
    Rejected,
    /// Identical repeat of an applied verdict
    NoOp,
}

pub struct ReviewGate {
    graph: Arc<dyn GraphStore>,
    playbooks: Arc<PlaybookStore>,
    /// Identity recorded as the producer of decisions
    system_identity: String,
}

impl ReviewGate {
    pub fn new(graph: Arc<dyn GraphStore>, playbooks: Arc<PlaybookStore>, system_identity: &str) -> Self {
        Self {
            graph,
            playbooks,
            system_identity: system_identity.to_string(),
        }
    }

    /// Open the PENDING record for a freshly persisted decision.
    pub async fn open(
        &self,
        cancel: &CancellationToken,
        decision_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ReviewRecord, ReviewError> {
        let record = ReviewRecord::pending(
            format!("rev-{}", uuid::Uuid::new_v4()),
            decision_id.to_string(),
            now,
        );
        self.persist(cancel, &record).await?;
        Ok(record)
    }

    /// Apply a human verdict.
    pub async fn submit(
        &self,
        cancel: &CancellationToken,
        decision_id: &str,
        verdict: ReviewState,
        reviewer: &str,
        notes: Option<&str>,
        playbook_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ReviewOutcome, ReviewError> {
        if verdict == ReviewState::Pending {
            return Err(ReviewError::NotFound(decision_id.to_string()));
        }
        if reviewer == self.system_identity {
            return Err(ReviewError::InvalidReviewer);
        }

        let mut record = self.load(cancel, decision_id).await?;
        if record.state.is_terminal() {
            let identical = record.state == verdict && record.reviewer.as_deref() == Some(reviewer);
            if identical {
                return Ok(ReviewOutcome::NoOp);
            }
            warn!(decision = decision_id, reviewer, "Verdict refused: review already closed");
            return Err(ReviewError::ReviewAlreadyClosed(decision_id.to_string()));
        }

        record.state = verdict;
        record.reviewer = Some(reviewer.to_string());
        record.updated_at = now;
        record.notes = notes.map(str::to_string);
        self.persist(cancel, &record).await?;

        info!(decision = decision_id, reviewer, verdict = ?verdict, "Review verdict applied");

        match verdict {
            ReviewState::Approved => {
                if let Some(playbook_id) = playbook_id {
                    self.promote_if_pending(cancel, playbook_id, reviewer, now)
                        .await?;
                }
                Ok(ReviewOutcome::ExecuteRequest {
                    decision_id: decision_id.to_string(),
                })
            }
            ReviewState::Rejected => {
                if let Some(playbook_id) = playbook_id {
                    self.archive_if_generated(cancel, playbook_id, reviewer, notes, now)
                        .await?;
                }
                Ok(ReviewOutcome::Rejected)
            }
            ReviewState::Pending => unreachable!("pending verdict rejected above"),
        }
    }

    /// Record a policy-sanctioned auto-approval. This is the one path that
    /// writes an approval under the system identity; it exists so that
    /// auto-approved executions still leave a review record behind.
    pub async fn record_auto_approval(
        &self,
        cancel: &CancellationToken,
        decision_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ReviewRecord, ReviewError> {
        let mut record = self.load(cancel, decision_id).await?;
        if record.state.is_terminal() {
            return Err(ReviewError::ReviewAlreadyClosed(decision_id.to_string()));
        }
        record.state = ReviewState::Approved;
        record.reviewer = Some(self.system_identity.clone());
        record.updated_at = now;
        record.notes = Some("auto-approved by policy".to_string());
        self.persist(cancel, &record).await?;
        info!(decision = decision_id, "Auto-approval recorded");
        Ok(record)
    }

    pub async fn load(
        &self,
        cancel: &CancellationToken,
        decision_id: &str,
    ) -> Result<ReviewRecord, ReviewError> {
        let nodes = self
            .graph
            .find_nodes(
                cancel,
                REVIEW_LABEL,
                &[("decision_id".to_string(), json!(decision_id))],
            )
            .await?;
        let node = nodes
            .into_iter()
            .next()
            .ok_or_else(|| ReviewError::NotFound(decision_id.to_string()))?;
        serde_json::from_value(node)
            .map_err(|e| AdapterError::ValidationFailed(format!("corrupt review record: {e}")).into())
    }

    async fn persist(
        &self,
        cancel: &CancellationToken,
        record: &ReviewRecord,
    ) -> Result<(), ReviewError> {
        let props = serde_json::to_value(record)
            .map_err(|e| AdapterError::ValidationFailed(format!("unserialisable review: {e}")))?;
        self.graph
            .upsert_node(cancel, REVIEW_LABEL, &record.id, props)
            .await?;
        self.graph
            .upsert_relation(cancel, &record.id, "REVIEWED_BY", &record.decision_id, json!({}))
            .await?;
        Ok(())
    }

    async fn promote_if_pending(
        &self,
        cancel: &CancellationToken,
        playbook_id: &str,
        reviewer: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ReviewError> {
        match self.playbooks.get(cancel, playbook_id).await {
            Ok(playbook) if playbook.status == PlaybookStatus::PendingReview => {
                self.playbooks
                    .transition(cancel, playbook_id, LifecycleAction::Approve, reviewer, now, None)
                    .await?;
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(StoreError::NotFound(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn archive_if_generated(
        &self,
        cancel: &CancellationToken,
        playbook_id: &str,
        reviewer: &str,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), ReviewError> {
        match self.playbooks.get(cancel, playbook_id).await {
            Ok(playbook)
                if playbook.source == PlaybookSource::LlmGenerated
                    && playbook.status == PlaybookStatus::PendingReview =>
            {
                self.playbooks
                    .transition(cancel, playbook_id, LifecycleAction::Reject, reviewer, now, notes)
                    .await?;
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(StoreError::NotFound(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Swarm orchestrator - parallel specialist dispatch under one deadline
//!
//! Spawns one task per registered specialist, all sharing a deadline
//! propagated as a child cancellation token. Results arrive on a completion
//! channel in completion order and are re-sorted by specialist id before
//! they leave the orchestrator, so downstream fusion is reproducible.
//!
//! Partial failure is expected: an erroring specialist contributes an ERROR
//! result, a late one a synthetic TIMEOUT result. The investigation is
//! degraded only when zero specialists succeed.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::specialists::Specialist;
use crate::resilience::AdapterError;
use crate::types::{AlertCluster, InvestigationReport, SpecialistResult};

pub struct SwarmOrchestrator {
    specialists: Vec<Arc<dyn Specialist>>,
}

impl SwarmOrchestrator {
    /// Specialists are held in id order; the same order the report uses.
    pub fn new(mut specialists: Vec<Arc<dyn Specialist>>) -> Self {
        specialists.sort_by_key(|s| s.id());
        Self { specialists }
    }

    pub fn specialist_count(&self) -> usize {
        self.specialists.len()
    }

    /// Investigate one cluster with a global deadline.
    ///
    /// Always returns exactly one result per registered specialist.
    pub async fn investigate(
        &self,
        cluster: &AlertCluster,
        deadline: Duration,
        cancel: &CancellationToken,
        now: DateTime<Utc>,
    ) -> InvestigationReport {
        let started = Instant::now();
        let swarm_cancel = cancel.child_token();
        let (tx, mut rx) = mpsc::channel::<(String, SpecialistResult)>(self.specialists.len().max(1));

        let mut tasks = JoinSet::new();
        for specialist in &self.specialists {
            let specialist = Arc::clone(specialist);
            let cluster = cluster.clone();
            let token = swarm_cancel.clone();
            let tx = tx.clone();
            tasks.spawn(async move {
                let task_started = Instant::now();
                let id = specialist.id().to_string();
                let result = match specialist.investigate(&cluster, &token, now).await {
                    Ok(result) => result,
                    Err(AdapterError::Cancelled) => {
                        SpecialistResult::timed_out(&id, task_started.elapsed())
                    }
                    Err(e) => {
                        let kind = match e {
                            AdapterError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
                            AdapterError::CircuitOpen => "CIRCUIT_OPEN",
                            AdapterError::ValidationFailed(_) => "VALIDATION_FAILED",
                            AdapterError::Cancelled => unreachable!(),
                        };
                        warn!(specialist = %id, error = %e, "Specialist failed");
                        SpecialistResult::errored(&id, kind, task_started.elapsed())
                    }
                };
                // A dropped receiver means the deadline already fired; the
                // late result is discarded by design.
                let _ = tx.send((id, result)).await;
            });
        }
        drop(tx);

        // Collect until every specialist reported or the deadline expired.
        let mut collected: HashMap<String, SpecialistResult> = HashMap::new();
        let deadline_at = started + deadline;
        while collected.len() < self.specialists.len() {
            let remaining = deadline_at.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match tokio::time::timeout(remaining, rx.recv()).await {
                Ok(Some((id, result))) => {
                    collected.insert(id, result);
                }
                Ok(None) => break,
                Err(_) => break,
            }
        }

        // Deadline expired: cancel stragglers and synthesise their results.
        swarm_cancel.cancel();
        tasks.abort_all();

        let elapsed = started.elapsed();
        let results: Vec<SpecialistResult> = self
            .specialists
            .iter()
            .map(|s| {
                collected
                    .remove(s.id())
                    .unwrap_or_else(|| SpecialistResult::timed_out(s.id(), elapsed))
            })
            .collect();

        let successes = results.iter().filter(|r| r.status.is_success()).count();
        let degraded = successes == 0;
        if degraded {
            warn!(
                cluster = %cluster.id,
                specialists = results.len(),
                "Investigation degraded: zero specialists succeeded"
            );
        } else {
            info!(
                cluster = %cluster.id,
                successes,
                total = results.len(),
                elapsed_ms = elapsed.as_millis(),
                "Investigation complete"
            );
        }

        InvestigationReport {
            cluster_id: cluster.id.clone(),
            results,
            degraded,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

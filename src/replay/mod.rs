//! Replay engine - deterministic re-execution of recorded alerts
//!
//! Replays a ledger of historical alerts through the same
//! normalise → cluster → investigate → decide chain under a frozen
//! configuration snapshot (model version, weight matrix, policy, seed).
//! The investigation stage runs offline specialists that derive results
//! purely from recorded content, so a replay of the same events is
//! byte-identical every time.
//!
//! Each replayed decision is compared against the original and classified
//! match / safe divergence / unsafe divergence; a validation run passes
//! only with zero unsafe divergences.

mod ledger;
mod offline;

pub use ledger::{LedgerError, ReplayLedger};
pub use offline::offline_specialists;

use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::WeightMatrix;
use crate::decision::{DecisionEngine, ThresholdPolicy};
use crate::ingest::cluster_cycle;
use crate::swarm::SwarmOrchestrator;
use crate::types::{
    AutomationLevel, DecisionCandidate, DecisionType, DivergenceClass, NormalisedAlert,
    ReplayEvent, ReplayMode, ReplayReport, RiskLevel, ValidationStatus,
};

pub struct ReplayEngine {
    swarm: SwarmOrchestrator,
    engine: DecisionEngine,
}

impl ReplayEngine {
    /// Build an engine from a frozen configuration snapshot.
    pub fn new(
        weights: WeightMatrix,
        policy: ThresholdPolicy,
        model_version: &str,
        default_automation: AutomationLevel,
    ) -> Self {
        Self {
            swarm: SwarmOrchestrator::new(offline_specialists()),
            engine: DecisionEngine::new(weights, policy, model_version, default_automation),
        }
    }

    /// Re-decide every recorded event. Returns, per event, the original
    /// decision id and the replayed decision, in event order.
    pub async fn replay_decisions(
        &self,
        events: &[ReplayEvent],
    ) -> Vec<(String, DecisionCandidate)> {
        // Rebuild the cycle input from recorded alerts; they were already
        // canonical when recorded.
        let alerts: Vec<NormalisedAlert> = events
            .iter()
            .map(|e| NormalisedAlert {
                alert: e.alert.clone(),
                canonical_service: e.alert.service.clone(),
                validation: ValidationStatus::Valid,
            })
            .collect();
        let clusters = cluster_cycle(alerts);

        let cancel = CancellationToken::new();
        let mut decisions: Vec<(String, DecisionCandidate)> = Vec::new();
        let mut decided: BTreeMap<String, DecisionCandidate> = BTreeMap::new();

        for cluster in &clusters {
            // The recorded cluster end is the clock: replays of the same
            // ledger always see the same "now".
            let now = cluster.latest;
            let report = self
                .swarm
                .investigate(cluster, Duration::from_secs(30), &cancel, now)
                .await;
            let decision = self.engine.fuse(cluster, &report, now);
            for member in &cluster.members {
                decided.insert(member.alert.fingerprint.clone(), decision.clone());
            }
        }

        for event in events {
            if let Some(decision) = decided.get(&event.alert.fingerprint) {
                decisions.push((event.decision.id.clone(), decision.clone()));
            }
        }
        decisions
    }

    /// Replay and classify against the originals.
    pub async fn replay(&self, events: &[ReplayEvent], mode: ReplayMode) -> ReplayReport {
        let replayed = self.replay_decisions(events).await;

        let mut matches = 0usize;
        let mut safe = 0usize;
        let mut unsafe_bypasses = 0usize;
        // bucket → (total, same-bucket count)
        let mut buckets: BTreeMap<u8, (usize, usize)> = BTreeMap::new();

        for (event, (_, new_decision)) in events.iter().zip(replayed.iter()) {
            let original = &event.decision;
            match classify(original, new_decision) {
                DivergenceClass::Match => matches += 1,
                DivergenceClass::DivergenceSafe => safe += 1,
                DivergenceClass::DivergenceUnsafe => {
                    warn!(
                        decision = %original.id,
                        original_risk = %original.risk,
                        replayed_type = ?new_decision.decision_type,
                        "Unsafe divergence in replay"
                    );
                    unsafe_bypasses += 1;
                }
            }

            let bucket = confidence_bucket(original.confidence);
            let entry = buckets.entry(bucket).or_insert((0, 0));
            entry.0 += 1;
            if confidence_bucket(new_decision.confidence) == bucket {
                entry.1 += 1;
            }
        }

        let events_replayed = replayed.len();
        let alignment_rate = if events_replayed > 0 {
            matches as f64 / events_replayed as f64
        } else {
            1.0
        };
        let confidence_bucket_precision: Vec<(u8, f64)> = buckets
            .into_iter()
            .map(|(bucket, (total, same))| (bucket, same as f64 / total.max(1) as f64))
            .collect();

        let passed = unsafe_bypasses == 0;
        info!(
            mode = ?mode,
            events = events_replayed,
            matches,
            safe_divergences = safe,
            unsafe_bypasses,
            passed,
            "Replay complete"
        );

        ReplayReport {
            mode,
            events_replayed,
            matches,
            safe_divergences: safe,
            unsafe_bypass_count: unsafe_bypasses,
            alignment_rate,
            confidence_bucket_precision,
            passed,
        }
    }
}

fn confidence_bucket(confidence: f64) -> u8 {
    ((confidence * 10.0).floor() as u8).min(9)
}

fn high_risk(risk: RiskLevel) -> bool {
    risk >= RiskLevel::High
}

/// Compare a replayed decision against the original.
///
/// Unsafe: a high-risk original became auto-approvable in replay, or a
/// replayed high-risk decision was auto-approvable originally. Everything
/// else diverging within the same governance outcome is safe.
fn classify(original: &DecisionCandidate, replayed: &DecisionCandidate) -> DivergenceClass {
    if high_risk(original.risk) && replayed.decision_type == DecisionType::AutoApprove {
        return DivergenceClass::DivergenceUnsafe;
    }
    if high_risk(replayed.risk) && original.decision_type == DecisionType::AutoApprove {
        return DivergenceClass::DivergenceUnsafe;
    }
    if original.risk == replayed.risk
        && original.decision_type == replayed.decision_type
        && original.automation == replayed.automation
    {
        return DivergenceClass::Match;
    }
    if original.risk != replayed.risk {
        // Bucket moved without flipping the approval gate; governance
        // outcome is unchanged, so this still counts as safe.
        warn!(
            decision = %original.id,
            from = %original.risk,
            to = %replayed.risk,
            "Replay shifted the risk bucket"
        );
    }
    DivergenceClass::DivergenceSafe
}

// ============================================================================
// Tests
// ============================================================================

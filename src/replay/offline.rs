//! Offline specialists for deterministic replay
//!
//! Replay must produce byte-identical decisions under a fixed configuration
//! and seed, so its investigation stage cannot touch live adapters. These
//! specialists carry the same ids as the live set but derive their results
//! purely from the recorded alert content: same input, same output, every
//! run.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::resilience::AdapterError;
use crate::swarm::Specialist;
use crate::types::{
    AlertCluster, CompletionStatus, EvidenceItem, EvidenceKind, Severity, SpecialistResult,
};

/// Deterministic pseudo-confidence from cluster content in [0.3, 0.9].
/// FNV-style fold over the member fingerprints keeps it stable.
fn content_score(cluster: &AlertCluster, salt: &str) -> f64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in salt.bytes() {
        hash = (hash ^ u64::from(byte)).wrapping_mul(0x100_0000_01b3);
    }
    for member in &cluster.members {
        for byte in member.alert.fingerprint.bytes() {
            hash = (hash ^ u64::from(byte)).wrapping_mul(0x100_0000_01b3);
        }
    }
    0.3 + (hash % 1000) as f64 / 1000.0 * 0.6
}

fn severity_weight(cluster: &AlertCluster) -> f64 {
    match cluster.severity() {
        Severity::Critical => 1.0,
        Severity::High => 0.8,
        Severity::Warning => 0.5,
        Severity::Info => 0.3,
    }
}

struct OfflineSpecialist {
    id: &'static str,
    kind: EvidenceKind,
}

#[async_trait]
impl Specialist for OfflineSpecialist {
    fn id(&self) -> &'static str {
        self.id
    }

    async fn investigate(
        &self,
        cluster: &AlertCluster,
        _cancel: &CancellationToken,
        now: DateTime<Utc>,
    ) -> Result<SpecialistResult, AdapterError> {
        let base = content_score(cluster, self.id);
        let confidence = (base * severity_weight(cluster)).clamp(0.0, 0.95);

        let descriptions: Vec<&str> = cluster
            .members
            .iter()
            .map(|m| m.alert.description.as_str())
            .collect();
        let hypothesis = format!(
            "[replay:{}] {} on {}: {}",
            self.id,
            cluster.cluster_type,
            cluster.service,
            descriptions.join("; ")
        );

        let evidence = vec![EvidenceItem {
            kind: self.kind,
            source: format!("replay:{}", self.id),
            description: format!("recorded signals for {}", cluster.service),
            quality: base,
            timestamp: now,
            value: Some(base),
        }];

        Ok(SpecialistResult {
            specialist_id: self.id.to_string(),
            hypothesis,
            confidence,
            evidence,
            suggested_actions: Vec::new(),
            status: CompletionStatus::Success,
            elapsed: Duration::ZERO,
        })
    }
}

/// The offline counterpart of the live specialist set.
pub fn offline_specialists() -> Vec<Arc<dyn Specialist>> {
    vec![
        Arc::new(OfflineSpecialist {
            id: "metrics",
            kind: EvidenceKind::Metric,
        }),
        Arc::new(OfflineSpecialist {
            id: "logs",
            kind: EvidenceKind::Log,
        }),
        Arc::new(OfflineSpecialist {
            id: "embeddings",
            kind: EvidenceKind::SimilarIncident,
        }),
        Arc::new(OfflineSpecialist {
            id: "graph",
            kind: EvidenceKind::GraphRelation,
        }),
        Arc::new(OfflineSpecialist {
            id: "correlator",
            kind: EvidenceKind::Metric,
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Alert, AlertStatus, ClusterBasis, NormalisedAlert, ValidationStatus};
    use std::collections::BTreeMap;

    fn cluster() -> AlertCluster {
        AlertCluster {
            id: "cluster-1".to_string(),
            service: "api".to_string(),
            earliest: Utc::now(),
            latest: Utc::now(),
            cluster_type: "service-degradation".to_string(),
            basis: ClusterBasis::SharedService,
            members: vec![NormalisedAlert {
                alert: Alert {
                    received_at: Utc::now(),
                    provider: "prom".to_string(),
                    fingerprint: "fp-stable".to_string(),
                    service: "api".to_string(),
                    severity: Severity::High,
                    description: "5xx spike".to_string(),
                    labels: BTreeMap::new(),
                    annotations: BTreeMap::new(),
                    status: AlertStatus::Firing,
                },
                canonical_service: "api".to_string(),
                validation: ValidationStatus::Valid,
            }],
        }
    }

    #[tokio::test]
    async fn results_are_reproducible() {
        let cancel = CancellationToken::new();
        let now = Utc::now();
        for specialist in offline_specialists() {
            let a = specialist.investigate(&cluster(), &cancel, now).await.unwrap();
            let b = specialist.investigate(&cluster(), &cancel, now).await.unwrap();
            assert_eq!(a.confidence, b.confidence);
            assert_eq!(a.hypothesis, b.hypothesis);
        }
    }

    #[tokio::test]
    async fn different_specialists_score_differently() {
        let cancel = CancellationToken::new();
        let now = Utc::now();
        let specialists = offline_specialists();
        let first = specialists[0]
            .investigate(&cluster(), &cancel, now)
            .await
            .unwrap();
        let second = specialists[1]
            .investigate(&cluster(), &cancel, now)
            .await
            .unwrap();
        assert_ne!(first.confidence, second.confidence);
    }
}

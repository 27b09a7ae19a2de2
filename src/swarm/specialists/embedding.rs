//! Embedding specialist - similar historical incidents via vector search
//!
//! Embeds the cluster's description and searches the vector store for
//! previously confirmed incidents. Search is read-only here; incident
//! embeddings are only persisted after a human confirms the decision, so
//! unreviewed hypotheses never pollute the index.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use super::Specialist;
use crate::adapters::{TextGenerator, VectorStore};
use crate::resilience::AdapterError;
use crate::types::{
    AlertCluster, CompletionStatus, EvidenceItem, EvidenceKind, SpecialistResult,
};

const TOP_K: usize = 5;
const MIN_SCORE: f64 = 0.70;

pub struct EmbeddingSpecialist {
    generator: Arc<dyn TextGenerator>,
    vectors: Arc<dyn VectorStore>,
}

impl EmbeddingSpecialist {
    pub fn new(generator: Arc<dyn TextGenerator>, vectors: Arc<dyn VectorStore>) -> Self {
        Self { generator, vectors }
    }

    /// Text the incident is embedded under: service plus member summaries.
    pub fn incident_text(cluster: &AlertCluster) -> String {
        let mut text = format!("service: {}\n", cluster.service);
        for member in &cluster.members {
            text.push_str(&format!(
                "[{}] {}\n",
                member.alert.severity, member.alert.description
            ));
        }
        text
    }
}

#[async_trait]
impl Specialist for EmbeddingSpecialist {
    fn id(&self) -> &'static str {
        "embeddings"
    }

    async fn investigate(
        &self,
        cluster: &AlertCluster,
        cancel: &CancellationToken,
        now: DateTime<Utc>,
    ) -> Result<SpecialistResult, AdapterError> {
        let started = Instant::now();
        let text = Self::incident_text(cluster);
        let vector = self.generator.embed(cancel, &text).await?;
        let hits = self
            .vectors
            .search(cancel, &vector, TOP_K, MIN_SCORE)
            .await?;

        if hits.is_empty() {
            return Ok(SpecialistResult {
                specialist_id: self.id().to_string(),
                hypothesis: format!(
                    "No similar historical incident found for {}",
                    cluster.service
                ),
                confidence: 0.15,
                evidence: Vec::new(),
                suggested_actions: Vec::new(),
                status: CompletionStatus::Success,
                elapsed: started.elapsed(),
            });
        }

        let evidence: Vec<EvidenceItem> = hits
            .iter()
            .map(|hit| {
                let summary = hit
                    .payload
                    .get("hypothesis")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unlabelled incident");
                EvidenceItem {
                    kind: EvidenceKind::SimilarIncident,
                    source: hit.id.clone(),
                    description: format!("similar incident ({:.0}% match): {summary}", hit.score * 100.0),
                    quality: hit.score.clamp(0.0, 1.0),
                    timestamp: now,
                    value: Some(hit.score),
                }
            })
            .collect();

        let best = &hits[0];
        let best_summary = best
            .payload
            .get("hypothesis")
            .and_then(|v| v.as_str())
            .unwrap_or("a previously confirmed incident");
        let actions: Vec<String> = best
            .payload
            .get("actions")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|a| a.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        Ok(SpecialistResult {
            specialist_id: self.id().to_string(),
            hypothesis: format!(
                "Incident resembles {best_summary} (similarity {:.0}%)",
                best.score * 100.0
            ),
            confidence: (best.score * 0.9).clamp(0.0, 0.9),
            evidence,
            suggested_actions: actions,
            status: CompletionStatus::Success,
            elapsed: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Alert, AlertStatus, ClusterBasis, NormalisedAlert, Severity, ValidationStatus};
    use std::collections::BTreeMap;

    #[test]
    fn incident_text_includes_service_and_members() {
        let cluster = AlertCluster {
            id: "c1".to_string(),
            service: "checkout".to_string(),
            earliest: Utc::now(),
            latest: Utc::now(),
            cluster_type: "service-degradation".to_string(),
            basis: ClusterBasis::SharedService,
            members: vec![NormalisedAlert {
                alert: Alert {
                    received_at: Utc::now(),
                    provider: "prom".to_string(),
                    fingerprint: "fp".to_string(),
                    service: "checkout".to_string(),
                    severity: Severity::High,
                    description: "5xx spike".to_string(),
                    labels: BTreeMap::new(),
                    annotations: BTreeMap::new(),
                    status: AlertStatus::Firing,
                },
                canonical_service: "checkout".to_string(),
                validation: ValidationStatus::Valid,
            }],
        };
        let text = EmbeddingSpecialist::incident_text(&cluster);
        assert!(text.contains("checkout"));
        assert!(text.contains("5xx spike"));
        assert!(text.contains("high"));
    }
}

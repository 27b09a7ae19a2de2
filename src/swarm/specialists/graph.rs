//! Graph specialist - service topology context

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use super::Specialist;
use crate::adapters::GraphStore;
use crate::resilience::AdapterError;
use crate::types::{
    AlertCluster, CompletionStatus, EvidenceItem, EvidenceKind, SpecialistResult,
};

pub struct GraphSpecialist {
    graph: Arc<dyn GraphStore>,
}

impl GraphSpecialist {
    pub fn new(graph: Arc<dyn GraphStore>) -> Self {
        Self { graph }
    }
}

#[async_trait]
impl Specialist for GraphSpecialist {
    fn id(&self) -> &'static str {
        "graph"
    }

    async fn investigate(
        &self,
        cluster: &AlertCluster,
        cancel: &CancellationToken,
        now: DateTime<Utc>,
    ) -> Result<SpecialistResult, AdapterError> {
        let started = Instant::now();

        // Upstream dependencies of the affected service, one hop out.
        let rows = self
            .graph
            .query(
                cancel,
                "MATCH (s:Service {name: $service})-[:DEPENDS_ON]->(d:Service) \
                 RETURN d.name AS name, d.health AS health",
                json!({ "service": cluster.service }),
            )
            .await?;

        let mut evidence = Vec::new();
        let mut unhealthy: Vec<String> = Vec::new();
        for row in &rows {
            let name = row
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string();
            let health = row.get("health").and_then(|v| v.as_str()).unwrap_or("unknown");
            let degraded = health == "degraded" || health == "down";
            evidence.push(EvidenceItem {
                kind: EvidenceKind::GraphRelation,
                source: name.clone(),
                description: format!("{} depends on {name} (health: {health})", cluster.service),
                quality: if degraded { 0.8 } else { 0.4 },
                timestamp: now,
                value: None,
            });
            if degraded {
                unhealthy.push(name);
            }
        }

        let (hypothesis, confidence, actions) = if !unhealthy.is_empty() {
            (
                format!(
                    "{} depends on degraded upstream {} - failure is likely propagated",
                    cluster.service,
                    unhealthy.join(", ")
                ),
                0.75,
                unhealthy
                    .iter()
                    .map(|dep| format!("Investigate upstream service {dep} before restarting {}", cluster.service))
                    .collect(),
            )
        } else if rows.is_empty() {
            (
                format!("No topology recorded for {}", cluster.service),
                0.1,
                Vec::new(),
            )
        } else {
            (
                format!(
                    "All {} recorded dependencies of {} are healthy - fault is likely local",
                    rows.len(),
                    cluster.service
                ),
                0.5,
                Vec::new(),
            )
        };

        Ok(SpecialistResult {
            specialist_id: self.id().to_string(),
            hypothesis,
            confidence,
            evidence,
            suggested_actions: actions,
            status: CompletionStatus::Success,
            elapsed: started.elapsed(),
        })
    }
}

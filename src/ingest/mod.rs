//! Alert ingestion - poll providers, normalise, deduplicate, cluster
//!
//! Providers are polled in priority order, highest first. The first
//! provider that answers (even with an empty list) wins the cycle; lower
//! priority providers are skipped. A provider failing its resilience guard
//! counts as unavailable. When every provider fails the cycle surfaces
//! `NO_PROVIDER_AVAILABLE` and the controller skips the tick.

mod clusterer;
mod dedup;
mod normalizer;
mod provider;

pub use clusterer::cluster_cycle;
pub use dedup::DedupWindow;
pub use normalizer::normalise;
pub use provider::{AlertProvider, HttpAlertProvider, NormalisationRecipe};

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::defaults::DEDUP_WINDOW_SECS;
use crate::types::{AlertCluster, ValidationStatus};

/// Ingestion failures surfaced to the controller.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Every configured provider failed this cycle
    #[error("no alert provider available")]
    NoProviderAvailable,
}

/// Outcome of one collection cycle.
#[derive(Debug)]
pub struct CycleOutcome {
    pub clusters: Vec<AlertCluster>,
    /// Provider that answered this cycle
    pub provider: String,
    pub alerts_seen: usize,
    pub rejected: usize,
    pub duplicates_dropped: u64,
}

/// Polls providers and turns raw alerts into finalised clusters.
pub struct AlertCollector {
    providers: Vec<Arc<dyn AlertProvider>>,
    dedup: DedupWindow,
}

impl AlertCollector {
    /// Build a collector; providers are polled in descending priority.
    pub fn new(mut providers: Vec<Arc<dyn AlertProvider>>) -> Self {
        providers.sort_by(|a, b| b.priority().cmp(&a.priority()));
        Self {
            providers,
            dedup: DedupWindow::new(DEDUP_WINDOW_SECS),
        }
    }

    /// Run one cycle: poll → normalise → dedup → cluster.
    pub async fn collect_cycle(
        &mut self,
        cancel: &CancellationToken,
        now: DateTime<Utc>,
    ) -> Result<CycleOutcome, IngestError> {
        let duplicates_before = self.dedup.total_duplicates();

        let (provider, raw_alerts) = self.poll_providers(cancel).await?;
        let alerts_seen = raw_alerts.len();

        let mut normalised = Vec::with_capacity(raw_alerts.len());
        let mut rejected = 0usize;
        for raw in &raw_alerts {
            let received_at = raw.starts_at.unwrap_or(now);
            let alert = normalise(raw, provider.name(), provider.recipe(), received_at);
            match &alert.validation {
                ValidationStatus::Valid => {
                    if self.dedup.admit(&alert.alert.fingerprint, received_at) {
                        normalised.push(alert);
                    }
                }
                ValidationStatus::Rejected { reason } => {
                    warn!(
                        provider = provider.name(),
                        reason = %reason,
                        "Alert rejected during normalisation"
                    );
                    rejected += 1;
                }
            }
        }

        let clusters = cluster_cycle(normalised);
        let duplicates_dropped = self.dedup.total_duplicates() - duplicates_before;

        info!(
            provider = provider.name(),
            alerts = alerts_seen,
            rejected,
            duplicates = duplicates_dropped,
            clusters = clusters.len(),
            "Collection cycle complete"
        );

        Ok(CycleOutcome {
            clusters,
            provider: provider.name().to_string(),
            alerts_seen,
            rejected,
            duplicates_dropped,
        })
    }

    /// Try providers highest-priority first; first answer wins the cycle.
    async fn poll_providers(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(Arc<dyn AlertProvider>, Vec<crate::adapters::ProviderAlert>), IngestError> {
        for provider in &self.providers {
            match provider.list_active(cancel).await {
                Ok(alerts) => {
                    debug!(
                        provider = provider.name(),
                        count = alerts.len(),
                        "Provider answered"
                    );
                    return Ok((Arc::clone(provider), alerts));
                }
                Err(e) => {
                    warn!(
                        provider = provider.name(),
                        error = %e,
                        "Provider unavailable this cycle"
                    );
                }
            }
        }
        Err(IngestError::NoProviderAvailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ProviderAlert;
    use crate::resilience::AdapterError;
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    struct FakeProvider {
        name: String,
        priority: i32,
        recipe: NormalisationRecipe,
        alerts: Option<Vec<ProviderAlert>>,
    }

    impl FakeProvider {
        fn up(name: &str, priority: i32, alerts: Vec<ProviderAlert>) -> Arc<dyn AlertProvider> {
            Arc::new(Self {
                name: name.to_string(),
                priority,
                recipe: NormalisationRecipe::default(),
                alerts: Some(alerts),
            })
        }

        fn down(name: &str, priority: i32) -> Arc<dyn AlertProvider> {
            Arc::new(Self {
                name: name.to_string(),
                priority,
                recipe: NormalisationRecipe::default(),
                alerts: None,
            })
        }
    }

    #[async_trait]
    impl AlertProvider for FakeProvider {
        fn name(&self) -> &str {
            &self.name
        }
        fn priority(&self) -> i32 {
            self.priority
        }
        fn recipe(&self) -> &NormalisationRecipe {
            &self.recipe
        }
        async fn list_active(
            &self,
            _cancel: &CancellationToken,
        ) -> Result<Vec<ProviderAlert>, AdapterError> {
            self.alerts
                .clone()
                .ok_or_else(|| AdapterError::UpstreamUnavailable("down".to_string()))
        }
    }

    fn raw(service: &str, severity: &str) -> ProviderAlert {
        let mut labels = BTreeMap::new();
        labels.insert("service".to_string(), service.to_string());
        labels.insert("severity".to_string(), severity.to_string());
        ProviderAlert {
            fingerprint: None,
            labels,
            annotations: BTreeMap::new(),
            severity: Some(severity.to_string()),
            description: Some(format!("{service} failing")),
            status: Some("firing".to_string()),
            starts_at: None,
        }
    }

    #[tokio::test]
    async fn highest_priority_provider_wins() {
        let mut collector = AlertCollector::new(vec![
            FakeProvider::up("low", 10, vec![raw("db", "high")]),
            FakeProvider::up("high", 100, vec![raw("api", "critical")]),
        ]);
        let outcome = collector
            .collect_cycle(&CancellationToken::new(), Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome.provider, "high");
        assert_eq!(outcome.clusters.len(), 1);
        assert_eq!(outcome.clusters[0].service, "api");
    }

    #[tokio::test]
    async fn failed_provider_falls_through() {
        let mut collector = AlertCollector::new(vec![
            FakeProvider::down("primary", 100),
            FakeProvider::up("fallback", 10, vec![raw("db", "warning")]),
        ]);
        let outcome = collector
            .collect_cycle(&CancellationToken::new(), Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome.provider, "fallback");
    }

    #[tokio::test]
    async fn empty_answer_still_wins_cycle() {
        let mut collector = AlertCollector::new(vec![
            FakeProvider::up("primary", 100, Vec::new()),
            FakeProvider::up("fallback", 10, vec![raw("db", "high")]),
        ]);
        let outcome = collector
            .collect_cycle(&CancellationToken::new(), Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome.provider, "primary");
        assert!(outcome.clusters.is_empty());
    }

    #[tokio::test]
    async fn all_providers_down_surfaces_no_provider() {
        let mut collector = AlertCollector::new(vec![
            FakeProvider::down("a", 100),
            FakeProvider::down("b", 10),
        ]);
        let err = collector
            .collect_cycle(&CancellationToken::new(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::NoProviderAvailable));
    }

    #[tokio::test]
    async fn duplicates_within_window_dropped() {
        let mut collector = AlertCollector::new(vec![FakeProvider::up(
            "prom",
            100,
            vec![raw("api", "high"), raw("api", "high")],
        )]);
        let outcome = collector
            .collect_cycle(&CancellationToken::new(), Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome.duplicates_dropped, 1);
        assert_eq!(outcome.clusters[0].members.len(), 1);
    }
}

//! Correlator specialist - cross-series statistical relationships
//!
//! Pulls paired series for the affected service and runs the correlation
//! analyzer over each pair, surfacing the strongest pattern as its
//! hypothesis. Lagged correlations carry a remediation hint: the leading
//! series points at the cause.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use super::Specialist;
use crate::adapters::MetricsSource;
use crate::correlation::{AnalyzeOptions, CorrelationAnalyzer};
use crate::resilience::AdapterError;
use crate::types::{
    AlertCluster, CompletionStatus, CorrelationPattern, CorrelationStrength, CorrelationType,
    EvidenceItem, EvidenceKind, SpecialistResult,
};

const LOOKBACK_MINUTES: i64 = 60;
const STEP_SECS: u64 = 60;

pub struct CorrelatorSpecialist {
    source: Arc<dyn MetricsSource>,
}

impl CorrelatorSpecialist {
    pub fn new(source: Arc<dyn MetricsSource>) -> Self {
        Self { source }
    }

    /// Series pairs analysed for every incident, in fixed order so fusion
    /// inputs are reproducible.
    fn pairs(service: &str) -> Vec<(String, String, String, String)> {
        let error_rate = format!(
            "sum(rate(http_requests_total{{service=\"{service}\",code=~\"5..\"}}[5m]))"
        );
        let latency = format!(
            "histogram_quantile(0.99, sum(rate(http_request_duration_seconds_bucket{{service=\"{service}\"}}[5m])) by (le))"
        );
        let cpu = format!(
            "sum(rate(container_cpu_usage_seconds_total{{service=\"{service}\"}}[5m]))"
        );
        let memory = format!(
            "sum(container_memory_working_set_bytes{{service=\"{service}\"}})"
        );
        vec![
            ("cpu_usage".into(), cpu.clone(), "latency_p99".into(), latency.clone()),
            ("memory_bytes".into(), memory, "error_rate".into(), error_rate.clone()),
            ("latency_p99".into(), latency, "error_rate".into(), error_rate),
        ]
    }

    fn hint(pattern: &CorrelationPattern) -> Option<String> {
        if pattern.strength < CorrelationStrength::Strong {
            return None;
        }
        let hint = match (pattern.series_a.as_str(), pattern.lag_offset) {
            ("cpu_usage", lag) if lag > 0 => {
                "CPU saturation precedes the latency rise; raise CPU limits or scale out".to_string()
            }
            ("memory_bytes", lag) if lag > 0 => {
                "Memory growth precedes the errors; check for leaks and raise memory limits".to_string()
            }
            (a, _) => format!("{a} and {} move together; treat {a} as the leading signal", pattern.series_b),
        };
        Some(hint)
    }
}

#[async_trait]
impl Specialist for CorrelatorSpecialist {
    fn id(&self) -> &'static str {
        "correlator"
    }

    async fn investigate(
        &self,
        cluster: &AlertCluster,
        cancel: &CancellationToken,
        now: DateTime<Utc>,
    ) -> Result<SpecialistResult, AdapterError> {
        let started = Instant::now();
        let start = now - Duration::minutes(LOOKBACK_MINUTES);
        let options = AnalyzeOptions {
            correlation_type: CorrelationType::MetricMetric,
            ..Default::default()
        };

        let mut patterns: Vec<CorrelationPattern> = Vec::new();
        for (name_a, expr_a, name_b, expr_b) in Self::pairs(&cluster.service) {
            let series_a = match self
                .source
                .query_range(cancel, &expr_a, start, now, STEP_SECS)
                .await
            {
                Ok(s) => s,
                Err(AdapterError::Cancelled) => return Err(AdapterError::Cancelled),
                Err(e) => {
                    tracing::debug!(series = %name_a, error = %e, "Series fetch failed");
                    continue;
                }
            };
            let series_b = match self
                .source
                .query_range(cancel, &expr_b, start, now, STEP_SECS)
                .await
            {
                Ok(s) => s,
                Err(AdapterError::Cancelled) => return Err(AdapterError::Cancelled),
                Err(e) => {
                    tracing::debug!(series = %name_b, error = %e, "Series fetch failed");
                    continue;
                }
            };

            let mut pattern =
                CorrelationAnalyzer::analyze(&series_a, &series_b, &name_a, &name_b, &options);
            pattern.remediation_hint = Self::hint(&pattern);
            if pattern.degraded_reason.is_none() {
                patterns.push(pattern);
            }
        }

        // Strongest posterior first; fixed sort keys keep ordering stable.
        patterns.sort_by(|a, b| {
            b.posterior
                .total_cmp(&a.posterior)
                .then_with(|| a.series_a.cmp(&b.series_a))
        });

        let evidence: Vec<EvidenceItem> = patterns
            .iter()
            .map(|p| EvidenceItem {
                kind: EvidenceKind::Metric,
                source: format!("{}~{}", p.series_a, p.series_b),
                description: format!(
                    "r={:.2} lag={} p={:.4} posterior={:.2} between {} and {}",
                    p.r_value, p.lag_offset, p.p_value, p.posterior, p.series_a, p.series_b
                ),
                quality: p.posterior,
                timestamp: now,
                value: Some(p.r_value),
            })
            .collect();

        let Some(best) = patterns.first() else {
            return Ok(SpecialistResult {
                specialist_id: self.id().to_string(),
                hypothesis: format!(
                    "No usable correlation for {} (series too short or constant)",
                    cluster.service
                ),
                confidence: 0.1,
                evidence: Vec::new(),
                suggested_actions: Vec::new(),
                status: CompletionStatus::Success,
                elapsed: started.elapsed(),
            });
        };

        let hypothesis = format!(
            "{} correlates with {} (r={:.2}, lag {} samples, {:?})",
            best.series_a, best.series_b, best.r_value, best.lag_offset, best.strength
        );
        let actions = best.remediation_hint.clone().into_iter().collect();

        Ok(SpecialistResult {
            specialist_id: self.id().to_string(),
            hypothesis,
            confidence: best.posterior,
            evidence,
            suggested_actions: actions,
            status: CompletionStatus::Success,
            elapsed: started.elapsed(),
        })
    }
}

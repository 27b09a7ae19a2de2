//! Metrics specialist - time-series behaviour of the affected service

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use super::Specialist;
use crate::adapters::MetricsSource;
use crate::correlation::kahan;
use crate::resilience::AdapterError;
use crate::types::{
    AlertCluster, CompletionStatus, EvidenceItem, EvidenceKind, Severity, SpecialistResult,
};

/// Window of history inspected around the incident.
const LOOKBACK_MINUTES: i64 = 30;
/// Range query resolution.
const STEP_SECS: u64 = 60;

pub struct MetricsSpecialist {
    source: Arc<dyn MetricsSource>,
}

impl MetricsSpecialist {
    pub fn new(source: Arc<dyn MetricsSource>) -> Self {
        Self { source }
    }

    fn queries(service: &str) -> Vec<(&'static str, String)> {
        vec![
            (
                "error_rate",
                format!("sum(rate(http_requests_total{{service=\"{service}\",code=~\"5..\"}}[5m]))"),
            ),
            (
                "latency_p99",
                format!(
                    "histogram_quantile(0.99, sum(rate(http_request_duration_seconds_bucket{{service=\"{service}\"}}[5m])) by (le))"
                ),
            ),
            (
                "memory_bytes",
                format!("sum(container_memory_working_set_bytes{{service=\"{service}\"}})"),
            ),
            (
                "cpu_usage",
                format!("sum(rate(container_cpu_usage_seconds_total{{service=\"{service}\"}}[5m]))"),
            ),
        ]
    }
}

/// Relative change of the last quarter of a series against the first
/// quarter. NaN samples are skipped.
fn recent_shift(values: &[f64]) -> Option<f64> {
    let clean: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if clean.len() < 8 {
        return None;
    }
    let quarter = clean.len() / 4;
    let early = kahan::mean(&clean[..quarter]);
    let late = kahan::mean(&clean[clean.len() - quarter..]);
    if early.abs() < 1e-12 {
        return if late.abs() < 1e-12 { Some(0.0) } else { None };
    }
    Some((late - early) / early.abs())
}

#[async_trait]
impl Specialist for MetricsSpecialist {
    fn id(&self) -> &'static str {
        "metrics"
    }

    async fn investigate(
        &self,
        cluster: &AlertCluster,
        cancel: &CancellationToken,
        now: DateTime<Utc>,
    ) -> Result<SpecialistResult, AdapterError> {
        let started = Instant::now();
        let start = now - Duration::minutes(LOOKBACK_MINUTES);
        let mut evidence = Vec::new();
        let mut shifts: Vec<(&'static str, f64)> = Vec::new();

        for (name, expr) in Self::queries(&cluster.service) {
            let series = match self
                .source
                .query_range(cancel, &expr, start, now, STEP_SECS)
                .await
            {
                Ok(series) => series,
                Err(AdapterError::Cancelled) => return Err(AdapterError::Cancelled),
                Err(e) => {
                    // One failing query degrades quality, not the specialist.
                    tracing::debug!(metric = name, error = %e, "Metric query failed");
                    continue;
                }
            };
            if let Some(shift) = recent_shift(&series.values) {
                let quality = (shift.abs() / 2.0).clamp(0.1, 1.0);
                evidence.push(EvidenceItem {
                    kind: EvidenceKind::Metric,
                    source: name.to_string(),
                    description: format!("{name} shifted {:+.0}% over the last half hour", shift * 100.0),
                    quality,
                    timestamp: now,
                    value: Some(shift),
                });
                shifts.push((name, shift));
            }
        }

        if shifts.is_empty() {
            return Ok(SpecialistResult {
                specialist_id: self.id().to_string(),
                hypothesis: format!(
                    "No significant metric movement for {} in the last {} minutes",
                    cluster.service, LOOKBACK_MINUTES
                ),
                confidence: 0.2,
                evidence,
                suggested_actions: Vec::new(),
                status: CompletionStatus::Success,
                elapsed: started.elapsed(),
            });
        }

        // Largest mover drives the hypothesis.
        let (dominant, magnitude) = shifts
            .iter()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .map(|(name, shift)| (*name, *shift))
            .unwrap_or(("error_rate", 0.0));

        let (hypothesis, actions) = match dominant {
            "memory_bytes" if magnitude > 0.0 => (
                format!(
                    "{} memory footprint grew {:.0}% - likely memory leak or undersized limits",
                    cluster.service,
                    magnitude * 100.0
                ),
                vec![
                    format!("kubectl top pods -l service={}", cluster.service),
                    format!("kubectl describe deployment {} | grep -A4 Limits", cluster.service),
                ],
            ),
            "cpu_usage" if magnitude > 0.0 => (
                format!(
                    "{} CPU usage grew {:.0}% - possible CPU exhaustion or runaway workload",
                    cluster.service,
                    magnitude * 100.0
                ),
                vec![format!("kubectl top pods -l service={}", cluster.service)],
            ),
            "latency_p99" => (
                format!(
                    "{} p99 latency shifted {:+.0}% - downstream slowness or saturation",
                    cluster.service,
                    magnitude * 100.0
                ),
                vec![format!(
                    "Check upstream dependencies of {} for elevated latency",
                    cluster.service
                )],
            ),
            _ => (
                format!(
                    "{} error rate shifted {:+.0}% around the incident window",
                    cluster.service,
                    magnitude * 100.0
                ),
                vec![format!("kubectl logs -l service={} --since=30m | tail", cluster.service)],
            ),
        };

        // Confidence grows with the magnitude of the dominant shift and the
        // cluster's own severity.
        let severity_boost = match cluster.severity() {
            Severity::Critical => 0.15,
            Severity::High => 0.10,
            _ => 0.0,
        };
        let confidence = (0.4 + (magnitude.abs() / 2.0).min(0.4) + severity_boost).min(0.95);

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

//! Log specialist - pod logs and restart behaviour

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use super::Specialist;
use crate::adapters::ClusterIntrospection;
use crate::correlation::{detect_chains, TimedEvent};
use crate::resilience::AdapterError;
use crate::types::{
    AlertCluster, CompletionStatus, EvidenceItem, EvidenceKind, SpecialistResult,
};

const LOG_LOOKBACK_MINUTES: i64 = 30;
const MAX_LOG_LINES: usize = 500;
/// Restart count above which a pod is considered crash-looping.
const RESTART_LOOP_THRESHOLD: u32 = 5;
/// Two cluster events closer than this belong to the same chain.
const EVENT_CHAIN_WINDOW_SECS: i64 = 120;

fn error_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::unwrap_used)]
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(error|panic|fatal|exception|oom|out of memory|killed)\b").unwrap()
    })
}

pub struct LogSpecialist {
    introspection: Arc<dyn ClusterIntrospection>,
}

impl LogSpecialist {
    pub fn new(introspection: Arc<dyn ClusterIntrospection>) -> Self {
        Self { introspection }
    }
}

#[async_trait]
impl Specialist for LogSpecialist {
    fn id(&self) -> &'static str {
        "logs"
    }

    async fn investigate(
        &self,
        cluster: &AlertCluster,
        cancel: &CancellationToken,
        now: DateTime<Utc>,
    ) -> Result<SpecialistResult, AdapterError> {
        let started = Instant::now();
        let selector = format!("service={}", cluster.service);
        let pods = self.introspection.list_pods(cancel, &selector).await?;

        if pods.is_empty() {
            return Ok(SpecialistResult {
                specialist_id: self.id().to_string(),
                hypothesis: format!("No pods found matching {selector}"),
                confidence: 0.1,
                evidence: Vec::new(),
                suggested_actions: vec![format!("kubectl get pods -l {selector} -A")],
                status: CompletionStatus::Success,
                elapsed: started.elapsed(),
            });
        }

        let mut evidence = Vec::new();
        let mut total_error_lines = 0usize;
        let mut looping_pods: Vec<String> = Vec::new();
        let since = now - Duration::minutes(LOG_LOOKBACK_MINUTES);

        for pod in &pods {
            if pod.restart_count >= RESTART_LOOP_THRESHOLD {
                looping_pods.push(pod.name.clone());
                evidence.push(EvidenceItem {
                    kind: EvidenceKind::Event,
                    source: pod.name.clone(),
                    description: format!(
                        "Pod {} restarted {} times (restart-loop)",
                        pod.name, pod.restart_count
                    ),
                    quality: 0.9,
                    timestamp: now,
                    value: Some(f64::from(pod.restart_count)),
                });
            }

            let logs = match self
                .introspection
                .fetch_logs(cancel, &pod.name, since, MAX_LOG_LINES)
                .await
            {
                Ok(logs) => logs,
                Err(AdapterError::Cancelled) => return Err(AdapterError::Cancelled),
                Err(e) => {
                    tracing::debug!(pod = %pod.name, error = %e, "Log fetch failed");
                    continue;
                }
            };

            let error_lines: Vec<&str> = logs
                .lines()
                .filter(|line| error_line().is_match(line))
                .collect();
            if !error_lines.is_empty() {
                total_error_lines += error_lines.len();
                // Keep the most recent matching line as the sample
                let sample = error_lines.last().copied().unwrap_or_default();
                evidence.push(EvidenceItem {
                    kind: EvidenceKind::Log,
                    source: pod.name.clone(),
                    description: format!(
                        "{} error lines in {}; last: {}",
                        error_lines.len(),
                        pod.name,
                        truncate(sample, 160)
                    ),
                    quality: ((error_lines.len() as f64) / 50.0).clamp(0.2, 0.9),
                    timestamp: now,
                    value: Some(error_lines.len() as f64),
                });
            }
        }

        // Cluster events tell the ordering story logs alone cannot: a
        // monotonic chain (oom-kill → restart → readiness-fail) inside the
        // window is strong causal evidence.
        match self
            .introspection
            .fetch_events(cancel, &cluster.service, since)
            .await
        {
            Ok(events) => {
                let timed: Vec<TimedEvent> = events
                    .iter()
                    .map(|e| TimedEvent {
                        timestamp: e.timestamp,
                        label: e.reason.clone(),
                    })
                    .collect();
                for chain in
                    detect_chains(&timed, chrono::Duration::seconds(EVENT_CHAIN_WINDOW_SECS))
                {
                    evidence.push(EvidenceItem {
                        kind: EvidenceKind::Event,
                        source: cluster.service.clone(),
                        description: format!(
                            "event chain {} → {} ({} events in sequence)",
                            chain.series_a, chain.series_b, chain.sample_count
                        ),
                        quality: chain.posterior,
                        timestamp: now,
                        value: Some(chain.sample_count as f64),
                    });
                }
            }
            Err(AdapterError::Cancelled) => return Err(AdapterError::Cancelled),
            Err(e) => {
                tracing::debug!(namespace = %cluster.service, error = %e, "Event fetch failed");
            }
        }

        let (hypothesis, confidence, actions) = if !looping_pods.is_empty() {
            (
                format!(
                    "{} pods of {} are in a restart-loop ({})",
                    looping_pods.len(),
                    cluster.service,
                    looping_pods.join(", ")
                ),
                0.85,
                vec![
                    format!("kubectl describe pod {}", looping_pods[0]),
                    format!("kubectl logs {} --previous", looping_pods[0]),
                ],
            )
        } else if total_error_lines > 0 {
            (
                format!(
                    "{} emitted {} error-level log lines in the last {} minutes",
                    cluster.service, total_error_lines, LOG_LOOKBACK_MINUTES
                ),
                (0.4 + (total_error_lines as f64 / 100.0)).min(0.8),
                vec![format!(
                    "kubectl logs -l service={} --since={}m | grep -iE 'error|panic|fatal'",
                    cluster.service, LOG_LOOKBACK_MINUTES
                )],
            )
        } else {
            (
                format!(
                    "Logs for {} look clean over the last {} minutes",
                    cluster.service, LOG_LOOKBACK_MINUTES
                ),
                0.25,
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

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{cut}…")
    }
}

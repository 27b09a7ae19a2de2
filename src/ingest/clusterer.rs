//! Alert clustering - group normalised alerts into incidents
//!
//! Within one collection cycle, alerts group by
//! `(canonical service, 5-minute truncated time window)`. Clusters are
//! finalised at end of cycle. Cluster ids derive from content so a replayed
//! cycle produces identical clusters.

use chrono::{DateTime, TimeZone, Utc};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::config::defaults::CLUSTER_WINDOW_SECS;
use crate::types::{AlertCluster, ClusterBasis, NormalisedAlert, Severity};

/// Truncate a timestamp down to its clustering window.
fn truncate_window(at: DateTime<Utc>, window_secs: i64) -> DateTime<Utc> {
    let secs = at.timestamp();
    let truncated = secs - secs.rem_euclid(window_secs);
    Utc.timestamp_opt(truncated, 0)
        .single()
        .unwrap_or(at)
}

/// Content-derived cluster id: stable across replays of the same members.
fn cluster_id(service: &str, window_start: DateTime<Utc>, members: &[NormalisedAlert]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(service.as_bytes());
    hasher.update(b"|");
    hasher.update(window_start.timestamp().to_be_bytes());
    for member in members {
        hasher.update(b"|");
        hasher.update(member.alert.fingerprint.as_bytes());
    }
    let digest = hasher.finalize();
    format!("cluster-{:x}", digest)[..24].to_string()
}

/// Tag describing the dominant member severity; used for triage display.
fn cluster_type(members: &[NormalisedAlert]) -> String {
    let severity = members
        .iter()
        .map(|m| m.alert.severity)
        .max()
        .unwrap_or(Severity::Info);
    match severity {
        Severity::Critical => "critical-incident",
        Severity::High => "service-degradation",
        Severity::Warning => "early-warning",
        Severity::Info => "informational",
    }
    .to_string()
}

/// Group one cycle's valid alerts into clusters, arrival order preserved,
/// duplicates by fingerprint removed within each cluster.
///
/// Returned clusters are ordered by cluster id so downstream processing is
/// deterministic.
pub fn cluster_cycle(alerts: Vec<NormalisedAlert>) -> Vec<AlertCluster> {
    // BTreeMap keys keep (service, window) grouping deterministic.
    let mut groups: BTreeMap<(String, i64), Vec<NormalisedAlert>> = BTreeMap::new();
    for alert in alerts {
        if !alert.validation.is_valid() {
            continue;
        }
        let window = truncate_window(alert.alert.received_at, CLUSTER_WINDOW_SECS);
        let key = (alert.canonical_service.clone(), window.timestamp());
        let members = groups.entry(key).or_default();
        if members
            .iter()
            .any(|m| m.alert.fingerprint == alert.alert.fingerprint)
        {
            continue;
        }
        members.push(alert);
    }

    let mut clusters: Vec<AlertCluster> = groups
        .into_iter()
        .map(|((service, window_secs), members)| {
            let window_start = Utc
                .timestamp_opt(window_secs, 0)
                .single()
                .unwrap_or_else(Utc::now);
            let earliest = members
                .iter()
                .map(|m| m.alert.received_at)
                .min()
                .unwrap_or(window_start);
            let latest = members
                .iter()
                .map(|m| m.alert.received_at)
                .max()
                .unwrap_or(window_start);
            AlertCluster {
                id: cluster_id(&service, window_start, &members),
                service,
                earliest,
                latest,
                cluster_type: cluster_type(&members),
                basis: ClusterBasis::SharedService,
                members,
            }
        })
        .collect();

    clusters.sort_by(|a, b| a.id.cmp(&b.id));
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Alert, AlertStatus, ValidationStatus};
    use std::collections::BTreeMap as Map;

    fn alert(service: &str, fingerprint: &str, offset_secs: i64, severity: Severity) -> NormalisedAlert {
        let received_at = Utc
            .timestamp_opt(1_700_000_000 + offset_secs, 0)
            .single()
            .unwrap();
        NormalisedAlert {
            alert: Alert {
                received_at,
                provider: "prom".to_string(),
                fingerprint: fingerprint.to_string(),
                service: service.to_string(),
                severity,
                description: "test".to_string(),
                labels: Map::new(),
                annotations: Map::new(),
                status: AlertStatus::Firing,
            },
            canonical_service: service.to_string(),
            validation: ValidationStatus::Valid,
        }
    }

    #[test]
    fn same_service_same_window_clusters_together() {
        let clusters = cluster_cycle(vec![
            alert("api", "fp-1", 0, Severity::High),
            alert("api", "fp-2", 30, Severity::Warning),
        ]);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members.len(), 2);
        assert_eq!(clusters[0].service, "api");
    }

    #[test]
    fn different_services_split() {
        let clusters = cluster_cycle(vec![
            alert("api", "fp-1", 0, Severity::High),
            alert("db", "fp-2", 10, Severity::High),
        ]);
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn window_boundary_splits() {
        let clusters = cluster_cycle(vec![
            alert("api", "fp-1", 0, Severity::High),
            // More than one truncation step later
            alert("api", "fp-2", CLUSTER_WINDOW_SECS + 10, Severity::High),
        ]);
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn duplicate_fingerprints_dropped_within_cluster() {
        let clusters = cluster_cycle(vec![
            alert("api", "fp-1", 0, Severity::High),
            alert("api", "fp-1", 20, Severity::High),
        ]);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members.len(), 1);
    }

    #[test]
    fn rejected_alerts_excluded() {
        let mut bad = alert("api", "fp-1", 0, Severity::High);
        bad.validation = ValidationStatus::Rejected {
            reason: "test".to_string(),
        };
        let clusters = cluster_cycle(vec![bad]);
        assert!(clusters.is_empty());
    }

    #[test]
    fn cluster_ids_are_deterministic() {
        let make = || {
            cluster_cycle(vec![
                alert("api", "fp-1", 0, Severity::High),
                alert("api", "fp-2", 30, Severity::Warning),
            ])
        };
        assert_eq!(make()[0].id, make()[0].id);
    }

    #[test]
    fn cluster_severity_is_member_max() {
        let clusters = cluster_cycle(vec![
            alert("api", "fp-1", 0, Severity::Warning),
            alert("api", "fp-2", 30, Severity::Critical),
        ]);
        assert_eq!(clusters[0].severity(), Severity::Critical);
        assert_eq!(clusters[0].cluster_type, "critical-incident");
    }
}

//! Alert types: Severity, Alert, NormalisedAlert, AlertCluster
//!
//! Raw alerts arrive from monitoring providers, are validated and harmonised
//! into `NormalisedAlert`, then grouped into `AlertCluster`s that each
//! describe one incident.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Severity
// ============================================================================

/// Canonical alert severity, ordered info < warning < high < critical.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

/// Firing state reported by the provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Firing,
    Resolved,
}

// ============================================================================
// Raw alert
// ============================================================================

/// A single external monitoring notification, frozen after validation.
///
/// Labels and annotations use `BTreeMap` so serialisation order is stable
/// regardless of provider iteration order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    /// Arrival time at the collector
    pub received_at: DateTime<Utc>,
    /// Provider that produced the alert
    pub provider: String,
    /// Stable dedup hash; provider-supplied or derived
    pub fingerprint: String,
    /// Service the alert concerns
    pub service: String,
    pub severity: Severity,
    pub description: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub status: AlertStatus,
}

// ============================================================================
// Normalised alert
// ============================================================================

/// Outcome of boundary validation for a raw alert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ValidationStatus {
    Valid,
    Rejected { reason: String },
}

impl ValidationStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationStatus::Valid)
    }
}

/// Alert with provider-specific fields harmonised to the canonical model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalisedAlert {
    pub alert: Alert,
    /// Canonical service after extraction rules (label, description pattern,
    /// or the literal "unknown")
    pub canonical_service: String,
    pub validation: ValidationStatus,
}

// ============================================================================
// Alert cluster
// ============================================================================

/// How the members of a cluster were judged to belong together.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ClusterBasis {
    /// All members share the same canonical service
    SharedService,
    /// Members joined by an explicit correlation rule
    CorrelationRule { rule: String },
}

/// An ordered set of normalised alerts describing one incident.
///
/// Member order is arrival order; no two members share a fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertCluster {
    pub id: String,
    pub service: String,
    pub earliest: DateTime<Utc>,
    pub latest: DateTime<Utc>,
    /// Tag describing the dominant alert kind in the cluster
    pub cluster_type: String,
    pub basis: ClusterBasis,
    pub members: Vec<NormalisedAlert>,
}

impl AlertCluster {
    /// Highest severity among member alerts.
    pub fn severity(&self) -> Severity {
        self.members
            .iter()
            .map(|m| m.alert.severity)
            .max()
            .unwrap_or(Severity::Info)
    }
}

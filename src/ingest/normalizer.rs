//! Alert normalisation - harmonise provider-native alerts into the
//! canonical model
//!
//! Rules, in order:
//! 1. Severity mapped through the provider's recipe
//! 2. Service: label `service`, else first service-pattern match in the
//!    description, else the literal "unknown"
//! 3. Fingerprint: provider-supplied, else SHA-256 over
//!    service ‖ canonical labels ‖ severity ‖ truncated description
//! 4. Boundary validation; a bad alert is rejected, never fatal

use chrono::{DateTime, Utc};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

use super::provider::NormalisationRecipe;
use crate::adapters::ProviderAlert;
use crate::config::defaults::FINGERPRINT_DESCRIPTION_CHARS;
use crate::types::{Alert, AlertStatus, NormalisedAlert, Severity, ValidationStatus};

/// Patterns that extract a service name from free-text descriptions.
/// Checked in order; first capture wins.
fn service_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)service[=:\s]+([a-z0-9][a-z0-9_-]*)",
            r"(?i)deployment[=:\s]+([a-z0-9][a-z0-9_-]*)",
            r"(?i)pod[=:\s]+([a-z0-9][a-z0-9_-]*?)(?:-[0-9a-f]{5,10}-[0-9a-z]{5})?\b",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

/// Normalise one provider alert. Returns the alert with a validation
/// status; callers decide what to do with rejects.
pub fn normalise(
    raw: &ProviderAlert,
    provider: &str,
    recipe: &NormalisationRecipe,
    received_at: DateTime<Utc>,
) -> NormalisedAlert {
    let severity = recipe.map_severity(raw.severity.as_deref().or_else(|| {
        raw.labels.get("severity").map(String::as_str)
    }));

    let description = raw
        .description
        .clone()
        .or_else(|| raw.annotations.get("description").cloned())
        .or_else(|| raw.annotations.get("summary").cloned())
        .unwrap_or_default();

    let service = extract_service(raw, &description);

    let status = match raw.status.as_deref() {
        Some("resolved") => AlertStatus::Resolved,
        _ => AlertStatus::Firing,
    };

    let fingerprint = raw
        .fingerprint
        .clone()
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| derive_fingerprint(&service, raw, severity, &description));

    let alert = Alert {
        received_at,
        provider: provider.to_string(),
        fingerprint,
        service: service.clone(),
        severity,
        description: description.clone(),
        labels: raw.labels.clone(),
        annotations: raw.annotations.clone(),
        status,
    };

    let validation = validate(&alert);
    NormalisedAlert {
        alert,
        canonical_service: service,
        validation,
    }
}

/// Service extraction: label first, then description patterns, then
/// "unknown".
fn extract_service(raw: &ProviderAlert, description: &str) -> String {
    if let Some(service) = raw.labels.get("service") {
        if !service.is_empty() {
            return service.clone();
        }
    }
    for pattern in service_patterns() {
        if let Some(captures) = pattern.captures(description) {
            if let Some(m) = captures.get(1) {
                return m.as_str().to_string();
            }
        }
    }
    "unknown".to_string()
}

/// SHA-256 fingerprint over the stable identifying fields.
fn derive_fingerprint(
    service: &str,
    raw: &ProviderAlert,
    severity: Severity,
    description: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(service.as_bytes());
    hasher.update(b"|");
    // BTreeMap iteration is key-ordered, so label order at the provider
    // cannot change the fingerprint.
    for (key, value) in &raw.labels {
        hasher.update(key.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
        hasher.update(b";");
    }
    hasher.update(b"|");
    hasher.update(severity.to_string().as_bytes());
    hasher.update(b"|");
    let truncated: String = description.chars().take(FINGERPRINT_DESCRIPTION_CHARS).collect();
    hasher.update(truncated.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Boundary validation. A rejected alert carries the reason and is dropped
/// from clustering, but never aborts the cycle.
fn validate(alert: &Alert) -> ValidationStatus {
    if alert.fingerprint.is_empty() {
        return ValidationStatus::Rejected {
            reason: "empty fingerprint".to_string(),
        };
    }
    if alert.description.is_empty() && alert.labels.is_empty() {
        return ValidationStatus::Rejected {
            reason: "no description and no labels".to_string(),
        };
    }
    ValidationStatus::Valid
}

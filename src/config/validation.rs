//! Config validation: range checks that make a configuration fatal at
//! startup rather than subtly wrong at runtime.
//!
//! Violations are fatal (`ConfigError::Invalid`, exit code 1); suspicious
//! but workable values produce warnings only.

use tracing::warn;

use super::settings::{ConfigError, SystemConfig};

/// Policies the decision engine recognises.
const KNOWN_POLICIES: &[&str] = &["STRICT", "BALANCED", "PERMISSIVE"];

/// Automation levels accepted as the pre-downgrade default.
const KNOWN_AUTOMATION: &[&str] = &["MANUAL", "ASSISTED", "FULL"];

/// Validate a loaded configuration. Returns the first fatal violation.
pub fn validate(config: &SystemConfig) -> Result<(), ConfigError> {
    if config.controller.tick_interval_secs == 0 {
        return Err(ConfigError::Invalid(
            "controller.tick_interval_secs must be greater than zero".to_string(),
        ));
    }
    if config.controller.global_deadline_secs == 0 {
        return Err(ConfigError::Invalid(
            "controller.global_deadline_secs must be greater than zero".to_string(),
        ));
    }

    let policy = config.decision.policy.to_uppercase();
    if !KNOWN_POLICIES.contains(&policy.as_str()) {
        return Err(ConfigError::Invalid(format!(
            "unknown decision.policy '{}' (expected one of {})",
            config.decision.policy,
            KNOWN_POLICIES.join(", ")
        )));
    }

    let automation = config.decision.default_automation.to_uppercase();
    if !KNOWN_AUTOMATION.contains(&automation.as_str()) {
        return Err(ConfigError::Invalid(format!(
            "unknown decision.default_automation '{}' (expected one of {})",
            config.decision.default_automation,
            KNOWN_AUTOMATION.join(", ")
        )));
    }

    let weights = &config.decision.weights;
    let sum = weights.sum();
    if sum <= 0.0 {
        return Err(ConfigError::Invalid(
            "decision.weights must contain at least one positive weight".to_string(),
        ));
    }
    for (name, w) in [
        ("metrics", weights.metrics),
        ("logs", weights.logs),
        ("graph", weights.graph),
        ("embeddings", weights.embeddings),
        ("correlator", weights.correlator),
    ] {
        if !(0.0..=1.0).contains(&w) {
            return Err(ConfigError::Invalid(format!(
                "decision.weights.{name} must be in [0, 1], got {w}"
            )));
        }
    }
    if (sum - 1.0).abs() > 0.01 {
        warn!(sum, "Specialist weights do not sum to 1.0; they will be normalised");
    }

    if config.correlation.min_sample_size < 3 {
        return Err(ConfigError::Invalid(
            "correlation.min_sample_size must be at least 3".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&config.correlation.prior) {
        return Err(ConfigError::Invalid(format!(
            "correlation.prior must be in [0, 1], got {}",
            config.correlation.prior
        )));
    }

    if config.resilience.max_attempts == 0 {
        return Err(ConfigError::Invalid(
            "resilience.max_attempts must be at least 1".to_string(),
        ));
    }
    if !(0.0..1.0).contains(&config.resilience.jitter_ratio) {
        return Err(ConfigError::Invalid(format!(
            "resilience.jitter_ratio must be in [0, 1), got {}",
            config.resilience.jitter_ratio
        )));
    }

    for provider in &config.providers {
        if provider.enabled && provider.endpoint.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "provider '{}' is enabled but has no endpoint",
                provider.name
            )));
        }
    }

    Ok(())
}

//! Alert providers - polled sources of raw alerts
//!
//! Providers are declared in configuration with a priority; the collector
//! polls them highest-first and stops at the first that answers. Each
//! provider carries its own normalisation recipe (severity mapping) so the
//! collector can harmonise provider-native alerts without knowing the
//! provider's conventions.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

use crate::adapters::{classify_http, classify_status, ProviderAlert};
use crate::config::ProviderConfig;
use crate::resilience::{AdapterError, CallFailure, Guard};
use crate::types::Severity;

/// How a provider's native fields map onto the canonical model.
#[derive(Debug, Clone, Default)]
pub struct NormalisationRecipe {
    /// Provider-severity string → canonical severity
    pub severity_map: BTreeMap<String, Severity>,
}

impl NormalisationRecipe {
    /// Map a provider severity; unmapped values fall back to parsing the
    /// canonical names, then to `warning`.
    pub fn map_severity(&self, raw: Option<&str>) -> Severity {
        let Some(raw) = raw else {
            return Severity::Warning;
        };
        if let Some(mapped) = self.severity_map.get(raw) {
            return *mapped;
        }
        match raw.to_lowercase().as_str() {
            "info" | "none" => Severity::Info,
            "warning" | "warn" | "minor" => Severity::Warning,
            "high" | "major" | "error" => Severity::High,
            "critical" | "page" | "disaster" => Severity::Critical,
            _ => Severity::Warning,
        }
    }
}

fn parse_severity(raw: &str) -> Option<Severity> {
    match raw.to_lowercase().as_str() {
        "info" => Some(Severity::Info),
        "warning" => Some(Severity::Warning),
        "high" => Some(Severity::High),
        "critical" => Some(Severity::Critical),
        _ => None,
    }
}

/// A polled alert source.
#[async_trait]
pub trait AlertProvider: Send + Sync {
    fn name(&self) -> &str;
    fn priority(&self) -> i32;
    fn recipe(&self) -> &NormalisationRecipe;

    /// Alerts currently active at the source. An empty list is a valid
    /// answer and ends the polling cycle.
    async fn list_active(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<ProviderAlert>, AdapterError>;
}

/// Alertmanager-style HTTP provider.
pub struct HttpAlertProvider {
    name: String,
    priority: i32,
    endpoint: String,
    auth_token: Option<String>,
    recipe: NormalisationRecipe,
    http: reqwest::Client,
    guard: Guard,
}

impl HttpAlertProvider {
    pub fn from_config(config: &ProviderConfig, guard: Guard) -> Self {
        let severity_map = config
            .severity_map
            .iter()
            .filter_map(|(from, to)| parse_severity(to).map(|sev| (from.clone(), sev)))
            .collect();
        let auth_token = config
            .auth_env
            .as_ref()
            .and_then(|var| std::env::var(var).ok());
        Self {
            name: config.name.clone(),
            priority: config.priority,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            auth_token,
            recipe: NormalisationRecipe { severity_map },
            http: reqwest::Client::new(),
            guard,
        }
    }
}

#[async_trait]
impl AlertProvider for HttpAlertProvider {
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
        cancel: &CancellationToken,
    ) -> Result<Vec<ProviderAlert>, AdapterError> {
        let url = format!("{}/api/v2/alerts", self.endpoint);
        self.guard
            .execute("provider.list_active", cancel, || {
                let url = url.clone();
                let mut req = self.http.get(&url).query(&[("active", "true")]);
                if let Some(token) = &self.auth_token {
                    req = req.bearer_auth(token);
                }
                async move {
                    let resp = req.send().await.map_err(|e| classify_http(&e))?;
                    if !resp.status().is_success() {
                        return Err(classify_status(resp.status()));
                    }
                    let alerts: Vec<ProviderAlert> = resp
                        .json()
                        .await
                        .map_err(|e| CallFailure::Transient(format!("malformed response: {e}")))?;
                    Ok(alerts)
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipe_maps_configured_severities() {
        let mut severity_map = BTreeMap::new();
        severity_map.insert("P1".to_string(), Severity::Critical);
        severity_map.insert("P3".to_string(), Severity::Warning);
        let recipe = NormalisationRecipe { severity_map };

        assert_eq!(recipe.map_severity(Some("P1")), Severity::Critical);
        assert_eq!(recipe.map_severity(Some("P3")), Severity::Warning);
    }

    #[test]
    fn recipe_falls_back_to_canonical_names() {
        let recipe = NormalisationRecipe::default();
        assert_eq!(recipe.map_severity(Some("critical")), Severity::Critical);
        assert_eq!(recipe.map_severity(Some("error")), Severity::High);
        assert_eq!(recipe.map_severity(Some("bogus")), Severity::Warning);
        assert_eq!(recipe.map_severity(None), Severity::Warning);
    }
}

//! System configuration - operator-tunable TOML values with env overrides
//!
//! Every tunable the pipeline consumes is a field here. Each struct
//! implements `Default` with values matching the constants in
//! `config::defaults`, so behaviour is unchanged when no config file is
//! present.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;

// ============================================================================
// Top-level config
// ============================================================================

/// Root configuration for a deployment.
///
/// Load with `SystemConfig::load()` which searches:
/// 1. `$STRANDS_CONFIG` env var
/// 2. `./strands.toml`
/// 3. Built-in defaults
///
/// Individual endpoint/policy fields are then overridable through the
/// environment (`GRAPH_URL`, `POLICY_NAME`, ...).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SystemConfig {
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub endpoints: EndpointConfig,
    #[serde(default)]
    pub correlation: CorrelationConfig,
    #[serde(default)]
    pub decision: DecisionConfig,
    #[serde(default)]
    pub resilience: ResilienceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Identity of this deployment, used for audit and reviewer guards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Identity recorded as the producer of decisions. A review submitted
    /// under this identity is refused.
    pub system_id: String,
    /// Version label recorded on every decision candidate.
    pub model_version: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            system_id: "strands-system".to_string(),
            model_version: "v1".to_string(),
        }
    }
}

/// Controller loop timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub tick_interval_secs: u64,
    pub global_deadline_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: defaults::TICK_INTERVAL_SECS,
            global_deadline_secs: defaults::GLOBAL_DEADLINE_SECS,
        }
    }
}

/// One alert provider entry. Providers are polled highest priority first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub endpoint: String,
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_provider_retries")]
    pub retries: u32,
    #[serde(default)]
    pub priority: i32,
    /// Provider-severity → canonical-severity mapping
    #[serde(default)]
    pub severity_map: BTreeMap<String, String>,
    /// Name of the environment variable holding the credential
    #[serde(default)]
    pub auth_env: Option<String>,
}

fn default_true() -> bool {
    true
}
fn default_provider_timeout() -> u64 {
    10
}
fn default_provider_retries() -> u32 {
    2
}

/// External store endpoints. Empty graph URL selects the embedded store.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EndpointConfig {
    #[serde(default)]
    pub metrics_url: String,
    #[serde(default)]
    pub graph_url: String,
    #[serde(default)]
    pub vector_url: String,
    #[serde(default)]
    pub generator_url: String,
    #[serde(default)]
    pub introspection_url: String,
}

/// Correlation analyzer tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationConfig {
    pub min_sample_size: usize,
    pub max_lag: usize,
    pub prior: f64,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            min_sample_size: defaults::MIN_SAMPLE_SIZE,
            max_lag: defaults::MAX_LAG,
            prior: defaults::CORRELATION_PRIOR,
        }
    }
}

/// Specialist fusion weights. Relative weights in the weighted mean;
/// they are normalised by their sum at fusion time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeightMatrix {
    pub version: String,
    pub metrics: f64,
    pub logs: f64,
    pub graph: f64,
    pub embeddings: f64,
    pub correlator: f64,
}

impl Default for WeightMatrix {
    fn default() -> Self {
        Self {
            version: "w1".to_string(),
            metrics: 0.4,
            logs: 0.3,
            graph: 0.1,
            embeddings: 0.1,
            correlator: 0.1,
        }
    }
}

impl WeightMatrix {
    /// Weight for a specialist id; unknown specialists weigh zero.
    pub fn weight_for(&self, specialist_id: &str) -> f64 {
        match specialist_id {
            "metrics" => self.metrics,
            "logs" => self.logs,
            "graph" => self.graph,
            "embeddings" => self.embeddings,
            "correlator" => self.correlator,
            _ => 0.0,
        }
    }

    pub fn sum(&self) -> f64 {
        self.metrics + self.logs + self.graph + self.embeddings + self.correlator
    }
}

/// Decision engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionConfig {
    /// Named threshold policy: STRICT, BALANCED or PERMISSIVE
    pub policy: String,
    /// Automation level decisions start from before the risk downgrade
    pub default_automation: String,
    /// Path to a TOML file holding the weight matrix; inline defaults if unset
    #[serde(default)]
    pub weights_file: Option<PathBuf>,
    #[serde(default)]
    pub weights: WeightMatrix,
    /// Seed for all pseudo-random draws (retry jitter excepted in live mode);
    /// fixed per deployment so replays are reproducible
    pub seed: u64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            policy: "BALANCED".to_string(),
            default_automation: "ASSISTED".to_string(),
            weights_file: None,
            weights: WeightMatrix::default(),
            seed: 42,
        }
    }
}

/// Resilience wrapper tuning shared by all adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfig {
    pub failure_threshold: u32,
    pub recovery_secs: u64,
    pub half_open_probes: u32,
    pub max_attempts: u32,
    pub initial_delay_secs: f64,
    pub max_delay_secs: f64,
    pub backoff_base: f64,
    pub jitter_ratio: f64,
    pub call_timeout_secs: u64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            failure_threshold: defaults::BREAKER_FAILURE_THRESHOLD,
            recovery_secs: defaults::BREAKER_RECOVERY_SECS,
            half_open_probes: defaults::BREAKER_HALF_OPEN_PROBES,
            max_attempts: defaults::RETRY_MAX_ATTEMPTS,
            initial_delay_secs: defaults::RETRY_INITIAL_DELAY_SECS,
            max_delay_secs: defaults::RETRY_MAX_DELAY_SECS,
            backoff_base: defaults::RETRY_BASE,
            jitter_ratio: defaults::RETRY_JITTER_RATIO,
            call_timeout_secs: defaults::CALL_TIMEOUT_SECS,
        }
    }
}

/// Local storage paths (embedded graph store, replay ledger, audit log).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub audit_log: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            audit_log: PathBuf::from("./data/audit.jsonl"),
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

impl SystemConfig {
    /// Load configuration using the standard search order:
    /// 1. `$STRANDS_CONFIG` environment variable
    /// 2. `./strands.toml` in the current working directory
    /// 3. Built-in defaults
    ///
    /// Environment overrides are applied on top in every case.
    pub fn load() -> Self {
        let mut config = Self::load_file();
        config.apply_env_overrides();
        config.load_weights_file();
        config
    }

    fn load_file() -> Self {
        if let Ok(path) = std::env::var("STRANDS_CONFIG") {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from STRANDS_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from STRANDS_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "STRANDS_CONFIG points to non-existent file, falling back");
            }
        }

        let local = Path::new("strands.toml");
        if local.exists() {
            match Self::load_from_file(local) {
                Ok(config) => {
                    info!("Loaded config from ./strands.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to parse ./strands.toml, using defaults");
                }
            }
        }

        info!("No config file found, using built-in defaults");
        Self::default()
    }

    /// Parse a specific TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.display().to_string(), e.to_string()))?;
        toml::from_str(&raw).map_err(|e| ConfigError::Parse(path.display().to_string(), e.to_string()))
    }

    /// Environment variables override file values so deployments can be
    /// reconfigured without editing the TOML.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("METRICS_URL") {
            self.endpoints.metrics_url = v;
        }
        if let Ok(v) = std::env::var("GRAPH_URL") {
            self.endpoints.graph_url = v;
        }
        if let Ok(v) = std::env::var("VECTOR_URL") {
            self.endpoints.vector_url = v;
        }
        if let Ok(v) = std::env::var("GENERATOR_URL") {
            self.endpoints.generator_url = v;
        }
        if let Ok(v) = std::env::var("POLICY_NAME") {
            self.decision.policy = v;
        }
        if let Ok(v) = std::env::var("MODEL_VERSION") {
            self.identity.model_version = v;
        }
        if let Ok(v) = std::env::var("WEIGHTS_FILE") {
            self.decision.weights_file = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("TICK_INTERVAL_S") {
            match v.parse() {
                Ok(n) => self.controller.tick_interval_secs = n,
                Err(_) => warn!(value = %v, "Ignoring non-numeric TICK_INTERVAL_S"),
            }
        }
        if let Ok(v) = std::env::var("GLOBAL_DEADLINE_S") {
            match v.parse() {
                Ok(n) => self.controller.global_deadline_secs = n,
                Err(_) => warn!(value = %v, "Ignoring non-numeric GLOBAL_DEADLINE_S"),
            }
        }
    }

    /// A weights file, when configured, replaces the inline weight matrix.
    fn load_weights_file(&mut self) {
        let Some(path) = self.decision.weights_file.clone() else {
            return;
        };
        match std::fs::read_to_string(&path) {
            Ok(raw) => match toml::from_str::<WeightMatrix>(&raw) {
                Ok(weights) => {
                    info!(path = %path.display(), version = %weights.version, "Loaded weight matrix");
                    self.decision.weights = weights;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to parse weights file, keeping inline weights"),
            },
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to read weights file, keeping inline weights"),
        }
    }

    /// Providers in polling order: enabled, highest priority first.
    pub fn providers_by_priority(&self) -> Vec<&ProviderConfig> {
        let mut providers: Vec<&ProviderConfig> =
            self.providers.iter().filter(|p| p.enabled).collect();
        providers.sort_by(|a, b| b.priority.cmp(&a.priority));
        providers
    }
}

/// Fatal configuration errors; these abort startup with exit code 1.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    Io(String, String),
    #[error("failed to parse {0}: {1}")]
    Parse(String, String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

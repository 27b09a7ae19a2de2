//! External adapter contracts
//!
//! Narrow async traits over the five external collaborators: metrics source,
//! cluster introspection, graph store, vector store and text generator.
//! These are the only suspension points in the core; every implementation
//! routes its calls through a resilience `Guard` and takes the caller's
//! `CancellationToken` so tick deadlines propagate into I/O.
//!
//! Backends are swappable: HTTP implementations for production, an embedded
//! sled graph store for tests and single-node deployments.

mod generator;
mod graph;
mod introspection;
mod metrics;
mod vector;

pub use generator::{GenerationParams, HttpTextGenerator};
pub use graph::{EmbeddedGraphStore, HttpGraphStore};
pub use introspection::HttpClusterIntrospection;
pub use metrics::HttpMetricsSource;
pub use vector::HttpVectorStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

pub use crate::resilience::AdapterError;

// ============================================================================
// Shared wire types
// ============================================================================

/// A provider-native alert before normalisation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderAlert {
    #[serde(default)]
    pub fingerprint: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    /// Provider-specific severity string, mapped per provider config
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
}

/// A time-aligned numeric series. Gaps are `f64::NAN` sentinels the
/// correlation analyzer drops pairwise.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RangeSeries {
    pub timestamps: Vec<DateTime<Utc>>,
    pub values: Vec<f64>,
}

impl RangeSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Pod summary from cluster introspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodInfo {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub restart_count: u32,
    pub status: String,
}

/// Cluster event from introspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventInfo {
    pub timestamp: DateTime<Utc>,
    pub reason: String,
    pub involved_object: String,
    pub message: String,
}

/// One row of a graph query result.
pub type GraphRow = Value;

/// Vector search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f64,
    #[serde(default)]
    pub payload: Value,
}

// ============================================================================
// Contracts
// ============================================================================

/// Time-series metrics backend.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Evaluate `expr` at one instant.
    async fn query_instant(
        &self,
        cancel: &CancellationToken,
        expr: &str,
        at: DateTime<Utc>,
    ) -> Result<(f64, DateTime<Utc>), AdapterError>;

    /// Evaluate `expr` over a range; timestamps ascend, values align.
    async fn query_range(
        &self,
        cancel: &CancellationToken,
        expr: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step_secs: u64,
    ) -> Result<RangeSeries, AdapterError>;

    /// Alerts currently firing at the source.
    async fn list_active_alerts(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<ProviderAlert>, AdapterError>;
}

/// Kubernetes-style cluster state reads.
#[async_trait]
pub trait ClusterIntrospection: Send + Sync {
    async fn list_pods(
        &self,
        cancel: &CancellationToken,
        selector: &str,
    ) -> Result<Vec<PodInfo>, AdapterError>;

    async fn fetch_logs(
        &self,
        cancel: &CancellationToken,
        pod: &str,
        since: DateTime<Utc>,
        max_lines: usize,
    ) -> Result<String, AdapterError>;

    async fn fetch_events(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<EventInfo>, AdapterError>;
}

/// Transactional node/relation store with compare-and-set on node
/// properties. Playbook statistics writes go through `checked_update`
/// and nothing else.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn upsert_node(
        &self,
        cancel: &CancellationToken,
        label: &str,
        id: &str,
        props: Value,
    ) -> Result<(), AdapterError>;

    async fn get_node(
        &self,
        cancel: &CancellationToken,
        label: &str,
        id: &str,
    ) -> Result<Option<Value>, AdapterError>;

    /// Nodes of `label` whose properties equal every `(key, value)` filter.
    async fn find_nodes(
        &self,
        cancel: &CancellationToken,
        label: &str,
        filters: &[(String, Value)],
    ) -> Result<Vec<Value>, AdapterError>;

    async fn upsert_relation(
        &self,
        cancel: &CancellationToken,
        from_id: &str,
        rel_type: &str,
        to_id: &str,
        props: Value,
    ) -> Result<(), AdapterError>;

    /// Free-form query pass-through for backends with a query language.
    async fn query(
        &self,
        cancel: &CancellationToken,
        query: &str,
        params: Value,
    ) -> Result<Vec<GraphRow>, AdapterError>;

    /// Replace a node's properties only if `expect_key` currently equals
    /// `expect_value`. Returns false on a lost race.
    async fn checked_update(
        &self,
        cancel: &CancellationToken,
        label: &str,
        id: &str,
        expect_key: &str,
        expect_value: Value,
        props: Value,
    ) -> Result<bool, AdapterError>;
}

/// Embedding/similarity backend.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(
        &self,
        cancel: &CancellationToken,
        id: &str,
        vector: &[f32],
        payload: Value,
    ) -> Result<(), AdapterError>;

    async fn search(
        &self,
        cancel: &CancellationToken,
        vector: &[f32],
        top_k: usize,
        min_score: f64,
    ) -> Result<Vec<SearchHit>, AdapterError>;
}

/// Embedding + completion model behind an HTTP API.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn embed(
        &self,
        cancel: &CancellationToken,
        text: &str,
    ) -> Result<Vec<f32>, AdapterError>;

    async fn generate(
        &self,
        cancel: &CancellationToken,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, AdapterError>;
}

// ============================================================================
// HTTP error classification
// ============================================================================

/// Map a reqwest failure onto the transient/permanent split the guard
/// retries by.
pub(crate) fn classify_http(err: &reqwest::Error) -> crate::resilience::CallFailure {
    use crate::resilience::CallFailure;
    if let Some(status) = err.status() {
        if status.is_client_error() {
            return CallFailure::Permanent(format!("upstream returned {status}"));
        }
    }
    CallFailure::Transient(err.to_string())
}

/// Map a non-success status onto the transient/permanent split.
pub(crate) fn classify_status(status: reqwest::StatusCode) -> crate::resilience::CallFailure {
    use crate::resilience::CallFailure;
    if status.is_client_error() {
        CallFailure::Permanent(format!("upstream returned {status}"))
    } else {
        CallFailure::Transient(format!("upstream returned {status}"))
    }
}

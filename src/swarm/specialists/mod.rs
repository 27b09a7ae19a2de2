//! Investigation specialists - one per signal domain
//!
//! Each specialist investigates an alert cluster from its own perspective
//! and produces a `SpecialistResult`: a hypothesis, a base confidence,
//! supporting evidence and suggested actions. Specialists are values behind
//! a shared trait, not a hierarchy; the orchestrator treats them uniformly.
//!
//! ## Specialists
//!
//! 1. **metrics** - time-series behaviour of the affected service
//! 2. **logs** - pod logs and restart counts
//! 3. **embeddings** - similar historical incidents via vector search
//! 4. **graph** - service topology context from the graph store
//! 5. **correlator** - cross-series statistical relationships

pub mod correlator;
pub mod embedding;
pub mod graph;
pub mod logs;
pub mod metrics;

pub use correlator::CorrelatorSpecialist;
pub use embedding::EmbeddingSpecialist;
pub use graph::GraphSpecialist;
pub use logs::LogSpecialist;
pub use metrics::MetricsSpecialist;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::resilience::AdapterError;
use crate::types::{AlertCluster, SpecialistResult};

/// One investigation capability. `investigate` may make several guarded
/// adapter calls in sequence but must respect the shared cancellation
/// token; the orchestrator converts missed deadlines into synthetic
/// TIMEOUT results.
#[async_trait]
pub trait Specialist: Send + Sync {
    /// Stable identifier; also the key into the fusion weight matrix.
    fn id(&self) -> &'static str;

    async fn investigate(
        &self,
        cluster: &AlertCluster,
        cancel: &CancellationToken,
        now: DateTime<Utc>,
    ) -> Result<SpecialistResult, AdapterError>;
}

/// Keywords that mark evidence as data-loss related; the decision engine
/// escalates risk to CRITICAL when they appear under a critical-severity
/// cluster.
pub const DATA_LOSS_KEYWORDS: &[&str] = &[
    "data loss",
    "data corruption",
    "volume failure",
    "disk failure",
    "pv lost",
    "unrecoverable",
];

//! Strands: Autonomous Incident Response
//!
//! Multi-specialist investigation pipeline for Kubernetes/SRE alerts.
//!
//! ## Architecture
//!
//! - **Ingestion**: polls alert providers in priority order, normalises and
//!   clusters alerts into incidents
//! - **Swarm**: parallel investigation specialists under a global deadline
//! - **Correlation**: Pearson-with-lag analysis scored by Bayesian posterior
//! - **Decision engine**: weighted evidence fusion with risk-bounded
//!   automation
//! - **Playbook library**: versioned remediations with lifecycle governance
//!   and self-updating execution statistics
//! - **Review gate**: human-in-the-loop approval that closes the learning
//!   loop
//! - **Replay**: deterministic re-execution of recorded incidents for
//!   validation and audit

pub mod adapters;
pub mod audit;
pub mod config;
pub mod controller;
pub mod correlation;
pub mod decision;
pub mod ingest;
pub mod playbooks;
pub mod recommend;
pub mod replay;
pub mod resilience;
pub mod review;
pub mod swarm;
pub mod types;

// Re-export the types most callers touch
pub use types::{
    Alert, AlertCluster, AutomationLevel, CorrelationPattern, CorrelationStrength,
    DecisionCandidate, DecisionType, EvidenceItem, EvidenceKind, InvestigationReport, Playbook,
    PlaybookExecution, PlaybookStatus, ReplayEvent, ReplayMode, ReviewRecord, ReviewState,
    RiskLevel, Severity, SpecialistResult,
};

pub use config::SystemConfig;
pub use controller::IncidentController;
pub use decision::DecisionEngine;
pub use playbooks::PlaybookStore;
pub use replay::ReplayEngine;
pub use review::ReviewGate;
pub use swarm::SwarmOrchestrator;

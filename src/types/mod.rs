//! Shared data structures for the incident-analysis pipeline
//!
//! This module defines the core types flowing through the system:
//! - Ingestion: Alert, NormalisedAlert, AlertCluster
//! - Investigation: EvidenceItem, SpecialistResult, InvestigationReport
//! - Analysis: CorrelationPattern with posterior-derived strength
//! - Decision: DecisionCandidate with risk-bounded automation
//! - Remediation: Playbook, PlaybookExecution, Welford statistics
//! - Governance: ReviewRecord, ReplayEvent

mod alert;
mod correlation;
mod decision;
mod investigation;
mod playbook;
mod replay;
mod review;

pub use alert::*;
pub use correlation::*;
pub use decision::*;
pub use investigation::*;
pub use playbook::*;
pub use replay::*;
pub use review::*;

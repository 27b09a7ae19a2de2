//! Review types: ReviewState, ReviewRecord

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Human-in-the-loop review state. PENDING is initial; APPROVED and
/// REJECTED are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewState {
    Pending,
    Approved,
    Rejected,
}

impl ReviewState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ReviewState::Pending)
    }
}

/// The verdict record for one decision; exactly one per decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub id: String,
    pub decision_id: String,
    pub state: ReviewState,
    /// Identity that moved the record to a terminal state; None while pending
    pub reviewer: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl ReviewRecord {
    /// Fresh pending record for a newly persisted decision.
    pub fn pending(id: String, decision_id: String, at: DateTime<Utc>) -> Self {
        Self {
            id,
            decision_id,
            state: ReviewState::Pending,
            reviewer: None,
            updated_at: at,
            notes: None,
        }
    }
}

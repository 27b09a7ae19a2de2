//! Replay ledger - append-only record of decided alerts
//!
//! Events are keyed by recorded timestamp (big-endian nanos, so iteration
//! is chronological) plus a sequence discriminator for same-instant
//! events. Entries are never updated or deleted.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::types::ReplayEvent;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger storage error: {0}")]
    Storage(String),
    #[error("corrupt ledger entry: {0}")]
    Corrupt(String),
}

impl From<sled::Error> for LedgerError {
    fn from(e: sled::Error) -> Self {
        LedgerError::Storage(e.to_string())
    }
}

pub struct ReplayLedger {
    tree: sled::Tree,
    sequence: AtomicU32,
}

impl ReplayLedger {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LedgerError> {
        let db = sled::open(path)?;
        Ok(Self {
            tree: db.open_tree("replay_events")?,
            sequence: AtomicU32::new(0),
        })
    }

    /// Share an already-open database (single-node deployments keep the
    /// graph store and the ledger in one sled instance).
    pub fn in_db(db: &sled::Db) -> Result<Self, LedgerError> {
        Ok(Self {
            tree: db.open_tree("replay_events")?,
            sequence: AtomicU32::new(0),
        })
    }

    pub fn temporary() -> Result<Self, LedgerError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::in_db(&db)
    }

    /// Append one event.
    pub fn append(&self, event: &ReplayEvent) -> Result<(), LedgerError> {
        let nanos = event
            .recorded_at
            .timestamp_nanos_opt()
            .unwrap_or_else(|| event.recorded_at.timestamp() * 1_000_000_000);
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let mut key = [0u8; 12];
        key[..8].copy_from_slice(&(nanos as u64).to_be_bytes());
        key[8..].copy_from_slice(&seq.to_be_bytes());

        let value =
            serde_json::to_vec(event).map_err(|e| LedgerError::Corrupt(e.to_string()))?;
        self.tree.insert(key, value)?;
        Ok(())
    }

    /// All events in chronological order.
    pub fn load_all(&self) -> Result<Vec<ReplayEvent>, LedgerError> {
        let mut events = Vec::new();
        for item in self.tree.iter() {
            let (_, value) = item?;
            let event: ReplayEvent = serde_json::from_slice(&value)
                .map_err(|e| LedgerError::Corrupt(e.to_string()))?;
            events.push(event);
        }
        Ok(events)
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        Alert, AlertStatus, AutomationLevel, DecisionCandidate, DecisionType, RiskLevel,
        Severity,
    };
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn event(offset_secs: i64) -> ReplayEvent {
        let at = Utc.timestamp_opt(1_700_000_000 + offset_secs, 0).single().unwrap();
        ReplayEvent {
            recorded_at: at,
            alert: Alert {
                received_at: at,
                provider: "prom".to_string(),
                fingerprint: format!("fp-{offset_secs}"),
                service: "api".to_string(),
                severity: Severity::High,
                description: "test".to_string(),
                labels: BTreeMap::new(),
                annotations: BTreeMap::new(),
                status: AlertStatus::Firing,
            },
            decision: DecisionCandidate {
                id: format!("dec-{offset_secs}"),
                cluster_id: "cluster-1".to_string(),
                hypothesis: "h".to_string(),
                confidence: 0.5,
                risk: RiskLevel::Medium,
                automation: AutomationLevel::Assisted,
                decision_type: DecisionType::RequiresApproval,
                conflict: false,
                degraded: false,
                suggested_actions: Vec::new(),
                evidence: Vec::new(),
                created_at: at,
                model_version: "v1".to_string(),
                weights_version: "w1".to_string(),
                audit_id: "audit-1".to_string(),
            },
            playbook_id: None,
            playbook_version: None,
            outcome: None,
        }
    }

    #[test]
    fn events_load_in_chronological_order() {
        let ledger = ReplayLedger::temporary().unwrap();
        ledger.append(&event(30)).unwrap();
        ledger.append(&event(10)).unwrap();
        ledger.append(&event(20)).unwrap();

        let events = ledger.load_all().unwrap();
        assert_eq!(events.len(), 3);
        assert!(events[0].recorded_at <= events[1].recorded_at);
        assert!(events[1].recorded_at <= events[2].recorded_at);
    }

    #[test]
    fn same_instant_events_both_kept() {
        let ledger = ReplayLedger::temporary().unwrap();
        ledger.append(&event(5)).unwrap();
        ledger.append(&event(5)).unwrap();
        assert_eq!(ledger.len(), 2);
    }
}

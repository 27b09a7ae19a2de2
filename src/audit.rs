//! Append-only audit trail
//!
//! One JSON line per decision transition, execution record or skipped
//! tick. The file is append-only; nothing in the process rewrites or
//! truncates it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use tracing::warn;

/// One audit entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// RFC3339 timestamp
    pub timestamp: DateTime<Utc>,
    /// Ties together all entries of one pipeline pass
    pub correlation_id: String,
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playbook_id: Option<String>,
    pub payload: Value,
}

pub struct AuditLog {
    file: Mutex<std::fs::File>,
}

impl AuditLog {
    /// Open (or create) the audit file for appending.
    pub fn open<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Append one event. Audit failures are logged, never propagated: the
    /// pipeline must not stall because the audit disk is full.
    pub fn record(&self, event: &AuditEvent) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Unserialisable audit event dropped");
                return;
            }
        };
        #[allow(clippy::unwrap_used)]
        let mut file = self.file.lock().unwrap();
        if let Err(e) = writeln!(file, "{line}") {
            warn!(error = %e, "Audit append failed");
        }
    }

    pub fn event(
        &self,
        correlation_id: &str,
        event_type: &str,
        decision_id: Option<&str>,
        playbook_id: Option<&str>,
        payload: Value,
        now: DateTime<Utc>,
    ) {
        self.record(&AuditEvent {
            timestamp: now,
            correlation_id: correlation_id.to_string(),
            event_type: event_type.to_string(),
            decision_id: decision_id.map(str::to_string),
            playbook_id: playbook_id.map(str::to_string),
            payload,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let log = AuditLog::open(&path).unwrap();

        log.event("corr-1", "DECISION_CREATED", Some("dec-1"), None, json!({}), Utc::now());
        log.event(
            "corr-1",
            "EXECUTION_RECORDED",
            Some("dec-1"),
            Some("pb-1"),
            json!({ "outcome": "SUCCESS" }),
            Utc::now(),
        );

        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: AuditEvent = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.event_type, "DECISION_CREATED");
        assert_eq!(first.decision_id.as_deref(), Some("dec-1"));
        let second: AuditEvent = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.playbook_id.as_deref(), Some("pb-1"));
    }

    #[test]
    fn reopening_appends_rather_than_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        {
            let log = AuditLog::open(&path).unwrap();
            log.event("a", "TICK_SKIPPED", None, None, json!({}), Utc::now());
        }
        {
            let log = AuditLog::open(&path).unwrap();
            log.event("b", "TICK_SKIPPED", None, None, json!({}), Utc::now());
        }
        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw.lines().count(), 2);
    }
}

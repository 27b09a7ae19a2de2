//! Per-fingerprint deduplication window
//!
//! An alert whose fingerprint was seen within the window is dropped; the
//! duplicate count per fingerprint is kept for diagnostics. Entries older
//! than the window are pruned on every pass.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

pub struct DedupWindow {
    window: Duration,
    last_seen: HashMap<String, DateTime<Utc>>,
    duplicate_counts: HashMap<String, u64>,
}

impl DedupWindow {
    pub fn new(window_secs: i64) -> Self {
        Self {
            window: Duration::seconds(window_secs),
            last_seen: HashMap::new(),
            duplicate_counts: HashMap::new(),
        }
    }

    /// Returns true if the alert is fresh and should be processed.
    pub fn admit(&mut self, fingerprint: &str, at: DateTime<Utc>) -> bool {
        self.prune(at);
        match self.last_seen.get(fingerprint) {
            Some(seen) if at - *seen < self.window => {
                *self
                    .duplicate_counts
                    .entry(fingerprint.to_string())
                    .or_insert(0) += 1;
                false
            }
            _ => {
                self.last_seen.insert(fingerprint.to_string(), at);
                true
            }
        }
    }

    /// Duplicates dropped for a fingerprint since startup.
    pub fn duplicates(&self, fingerprint: &str) -> u64 {
        self.duplicate_counts.get(fingerprint).copied().unwrap_or(0)
    }

    /// Total duplicates dropped across all fingerprints.
    pub fn total_duplicates(&self) -> u64 {
        self.duplicate_counts.values().sum()
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        let window = self.window;
        self.last_seen.retain(|_, seen| now - *seen < window);
    }
}

//! Temporal event-sequence correlation
//!
//! Scans an ordered stream of timestamped events for monotonic chains:
//! runs of events where each follows the previous within a fixed sliding
//! window. Each chain of sufficient length becomes one EVENT_SEQUENCE
//! pattern, with a posterior that grows with chain length.

use chrono::{DateTime, Duration, Utc};

use crate::types::{
    CorrelationPattern, CorrelationStrength, CorrelationType, SignificanceBand,
};

/// One event in a temporal stream.
#[derive(Debug, Clone)]
pub struct TimedEvent {
    pub timestamp: DateTime<Utc>,
    pub label: String,
}

/// Minimum chain length worth reporting.
const MIN_CHAIN_LEN: usize = 3;

/// Find monotonic chains within `window` and emit one pattern per chain.
///
/// Events must be time-ascending; out-of-order input is sorted first so a
/// jittered provider cannot break chain detection.
pub fn detect_chains(events: &[TimedEvent], window: Duration) -> Vec<CorrelationPattern> {
    let mut ordered: Vec<&TimedEvent> = events.iter().collect();
    ordered.sort_by_key(|e| e.timestamp);

    let mut patterns = Vec::new();
    let mut chain_start = 0usize;
    for i in 1..=ordered.len() {
        let broken = i == ordered.len()
            || ordered[i].timestamp - ordered[i - 1].timestamp > window;
        if broken {
            let chain = &ordered[chain_start..i];
            if chain.len() >= MIN_CHAIN_LEN {
                patterns.push(chain_pattern(chain));
            }
            chain_start = i;
        }
    }
    patterns
}

fn chain_pattern(chain: &[&TimedEvent]) -> CorrelationPattern {
    // Longer chains are less likely to be coincidental; saturate at 0.95.
    let posterior = (0.5 + 0.1 * (chain.len() - MIN_CHAIN_LEN) as f64).min(0.95);
    let first = chain[0];
    let last = chain[chain.len() - 1];
    CorrelationPattern {
        correlation_type: CorrelationType::EventSequence,
        series_a: first.label.clone(),
        series_b: last.label.clone(),
        r_value: 0.0,
        lag_offset: 0,
        sample_count: chain.len(),
        p_value: 1.0 - posterior,
        significance: SignificanceBand::from_p_value(1.0 - posterior),
        posterior,
        strength: CorrelationStrength::from_posterior(posterior),
        noisy: false,
        degraded_reason: None,
        evidence: Vec::new(),
        remediation_hint: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event(offset_secs: i64, label: &str) -> TimedEvent {
        TimedEvent {
            timestamp: Utc.timestamp_opt(1_700_000_000 + offset_secs, 0).single().unwrap(),
            label: label.to_string(),
        }
    }

    #[test]
    fn detects_single_chain() {
        let events = vec![
            event(0, "oom-kill"),
            event(10, "pod-restart"),
            event(20, "readiness-fail"),
        ];
        let patterns = detect_chains(&events, Duration::seconds(30));
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].sample_count, 3);
        assert_eq!(patterns[0].series_a, "oom-kill");
        assert_eq!(patterns[0].series_b, "readiness-fail");
    }

    #[test]
    fn window_gap_splits_chains() {
        let events = vec![
            event(0, "a"),
            event(10, "b"),
            event(20, "c"),
            // 10-minute gap
            event(620, "d"),
            event(630, "e"),
            event(640, "f"),
        ];
        let patterns = detect_chains(&events, Duration::seconds(60));
        assert_eq!(patterns.len(), 2);
    }

    #[test]
    fn short_runs_ignored() {
        let events = vec![event(0, "a"), event(10, "b")];
        let patterns = detect_chains(&events, Duration::seconds(60));
        assert!(patterns.is_empty());
    }

    #[test]
    fn longer_chains_score_higher() {
        let short: Vec<TimedEvent> = (0..3).map(|i| event(i * 5, "x")).collect();
        let long: Vec<TimedEvent> = (0..8).map(|i| event(i * 5, "x")).collect();
        let p_short = detect_chains(&short, Duration::seconds(60))[0].posterior;
        let p_long = detect_chains(&long, Duration::seconds(60))[0].posterior;
        assert!(p_long > p_short);
    }

    #[test]
    fn unsorted_input_is_handled() {
        let events = vec![event(20, "c"), event(0, "a"), event(10, "b")];
        let patterns = detect_chains(&events, Duration::seconds(30));
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].series_a, "a");
    }
}

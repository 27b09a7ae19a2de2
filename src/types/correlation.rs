//! Correlation types: CorrelationType, CorrelationPattern, strength/significance bands

use serde::{Deserialize, Serialize};

use super::EvidenceItem;

/// Which pair of signal domains a pattern relates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CorrelationType {
    LogMetric,
    MetricMetric,
    TraceEvent,
    Temporal,
    EventSequence,
}

impl std::fmt::Display for CorrelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CorrelationType::LogMetric => "LOG_METRIC",
            CorrelationType::MetricMetric => "METRIC_METRIC",
            CorrelationType::TraceEvent => "TRACE_EVENT",
            CorrelationType::Temporal => "TEMPORAL",
            CorrelationType::EventSequence => "EVENT_SEQUENCE",
        };
        write!(f, "{s}")
    }
}

/// Strength label derived from the Bayesian posterior.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CorrelationStrength {
    VeryWeak,
    Weak,
    Moderate,
    Strong,
    VeryStrong,
}

impl CorrelationStrength {
    /// Posterior bands: ≥0.9 VERY_STRONG, ≥0.7 STRONG, ≥0.5 MODERATE,
    /// ≥0.3 WEAK, else VERY_WEAK.
    pub fn from_posterior(posterior: f64) -> Self {
        if posterior >= 0.9 {
            CorrelationStrength::VeryStrong
        } else if posterior >= 0.7 {
            CorrelationStrength::Strong
        } else if posterior >= 0.5 {
            CorrelationStrength::Moderate
        } else if posterior >= 0.3 {
            CorrelationStrength::Weak
        } else {
            CorrelationStrength::VeryWeak
        }
    }
}

/// Significance band from the two-tailed p-value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignificanceBand {
    VerySignificant,
    Significant,
    Weak,
    NotSignificant,
}

impl SignificanceBand {
    pub fn from_p_value(p: f64) -> Self {
        if p < 0.01 {
            SignificanceBand::VerySignificant
        } else if p < 0.05 {
            SignificanceBand::Significant
        } else if p < 0.10 {
            SignificanceBand::Weak
        } else {
            SignificanceBand::NotSignificant
        }
    }
}

/// A detected statistical relationship between two signal series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationPattern {
    pub correlation_type: CorrelationType,
    /// Identifier of the first series/domain
    pub series_a: String,
    /// Identifier of the second series/domain
    pub series_b: String,
    /// Pearson r at the best lag
    pub r_value: f64,
    /// Lag of `series_b` relative to `series_a`, in samples
    pub lag_offset: i64,
    pub sample_count: usize,
    pub p_value: f64,
    pub significance: SignificanceBand,
    /// Posterior probability that the correlation is real
    pub posterior: f64,
    pub strength: CorrelationStrength,
    /// Set when either series carries more than 5% |z|>3 anomalies
    pub noisy: bool,
    /// Explanation for degenerate outcomes (constant series, too few samples)
    pub degraded_reason: Option<String>,
    pub evidence: Vec<EvidenceItem>,
    /// Remediation hint derived from the pattern shape
    pub remediation_hint: Option<String>,
}

impl CorrelationPattern {
    /// Pattern for input that cannot support a correlation estimate.
    pub fn degenerate(
        correlation_type: CorrelationType,
        series_a: &str,
        series_b: &str,
        sample_count: usize,
        reason: &str,
    ) -> Self {
        Self {
            correlation_type,
            series_a: series_a.to_string(),
            series_b: series_b.to_string(),
            r_value: 0.0,
            lag_offset: 0,
            sample_count,
            p_value: 1.0,
            significance: SignificanceBand::NotSignificant,
            posterior: 0.0,
            strength: CorrelationStrength::VeryWeak,
            noisy: false,
            degraded_reason: Some(reason.to_string()),
            evidence: Vec::new(),
            remediation_hint: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strength_bands() {
        assert_eq!(
            CorrelationStrength::from_posterior(0.95),
            CorrelationStrength::VeryStrong
        );
        assert_eq!(
            CorrelationStrength::from_posterior(0.9),
            CorrelationStrength::VeryStrong
        );
        assert_eq!(
            CorrelationStrength::from_posterior(0.7),
            CorrelationStrength::Strong
        );
        assert_eq!(
            CorrelationStrength::from_posterior(0.5),
            CorrelationStrength::Moderate
        );
        assert_eq!(
            CorrelationStrength::from_posterior(0.3),
            CorrelationStrength::Weak
        );
        assert_eq!(
            CorrelationStrength::from_posterior(0.29),
            CorrelationStrength::VeryWeak
        );
    }

    #[test]
    fn significance_bands() {
        assert_eq!(
            SignificanceBand::from_p_value(0.005),
            SignificanceBand::VerySignificant
        );
        assert_eq!(
            SignificanceBand::from_p_value(0.03),
            SignificanceBand::Significant
        );
        assert_eq!(SignificanceBand::from_p_value(0.07), SignificanceBand::Weak);
        assert_eq!(
            SignificanceBand::from_p_value(0.2),
            SignificanceBand::NotSignificant
        );
    }
}

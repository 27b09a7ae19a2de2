//! Confidence aggregation strategies
//!
//! Each variant turns a set of weighted specialist scores into one number.
//! The decision engine uses `Weighted` for the headline confidence and
//! `Consensus` for the policy agreement check; the rest exist for weight
//! experiments via configuration.

use crate::correlation::kahan;

/// A weighted specialist score: `(weight, score)`.
pub type WeightedScore = (f64, f64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceStrategy {
    /// Unweighted arithmetic mean
    Average,
    /// Weight-normalised mean
    Weighted,
    /// Most pessimistic specialist
    Min,
    /// Most optimistic specialist
    Max,
    /// Mean discounted by score dispersion; high only when specialists agree
    Consensus,
}

impl ConfidenceStrategy {
    /// Aggregate scores into [0, 1]. Empty input yields 0.
    pub fn aggregate(self, scores: &[WeightedScore]) -> f64 {
        if scores.is_empty() {
            return 0.0;
        }
        match self {
            ConfidenceStrategy::Average => {
                let values: Vec<f64> = scores.iter().map(|(_, s)| *s).collect();
                kahan::mean(&values)
            }
            ConfidenceStrategy::Weighted => {
                let mut numerator = kahan::NeumaierSum::new();
                let mut denominator = kahan::NeumaierSum::new();
                for (w, s) in scores {
                    numerator.add(w * s);
                    denominator.add(*w);
                }
                let total = denominator.total();
                if total == 0.0 {
                    0.0
                } else {
                    numerator.total() / total
                }
            }
            ConfidenceStrategy::Min => scores
                .iter()
                .map(|(_, s)| *s)
                .fold(f64::INFINITY, f64::min),
            ConfidenceStrategy::Max => scores
                .iter()
                .map(|(_, s)| *s)
                .fold(f64::NEG_INFINITY, f64::max),
            ConfidenceStrategy::Consensus => {
                let values: Vec<f64> = scores.iter().map(|(_, s)| *s).collect();
                let mean = kahan::mean(&values);
                let variance = if values.len() > 1 {
                    let mut acc = kahan::NeumaierSum::new();
                    for v in &values {
                        let d = v - mean;
                        acc.add(d * d);
                    }
                    acc.total() / (values.len() - 1) as f64
                } else {
                    0.0
                };
                (mean * (1.0 - variance.sqrt())).clamp(0.0, 1.0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCORES: &[WeightedScore] = &[(0.4, 0.9), (0.3, 0.6), (0.3, 0.3)];

    #[test]
    fn average_ignores_weights() {
        let avg = ConfidenceStrategy::Average.aggregate(SCORES);
        assert!((avg - 0.6).abs() < 1e-12);
    }

    #[test]
    fn weighted_respects_weights() {
        // (0.4·0.9 + 0.3·0.6 + 0.3·0.3) / 1.0 = 0.63
        let w = ConfidenceStrategy::Weighted.aggregate(SCORES);
        assert!((w - 0.63).abs() < 1e-12);
    }

    #[test]
    fn min_and_max() {
        assert_eq!(ConfidenceStrategy::Min.aggregate(SCORES), 0.3);
        assert_eq!(ConfidenceStrategy::Max.aggregate(SCORES), 0.9);
    }

    #[test]
    fn consensus_rewards_agreement() {
        let agreeing = &[(0.5, 0.8), (0.5, 0.8)];
        let split = &[(0.5, 1.0), (0.5, 0.0)];
        let high = ConfidenceStrategy::Consensus.aggregate(agreeing);
        let low = ConfidenceStrategy::Consensus.aggregate(split);
        assert!(high > low);
        assert!((high - 0.8).abs() < 1e-12);
    }

    #[test]
    fn empty_scores_aggregate_to_zero() {
        for strategy in [
            ConfidenceStrategy::Average,
            ConfidenceStrategy::Weighted,
            ConfidenceStrategy::Min,
            ConfidenceStrategy::Max,
            ConfidenceStrategy::Consensus,
        ] {
            assert_eq!(strategy.aggregate(&[]), 0.0);
        }
    }
}

//! Statistical correlation analyzer
//!
//! Pearson correlation with lag detection, optional detrending and z-score
//! normalisation, Student-t significance testing and a Bayesian posterior
//! that grades how likely the correlation is real. Produces one
//! `CorrelationPattern` per analysed pair.
//!
//! ## Pipeline
//!
//! 1. Align the two series on shared timestamps, dropping NaN pairs
//! 2. Optionally detrend (least-squares linear fit) and z-score normalise
//! 3. Search lags in [-max_lag, +max_lag] for the strongest |r|
//! 4. p-value from the t-statistic with n-2 degrees of freedom
//! 5. Bayesian posterior from configured prior and likelihood bands
//! 6. Flag anomalous samples (|z| > 3) and noisy series (> 5% anomalies)

use statrs::distribution::{ContinuousCDF, StudentsT};
use std::time::Instant;
use tracing::warn;

use super::kahan;
use crate::adapters::RangeSeries;
use crate::config::defaults;
use crate::types::{
    CorrelationPattern, CorrelationStrength, CorrelationType, SignificanceBand,
};

/// Per-call analyzer options.
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    pub correlation_type: CorrelationType,
    pub max_lag: usize,
    pub min_sample_size: usize,
    pub detrend: bool,
    pub zscore: bool,
    /// Prior probability that a detected correlation is real
    pub prior: f64,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            correlation_type: CorrelationType::MetricMetric,
            max_lag: defaults::MAX_LAG,
            min_sample_size: defaults::MIN_SAMPLE_SIZE,
            detrend: false,
            zscore: true,
            prior: defaults::CORRELATION_PRIOR,
        }
    }
}

/// Correlation analyzer over aligned numeric series.
pub struct CorrelationAnalyzer;

impl CorrelationAnalyzer {
    /// Analyse two series and produce a scored pattern.
    ///
    /// `series_b` trailing `series_a` by k samples is reported as
    /// `lag_offset = +k`.
    pub fn analyze(
        a: &RangeSeries,
        b: &RangeSeries,
        name_a: &str,
        name_b: &str,
        options: &AnalyzeOptions,
    ) -> CorrelationPattern {
        let started = Instant::now();
        let pattern = Self::analyze_inner(a, b, name_a, name_b, options);
        let elapsed = started.elapsed().as_millis();
        if elapsed > defaults::CORRELATION_BUDGET_MS {
            warn!(
                series_a = name_a,
                series_b = name_b,
                elapsed_ms = elapsed,
                "Correlation exceeded soft budget"
            );
        }
        pattern
    }

    fn analyze_inner(
        a: &RangeSeries,
        b: &RangeSeries,
        name_a: &str,
        name_b: &str,
        options: &AnalyzeOptions,
    ) -> CorrelationPattern {
        // 1. Align on shared timestamps, dropping NaN pairs
        let (mut xs, mut ys) = align(a, b);
        let n = xs.len();
        if n < options.min_sample_size {
            return CorrelationPattern::degenerate(
                options.correlation_type,
                name_a,
                name_b,
                n,
                "degenerate-series",
            );
        }

        // 2. Clean
        if options.detrend {
            detrend(&mut xs);
            detrend(&mut ys);
        }
        let (std_x, std_y) = (std_dev(&xs), std_dev(&ys));
        if std_x == 0.0 || std_y == 0.0 {
            return CorrelationPattern::degenerate(
                options.correlation_type,
                name_a,
                name_b,
                n,
                "degenerate-series",
            );
        }
        let noisy = if options.zscore {
            let noisy_x = zscore_in_place(&mut xs);
            let noisy_y = zscore_in_place(&mut ys);
            noisy_x || noisy_y
        } else {
            // Anomaly detection still happens in z-space even when the
            // series themselves stay un-normalised.
            let mut zx = xs.clone();
            let mut zy = ys.clone();
            let noisy_x = zscore_in_place(&mut zx);
            let noisy_y = zscore_in_place(&mut zy);
            noisy_x || noisy_y
        };

        // 3. Lag search: maximise |r|, tie-break smallest |lag| then positive
        let max_lag = options.max_lag as i64;
        let mut best: Option<(i64, f64)> = None;
        for lag in -max_lag..=max_lag {
            let Some(r) = pearson_at_lag(&xs, &ys, lag) else {
                continue;
            };
            let better = match best {
                None => true,
                Some((best_lag, best_r)) => {
                    let (abs_r, best_abs_r) = (r.abs(), best_r.abs());
                    if (abs_r - best_abs_r).abs() > 1e-12 {
                        abs_r > best_abs_r
                    } else if lag.abs() != best_lag.abs() {
                        lag.abs() < best_lag.abs()
                    } else {
                        lag > best_lag
                    }
                }
            };
            if better {
                best = Some((lag, r));
            }
        }
        let Some((lag_offset, r_value)) = best else {
            return CorrelationPattern::degenerate(
                options.correlation_type,
                name_a,
                name_b,
                n,
                "degenerate-series",
            );
        };

        // 4. Significance at the chosen lag
        let overlap = n - lag_offset.unsigned_abs() as usize;
        let p_value = p_value_for_r(r_value, overlap);
        let significance = SignificanceBand::from_p_value(p_value);

        // 5. Bayesian posterior
        let posterior = posterior(options.prior, p_value);
        let strength = CorrelationStrength::from_posterior(posterior);

        CorrelationPattern {
            correlation_type: options.correlation_type,
            series_a: name_a.to_string(),
            series_b: name_b.to_string(),
            r_value,
            lag_offset,
            sample_count: n,
            p_value,
            significance,
            posterior,
            strength,
            noisy,
            degraded_reason: None,
            evidence: Vec::new(),
            remediation_hint: None,
        }
    }
}

// ============================================================================
// Numeric helpers
// ============================================================================

/// Intersect two series on timestamps and drop pairs with a NaN on either
/// side. Both inputs are expected time-ascending.
fn align(a: &RangeSeries, b: &RangeSeries) -> (Vec<f64>, Vec<f64>) {
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    let mut i = 0usize;
    let mut j = 0usize;
    while i < a.timestamps.len() && j < b.timestamps.len() {
        match a.timestamps[i].cmp(&b.timestamps[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                let (x, y) = (a.values[i], b.values[j]);
                if !x.is_nan() && !y.is_nan() {
                    xs.push(x);
                    ys.push(y);
                }
                i += 1;
                j += 1;
            }
        }
    }
    (xs, ys)
}

/// Remove the least-squares linear fit in place.
fn detrend(values: &mut [f64]) {
    let n = values.len();
    if n < 2 {
        return;
    }
    let nf = n as f64;
    let mean_t = (nf - 1.0) / 2.0;
    let mean_v = kahan::mean(values);

    let mut cov = kahan::NeumaierSum::new();
    let mut var_t = kahan::NeumaierSum::new();
    for (t, &v) in values.iter().enumerate() {
        let dt = t as f64 - mean_t;
        cov.add(dt * (v - mean_v));
        var_t.add(dt * dt);
    }
    let denom = var_t.total();
    if denom == 0.0 {
        return;
    }
    let slope = cov.total() / denom;
    let intercept = mean_v - slope * mean_t;
    for (t, v) in values.iter_mut().enumerate() {
        *v -= intercept + slope * t as f64;
    }
}

fn std_dev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let m = kahan::mean(values);
    let mut acc = kahan::NeumaierSum::new();
    for &v in values {
        let d = v - m;
        acc.add(d * d);
    }
    (acc.total() / (n - 1) as f64).sqrt()
}

/// Normalise to z-scores in place; returns whether the series is noisy
/// (more than 5% of samples beyond |z| > 3).
fn zscore_in_place(values: &mut [f64]) -> bool {
    let m = kahan::mean(values);
    let sd = std_dev(values);
    if sd == 0.0 {
        return false;
    }
    for v in values.iter_mut() {
        *v = (*v - m) / sd;
    }
    anomaly_fraction(values) > defaults::NOISY_SERIES_FRACTION
}

/// Fraction of samples with |z| beyond the anomaly threshold. Assumes the
/// slice is already in z-score space.
fn anomaly_fraction(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let anomalies = values
        .iter()
        .filter(|v| v.abs() > defaults::ANOMALY_Z_THRESHOLD)
        .count();
    anomalies as f64 / values.len() as f64
}

/// Pearson r between `xs[i]` and `ys[i + lag]` over their overlap.
/// None when the overlap is too short or either window is constant.
fn pearson_at_lag(xs: &[f64], ys: &[f64], lag: i64) -> Option<f64> {
    let n = xs.len();
    let (x_window, y_window): (&[f64], &[f64]) = if lag >= 0 {
        let lag = lag as usize;
        if lag >= n {
            return None;
        }
        (&xs[..n - lag], &ys[lag..])
    } else {
        let lag = (-lag) as usize;
        if lag >= n {
            return None;
        }
        (&xs[lag..], &ys[..n - lag])
    };
    if x_window.len() < 3 {
        return None;
    }

    let mean_x = kahan::mean(x_window);
    let mean_y = kahan::mean(y_window);
    let mut cov = kahan::NeumaierSum::new();
    let mut var_x = kahan::NeumaierSum::new();
    let mut var_y = kahan::NeumaierSum::new();
    for (&x, &y) in x_window.iter().zip(y_window.iter()) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov.add(dx * dy);
        var_x.add(dx * dx);
        var_y.add(dy * dy);
    }
    let denom = (var_x.total() * var_y.total()).sqrt();
    if denom == 0.0 {
        return None;
    }
    Some((cov.total() / denom).clamp(-1.0, 1.0))
}

/// Two-tailed p-value for r with n-2 degrees of freedom.
fn p_value_for_r(r: f64, n: usize) -> f64 {
    if n < 3 {
        return 1.0;
    }
    if r.abs() >= 0.9999 {
        return 0.0;
    }
    let df = (n - 2) as f64;
    let t_stat = r * (df / (1.0 - r * r)).sqrt();
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => 2.0 * (1.0 - dist.cdf(t_stat.abs())),
        Err(_) => 1.0,
    }
}

/// Posterior probability the correlation is real, by Bayes' rule over the
/// significance outcome: likelihoods 0.95/0.40 given real, 0.05/0.60 given
/// spurious, split at p < 0.05.
fn posterior(prior: f64, p_value: f64) -> f64 {
    let significant = p_value < 0.05;
    let likelihood_real = if significant { 0.95 } else { 0.40 };
    let likelihood_spurious = if significant { 0.05 } else { 0.60 };
    let numerator = prior * likelihood_real;
    let denominator = numerator + (1.0 - prior) * likelihood_spurious;
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Population normalization and scoring
//!
//! This module turns raw metrics into a single severity score:
//! - Guarded z-scores against the population reference
//! - Fixed per-metric weights
//! - Contribution ranking for the report

use crate::population::PopulationStats;
use crate::types::{Metric, MetricReference, MetricSet, PerMetric, ScoringDetail};
use tracing::debug;

/// Fixed metric weights, in scoring order
pub const WEIGHTS: PerMetric<f64> = PerMetric {
    log_dr_dtheta_mean: 0.30,
    log_dr_dt_mean: 0.20,
    auc_ratio: 0.20,
    geom_power: 0.10,
    temp_power: 0.10,
    jerk_proxy: 0.10,
};

/// Standard score, or `0.0` when any input is non-finite or `std` is zero
pub fn zscore(raw: f64, mean: f64, std: f64) -> f64 {
    if !raw.is_finite() || !mean.is_finite() || !std.is_finite() || std == 0.0 {
        return 0.0;
    }
    (raw - mean) / std
}

/// Scorer combining metrics with a population reference
pub struct PopulationNormalizer;

impl PopulationNormalizer {
    /// Score a metric set against the population table
    pub fn score(metrics: &MetricSet, stats: &PopulationStats) -> ScoringDetail {
        let population_reference = PerMetric::from_fn(|metric| {
            let entry = stats.entry(metric);
            MetricReference {
                mean: entry.mean,
                std: entry.std,
                raw: metrics.value(metric),
            }
        });

        let z_scores = PerMetric::from_fn(|metric| {
            let reference = population_reference.get(metric);
            zscore(reference.raw, reference.mean, reference.std)
        });

        let weighted_contributions =
            PerMetric::from_fn(|metric| z_scores.get(metric) * WEIGHTS.get(metric));

        // Summation order is fixed so the score is bit-for-bit reproducible
        let final_score = Metric::ALL
            .iter()
            .fold(0.0, |acc, m| acc + weighted_contributions.get(*m));

        let weighted_contributions_sorted = rank_contributions(&weighted_contributions);

        debug!(final_score, "computed weighted score");

        ScoringDetail {
            population_reference,
            z_scores,
            weights: WEIGHTS,
            weighted_contributions,
            weighted_contributions_sorted,
            final_score,
        }
    }
}

/// `(code, contribution)` pairs by descending magnitude; ties keep scoring order
pub fn rank_contributions(contributions: &PerMetric<f64>) -> Vec<(String, f64)> {
    let mut ranked: Vec<(String, f64)> = contributions
        .iter()
        .map(|(metric, value)| (metric.code().to_string(), *value))
        .collect();
    ranked.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
    ranked
}

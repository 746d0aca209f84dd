//! Metric computation
//!
//! This module derives the six motor-control metrics from a processed trace
//! and its smoothed derivatives:
//! - Log-rate means (dr/dtheta and dr/dt)
//! - Drawn-to-template swept area ratio
//! - Geometric and temporal power
//! - Jerk proxy
//!
//! A metric that cannot be computed is `NaN`; deciding what that means for the
//! score is the normalizer's job.

use crate::smoothing::safe_mean;
use crate::types::{Derivatives, MetricSet, ProcessedTrace, SpiralTemplate};
use tracing::warn;

/// Metric computer for processed traces
pub struct MetricComputer;

impl MetricComputer {
    /// Compute all metrics plus total duration
    pub fn compute(trace: &ProcessedTrace, derivatives: &Derivatives) -> MetricSet {
        let metrics = MetricSet {
            log_dr_dtheta_mean: log_dr_dtheta_mean(&derivatives.dr_dt, &derivatives.dtheta_dt),
            log_dr_dt_mean: log_positive_mean(&derivatives.dr_dt),
            auc_ratio: auc_ratio(trace, derivatives),
            geom_power: geometric_power(trace),
            temp_power: temporal_power(&derivatives.dr_dt, &derivatives.dr_dt_baseline),
            jerk_proxy: jerk_proxy(trace, derivatives),
            total_time_ms: trace.duration_ms(),
        };

        let undefined = metrics.undefined();
        if !undefined.is_empty() {
            let names: Vec<&str> = undefined.iter().map(|m| m.code()).collect();
            warn!(?names, "some metrics are undefined for this trace");
        }

        metrics
    }
}

/// Mean of `ln` over the finite, positive entries
fn log_positive_mean(values: &[f64]) -> f64 {
    safe_mean(
        values
            .iter()
            .filter(|v| v.is_finite() && **v > 0.0)
            .map(|v| v.ln()),
    )
}

/// Mean log of the radial growth per radian
fn log_dr_dtheta_mean(dr_dt: &[f64], dtheta_dt: &[f64]) -> f64 {
    let ratios: Vec<f64> = dr_dt
        .iter()
        .zip(dtheta_dt)
        .map(|(dr, dtheta)| dr / dtheta)
        .collect();
    log_positive_mean(&ratios)
}

/// Trapezoidal integral of `values` over `t`
fn trapezoid(values: &[f64], t: &[f64]) -> f64 {
    values
        .windows(2)
        .zip(t.windows(2))
        .map(|(v, tt)| 0.5 * (v[0] + v[1]) * (tt[1] - tt[0]))
        .sum()
}

/// Closed-form area swept by `r = a + bθ` between two angles
pub fn template_swept_area(template: SpiralTemplate, theta_start: f64, theta_end: f64) -> f64 {
    let SpiralTemplate { a, b } = template;
    let (th1, th2) = (theta_start, theta_end);
    0.5 * ((b * b) * (th2.powi(3) - th1.powi(3)) / 3.0
        + b * a * (th2.powi(2) - th1.powi(2))
        + (a * a) * (th2 - th1))
}

/// Drawn swept area over the template's analytic area
fn auc_ratio(trace: &ProcessedTrace, derivatives: &Derivatives) -> f64 {
    let (Some(first), Some(last)) = (trace.samples.first(), trace.samples.last()) else {
        return f64::NAN;
    };

    let area_rate: Vec<f64> = derivatives
        .r_smoothed
        .iter()
        .zip(&derivatives.dtheta_dt)
        .map(|(r, dtheta)| 0.5 * (r * r) * dtheta)
        .collect();
    let drawn = trapezoid(&area_rate, &trace.ts());

    let fit = template_swept_area(trace.template(), first.theta, last.theta);
    if fit == 0.0 {
        return f64::NAN;
    }
    drawn / fit
}

/// Mean squared deviation from the template radius
fn geometric_power(trace: &ProcessedTrace) -> f64 {
    if trace.is_empty() {
        return f64::NAN;
    }
    let total: f64 = trace.samples.iter().map(|s| s.relative_r * s.relative_r).sum();
    total / trace.len() as f64
}

/// Mean squared residual between the polynomial and moving-average velocities
fn temporal_power(dr_dt: &[f64], baseline: &[f64]) -> f64 {
    if dr_dt.is_empty() {
        return f64::NAN;
    }
    let total: f64 = dr_dt
        .iter()
        .zip(baseline)
        .map(|(v, b)| (v - b) * (v - b))
        .sum();
    total / dr_dt.len() as f64
}

/// Total Euclidean length of the drawn path
pub fn path_length(xs: &[f64], ys: &[f64]) -> f64 {
    xs.windows(2)
        .zip(ys.windows(2))
        .map(|(x, y)| {
            let dx = x[1] - x[0];
            let dy = y[1] - y[0];
            (dx * dx + dy * dy).sqrt()
        })
        .sum()
}

/// `ln(T³) · Σ(d³r/dt³)²·dt / L²`
fn jerk_proxy(trace: &ProcessedTrace, derivatives: &Derivatives) -> f64 {
    let duration = trace.duration_ms();
    let length = path_length(&trace.xs(), &trace.ys());
    if !(duration > 0.0 && length > 0.0) {
        return f64::NAN;
    }

    let jerk_integral: f64 = derivatives
        .d3r_dt3
        .iter()
        .map(|j| (j * j) * derivatives.dt_ms)
        .sum();

    duration.powi(3).ln() * jerk_integral / (length * length)
}

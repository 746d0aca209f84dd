//! Derivative and smoothing engine
//!
//! Treats the trace as uniformly sampled at its mean interval and computes the
//! smoothed derivative products the metric computer needs.

use crate::error::ScoringError;
use crate::smoothing::{moving_average, odd_window_at_most, savgol_filter, MIN_SMOOTHING_SAMPLES};
use crate::types::{Derivatives, ProcessedTrace};
use tracing::debug;

/// Upper bound for the first-derivative window
pub const MAIN_WINDOW_TARGET: usize = 31;
/// Upper bound for the third-derivative window
pub const JERK_WINDOW_TARGET: usize = 51;
/// Polynomial order for first derivatives
pub const MAIN_POLYORDER: usize = 5;
/// Polynomial order for the third derivative
pub const JERK_POLYORDER: usize = 7;
/// Polynomial order for the smoothed radius used in the area integral
pub const RADIUS_POLYORDER: usize = 3;
/// Moving-average window for the velocity baseline
pub const BASELINE_WINDOW: usize = 7;

/// Engine computing smoothed derivatives of a processed trace
pub struct DerivativeEngine;

impl DerivativeEngine {
    pub fn compute(trace: &ProcessedTrace) -> Result<Derivatives, ScoringError> {
        let n = trace.len();
        let t = trace.ts();
        let r = trace.radii();
        let theta = trace.thetas();

        let dt_ms = mean_interval(&t);
        if !dt_ms.is_finite() || dt_ms <= 0.0 {
            return Err(ScoringError::BadTimestep { dt: dt_ms });
        }

        let window_main = odd_window_at_most(n, MAIN_WINDOW_TARGET);
        let window_jerk = odd_window_at_most(n, JERK_WINDOW_TARGET);
        if window_main == 0 || window_jerk == 0 {
            return Err(ScoringError::InsufficientSamples {
                count: n,
                minimum: MIN_SMOOTHING_SAMPLES,
            });
        }

        debug!(n, dt_ms, window_main, window_jerk, "smoothing windows chosen");

        let dr_dt = savgol_filter(&r, window_main, MAIN_POLYORDER, 1, dt_ms)?;
        let dtheta_dt = savgol_filter(&theta, window_main, MAIN_POLYORDER, 1, dt_ms)?;
        let d3r_dt3 = savgol_filter(&r, window_jerk, JERK_POLYORDER, 3, dt_ms)?;
        let r_smoothed = savgol_filter(&r, window_main, RADIUS_POLYORDER, 0, 1.0)?;
        let dr_dt_baseline = moving_average(&dr_dt, BASELINE_WINDOW);

        Ok(Derivatives {
            dt_ms,
            window_main,
            window_jerk,
            dr_dt,
            dtheta_dt,
            d3r_dt3,
            r_smoothed,
            dr_dt_baseline,
        })
    }
}

/// Mean of consecutive differences; `NaN` for fewer than two samples
pub fn mean_interval(t: &[f64]) -> f64 {
    if t.len() < 2 {
        return f64::NAN;
    }
    let total: f64 = t.windows(2).map(|pair| pair[1] - pair[0]).sum();
    total / (t.len() - 1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FittedTemplate, ProcessedSample, SpiralTemplate, TemplateOrigin};
    use approx::assert_abs_diff_eq;

    fn processed(samples: Vec<(f64, f64, f64)>) -> ProcessedTrace {
        ProcessedTrace {
            fitted: FittedTemplate {
                template: SpiralTemplate::new(0.0, 1.0),
                origin: TemplateOrigin::Supplied,
                valid_samples: 0,
            },
            center_x: 0.0,
            center_y: 0.0,
            samples: samples
                .into_iter()
                .map(|(t, r, theta)| ProcessedSample {
                    x: r * theta.cos(),
                    y: r * theta.sin(),
                    t,
                    r,
                    theta,
                    relative_r: r - theta,
                })
                .collect(),
            duplicates_removed: 0,
        }
    }

    #[test]
    fn test_linear_growth_has_constant_rates() {
        let trace = processed(
            (0..100)
                .map(|i| {
                    let t = 20.0 * i as f64;
                    (t, 1.0 + 0.01 * t, 0.002 * t)
                })
                .collect(),
        );
        let d = DerivativeEngine::compute(&trace).unwrap();
        assert_abs_diff_eq!(d.dt_ms, 20.0, epsilon = 1e-12);
        assert_eq!(d.window_main, 31);
        assert_eq!(d.window_jerk, 51);
        for i in 0..100 {
            assert_abs_diff_eq!(d.dr_dt[i], 0.01, epsilon = 1e-9);
            assert_abs_diff_eq!(d.dtheta_dt[i], 0.002, epsilon = 1e-9);
            assert_abs_diff_eq!(d.d3r_dt3[i], 0.0, epsilon = 1e-9);
            assert_abs_diff_eq!(d.r_smoothed[i], trace.samples[i].r, epsilon = 1e-9);
        }
        // Baseline interior equals the constant, edges are zero-padded
        assert_abs_diff_eq!(d.dr_dt_baseline[50], 0.01, epsilon = 1e-12);
        assert!(d.dr_dt_baseline[0] < 0.01);
    }

    #[test]
    fn test_short_trace_windows() {
        let trace = processed((0..10).map(|i| (i as f64, 1.0 + i as f64, 0.1 * i as f64)).collect());
        let d = DerivativeEngine::compute(&trace).unwrap();
        assert_eq!(d.window_main, 9);
        assert_eq!(d.window_jerk, 9);
    }

    #[test]
    fn test_too_short_for_windows() {
        let trace = processed((0..6).map(|i| (i as f64, 1.0, 0.0)).collect());
        let err = DerivativeEngine::compute(&trace).unwrap_err();
        assert!(matches!(
            err,
            ScoringError::InsufficientSamples { count: 6, minimum: 7 }
        ));
    }

    #[test]
    fn test_bad_timestep() {
        let trace = processed((0..20).map(|i| (100.0 - i as f64, 1.0, 0.0)).collect());
        let err = DerivativeEngine::compute(&trace).unwrap_err();
        match err {
            ScoringError::BadTimestep { dt } => assert_abs_diff_eq!(dt, -1.0, epsilon = 1e-12),
            other => panic!("unexpected error: {other:?}"),
        }

        let flat = processed((0..20).map(|_| (5.0, 1.0, 0.0)).collect());
        assert!(matches!(
            DerivativeEngine::compute(&flat).unwrap_err(),
            ScoringError::BadTimestep { .. }
        ));
    }

    #[test]
    fn test_mean_interval() {
        assert_eq!(mean_interval(&[0.0, 10.0, 30.0]), 15.0);
        assert!(mean_interval(&[1.0]).is_nan());
    }
}

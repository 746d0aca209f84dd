//! Spiral unwrapping
//!
//! Converts a clean Cartesian trace into polar form around the drawing's own
//! centroid, re-estimates the template when the data supports it, and computes
//! the residual radius against the chosen template.

use crate::config::RefitPolicy;
use crate::types::{
    CleanTrace, FittedTemplate, ProcessedSample, ProcessedTrace, SpiralTemplate, TemplateOrigin,
};
use std::f64::consts::PI;
use tracing::{debug, warn};

/// Unwrapper for producing processed (polar) traces
pub struct SpiralUnwrapper;

impl SpiralUnwrapper {
    /// Center, unwrap and fit a clean trace against `template`
    pub fn process(
        trace: &CleanTrace,
        template: SpiralTemplate,
        policy: &RefitPolicy,
    ) -> ProcessedTrace {
        let points = trace.points();
        let xs: Vec<f64> = points.iter().map(|p| p.x).collect();
        let ys: Vec<f64> = points.iter().map(|p| p.y).collect();

        let (centered_x, center_x) = center(&xs);
        let (centered_y, center_y) = center(&ys);

        let radii: Vec<f64> = centered_x
            .iter()
            .zip(&centered_y)
            .map(|(x, y)| (x * x + y * y).sqrt())
            .collect();
        let angles: Vec<f64> = centered_x
            .iter()
            .zip(&centered_y)
            .map(|(x, y)| y.atan2(*x))
            .collect();
        let thetas = unwrap_angles(&angles);

        let fitted = refit_template(&radii, &thetas, template, policy);
        let chosen = fitted.template;

        let samples = points
            .iter()
            .enumerate()
            .map(|(i, p)| ProcessedSample {
                x: centered_x[i],
                y: centered_y[i],
                t: p.t,
                r: radii[i],
                theta: thetas[i],
                relative_r: radii[i] - chosen.radius_at(thetas[i]),
            })
            .collect();

        ProcessedTrace {
            fitted,
            center_x,
            center_y,
            samples,
            duplicates_removed: trace.duplicates_removed(),
        }
    }
}

/// Subtract the arithmetic mean; returns the centered values and the mean
pub fn center(values: &[f64]) -> (Vec<f64>, f64) {
    if values.is_empty() {
        return (Vec::new(), 0.0);
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    (values.iter().map(|v| v - mean).collect(), mean)
}

/// Remove ±2π jumps so consecutive angles never differ by more than π
pub fn unwrap_angles(angles: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(angles.len());
    let Some(&first) = angles.first() else {
        return out;
    };
    out.push(first);

    let mut correction = 0.0;
    for pair in angles.windows(2) {
        let delta = pair[1] - pair[0];
        let mut wrapped = (delta + PI).rem_euclid(2.0 * PI) - PI;
        if wrapped == -PI && delta > 0.0 {
            wrapped = PI;
        }
        if delta.abs() >= PI {
            correction += wrapped - delta;
        }
        out.push(pair[1] + correction);
    }
    out
}

/// Ordinary least squares for `r = a + b·theta`.
///
/// Returns `(a, b, samples_used)` over samples with `theta > 0` and finite
/// `r`, `theta`. The coefficients are `NaN` when theta has no spread.
pub fn fit_linear_spiral(radii: &[f64], thetas: &[f64]) -> (f64, f64, usize) {
    let valid: Vec<(f64, f64)> = thetas
        .iter()
        .zip(radii)
        .filter(|(theta, r)| theta.is_finite() && r.is_finite() && **theta > 0.0)
        .map(|(theta, r)| (*theta, *r))
        .collect();

    let n = valid.len();
    if n == 0 {
        return (f64::NAN, f64::NAN, 0);
    }

    let mean_theta = valid.iter().map(|(theta, _)| theta).sum::<f64>() / n as f64;
    let mean_r = valid.iter().map(|(_, r)| r).sum::<f64>() / n as f64;

    let (sxy, sxx) = valid.iter().fold((0.0, 0.0), |(sxy, sxx), (theta, r)| {
        let dtheta = theta - mean_theta;
        (sxy + dtheta * (r - mean_r), sxx + dtheta * dtheta)
    });

    if sxx == 0.0 {
        return (f64::NAN, f64::NAN, n);
    }

    let b = sxy / sxx;
    let a = mean_r - b * mean_theta;
    (a, b, n)
}

/// Choose between a refit of the centered data and the supplied template.
///
/// Pure: the supplied template is returned untouched when the refit is
/// rejected or disabled.
pub fn refit_template(
    radii: &[f64],
    thetas: &[f64],
    supplied: SpiralTemplate,
    policy: &RefitPolicy,
) -> FittedTemplate {
    let (a, b, valid_samples) = fit_linear_spiral(radii, thetas);

    let keep_supplied = FittedTemplate {
        template: supplied,
        origin: TemplateOrigin::Supplied,
        valid_samples,
    };

    if !policy.enabled {
        return keep_supplied;
    }

    if valid_samples <= policy.min_valid_samples {
        debug!(
            valid_samples,
            required = policy.min_valid_samples,
            "too few samples for template refit"
        );
        return keep_supplied;
    }

    if !a.is_finite() || !b.is_finite() || b <= policy.min_slope {
        warn!(a, b, "rejected template refit, keeping supplied parameters");
        return keep_supplied;
    }

    debug!(
        supplied_a = supplied.a,
        supplied_b = supplied.b,
        a,
        b,
        valid_samples,
        "using refit template"
    );

    FittedTemplate {
        template: SpiralTemplate { a, b },
        origin: TemplateOrigin::Refit,
        valid_samples,
    }
}

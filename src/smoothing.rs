//! Numeric smoothing primitives
//!
//! - Savitzky–Golay (local polynomial least squares) filtering and
//!   differentiation, with polynomial interpolation at the edges
//! - Unweighted moving average with "same"-length output
//! - Odd window selection for short traces

use crate::error::ScoringError;

/// Smallest window the selector will return
pub const MIN_WINDOW: usize = 5;

/// Traces shorter than this cannot be smoothed at all
pub const MIN_SMOOTHING_SAMPLES: usize = 7;

/// Largest odd window `<= min(target, n - 1)`, floored at [`MIN_WINDOW`].
///
/// Returns 0 when `n` is below [`MIN_SMOOTHING_SAMPLES`].
pub fn odd_window_at_most(n: usize, target: usize) -> usize {
    if n < MIN_SMOOTHING_SAMPLES {
        return 0;
    }
    let mut window = target.min(n - 1);
    if window % 2 == 0 {
        window = window.saturating_sub(1);
    }
    window.max(MIN_WINDOW)
}

/// Savitzky–Golay filter.
///
/// Fits a polynomial of `polyorder` to each `window`-sample neighbourhood and
/// evaluates its `deriv`-th derivative, scaled by `1 / delta^deriv`. The first
/// and last `window / 2` samples are evaluated on the polynomial fitted to the
/// first and last full window respectively.
pub fn savgol_filter(
    signal: &[f64],
    window: usize,
    polyorder: usize,
    deriv: usize,
    delta: f64,
) -> Result<Vec<f64>, ScoringError> {
    let n = signal.len();
    if window % 2 == 0 || window <= polyorder || window > n {
        return Err(ScoringError::InsufficientSamples {
            count: n,
            minimum: (polyorder + 1).max(window),
        });
    }

    let half = window / 2;
    let weights = SavgolWeights::new(window, polyorder, deriv, delta)?;
    let mut out = vec![0.0; n];

    // Interior: centered evaluation
    let center = weights.at_offset(0);
    for (i, value) in out.iter_mut().enumerate().take(n - half).skip(half) {
        *value = dot(center, &signal[i - half..i + half + 1]);
    }

    // Leading edge: polynomial through the first window
    let head = &signal[..window];
    for (i, value) in out.iter_mut().enumerate().take(half) {
        *value = dot(weights.at_offset(i as isize - half as isize), head);
    }

    // Trailing edge: polynomial through the last window
    let tail_start = n - window;
    let tail = &signal[tail_start..];
    for (i, value) in out.iter_mut().enumerate().skip(n - half) {
        let offset = (i - tail_start) as isize - half as isize;
        *value = dot(weights.at_offset(offset), tail);
    }

    Ok(out)
}

/// Per-offset convolution weights for one window/order/derivative combination.
///
/// Row `k` holds the weights that evaluate the fitted polynomial's derivative
/// at position `k - half` relative to the window center.
struct SavgolWeights {
    half: usize,
    rows: Vec<Vec<f64>>,
}

impl SavgolWeights {
    fn new(window: usize, polyorder: usize, deriv: usize, delta: f64) -> Result<Self, ScoringError> {
        let half = window / 2;
        let terms = polyorder + 1;
        // Positions scaled to [-1, 1] keep the normal equations well conditioned
        let scale = half.max(1) as f64;
        let positions: Vec<f64> = (0..window)
            .map(|j| (j as f64 - half as f64) / scale)
            .collect();

        // Vandermonde rows: design[j][k] = u_j^k
        let design: Vec<Vec<f64>> = positions
            .iter()
            .map(|&u| powers(u, terms))
            .collect();

        // Normal matrix G = AᵀA
        let mut gram = vec![vec![0.0; terms]; terms];
        for row in &design {
            for k in 0..terms {
                for l in 0..terms {
                    gram[k][l] += row[k] * row[l];
                }
            }
        }

        let derivative_scale = (scale * delta).powi(deriv as i32);
        let mut rows = Vec::with_capacity(window);

        for &u0 in &positions {
            // d^deriv/du^deriv of u^k at u0
            let basis: Vec<f64> = (0..terms)
                .map(|k| {
                    if k < deriv {
                        0.0
                    } else {
                        falling_factorial(k, deriv) * u0.powi((k - deriv) as i32)
                    }
                })
                .collect();

            let z = solve_linear(gram.clone(), basis).ok_or(ScoringError::InsufficientSamples {
                count: window,
                minimum: terms,
            })?;

            let row: Vec<f64> = design
                .iter()
                .map(|d| d.iter().zip(&z).map(|(a, b)| a * b).sum::<f64>() / derivative_scale)
                .collect();
            rows.push(row);
        }

        Ok(Self { half, rows })
    }

    fn at_offset(&self, offset: isize) -> &[f64] {
        &self.rows[(offset + self.half as isize) as usize]
    }
}

fn powers(u: f64, terms: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(terms);
    let mut acc = 1.0;
    for _ in 0..terms {
        out.push(acc);
        acc *= u;
    }
    out
}

/// k · (k-1) · … · (k-d+1)
fn falling_factorial(k: usize, d: usize) -> f64 {
    ((k - d + 1)..=k).map(|v| v as f64).product()
}

fn dot(weights: &[f64], values: &[f64]) -> f64 {
    weights.iter().zip(values).map(|(w, v)| w * v).sum()
}

/// Gaussian elimination with partial pivoting. `None` if the system is singular.
pub(crate) fn solve_linear(mut matrix: Vec<Vec<f64>>, mut rhs: Vec<f64>) -> Option<Vec<f64>> {
    let n = rhs.len();

    for col in 0..n {
        let pivot = (col..n).max_by(|&a, &b| matrix[a][col].abs().total_cmp(&matrix[b][col].abs()))?;
        if matrix[pivot][col].abs() < 1e-12 {
            return None;
        }
        matrix.swap(col, pivot);
        rhs.swap(col, pivot);

        for row in (col + 1)..n {
            let factor = matrix[row][col] / matrix[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                matrix[row][k] -= factor * matrix[col][k];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut solution = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| matrix[row][k] * solution[k]).sum();
        solution[row] = (rhs[row] - tail) / matrix[row][row];
    }
    Some(solution)
}

/// Unweighted moving average, same length as the input.
///
/// Samples beyond either end count as zero, so the edges are pulled toward 0
/// exactly like a zero-padded "same" convolution.
pub fn moving_average(signal: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    if window == 1 {
        return signal.to_vec();
    }

    let n = signal.len();
    let weight = 1.0 / window as f64;
    // Offset of the output sample inside the kernel for "same" alignment
    let lead = (window - 1) / 2;

    (0..n)
        .map(|i| {
            let full_index = i + lead;
            let lo = full_index.saturating_sub(window - 1);
            let hi = full_index.min(n - 1);
            (lo..=hi).map(|j| signal[j] * weight).sum()
        })
        .collect()
}

/// Mean of the finite values, `NaN` when there are none
pub fn safe_mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

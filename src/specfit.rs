//! Aperiodic spectral model fitting.
//!
//! Fits the non-oscillatory component of a power spectrum in log-log space.
//! The fixed mode is a straight line, `log10 P = offset - exp * log10 f`,
//! solved in closed form. The double-exponential mode,
//! `log10 P = offset - exp0 * log10 f - log10(knee + f^exp1)`,
//! is solved by a damped Gauss-Newton iteration.

use itertools::izip;
use log::debug;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::FppError;

/// The maximum number of Gauss-Newton iterations.
const MAX_ITER: usize = 300;
/// The initial damping factor.
const LAMBDA_INIT: f64 = 1e-3;
/// The damping factor above which a step search is abandoned.
const LAMBDA_MAX: f64 = 1e12;
/// The smallest admissible knee value.
const KNEE_MIN: f64 = 1e-9;

/// The parametric form of the aperiodic component.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub enum AperiodicMode {
    /// Straight line in log-log space: parameters `[offset, exponent]`.
    Fixed,
    /// Two exponents around a knee: parameters `[offset, exp_0, knee, exp_1]`.
    DoubleExponential,
}

/// The result of an aperiodic fit.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct AperiodicFit {
    /// The fitted aperiodic parameters, 2 for `Fixed` and 4 for `DoubleExponential`.
    pub params: Vec<f64>,
    /// The mean absolute error of the fit, in log10 power units.
    pub error_mae: f64,
    /// The coefficient of determination of the fit.
    pub r_squared: f64,
}

// Restrict the spectrum to the requested frequency range, keeping only
// strictly positive frequencies and powers (both are log-transformed).
// Returns (f, log10 f, log10 p).
fn select_range(
    psd: &[f64],
    freqs: &[f64],
    freq_range: (f64, f64),
) -> Result<(Vec<f64>, Vec<f64>, Vec<f64>), FppError> {
    if psd.len() != freqs.len() {
        return Err(FppError::LengthMismatch {
            left: psd.len(),
            right: freqs.len(),
        });
    }
    let (lo, hi) = freq_range;
    if !(lo <= hi) {
        return Err(FppError::InvalidParameter(format!(
            "invalid frequency range ({}, {})",
            lo, hi
        )));
    }

    let mut f = Vec::new();
    let mut x = Vec::new();
    let mut y = Vec::new();
    for (&freq, &power) in freqs.iter().zip(psd.iter()) {
        if freq >= lo && freq <= hi && freq > 0.0 && power > 0.0 {
            f.push(freq);
            x.push(freq.log10());
            y.push(power.log10());
        }
    }
    Ok((f, x, y))
}

// Ordinary least squares line, returning (intercept, slope).
fn linear_fit(x: &[f64], y: &[f64]) -> (f64, f64) {
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;
    let sxx = x.iter().map(|&v| (v - mean_x) * (v - mean_x)).sum::<f64>();
    if sxx <= 0.0 {
        return (mean_y, 0.0);
    }
    let sxy = x
        .iter()
        .zip(y.iter())
        .map(|(&a, &b)| (a - mean_x) * (b - mean_y))
        .sum::<f64>();
    let slope = sxy / sxx;
    (mean_y - slope * mean_x, slope)
}

fn fit_metrics(residuals: &DVector<f64>, y: &[f64]) -> (f64, f64) {
    let n = y.len() as f64;
    let mae = residuals.iter().map(|r| r.abs()).sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;
    let ss_tot = y.iter().map(|&v| (v - mean_y) * (v - mean_y)).sum::<f64>();
    let ss_res = residuals.norm_squared();
    let r_squared = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 1.0 };
    (mae, r_squared)
}

// Residuals y - model(theta) of the double-exponential model.
fn dexp_residuals(theta: &DVector<f64>, f: &[f64], x: &[f64], y: &[f64]) -> DVector<f64> {
    let (offset, exp0, knee, exp1) = (theta[0], theta[1], theta[2], theta[3]);
    DVector::from_iterator(
        y.len(),
        izip!(f, x, y).map(|(&fi, &xi, &yi)| {
            yi - (offset - exp0 * xi - (knee + fi.powf(exp1)).log10())
        }),
    )
}

// Jacobian of the double-exponential model with respect to its parameters.
fn dexp_jacobian(theta: &DVector<f64>, f: &[f64], x: &[f64]) -> DMatrix<f64> {
    let (knee, exp1) = (theta[2], theta[3]);
    let ln10 = std::f64::consts::LN_10;

    let mut jacobian = DMatrix::zeros(f.len(), 4);
    for (i, (&fi, &xi)) in f.iter().zip(x.iter()).enumerate() {
        let pow = fi.powf(exp1);
        let denom = (knee + pow) * ln10;
        jacobian[(i, 0)] = 1.0;
        jacobian[(i, 1)] = -xi;
        jacobian[(i, 2)] = -1.0 / denom;
        jacobian[(i, 3)] = -pow * fi.ln() / denom;
    }
    jacobian
}

// Initial guess from the slopes of the lower and upper quarters of the
// log-frequency span.
fn dexp_initial_guess(f: &[f64], x: &[f64], y: &[f64]) -> DVector<f64> {
    let n = f.len();
    let span = x[n - 1] - x[0];

    let low_end = x
        .iter()
        .position(|&v| v > x[0] + 0.25 * span)
        .unwrap_or(n)
        .max(3)
        .min(n);
    let high_start = x
        .iter()
        .position(|&v| v >= x[0] + 0.75 * span)
        .unwrap_or(0)
        .min(n - 3);

    let (_, slope_low) = linear_fit(&x[..low_end], &y[..low_end]);
    let (_, slope_high) = linear_fit(&x[high_start..], &y[high_start..]);

    let exp0 = (-slope_low).max(0.0);
    let exp1 = ((-slope_high) - exp0).max(0.25);
    let knee = (f[0] * f[n - 1]).sqrt().powf(exp1).max(KNEE_MIN);
    let offset = izip!(f, x, y)
        .map(|(&fi, &xi, &yi)| yi + exp0 * xi + (knee + fi.powf(exp1)).log10())
        .sum::<f64>()
        / n as f64;

    DVector::from_vec(vec![offset, exp0, knee, exp1])
}

fn fit_dexp(f: &[f64], x: &[f64], y: &[f64]) -> Result<(DVector<f64>, DVector<f64>), FppError> {
    let mut theta = dexp_initial_guess(f, x, y);
    let mut residuals = dexp_residuals(&theta, f, x, y);
    let mut sse = residuals.norm_squared();
    let mut lambda = LAMBDA_INIT;

    for iter in 0..MAX_ITER {
        let jacobian = dexp_jacobian(&theta, f, x);
        let jtj = jacobian.transpose() * &jacobian;
        let jtr = jacobian.transpose() * &residuals;

        let mut improved = false;
        while lambda <= LAMBDA_MAX {
            let mut damped = jtj.clone();
            for i in 0..4 {
                damped[(i, i)] += lambda * jtj[(i, i)].max(1e-12);
            }

            if let Some(step) = damped.lu().solve(&jtr) {
                let mut candidate = &theta + step;
                candidate[2] = candidate[2].max(KNEE_MIN);

                let candidate_residuals = dexp_residuals(&candidate, f, x, y);
                let candidate_sse = candidate_residuals.norm_squared();
                if candidate_sse.is_finite() && candidate_sse < sse {
                    let gain = sse - candidate_sse;
                    theta = candidate;
                    residuals = candidate_residuals;
                    sse = candidate_sse;
                    lambda = (lambda * 0.5).max(1e-12);
                    improved = true;

                    if gain < 1e-12 * sse.max(1e-12) {
                        debug!("double-exponential fit converged after {} iterations", iter + 1);
                        return Ok((theta, residuals));
                    }
                    break;
                }
            }
            lambda *= 10.0;
        }

        if !improved {
            // The damping search stalled; the current estimate is the best found
            break;
        }
    }

    if theta.iter().all(|v| v.is_finite()) && sse.is_finite() {
        Ok((theta, residuals))
    } else {
        Err(FppError::SpectralFitFailure(
            "double-exponential fit diverged to non-finite parameters".to_string(),
        ))
    }
}

/// Fits the aperiodic component of a power spectrum over a frequency range.
///
/// # Parameters
/// - `psd`: The power values, aligned with `freqs`.
/// - `freqs`: The frequency axis, in Hz.
/// - `freq_range`: The inclusive `(low, high)` fit range, in Hz.
/// - `mode`: The parametric form of the aperiodic component.
///
/// # Returns
/// The fitted parameters together with the mean absolute error and the
/// coefficient of determination, both computed in log10 power units.
pub fn fit_aperiodic(
    psd: &[f64],
    freqs: &[f64],
    freq_range: (f64, f64),
    mode: AperiodicMode,
) -> Result<AperiodicFit, FppError> {
    let (f, x, y) = select_range(psd, freqs, freq_range)?;

    let min_points = match mode {
        AperiodicMode::Fixed => 3,
        AperiodicMode::DoubleExponential => 5,
    };
    if f.len() < min_points {
        return Err(FppError::SpectralFitFailure(format!(
            "only {} positive spectrum points in ({}, {}) Hz, need at least {}",
            f.len(),
            freq_range.0,
            freq_range.1,
            min_points
        )));
    }

    match mode {
        AperiodicMode::Fixed => {
            let (intercept, slope) = linear_fit(&x, &y);
            let residuals = DVector::from_iterator(
                y.len(),
                x.iter().zip(y.iter()).map(|(&xi, &yi)| yi - (intercept + slope * xi)),
            );
            let (error_mae, r_squared) = fit_metrics(&residuals, &y);
            Ok(AperiodicFit {
                params: vec![intercept, -slope],
                error_mae,
                r_squared,
            })
        }
        AperiodicMode::DoubleExponential => {
            let (theta, residuals) = fit_dexp(&f, &x, &y)?;
            let (error_mae, r_squared) = fit_metrics(&residuals, &y);
            Ok(AperiodicFit {
                params: theta.iter().copied().collect(),
                error_mae,
                r_squared,
            })
        }
    }
}

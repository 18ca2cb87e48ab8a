//! PSI pattern parameterization.
//!
//! An averaged PSI curve is reduced to four scalar descriptors: the time of
//! its peak, the rise time from the first lag to the peak, the decay time from
//! the peak to the first drop below a fraction of the peak value, and the peak
//! value itself.

use serde::{Deserialize, Serialize};

use crate::error::FppError;

/// Scalar descriptors of an averaged PSI curve.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct PsiParams {
    /// The lag of the PSI peak, in seconds.
    pub duration: f64,
    /// The time from the first lag to the peak, in seconds.
    pub rise: f64,
    /// The time from the peak to the first drop below the decay threshold, in seconds.
    pub decay: f64,
    /// The PSI peak value.
    pub max_val: f64,
}

/// Parameterizes an averaged PSI curve.
///
/// The peak is the first occurrence of the maximum value. The decay time is
/// measured at the first lag after the peak where the curve drops to or below
/// `decay_threshold * max_val`; a curve that never does is rejected with
/// [`FppError::NoDecayCrossing`].
///
/// # Parameters
/// - `psi`: The averaged PSI curve.
/// - `time_lags`: The lag axis, of the same length as the curve.
/// - `decay_threshold`: The decay level as a fraction of the peak value.
pub fn psi_params(
    psi: &[f64],
    time_lags: &[f64],
    decay_threshold: f64,
) -> Result<PsiParams, FppError> {
    if psi.len() != time_lags.len() {
        return Err(FppError::LengthMismatch {
            left: psi.len(),
            right: time_lags.len(),
        });
    }
    if psi.is_empty() {
        return Err(FppError::InvalidParameter(
            "cannot parameterize an empty PSI curve".to_string(),
        ));
    }

    // First occurrence of the maximum
    let (idx_max, max_val) = psi.iter().enumerate().fold((0, psi[0]), |acc, (i, &v)| {
        if v > acc.1 {
            (i, v)
        } else {
            acc
        }
    });
    let t_max = time_lags[idx_max];
    let rise = t_max - time_lags[0];

    let target_val = max_val * decay_threshold;
    let idx_decay = psi[idx_max..]
        .iter()
        .position(|&v| v <= target_val)
        .ok_or(FppError::NoDecayCrossing {
            threshold: decay_threshold,
            max_val,
        })?;
    let decay = time_lags[idx_max + idx_decay] - t_max;

    Ok(PsiParams {
        duration: t_max,
        rise,
        decay,
        max_val,
    })
}

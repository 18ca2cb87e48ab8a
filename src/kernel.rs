//! Synaptic kernel generators.
//!
//! All generators return a pair `(kernel, time)` of equal length
//! `N = round(fs * t_sec)`, with `time[i] = i / fs`. Kernels are zero beyond
//! their effective duration and rescaled so that their maximum equals the
//! requested amplitude (no rescaling when the raw maximum is not positive).

use crate::error::FppError;

/// The default duration (in seconds) after which a kernel is truncated to zero.
pub const DEFAULT_EFFECTIVE_DURATION: f64 = 0.1;

/// Returns the number of samples of a signal of duration `t_sec` sampled at `fs`.
pub fn num_samples(t_sec: f64, fs: f64) -> Result<usize, FppError> {
    if !(fs > 0.0) {
        return Err(FppError::InvalidParameter(format!(
            "sampling frequency must be positive, got {}",
            fs
        )));
    }
    if !(t_sec > 0.0) {
        return Err(FppError::InvalidParameter(format!(
            "duration must be positive, got {}",
            t_sec
        )));
    }
    Ok((fs * t_sec).round() as usize)
}

/// Returns the time axis `0, 1/fs, ..., (n-1)/fs`.
pub fn time_axis(n: usize, fs: f64) -> Vec<f64> {
    (0..n).map(|i| i as f64 / fs).collect()
}

// Rescale the kernel so that its maximum equals `max_amplitude`.
// Left untouched when the raw maximum is not positive.
fn rescale(kernel: &mut [f64], max_amplitude: f64) {
    let max = kernel.iter().fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
    if max > 0.0 {
        for v in kernel.iter_mut() {
            *v = *v / max * max_amplitude;
        }
    }
}

/// Generates an alpha-function kernel `t * exp(-t / tau_s)`.
///
/// # Parameters
/// - `t_sec`: The total duration of the kernel in seconds.
/// - `fs`: The sampling frequency in Hz.
/// - `tau_s`: The time constant in seconds.
/// - `max_amplitude`: The amplitude of the kernel peak.
/// - `effective_duration`: The duration after which the kernel is truncated to zero.
///
/// # Returns
/// A pair `(kernel, time)` of length `round(fs * t_sec)`.
pub fn alpha_kernel(
    t_sec: f64,
    fs: f64,
    tau_s: f64,
    max_amplitude: f64,
    effective_duration: f64,
) -> Result<(Vec<f64>, Vec<f64>), FppError> {
    if !(tau_s > 0.0) {
        return Err(FppError::InvalidParameter(format!(
            "time constant must be positive, got {}",
            tau_s
        )));
    }

    let n = num_samples(t_sec, fs)?;
    let time = time_axis(n, fs);
    let mut kernel: Vec<f64> = time
        .iter()
        .map(|&t| {
            if t > effective_duration {
                0.0
            } else {
                t * (-t / tau_s).exp()
            }
        })
        .collect();
    rescale(&mut kernel, max_amplitude);

    Ok((kernel, time))
}

/// Generates a dual-exponential kernel `exp(-t / tau_decay_s) - exp(-t / tau_rise_s)`.
///
/// The rise time constant must be strictly smaller than the decay time constant,
/// otherwise the kernel would be non-positive everywhere.
///
/// # Parameters
/// - `t_sec`: The total duration of the kernel in seconds.
/// - `fs`: The sampling frequency in Hz.
/// - `tau_rise_s`: The rise time constant in seconds.
/// - `tau_decay_s`: The decay time constant in seconds.
/// - `max_amplitude`: The amplitude of the kernel peak.
/// - `effective_duration`: The duration after which the kernel is truncated to zero.
///
/// # Returns
/// A pair `(kernel, time)` of length `round(fs * t_sec)`.
pub fn dual_exponential(
    t_sec: f64,
    fs: f64,
    tau_rise_s: f64,
    tau_decay_s: f64,
    max_amplitude: f64,
    effective_duration: f64,
) -> Result<(Vec<f64>, Vec<f64>), FppError> {
    if !(tau_rise_s > 0.0) || !(tau_decay_s > 0.0) {
        return Err(FppError::InvalidParameter(format!(
            "time constants must be positive, got rise {} and decay {}",
            tau_rise_s, tau_decay_s
        )));
    }
    if tau_rise_s >= tau_decay_s {
        return Err(FppError::InvalidParameter(format!(
            "rise time constant ({}) must be smaller than decay time constant ({})",
            tau_rise_s, tau_decay_s
        )));
    }

    let n = num_samples(t_sec, fs)?;
    let time = time_axis(n, fs);
    let mut kernel: Vec<f64> = time
        .iter()
        .map(|&t| {
            if t > effective_duration {
                0.0
            } else {
                (-t / tau_decay_s).exp() - (-t / tau_rise_s).exp()
            }
        })
        .collect();
    rescale(&mut kernel, max_amplitude);

    Ok((kernel, time))
}

/// Generates a square pulse kernel with three amplitude plateaus over
/// `[0, t1_s)`, `[t1_s, t2_s)`, and `[t2_s, t3_s)`, and zero afterwards.
///
/// # Parameters
/// - `t_sec`: The total duration of the kernel in seconds.
/// - `fs`: The sampling frequency in Hz.
/// - `t1_s`, `t2_s`, `t3_s`: The plateau boundaries in seconds (non-decreasing).
/// - `amplitude1`, `amplitude2`, `amplitude3`: The plateau amplitudes.
///
/// # Returns
/// A pair `(kernel, time)` of length `round(fs * t_sec)`.
#[allow(clippy::too_many_arguments)]
pub fn triple_square_kernel(
    t_sec: f64,
    fs: f64,
    t1_s: f64,
    t2_s: f64,
    t3_s: f64,
    amplitude1: f64,
    amplitude2: f64,
    amplitude3: f64,
) -> Result<(Vec<f64>, Vec<f64>), FppError> {
    if !(0.0 <= t1_s && t1_s <= t2_s && t2_s <= t3_s) {
        return Err(FppError::InvalidParameter(format!(
            "plateau boundaries must be non-decreasing, got {}, {}, {}",
            t1_s, t2_s, t3_s
        )));
    }

    let n = num_samples(t_sec, fs)?;
    let time = time_axis(n, fs);
    let kernel: Vec<f64> = time
        .iter()
        .map(|&t| {
            if t < t1_s {
                amplitude1
            } else if t < t2_s {
                amplitude2
            } else if t < t3_s {
                amplitude3
            } else {
                0.0
            }
        })
        .collect();

    Ok((kernel, time))
}

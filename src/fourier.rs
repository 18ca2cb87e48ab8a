//! Circular correlation engine.
//!
//! Convolutions and correlations are exact under periodic boundary conditions,
//! computed through the discrete Fourier transform. The PSI pattern is the
//! negative time-derivative of the circular autocorrelation.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use crate::error::FppError;
use crate::kernel::time_axis;

// Forward DFT of a real sequence.
fn fft_real(x: &[f64]) -> Vec<Complex<f64>> {
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(x.len());
    let mut buf: Vec<Complex<f64>> = x.iter().map(|&v| Complex::new(v, 0.0)).collect();
    fft.process(&mut buf);
    buf
}

// Inverse DFT, normalized by 1/N, keeping the real part only.
// The imaginary residue of real-input round trips is numerical noise.
fn ifft_real_part(mut buf: Vec<Complex<f64>>) -> Vec<f64> {
    let n = buf.len();
    let mut planner = FftPlanner::<f64>::new();
    let ifft = planner.plan_fft_inverse(n);
    ifft.process(&mut buf);
    let scale = 1.0 / n as f64;
    buf.into_iter().map(|c| c.re * scale).collect()
}

/// Circular convolution of a signal with a kernel of the same length,
/// computed as `IFFT(FFT(x) * FFT(kernel))`.
pub fn circular_convolution(x: &[f64], kernel: &[f64]) -> Result<Vec<f64>, FppError> {
    if x.len() != kernel.len() {
        return Err(FppError::LengthMismatch {
            left: x.len(),
            right: kernel.len(),
        });
    }
    if x.is_empty() {
        return Ok(vec![]);
    }

    let fx = fft_real(x);
    let fk = fft_real(kernel);
    let product: Vec<Complex<f64>> = fx.into_iter().zip(fk).map(|(a, b)| a * b).collect();
    Ok(ifft_real_part(product))
}

/// Circular autocorrelation of a signal, normalized by its length.
///
/// # Returns
/// A pair `(autocorr, time_lags)` with `time_lags[i] = i / fs`.
pub fn circular_autocorrelation(signal: &[f64], fs: f64) -> (Vec<f64>, Vec<f64>) {
    let n = signal.len();
    let time_lags = time_axis(n, fs);
    if n == 0 {
        return (vec![], time_lags);
    }

    let f = fft_real(signal);
    let psd: Vec<Complex<f64>> = f.into_iter().map(|c| c * c.conj()).collect();
    let autocorr = ifft_real_part(psd)
        .into_iter()
        .map(|v| v / n as f64)
        .collect();

    (autocorr, time_lags)
}

/// Circular cross-correlation of two signals of equal length, normalized by
/// their length, computed as `IFFT(FFT(x1) * conj(FFT(x2))) / N`.
///
/// # Returns
/// A pair `(cross_corr, time_lags)` with `time_lags[i] = i / fs`.
pub fn circular_crosscorrelation(
    signal1: &[f64],
    signal2: &[f64],
    fs: f64,
) -> Result<(Vec<f64>, Vec<f64>), FppError> {
    let n = signal1.len();
    if signal2.len() != n {
        return Err(FppError::LengthMismatch {
            left: n,
            right: signal2.len(),
        });
    }

    let time_lags = time_axis(n, fs);
    if n == 0 {
        return Ok((vec![], time_lags));
    }

    let f1 = fft_real(signal1);
    let f2 = fft_real(signal2);
    let cross_psd: Vec<Complex<f64>> = f1.into_iter().zip(f2).map(|(a, b)| a * b.conj()).collect();
    let cross_corr = ifft_real_part(cross_psd)
        .into_iter()
        .map(|v| v / n as f64)
        .collect();

    Ok((cross_corr, time_lags))
}

/// Numerical gradient by central differences with one-sided differences at the
/// boundaries, with uniform spacing `dx`.
pub fn gradient(y: &[f64], dx: f64) -> Vec<f64> {
    let n = y.len();
    if n < 2 {
        return vec![0.0; n];
    }

    let mut grad = Vec::with_capacity(n);
    grad.push((y[1] - y[0]) / dx);
    for i in 1..n - 1 {
        grad.push((y[i + 1] - y[i - 1]) / (2.0 * dx));
    }
    grad.push((y[n - 1] - y[n - 2]) / dx);
    grad
}

/// PSI pattern of a signal: the negative time-derivative of its circular
/// autocorrelation. The sampling frequency sets the derivative spacing.
///
/// # Returns
/// A pair `(psi, time_lags)` with `time_lags[i] = i / fs`.
pub fn psi_pattern(signal: &[f64], fs: f64) -> (Vec<f64>, Vec<f64>) {
    let (autocorr, time_lags) = circular_autocorrelation(signal, fs);
    let psi = gradient(&autocorr, 1.0 / fs)
        .into_iter()
        .map(|v| -v)
        .collect();
    (psi, time_lags)
}

/// PSI pattern of a batch of equal-length segments (one curve per segment).
///
/// # Returns
/// A pair `(psi_batch, time_lags)` sharing a single lag axis.
pub fn psi_pattern_batch(segments: &[Vec<f64>], fs: f64) -> Result<(Vec<Vec<f64>>, Vec<f64>), FppError> {
    let n = segments.first().map_or(0, |s| s.len());
    for segment in segments {
        if segment.len() != n {
            return Err(FppError::LengthMismatch {
                left: n,
                right: segment.len(),
            });
        }
    }

    let time_lags = time_axis(n, fs);
    let psi_batch = segments
        .iter()
        .map(|segment| psi_pattern(segment, fs).0)
        .collect();
    Ok((psi_batch, time_lags))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const SEED: u64 = 42;

    #[test]
    fn test_circular_convolution_with_impulse() {
        // Convolving with a shifted impulse rotates the signal
        let x = vec![1.0, 2.0, 3.0, 4.0];
        let mut impulse = vec![0.0; 4];
        impulse[1] = 1.0;

        let y = circular_convolution(&x, &impulse).unwrap();
        let expected = [4.0, 1.0, 2.0, 3.0];
        for (a, b) in y.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-10);
        }
    }

    #[test]
    fn test_circular_convolution_length_mismatch() {
        let x = vec![1.0, 2.0, 3.0];
        let k = vec![1.0, 2.0];
        assert_eq!(
            circular_convolution(&x, &k),
            Err(FppError::LengthMismatch { left: 3, right: 2 })
        );
    }

    #[test]
    fn test_autocorrelation_symmetry() {
        let mut rng = StdRng::seed_from_u64(SEED);
        let signal: Vec<f64> = (0..64).map(|_| rng.gen_range(-1.0..1.0)).collect();

        let (autocorr, time_lags) = circular_autocorrelation(&signal, 64.0);
        assert_eq!(autocorr.len(), 64);
        assert!((time_lags[1] - 1.0 / 64.0).abs() < 1e-12);

        // Even about lag zero modulo wraparound
        for k in 1..64 {
            assert!((autocorr[k] - autocorr[64 - k]).abs() < 1e-10);
        }

        // Zero lag equals the mean square of the signal
        let power = signal.iter().map(|v| v * v).sum::<f64>() / 64.0;
        assert!((autocorr[0] - power).abs() < 1e-10);
    }

    #[test]
    fn test_crosscorrelation_of_signal_with_itself() {
        let mut rng = StdRng::seed_from_u64(SEED);
        let signal: Vec<f64> = (0..128).map(|_| rng.gen_range(-1.0..1.0)).collect();

        let (autocorr, _) = circular_autocorrelation(&signal, 1000.0);
        let (cross_corr, _) = circular_crosscorrelation(&signal, &signal, 1000.0).unwrap();

        for (a, b) in autocorr.iter().zip(cross_corr.iter()) {
            assert!((a - b).abs() < 1e-10);
        }
    }

    #[test]
    fn test_crosscorrelation_length_mismatch() {
        let x1 = vec![1.0, 2.0, 3.0];
        let x2 = vec![1.0, 2.0];
        assert_eq!(
            circular_crosscorrelation(&x1, &x2, 1.0),
            Err(FppError::LengthMismatch { left: 3, right: 2 })
        );
    }

    #[test]
    fn test_gradient_of_linear_ramp() {
        let y: Vec<f64> = (0..10).map(|i| 3.0 * i as f64).collect();
        let grad = gradient(&y, 0.5);
        for g in grad {
            assert!((g - 6.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_psi_pattern_batch_matches_single() {
        let mut rng = StdRng::seed_from_u64(SEED);
        let segments: Vec<Vec<f64>> = (0..3)
            .map(|_| (0..32).map(|_| rng.gen_range(-1.0..1.0)).collect())
            .collect();

        let (batch, time_lags) = psi_pattern_batch(&segments, 32.0).unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(time_lags.len(), 32);

        for (segment, psi_from_batch) in segments.iter().zip(batch.iter()) {
            let (psi, _) = psi_pattern(segment, 32.0);
            for (a, b) in psi.iter().zip(psi_from_batch.iter()) {
                assert!((a - b).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_psi_pattern_batch_length_mismatch() {
        let segments = vec![vec![0.0; 8], vec![0.0; 7]];
        assert!(psi_pattern_batch(&segments, 8.0).is_err());
    }
}

//! Multitaper power spectral density estimation.
//!
//! The estimator contract takes a batch of equal-length real segments and
//! returns a one-sided frequency axis together with one spectrum per segment.
//! The provided implementation uses Riedel-Sidorenko sine tapers, an
//! orthonormal taper family whose resolution is set by the time-bandwidth
//! product NW, with `2 * NW - 1` tapers.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use crate::error::FppError;

/// Per-segment power spectral density estimation over a batch of equal-length
/// real segments.
pub trait SpectralEstimator {
    /// Estimates one spectrum per segment.
    ///
    /// # Returns
    /// A pair `(freqs, psd_batch)` where `psd_batch[k]` is the one-sided
    /// spectrum of segment `k`, aligned with `freqs`.
    fn estimate(
        &self,
        segments: &[Vec<f64>],
        fs: f64,
    ) -> Result<(Vec<f64>, Vec<Vec<f64>>), FppError>;
}

/// Sine-taper multitaper spectral estimator.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct SineMultitaper {
    nw: f64,
}

impl SineMultitaper {
    /// Creates an estimator with the given time-bandwidth product.
    /// NW must be at least 1, which yields at least one taper.
    pub fn new(nw: f64) -> Result<Self, FppError> {
        if !(nw >= 1.0) {
            return Err(FppError::InvalidParameter(format!(
                "time-bandwidth product must be at least 1, got {}",
                nw
            )));
        }
        Ok(SineMultitaper { nw })
    }

    /// Returns the time-bandwidth product.
    pub fn nw(&self) -> f64 {
        self.nw
    }

    /// The number of tapers, `round(2 * NW) - 1`.
    pub fn num_tapers(&self) -> usize {
        ((2.0 * self.nw).round() as usize).saturating_sub(1).max(1)
    }

    // The k-th orthonormal sine taper of length n (k starting at zero):
    // taper[i] = sqrt(2 / (n + 1)) * sin(pi * (k + 1) * (i + 1) / (n + 1))
    fn taper(&self, k: usize, n: usize) -> Vec<f64> {
        let norm = (2.0 / (n as f64 + 1.0)).sqrt();
        (0..n)
            .map(|i| {
                let phase =
                    std::f64::consts::PI * (k as f64 + 1.0) * (i as f64 + 1.0) / (n as f64 + 1.0);
                norm * phase.sin()
            })
            .collect()
    }
}

impl SpectralEstimator for SineMultitaper {
    fn estimate(
        &self,
        segments: &[Vec<f64>],
        fs: f64,
    ) -> Result<(Vec<f64>, Vec<Vec<f64>>), FppError> {
        if !(fs > 0.0) {
            return Err(FppError::InvalidParameter(format!(
                "sampling frequency must be positive, got {}",
                fs
            )));
        }
        let n = match segments.first() {
            Some(segment) if !segment.is_empty() => segment.len(),
            _ => {
                return Err(FppError::InvalidParameter(
                    "spectral estimation requires at least one non-empty segment".to_string(),
                ))
            }
        };
        for segment in segments {
            if segment.len() != n {
                return Err(FppError::LengthMismatch {
                    left: n,
                    right: segment.len(),
                });
            }
        }

        let n_freq = n / 2 + 1;
        let freqs: Vec<f64> = (0..n_freq).map(|k| k as f64 * fs / n as f64).collect();

        let num_tapers = self.num_tapers();
        let tapers: Vec<Vec<f64>> = (0..num_tapers).map(|k| self.taper(k, n)).collect();

        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(n);

        let mut psd_batch = Vec::with_capacity(segments.len());
        for segment in segments {
            let mut psd = vec![0.0; n_freq];
            for taper in &tapers {
                let mut buf: Vec<Complex<f64>> = segment
                    .iter()
                    .zip(taper.iter())
                    .map(|(&x, &w)| Complex::new(x * w, 0.0))
                    .collect();
                fft.process(&mut buf);

                // One-sided eigenspectrum; the tapers are orthonormal, so the
                // window power normalization is unity.
                for (j, value) in psd.iter_mut().enumerate() {
                    let mut p = buf[j].norm_sqr() / fs;
                    if j != 0 && !(n % 2 == 0 && j == n / 2) {
                        p *= 2.0;
                    }
                    *value += p;
                }
            }
            for value in psd.iter_mut() {
                *value /= num_tapers as f64;
            }
            psd_batch.push(psd);
        }

        Ok((freqs, psd_batch))
    }
}

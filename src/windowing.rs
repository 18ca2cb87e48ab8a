//! Windowed averaging framework.
//!
//! A signal is split into overlapping fixed-length segments, a reducer is
//! applied per segment (multitaper PSD or PSI pattern), and the per-segment
//! curves are averaged elementwise into a single curve with a shared axis.

use crate::error::FppError;
use crate::fourier::psi_pattern_batch;
use crate::spectrum::SpectralEstimator;

/// Fixed-stride segmentation of a signal into overlapping windows.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Segmentation {
    /// The number of samples per window.
    pub n_window: usize,
    /// The number of overlapping samples between consecutive windows.
    pub n_overlap: usize,
    /// The stride between window starts, `n_window - n_overlap`.
    pub step: usize,
}

impl Segmentation {
    /// Builds a segmentation from durations in seconds.
    /// The stride must be at least one sample, i.e., the overlap must be
    /// strictly shorter than the window.
    pub fn build(fs: f64, window_sec: f64, overlap_sec: f64) -> Result<Self, FppError> {
        if !(fs > 0.0) {
            return Err(FppError::InvalidParameter(format!(
                "sampling frequency must be positive, got {}",
                fs
            )));
        }
        if !(window_sec > 0.0) || overlap_sec < 0.0 {
            return Err(FppError::InvalidWindowing(format!(
                "window must be positive and overlap non-negative, got {} and {}",
                window_sec, overlap_sec
            )));
        }

        let n_window = (window_sec * fs).round() as usize;
        let n_overlap = (overlap_sec * fs).round() as usize;
        if n_window == 0 || n_overlap >= n_window {
            return Err(FppError::InvalidWindowing(format!(
                "stride must be at least one sample, got window {} and overlap {} samples",
                n_window, n_overlap
            )));
        }

        Ok(Segmentation {
            n_window,
            n_overlap,
            step: n_window - n_overlap,
        })
    }

    /// The number of segments produced from a signal of the given length.
    pub fn num_segments(&self, len: usize) -> usize {
        if len < self.n_window {
            0
        } else {
            (len - self.n_window) / self.step + 1
        }
    }

    /// Materializes all segments of the signal, at offsets `0, step, 2*step, ...`
    /// while the full window fits. The signal must hold at least one window.
    pub fn segment(&self, signal: &[f64]) -> Result<Vec<Vec<f64>>, FppError> {
        if signal.len() < self.n_window {
            return Err(FppError::InvalidWindowing(format!(
                "signal of {} samples is shorter than one window of {} samples",
                signal.len(),
                self.n_window
            )));
        }

        let segments = (0..)
            .map(|i| i * self.step)
            .take_while(|start| start + self.n_window <= signal.len())
            .map(|start| signal[start..start + self.n_window].to_vec())
            .collect();
        Ok(segments)
    }
}

// Elementwise average of equal-length curves.
fn average_curves(curves: &[Vec<f64>]) -> Vec<f64> {
    let n = curves.first().map_or(0, |c| c.len());
    let num = curves.len() as f64;
    (0..n)
        .map(|i| curves.iter().map(|c| c[i]).sum::<f64>() / num)
        .collect()
}

/// Computes the PSI pattern of each segment of the signal and averages the
/// per-segment curves.
///
/// # Returns
/// A pair `(avg_psi, time_lags)`, the lag axis being shared by all segments.
pub fn averaged_psi_pattern(
    signal: &[f64],
    fs: f64,
    window_sec: f64,
    overlap_sec: f64,
) -> Result<(Vec<f64>, Vec<f64>), FppError> {
    let segmentation = Segmentation::build(fs, window_sec, overlap_sec)?;
    let segments = segmentation.segment(signal)?;

    let (psi_segments, time_lags) = psi_pattern_batch(&segments, fs)?;
    Ok((average_curves(&psi_segments), time_lags))
}

/// Computes the power spectral density of each segment of the signal with the
/// given estimator and averages the per-segment spectra.
///
/// # Returns
/// A pair `(avg_psd, freqs)`, the frequency axis being shared by all segments.
pub fn averaged_psd<E: SpectralEstimator>(
    signal: &[f64],
    fs: f64,
    window_sec: f64,
    overlap_sec: f64,
    estimator: &E,
) -> Result<(Vec<f64>, Vec<f64>), FppError> {
    let segmentation = Segmentation::build(fs, window_sec, overlap_sec)?;
    let segments = segmentation.segment(signal)?;

    let (freqs, psd_segments) = estimator.estimate(&segments, fs)?;
    Ok((average_curves(&psd_segments), freqs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fourier::psi_pattern;
    use crate::spectrum::SineMultitaper;

    #[test]
    fn test_segmentation_build() {
        let segmentation = Segmentation::build(10000.0, 2.0, 1.0).unwrap();
        assert_eq!(segmentation.n_window, 20000);
        assert_eq!(segmentation.n_overlap, 10000);
        assert_eq!(segmentation.step, 10000);
    }

    #[test]
    fn test_segmentation_invalid() {
        // Overlap as long as the window leaves a zero stride
        assert!(matches!(
            Segmentation::build(1000.0, 1.0, 1.0),
            Err(FppError::InvalidWindowing(_))
        ));
        assert!(Segmentation::build(1000.0, 1.0, 2.0).is_err());
        assert!(Segmentation::build(0.0, 1.0, 0.5).is_err());
        assert!(Segmentation::build(1000.0, 0.0, 0.0).is_err());
    }

    #[test]
    fn test_segmentation_coverage() {
        // A 150 s signal at 10 kHz with 2 s windows and 1 s overlap
        let segmentation = Segmentation::build(10000.0, 2.0, 1.0).unwrap();
        assert_eq!(segmentation.num_segments(1_500_000), 149);
    }

    #[test]
    fn test_segment_contents() {
        let signal: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let segmentation = Segmentation::build(1.0, 4.0, 2.0).unwrap();

        let segments = segmentation.segment(&signal).unwrap();
        assert_eq!(segments.len(), segmentation.num_segments(10));
        assert_eq!(segments.len(), 4);
        assert_eq!(segments[0], vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(segments[1], vec![2.0, 3.0, 4.0, 5.0]);
        assert_eq!(segments[3], vec![6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_segment_too_short() {
        let segmentation = Segmentation::build(1.0, 4.0, 2.0).unwrap();
        assert!(segmentation.segment(&[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_averaged_psi_pattern_single_window() {
        // With exactly one window, averaging is the identity
        let signal: Vec<f64> = (0..64).map(|i| (i as f64 * 0.3).sin()).collect();
        let (avg_psi, time_lags) = averaged_psi_pattern(&signal, 64.0, 1.0, 0.0).unwrap();
        let (psi, _) = psi_pattern(&signal, 64.0);

        assert_eq!(time_lags.len(), 64);
        for (a, b) in avg_psi.iter().zip(psi.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_averaged_psd_shape() {
        let fs = 256.0;
        let signal: Vec<f64> = (0..1024)
            .map(|i| (2.0 * std::f64::consts::PI * 32.0 * i as f64 / fs).sin())
            .collect();

        let estimator = SineMultitaper::new(3.0).unwrap();
        let (avg_psd, freqs) = averaged_psd(&signal, fs, 1.0, 0.5, &estimator).unwrap();

        // One-sided spectrum of a 256-sample window
        assert_eq!(freqs.len(), 129);
        assert_eq!(avg_psd.len(), 129);
        assert!((freqs[1] - 1.0).abs() < 1e-12);
    }
}

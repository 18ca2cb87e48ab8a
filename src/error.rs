//! Error module for the FPP balance library.
use std::error::Error;
use std::fmt;

/// Error types for the library.
#[derive(Debug, PartialEq)]
pub enum FppError {
    /// Error for invalid parameters, e.g., a dual-exponential kernel with rise time >= decay time.
    InvalidParameter(String),
    /// Error for a kernel whose length does not match the number of signal bins.
    KernelLengthMismatch { expected: usize, actual: usize },
    /// Error for two signals of different lengths, e.g., in cross-correlation.
    LengthMismatch { left: usize, right: usize },
    /// Error for an invalid segmentation, e.g., an overlap at least as long as the window.
    InvalidWindowing(String),
    /// Error for a PSI curve that never drops below the decay threshold after its peak.
    NoDecayCrossing { threshold: f64, max_val: f64 },
    /// Error for a spectral model fit that cannot be computed, e.g., too few points or divergence.
    SpectralFitFailure(String),
    /// Error for I/O operations.
    IOError(String),
}

impl fmt::Display for FppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FppError::InvalidParameter(e) => write!(f, "Invalid parameters: {}", e),
            FppError::KernelLengthMismatch { expected, actual } => write!(
                f,
                "Kernel length mismatch: expected {} samples, got {}",
                expected, actual
            ),
            FppError::LengthMismatch { left, right } => {
                write!(f, "Signal length mismatch: {} and {}", left, right)
            }
            FppError::InvalidWindowing(e) => write!(f, "Invalid windowing: {}", e),
            FppError::NoDecayCrossing { threshold, max_val } => write!(
                f,
                "No decay crossing found: the PSI curve never drops to {} times its peak value {}",
                threshold, max_val
            ),
            FppError::SpectralFitFailure(e) => write!(f, "Spectral fit failure: {}", e),
            FppError::IOError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl Error for FppError {}

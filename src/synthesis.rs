//! Point-process signal synthesizer.
//!
//! Populations of units firing independently at a fixed rate are binned into
//! spike counts (one binomial draw per time bin) and filtered by a synaptic
//! kernel through exact circular convolution. Every synthesized signal is
//! mean-subtracted.

use itertools::izip;
use rand::Rng;
use rand_distr::{Binomial, Distribution};
use serde::{Deserialize, Serialize};

use crate::error::FppError;
use crate::fourier::circular_convolution;
use crate::kernel::{num_samples, time_axis};

/// Signed weights applied to the excitatory and inhibitory components of a
/// balanced signal, following the usual current-sign convention.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct Weights {
    /// The weight of the excitatory component.
    pub excitatory: f64,
    /// The weight of the inhibitory component.
    pub inhibitory: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Weights {
            excitatory: -1.0,
            inhibitory: 1.0,
        }
    }
}

/// A signal synthesized from a single population.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct FppSignal {
    /// The mean-subtracted signal.
    pub signal: Vec<f64>,
    /// The time axis, shared with the signal.
    pub time: Vec<f64>,
    /// The realized total event rate, in events per second.
    pub event_rate: f64,
}

/// A signal synthesized from an excitatory and an inhibitory population.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct BalancedSignal {
    /// The total signal, i.e., the sum of the weighted components.
    pub total: Vec<f64>,
    /// The weighted excitatory component.
    pub excitatory: Vec<f64>,
    /// The weighted inhibitory component.
    pub inhibitory: Vec<f64>,
    /// The time axis, shared by all three signals.
    pub time: Vec<f64>,
}

// Draw one binomial spike count per time bin.
fn spike_counts<R: Rng>(
    population_size: u64,
    rate: f64,
    fs: f64,
    n_bins: usize,
    rng: &mut R,
) -> Result<Vec<f64>, FppError> {
    let prob_spike = rate / fs;
    if !(0.0..=1.0).contains(&prob_spike) {
        return Err(FppError::InvalidParameter(format!(
            "per-bin spike probability must be in [0, 1], got {} (rate {} at fs {})",
            prob_spike, rate, fs
        )));
    }

    let binomial = Binomial::new(population_size, prob_spike)
        .map_err(|e| FppError::InvalidParameter(e.to_string()))?;
    Ok((0..n_bins).map(|_| binomial.sample(rng) as f64).collect())
}

// Subtract the mean in place.
fn subtract_mean(signal: &mut [f64]) {
    if signal.is_empty() {
        return;
    }
    let mean = signal.iter().sum::<f64>() / signal.len() as f64;
    for v in signal.iter_mut() {
        *v -= mean;
    }
}

// Filter binned spike counts by the kernel and remove the mean.
fn filter_spikes(spikes: &[f64], kernel: &[f64]) -> Result<Vec<f64>, FppError> {
    let mut signal = circular_convolution(spikes, kernel)?;
    subtract_mean(&mut signal);
    Ok(signal)
}

/// Simulates a filtered point process from a single population.
///
/// # Parameters
/// - `kernel`: The synaptic kernel, of length `round(fs * t_sec)`.
/// - `fs`: The sampling frequency in Hz.
/// - `t_sec`: The duration of the signal in seconds.
/// - `population_size`: The number of units in the population.
/// - `rate`: The firing rate of each unit, in Hz.
/// - `rng`: A mutable reference to a random number generator.
///
/// # Returns
/// The mean-subtracted signal, its time axis, and the realized event rate.
pub fn simulate_fpp<R: Rng>(
    kernel: &[f64],
    fs: f64,
    t_sec: f64,
    population_size: u64,
    rate: f64,
    rng: &mut R,
) -> Result<FppSignal, FppError> {
    let n = num_samples(t_sec, fs)?;
    if kernel.len() != n {
        return Err(FppError::KernelLengthMismatch {
            expected: n,
            actual: kernel.len(),
        });
    }

    let spikes = spike_counts(population_size, rate, fs, n, rng)?;
    let event_rate = spikes.iter().sum::<f64>() / t_sec;
    let signal = filter_spikes(&spikes, kernel)?;

    Ok(FppSignal {
        signal,
        time: time_axis(n, fs),
        event_rate,
    })
}

/// Simulates a filtered point process from an excitatory and an inhibitory
/// population, each with its own kernel, population size, and rate.
///
/// The returned components are already weighted; the total signal is their sum.
///
/// # Parameters
/// - `kernel_ex`, `kernel_in`: The synaptic kernels, of length `round(fs * t_sec)`.
/// - `fs`: The sampling frequency in Hz.
/// - `t_sec`: The duration of the signal in seconds.
/// - `n_ex`, `n_in`: The excitatory and inhibitory population sizes.
/// - `rate_ex`, `rate_in`: The per-unit firing rates, in Hz.
/// - `weights`: The signed weights of the two components.
/// - `rng`: A mutable reference to a random number generator.
#[allow(clippy::too_many_arguments)]
pub fn simulate_fpp_balance<R: Rng>(
    kernel_ex: &[f64],
    kernel_in: &[f64],
    fs: f64,
    t_sec: f64,
    n_ex: u64,
    n_in: u64,
    rate_ex: f64,
    rate_in: f64,
    weights: Weights,
    rng: &mut R,
) -> Result<BalancedSignal, FppError> {
    let n = num_samples(t_sec, fs)?;
    if kernel_ex.len() != n {
        return Err(FppError::KernelLengthMismatch {
            expected: n,
            actual: kernel_ex.len(),
        });
    }
    if kernel_in.len() != n {
        return Err(FppError::KernelLengthMismatch {
            expected: n,
            actual: kernel_in.len(),
        });
    }

    let spikes_ex = spike_counts(n_ex, rate_ex, fs, n, rng)?;
    let spikes_in = spike_counts(n_in, rate_in, fs, n, rng)?;

    let signal_ex = filter_spikes(&spikes_ex, kernel_ex)?;
    let signal_in = filter_spikes(&spikes_in, kernel_in)?;

    let excitatory: Vec<f64> = signal_ex.into_iter().map(|v| v * weights.excitatory).collect();
    let inhibitory: Vec<f64> = signal_in.into_iter().map(|v| v * weights.inhibitory).collect();
    let total: Vec<f64> = izip!(&excitatory, &inhibitory).map(|(e, i)| e + i).collect();

    Ok(BalancedSignal {
        total,
        excitatory,
        inhibitory,
        time: time_axis(n, fs),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::alpha_kernel;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SEED: u64 = 42;

    #[test]
    fn test_simulate_fpp_zero_mean() {
        let mut rng = StdRng::seed_from_u64(SEED);
        let fs = 1000.0;
        let (kernel, _) = alpha_kernel(1.0, fs, 5e-3, 1.0, 0.1).unwrap();

        let lfp = simulate_fpp(&kernel, fs, 1.0, 1000, 50.0, &mut rng).unwrap();
        assert_eq!(lfp.signal.len(), 1000);

        let scale = lfp
            .signal
            .iter()
            .fold(0.0_f64, |acc, &v| acc.max(v.abs()))
            .max(1.0);
        let mean = lfp.signal.iter().sum::<f64>() / lfp.signal.len() as f64;
        assert!(mean.abs() / scale < 1e-10);
    }

    #[test]
    fn test_simulate_fpp_event_rate() {
        let mut rng = StdRng::seed_from_u64(SEED);
        let fs = 1000.0;
        let (kernel, _) = alpha_kernel(1.0, fs, 5e-3, 1.0, 0.1).unwrap();

        // Expected total event rate is population_size * rate
        let lfp = simulate_fpp(&kernel, fs, 1.0, 1000, 50.0, &mut rng).unwrap();
        assert!((lfp.event_rate / 50_000.0 - 1.0).abs() < 0.05);
    }

    #[test]
    fn test_simulate_fpp_kernel_length_mismatch() {
        let mut rng = StdRng::seed_from_u64(SEED);
        let (kernel, _) = alpha_kernel(1.0, 1000.0, 5e-3, 1.0, 0.1).unwrap();

        // Kernel sampled at 1 kHz against a 2 kHz signal grid
        assert_eq!(
            simulate_fpp(&kernel, 2000.0, 1.0, 100, 10.0, &mut rng),
            Err(FppError::KernelLengthMismatch {
                expected: 2000,
                actual: 1000
            })
        );
    }

    #[test]
    fn test_simulate_fpp_invalid_rate() {
        let mut rng = StdRng::seed_from_u64(SEED);
        let (kernel, _) = alpha_kernel(1.0, 1000.0, 5e-3, 1.0, 0.1).unwrap();

        // Negative rate and rate exceeding one spike per unit per bin
        assert!(simulate_fpp(&kernel, 1000.0, 1.0, 100, -1.0, &mut rng).is_err());
        assert!(simulate_fpp(&kernel, 1000.0, 1.0, 100, 2000.0, &mut rng).is_err());
    }

    #[test]
    fn test_simulate_fpp_balance_components_sum() {
        let mut rng = StdRng::seed_from_u64(SEED);
        let fs = 1000.0;
        let (kernel_ex, _) = alpha_kernel(1.0, fs, 2e-3, 1.0, 0.1).unwrap();
        let (kernel_in, _) = alpha_kernel(1.0, fs, 10e-3, 1.0, 0.1).unwrap();

        let balanced = simulate_fpp_balance(
            &kernel_ex,
            &kernel_in,
            fs,
            1.0,
            500,
            500,
            50.0,
            50.0,
            Weights::default(),
            &mut rng,
        )
        .unwrap();

        for (t, e, i) in izip!(&balanced.total, &balanced.excitatory, &balanced.inhibitory) {
            assert!((t - (e + i)).abs() < 1e-12);
        }

        // Both components are zero-mean, hence so is the total
        let mean = balanced.total.iter().sum::<f64>() / balanced.total.len() as f64;
        let scale = balanced
            .total
            .iter()
            .fold(0.0_f64, |acc, &v| acc.max(v.abs()))
            .max(1.0);
        assert!(mean.abs() / scale < 1e-10);
    }

    #[test]
    fn test_simulate_fpp_balance_zero_rates() {
        let mut rng = StdRng::seed_from_u64(SEED);
        let fs = 1000.0;
        let (kernel_ex, _) = alpha_kernel(1.0, fs, 2e-3, 1.0, 0.1).unwrap();
        let (kernel_in, _) = alpha_kernel(1.0, fs, 10e-3, 1.0, 0.1).unwrap();

        // No spikes at all: the total signal is identically zero
        let balanced = simulate_fpp_balance(
            &kernel_ex,
            &kernel_in,
            fs,
            1.0,
            100,
            100,
            0.0,
            0.0,
            Weights::default(),
            &mut rng,
        )
        .unwrap();

        assert!(balanced.total.iter().all(|&v| v.abs() < 1e-12));
    }
}

//! Monte Carlo sweep of the excitation/inhibition balance.
//!
//! Each simulation task samples a target EIB log-uniformly, splits a fixed
//! total population accordingly, synthesizes a balanced LFP-like signal, and
//! reduces it to PSI pattern features and aperiodic spectral parameters. Tasks
//! are independent and run on a fixed-size worker pool; the collected records
//! are re-sorted by simulation id before being returned, which downstream
//! consumers rely on.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

use log::{debug, info};
use rand::distributions::{Distribution, Uniform};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::FppError;
use crate::kernel::{dual_exponential, DEFAULT_EFFECTIVE_DURATION};
use crate::pattern::psi_params;
use crate::specfit::{fit_aperiodic, AperiodicMode};
use crate::spectrum::SineMultitaper;
use crate::synthesis::{simulate_fpp_balance, Weights};
use crate::windowing::{averaged_psd, averaged_psi_pattern};
use crate::DECAY_THRESHOLD;

/// The rise and decay time constants of the AMPA-like excitatory kernel, in seconds.
pub const TAU_AMPA: (f64, f64) = (0.2e-3, 2e-3);
/// The rise and decay time constants of the GABA-like inhibitory kernel, in seconds.
pub const TAU_GABA: (f64, f64) = (0.5e-3, 10e-3);

/// The column names of the sweep dataset, in row order.
pub const COLUMNS: [&str; 14] = [
    "sim_id",
    "n_ex",
    "n_in",
    "eib",
    "psi_duration",
    "psi_rise",
    "psi_decay",
    "psi_maxval",
    "offset_linear",
    "exp_linear",
    "offset_dexp",
    "exp_0",
    "knee",
    "exp_1",
];

/// Configuration of an EIB sweep.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// The number of independent simulation tasks.
    pub num_sims: usize,
    /// The sampling frequency in Hz.
    pub fs: f64,
    /// The duration of each simulated signal in seconds.
    pub t_sec: f64,
    /// The total population size, split between excitation and inhibition.
    pub n_total: u64,
    /// The lower bound of the sampled EIB range.
    pub min_eib: f64,
    /// The upper bound of the sampled EIB range.
    pub max_eib: f64,
    /// The per-unit excitatory firing rate in Hz.
    pub rate_ex: f64,
    /// The per-unit inhibitory firing rate in Hz.
    pub rate_in: f64,
    /// The signed weights of the two signal components.
    pub weights: Weights,
    /// The analysis window length in seconds.
    pub window_sec: f64,
    /// The overlap between consecutive analysis windows in seconds.
    pub overlap_sec: f64,
    /// The time-bandwidth product of the multitaper estimator.
    pub nw: f64,
    /// The frequency range of the fixed-mode aperiodic fit, in Hz.
    pub linear_range: (f64, f64),
    /// The frequency range of the double-exponential aperiodic fit, in Hz.
    pub dexp_range: (f64, f64),
    /// The master seed; each task derives its own independent stream from it.
    pub seed: u64,
    /// The number of worker threads; 0 means one per available CPU.
    pub num_threads: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        SweepConfig {
            num_sims: 2000,
            fs: 10000.0,
            t_sec: 150.0,
            n_total: 10000,
            min_eib: 0.01,
            max_eib: 100.0,
            rate_ex: 50.0,
            rate_in: 50.0,
            weights: Weights::default(),
            window_sec: 2.0,
            overlap_sec: 1.0,
            nw: 3.0,
            linear_range: (40.0, 85.0),
            dexp_range: (1.0, 300.0),
            seed: 42,
            num_threads: 0,
        }
    }
}

/// One row of the sweep dataset.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SimRecord {
    /// The simulation id, unique within a sweep.
    pub sim_id: usize,
    /// The excitatory population size.
    pub n_ex: u64,
    /// The inhibitory population size.
    pub n_in: u64,
    /// The realized excitation/inhibition balance, `n_ex / n_in`.
    pub eib: f64,
    /// The lag of the PSI peak, in seconds.
    pub psi_duration: f64,
    /// The PSI rise time, in seconds.
    pub psi_rise: f64,
    /// The PSI decay time, in seconds.
    pub psi_decay: f64,
    /// The PSI peak value.
    pub psi_maxval: f64,
    /// The offset of the fixed-mode aperiodic fit.
    pub offset_linear: f64,
    /// The exponent of the fixed-mode aperiodic fit.
    pub exp_linear: f64,
    /// The offset of the double-exponential aperiodic fit.
    pub offset_dexp: f64,
    /// The first exponent of the double-exponential aperiodic fit.
    pub exp_0: f64,
    /// The knee of the double-exponential aperiodic fit.
    pub knee: f64,
    /// The second exponent of the double-exponential aperiodic fit.
    pub exp_1: f64,
}

/// Samples a target EIB log-uniformly over `[min_eib, max_eib]`.
pub fn sample_eib<R: Rng>(min_eib: f64, max_eib: f64, rng: &mut R) -> Result<f64, FppError> {
    if !(min_eib > 0.0) || !(max_eib >= min_eib) {
        return Err(FppError::InvalidParameter(format!(
            "EIB range must satisfy 0 < min <= max, got ({}, {})",
            min_eib, max_eib
        )));
    }
    if min_eib == max_eib {
        return Ok(min_eib);
    }

    let log_eib = Uniform::new(min_eib.log10(), max_eib.log10()).sample(rng);
    Ok(10.0_f64.powf(log_eib))
}

/// Splits a total population into excitatory and inhibitory parts whose ratio
/// approximates the target EIB.
///
/// The parts always sum to `n_total` and are each at least 1; the clamping
/// adjusts the opposite part so that the sum is preserved exactly.
pub fn eib_to_populations(target_eib: f64, n_total: u64) -> Result<(u64, u64), FppError> {
    if !(target_eib > 0.0) {
        return Err(FppError::InvalidParameter(format!(
            "target EIB must be positive, got {}",
            target_eib
        )));
    }
    if n_total < 2 {
        return Err(FppError::InvalidParameter(format!(
            "total population must be at least 2, got {}",
            n_total
        )));
    }

    let n_ex = (n_total as f64 * (target_eib / (1.0 + target_eib))) as u64;
    let n_ex = n_ex.clamp(1, n_total - 1);
    Ok((n_ex, n_total - n_ex))
}

// Mix the master seed with the simulation id into an independent per-task stream.
fn task_rng(seed: u64, sim_id: usize) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed ^ (sim_id as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// Runs one simulation task end to end: EIB sampling, signal synthesis, PSI
/// parameterization, and the two aperiodic spectral fits. One pass, no retries;
/// any failure aborts the task without a partial record.
pub fn run_single_sim(
    sim_id: usize,
    kernel_ex: &[f64],
    kernel_in: &[f64],
    config: &SweepConfig,
) -> Result<SimRecord, FppError> {
    let mut rng = task_rng(config.seed, sim_id);

    let target_eib = sample_eib(config.min_eib, config.max_eib, &mut rng)?;
    let (n_ex, n_in) = eib_to_populations(target_eib, config.n_total)?;
    let eib = n_ex as f64 / n_in as f64;

    let lfp = simulate_fpp_balance(
        kernel_ex,
        kernel_in,
        config.fs,
        config.t_sec,
        n_ex,
        n_in,
        config.rate_ex,
        config.rate_in,
        config.weights,
        &mut rng,
    )?;

    let (psi, psi_lags) = averaged_psi_pattern(
        &lfp.total,
        config.fs,
        config.window_sec,
        config.overlap_sec,
    )?;
    let features = psi_params(&psi, &psi_lags, DECAY_THRESHOLD)?;

    let estimator = SineMultitaper::new(config.nw)?;
    let (psd, freqs) = averaged_psd(
        &lfp.total,
        config.fs,
        config.window_sec,
        config.overlap_sec,
        &estimator,
    )?;

    let linear = fit_aperiodic(&psd, &freqs, config.linear_range, AperiodicMode::Fixed)?;
    let dexp = fit_aperiodic(&psd, &freqs, config.dexp_range, AperiodicMode::DoubleExponential)?;

    debug!(
        "simulation {} done (eib {:.4}, psi peak {:.3e})",
        sim_id, eib, features.max_val
    );

    Ok(SimRecord {
        sim_id,
        n_ex,
        n_in,
        eib,
        psi_duration: features.duration,
        psi_rise: features.rise,
        psi_decay: features.decay,
        psi_maxval: features.max_val,
        offset_linear: linear.params[0],
        exp_linear: linear.params[1],
        offset_dexp: dexp.params[0],
        exp_0: dexp.params[1],
        knee: dexp.params[2],
        exp_1: dexp.params[3],
    })
}

/// Runs a full EIB sweep: builds the shared AMPA-like and GABA-like kernels
/// once, fans the tasks out over a dedicated worker pool, and collects the
/// records sorted by simulation id.
///
/// The first task failure aborts the whole sweep; either the complete,
/// correctly ordered dataset is returned or an error is.
pub fn eib_sweep(config: &SweepConfig) -> Result<Vec<SimRecord>, FppError> {
    if config.num_sims == 0 {
        return Err(FppError::InvalidParameter(
            "the sweep needs at least one simulation".to_string(),
        ));
    }

    let (kernel_ex, _) = dual_exponential(
        config.t_sec,
        config.fs,
        TAU_AMPA.0,
        TAU_AMPA.1,
        1.0,
        DEFAULT_EFFECTIVE_DURATION,
    )?;
    let (kernel_in, _) = dual_exponential(
        config.t_sec,
        config.fs,
        TAU_GABA.0,
        TAU_GABA.1,
        1.0,
        DEFAULT_EFFECTIVE_DURATION,
    )?;
    let kernel_ex = Arc::new(kernel_ex);
    let kernel_in = Arc::new(kernel_in);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.num_threads)
        .build()
        .map_err(|e| FppError::InvalidParameter(e.to_string()))?;

    info!(
        "Starting {} simulations on {} workers.",
        config.num_sims,
        pool.current_num_threads()
    );

    let mut records = pool.install(|| {
        (0..config.num_sims)
            .into_par_iter()
            .map(|sim_id| run_single_sim(sim_id, &kernel_ex, &kernel_in, config))
            .collect::<Result<Vec<SimRecord>, FppError>>()
    })?;

    // Completion order is arbitrary; the dataset contract is ascending sim_id
    records.sort_by_key(|record| record.sim_id);
    Ok(records)
}

/// Saves sweep records to a file in JSON format.
pub fn save_records<P: AsRef<Path>>(records: &[SimRecord], path: P) -> Result<(), FppError> {
    let file = File::create(path).map_err(|e| FppError::IOError(e.to_string()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), records)
        .map_err(|e| FppError::IOError(e.to_string()))
}

/// Loads sweep records from a file in JSON format.
pub fn load_records<P: AsRef<Path>>(path: P) -> Result<Vec<SimRecord>, FppError> {
    let file = File::open(path).map_err(|e| FppError::IOError(e.to_string()))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| FppError::IOError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;

    const SEED: u64 = 42;

    #[test]
    fn test_sample_eib_within_bounds() {
        let mut rng = StdRng::seed_from_u64(SEED);
        for _ in 0..1000 {
            let eib = sample_eib(0.01, 100.0, &mut rng).unwrap();
            assert!((0.01..=100.0).contains(&eib));
        }

        assert_eq!(sample_eib(1.0, 1.0, &mut rng).unwrap(), 1.0);
        assert!(sample_eib(0.0, 1.0, &mut rng).is_err());
        assert!(sample_eib(10.0, 1.0, &mut rng).is_err());
    }

    #[test]
    fn test_eib_to_populations_round_trip() {
        let mut rng = StdRng::seed_from_u64(SEED);
        for _ in 0..1000 {
            let target = sample_eib(0.01, 100.0, &mut rng).unwrap();
            let (n_ex, n_in) = eib_to_populations(target, 10000).unwrap();

            assert_eq!(n_ex + n_in, 10000);
            assert!(n_ex >= 1 && n_in >= 1);

            // The realized ratio approximates the target up to integer
            // truncation of the excitatory part
            let n_ex_exact = 10000.0 * target / (1.0 + target);
            assert!((n_ex as f64 - n_ex_exact).abs() <= 1.0);
        }
    }

    #[test]
    fn test_eib_to_populations_clamping() {
        // Extreme ratios are floor-clamped to one unit, preserving the total
        let (n_ex, n_in) = eib_to_populations(1e-9, 10000).unwrap();
        assert_eq!((n_ex, n_in), (1, 9999));

        let (n_ex, n_in) = eib_to_populations(1e9, 10000).unwrap();
        assert_eq!((n_ex, n_in), (9999, 1));

        assert!(eib_to_populations(-1.0, 10000).is_err());
        assert!(eib_to_populations(1.0, 1).is_err());
    }

    #[test]
    fn test_task_rng_streams_are_independent() {
        let mut rng_a = task_rng(SEED, 0);
        let mut rng_b = task_rng(SEED, 1);

        let draws_a: Vec<u64> = (0..16).map(|_| rng_a.gen()).collect();
        let draws_b: Vec<u64> = (0..16).map(|_| rng_b.gen()).collect();
        assert_ne!(draws_a, draws_b);

        // Re-deriving the same task stream reproduces the draws
        let mut rng_c = task_rng(SEED, 0);
        let draws_c: Vec<u64> = (0..16).map(|_| rng_c.gen()).collect();
        assert_eq!(draws_a, draws_c);
    }

    #[test]
    fn test_save_and_load_records() {
        let records = vec![SimRecord {
            sim_id: 0,
            n_ex: 5000,
            n_in: 5000,
            eib: 1.0,
            psi_duration: 0.001,
            psi_rise: 0.001,
            psi_decay: 0.005,
            psi_maxval: 2.5,
            offset_linear: 1.0,
            exp_linear: 2.0,
            offset_dexp: 1.1,
            exp_0: 0.5,
            knee: 100.0,
            exp_1: 1.5,
        }];

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");

        save_records(&records, &path).unwrap();
        let loaded = load_records(&path).unwrap();
        assert_eq!(records, loaded);
    }

    #[test]
    fn test_columns_match_record_fields() {
        let record = SimRecord {
            sim_id: 3,
            n_ex: 1,
            n_in: 2,
            eib: 0.5,
            psi_duration: 0.0,
            psi_rise: 0.0,
            psi_decay: 0.0,
            psi_maxval: 0.0,
            offset_linear: 0.0,
            exp_linear: 0.0,
            offset_dexp: 0.0,
            exp_0: 0.0,
            knee: 0.0,
            exp_1: 0.0,
        };

        let value = serde_json::to_value(&record).unwrap();
        let fields = value.as_object().unwrap();
        assert_eq!(fields.len(), COLUMNS.len());
        for column in COLUMNS {
            assert!(fields.contains_key(column), "missing column {}", column);
        }
    }
}

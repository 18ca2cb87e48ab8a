//! This crate provides tools for simulating and characterizing LFP-like signals
//! generated by filtered point processes (FPP) with excitatory and inhibitory
//! populations.
//!
//! # Generating a Signal
//!
//! ```rust
//! use fpp_balance::kernel::alpha_kernel;
//! use fpp_balance::synthesis::simulate_fpp;
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//!
//! // Set the random number generator seed
//! let mut rng = StdRng::seed_from_u64(42);
//!
//! // A 1 s alpha-function synaptic kernel sampled at 1 kHz
//! let fs = 1000.0;
//! let (kernel, _) = alpha_kernel(1.0, fs, 5e-3, 1.0, 0.1).unwrap();
//!
//! // Population of 100 units firing at 20 Hz, filtered by the kernel
//! let lfp = simulate_fpp(&kernel, fs, 1.0, 100, 20.0, &mut rng).unwrap();
//! assert_eq!(lfp.signal.len(), 1000);
//! ```
//!
//! # Sweeping the Excitation/Inhibition Balance
//!
//! ```rust,no_run
//! use fpp_balance::sweep::{eib_sweep, SweepConfig};
//!
//! let config = SweepConfig {
//!     num_sims: 16,
//!     ..SweepConfig::default()
//! };
//!
//! // One record per simulation, sorted by simulation id
//! let records = eib_sweep(&config).unwrap();
//! assert_eq!(records.len(), 16);
//! ```

pub mod error;
pub mod fourier;
pub mod kernel;
pub mod pattern;
pub mod specfit;
pub mod spectrum;
pub mod sweep;
pub mod synthesis;
pub mod windowing;

/// The fraction of the PSI peak value at which the decay time is measured.
pub const DECAY_THRESHOLD: f64 = 0.15;

//! # specparam-rs
//!
//! `specparam-rs` parameterizes neural power spectra into an aperiodic
//! background and a set of Gaussian peaks, in log10 power.
//!
//! The library provides:
//! - A single-spectrum fitter with a robust background estimate, iterative
//!   peak detection and a joint multi-Gaussian refit
//! - A group fitter that runs it over many spectra, sequentially or with rayon
//! - An append-only JSON-lines sink for results that tolerates truncation
//! - A bounded Levenberg-Marquardt solver used internally for every fit
//! - Synthetic spectrum generation for testing and simulation
//!
//! ## Basic Usage
//!
//! ```
//! use rand::SeedableRng;
//! use specparam_rs::synth::{gen_freqs, gen_power_spectrum};
//! use specparam_rs::{BackgroundParams, FitSettings, PeakParams, SpectrumFitter};
//!
//! let freqs = gen_freqs((3.0, 40.0), 0.5).unwrap();
//! let background = BackgroundParams::Fixed { offset: 1.0, slope: 1.5 };
//! let peaks = [PeakParams { center: 10.0, amplitude: 0.6, width: 1.5 }];
//! let mut rng = rand::rngs::StdRng::seed_from_u64(0);
//! let power = gen_power_spectrum(&freqs, &background, &peaks, 0.0, &mut rng).unwrap();
//!
//! let settings = FitSettings::default().with_min_peak_height(0.1);
//! let mut fitter = SpectrumFitter::new(settings).unwrap();
//! let results = fitter.fit(freqs.view(), power.view(), None).unwrap();
//!
//! assert_eq!(results.peaks.len(), 1);
//! assert!((results.background.slope() - 1.5).abs() < 0.05);
//! ```

// Public modules
pub mod error;

// Least-squares solver
pub mod lm;
pub mod model;
pub mod parameters;
pub mod problem;
pub mod utils;

// Spectral parameterization
pub mod fit;
pub mod group;
pub mod models;
pub mod results;
pub mod settings;
pub mod sink;
pub mod spectrum;
pub mod synth;

// Re-exports for convenience
pub use error::{FitStage, Result, SpecParamError};
pub use fit::{FitState, SpectrumFitter};
pub use group::{DataField, GroupData, GroupFitter, GroupSummary};
pub use lm::{LevenbergMarquardt, LmConfig};
pub use problem::Problem;
pub use results::{BackgroundParams, FitResults, PeakParams};
pub use settings::{BackgroundGuess, BackgroundMode, FitSettings};
pub use sink::{load_results, load_results_file, ResultsWriter, SinkRecord};
pub use spectrum::Spectrum;
pub use utils::Summary;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

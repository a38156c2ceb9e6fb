//! Shared helpers for the integration tests.

#![allow(dead_code)]

use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use specparam_rs::synth::{gen_freqs, gen_group_power_spectra, gen_power_spectrum};
use specparam_rs::{BackgroundParams, FitSettings, PeakParams};

/// Install a test logger once; later calls are no-ops.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

pub fn peak(center: f64, amplitude: f64, width: f64) -> PeakParams {
    PeakParams {
        center,
        amplitude,
        width,
    }
}

pub fn fixed(offset: f64, slope: f64) -> BackgroundParams {
    BackgroundParams::Fixed { offset, slope }
}

/// Settings used by most scenario tests: absolute height floor keeps
/// numerical ripple in noise-free residuals from being read as peaks.
pub fn settings() -> FitSettings {
    FitSettings::default().with_min_peak_height(0.1)
}

/// 3-40 Hz at 0.25 Hz resolution.
pub fn freqs() -> Array1<f64> {
    gen_freqs((3.0, 40.0), 0.25).expect("valid frequency grid")
}

pub fn spectrum(background: &BackgroundParams, peaks: &[PeakParams], noise: f64, seed: u64) -> Array1<f64> {
    gen_power_spectrum(&freqs(), background, peaks, noise, &mut rng(seed)).expect("valid spectrum")
}

pub fn group(
    n_spectra: usize,
    background: &BackgroundParams,
    peaks: &[PeakParams],
    noise: f64,
    seed: u64,
) -> Array2<f64> {
    gen_group_power_spectra(n_spectra, &freqs(), background, peaks, noise, &mut rng(seed))
        .expect("valid spectra")
}

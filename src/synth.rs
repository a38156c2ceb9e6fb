//! Synthetic power spectra.
//!
//! Spectra are built in log10 space as background plus Gaussian peaks plus
//! optional white noise, then returned as linear power.

use ndarray::{Array1, Array2};
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::{Result, SpecParamError};
use crate::model::CurveModel;
use crate::models::{gaussian_sum, BackgroundModel};
use crate::results::{BackgroundParams, PeakParams};

/// Evenly spaced frequencies from `freq_range.0` to `freq_range.1` inclusive.
pub fn gen_freqs(freq_range: (f64, f64), freq_res: f64) -> Result<Array1<f64>> {
    let (lo, hi) = freq_range;
    if !(lo.is_finite() && hi.is_finite()) || lo >= hi {
        return Err(SpecParamError::InvalidInput(format!(
            "invalid frequency range ({}, {})",
            lo, hi
        )));
    }
    if !(freq_res > 0.0) || !freq_res.is_finite() {
        return Err(SpecParamError::InvalidInput(format!(
            "frequency resolution must be positive, got {}",
            freq_res
        )));
    }

    // Tolerate rounding so that e.g. (1, 50) at 0.1 Hz includes 50.
    let n = ((hi - lo) / freq_res + 1e-9).floor() as usize + 1;
    Ok(Array1::from_shape_fn(n, |i| lo + i as f64 * freq_res))
}

/// Linear power spectrum with the given components.
///
/// `noise` is the standard deviation of Gaussian noise added in log10 space;
/// zero gives an exact spectrum.
pub fn gen_power_spectrum<R: Rng + ?Sized>(
    freqs: &Array1<f64>,
    background: &BackgroundParams,
    peaks: &[PeakParams],
    noise: f64,
    rng: &mut R,
) -> Result<Array1<f64>> {
    let log_power = clean_log_spectrum(freqs, background, peaks)?;
    let noisy = add_noise(log_power, noise, rng)?;
    Ok(noisy.mapv(|v| 10f64.powf(v)))
}

/// `n_spectra` independent noisy draws of the same spectrum, one per row.
pub fn gen_group_power_spectra<R: Rng + ?Sized>(
    n_spectra: usize,
    freqs: &Array1<f64>,
    background: &BackgroundParams,
    peaks: &[PeakParams],
    noise: f64,
    rng: &mut R,
) -> Result<Array2<f64>> {
    let clean = clean_log_spectrum(freqs, background, peaks)?;
    let mut spectra = Array2::zeros((n_spectra, freqs.len()));

    for mut row in spectra.rows_mut() {
        let noisy = add_noise(clean.clone(), noise, rng)?;
        row.assign(&noisy.mapv(|v| 10f64.powf(v)));
    }
    Ok(spectra)
}

fn clean_log_spectrum(
    freqs: &Array1<f64>,
    background: &BackgroundParams,
    peaks: &[PeakParams],
) -> Result<Array1<f64>> {
    let model = BackgroundModel::new(background.mode());
    let peak_values: Vec<f64> = peaks.iter().flat_map(|p| p.as_array()).collect();
    Ok(model.eval(freqs, &background.as_array())? + gaussian_sum(freqs, &peak_values)?)
}

fn add_noise<R: Rng + ?Sized>(mut values: Array1<f64>, noise: f64, rng: &mut R) -> Result<Array1<f64>> {
    if !noise.is_finite() || noise < 0.0 {
        return Err(SpecParamError::InvalidInput(format!(
            "noise level must be finite and non-negative, got {}",
            noise
        )));
    }
    if noise == 0.0 {
        return Ok(values);
    }

    let normal = Normal::new(0.0, noise)
        .map_err(|e| SpecParamError::InvalidInput(format!("invalid noise level {}: {}", noise, e)))?;
    values.mapv_inplace(|v| v + normal.sample(rng));
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn background() -> BackgroundParams {
        BackgroundParams::Fixed {
            offset: 1.0,
            slope: 1.0,
        }
    }

    #[test]
    fn test_gen_freqs_inclusive() {
        let freqs = gen_freqs((1.0, 50.0), 0.5).unwrap();
        assert_eq!(freqs.len(), 99);
        assert_relative_eq!(freqs[freqs.len() - 1], 50.0);

        let fine = gen_freqs((1.0, 50.0), 0.1).unwrap();
        assert_eq!(fine.len(), 491);

        assert!(gen_freqs((5.0, 1.0), 0.5).is_err());
        assert!(gen_freqs((1.0, 5.0), 0.0).is_err());
    }

    #[test]
    fn test_noise_free_spectrum() {
        let freqs = gen_freqs((1.0, 100.0), 1.0).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let power = gen_power_spectrum(&freqs, &background(), &[], 0.0, &mut rng).unwrap();

        // 10^(1 - log10 f) = 10 / f
        assert_relative_eq!(power[0], 10.0, epsilon = 1e-9);
        assert_relative_eq!(power[9], 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_seeded_noise_is_reproducible() {
        let freqs = gen_freqs((1.0, 30.0), 0.5).unwrap();
        let peaks = [PeakParams {
            center: 10.0,
            amplitude: 0.5,
            width: 1.0,
        }];

        let a = gen_group_power_spectra(
            3,
            &freqs,
            &background(),
            &peaks,
            0.01,
            &mut ChaCha8Rng::seed_from_u64(7),
        )
        .unwrap();
        let b = gen_group_power_spectra(
            3,
            &freqs,
            &background(),
            &peaks,
            0.01,
            &mut ChaCha8Rng::seed_from_u64(7),
        )
        .unwrap();

        assert_eq!(a.shape(), &[3, freqs.len()]);
        assert_eq!(a, b);
        assert_ne!(a.row(0), a.row(1));
    }

    #[test]
    fn test_negative_noise_rejected() {
        let freqs = gen_freqs((1.0, 10.0), 1.0).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(gen_power_spectrum(&freqs, &background(), &[], -0.1, &mut rng).is_err());
    }
}

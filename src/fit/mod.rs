//! Single-spectrum fitting.
//!
//! [`SpectrumFitter`] runs the parameterization pipeline on one spectrum:
//!
//! 1. robust background fit on log power,
//! 2. peak candidate detection on the flattened spectrum,
//! 3. edge and overlap filtering of the candidates,
//! 4. joint multi-Gaussian refit,
//! 5. background refit on the peak-removed spectrum.
//!
//! [`SpectrumFitter::fit_spectrum`] is the pure core and performs no state
//! mutation; [`SpectrumFitter::fit`] wraps it with the fit state machine.

use ndarray::{Array1, ArrayView1};

use crate::error::{FitStage, Result, SpecParamError};
use crate::models::{gaussian_sum, BackgroundModel};
use crate::model::CurveModel;
use crate::results::{BackgroundParams, FitResults};
use crate::settings::FitSettings;
use crate::spectrum::Spectrum;
use crate::utils::{mean_absolute, r_squared};

mod background;
mod peaks;

/// Lifecycle of a [`SpectrumFitter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitState {
    /// No input has been provided yet.
    Uninitialized,
    /// Input validated, fit not started.
    FreqsSet,
    /// Pipeline running.
    Fitting,
    /// Last fit produced a result.
    Converged,
    /// Last fit failed; no result is available.
    Failed,
}

/// Fits one power spectrum at a time.
#[derive(Debug, Clone)]
pub struct SpectrumFitter {
    settings: FitSettings,
    state: FitState,
    spectrum: Option<Spectrum>,
    results: Option<FitResults>,
}

impl SpectrumFitter {
    /// Create a fitter. Fails with `InvalidSettings` if `settings` do not validate.
    pub fn new(settings: FitSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            state: FitState::Uninitialized,
            spectrum: None,
            results: None,
        })
    }

    pub fn settings(&self) -> &FitSettings {
        &self.settings
    }

    pub fn state(&self) -> FitState {
        self.state
    }

    /// The spectrum of the most recent converged fit.
    pub fn spectrum(&self) -> Option<&Spectrum> {
        self.spectrum.as_ref()
    }

    /// The result of the most recent fit, if it converged.
    pub fn results(&self) -> Option<&FitResults> {
        self.results.as_ref()
    }

    /// Validate the input and fit it, replacing any previous result.
    ///
    /// # Arguments
    ///
    /// * `freqs` - Frequencies in Hz, strictly increasing
    /// * `power` - Linear power values, strictly positive
    /// * `freq_range` - Optional inclusive range to fit
    pub fn fit(
        &mut self,
        freqs: ArrayView1<f64>,
        power: ArrayView1<f64>,
        freq_range: Option<(f64, f64)>,
    ) -> Result<&FitResults> {
        self.results = None;
        self.spectrum = None;
        self.state = FitState::Uninitialized;

        let spectrum = match Spectrum::new(freqs, power, freq_range) {
            Ok(spectrum) => spectrum,
            Err(err) => {
                self.state = FitState::Failed;
                return Err(err);
            }
        };
        self.state = FitState::FreqsSet;

        if let Err(err) = self.check_size(&spectrum) {
            self.state = FitState::Failed;
            return Err(err);
        }

        self.state = FitState::Fitting;
        match self.fit_spectrum(&spectrum) {
            Ok(results) => {
                self.state = FitState::Converged;
                self.spectrum = Some(spectrum);
                Ok(self.results.insert(results))
            }
            Err(err) => {
                self.state = FitState::Failed;
                Err(err)
            }
        }
    }

    /// Full model of the last converged fit in log10 power.
    pub fn model(&self) -> Result<Array1<f64>> {
        match (&self.results, &self.spectrum) {
            (Some(results), Some(spectrum)) => results.model(spectrum.freqs()),
            _ => Err(SpecParamError::InvalidState(
                "no converged fit available".to_string(),
            )),
        }
    }

    fn check_size(&self, spectrum: &Spectrum) -> Result<()> {
        let settings = &self.settings;
        if spectrum.len() < settings.min_spectrum_len() {
            return Err(SpecParamError::InvalidInput(format!(
                "{} samples cannot support {} peaks and {} background parameters (need {})",
                spectrum.len(),
                settings.max_n_peaks,
                settings.n_background_params(),
                settings.min_spectrum_len()
            )));
        }
        Ok(())
    }

    /// Run the pipeline on a validated spectrum without touching fitter state.
    pub fn fit_spectrum(&self, spectrum: &Spectrum) -> Result<FitResults> {
        self.check_size(spectrum)?;
        let settings = &self.settings;

        let freqs = spectrum.freqs();
        let log_power = spectrum.log_power();
        let model = BackgroundModel::new(settings.background_mode);

        let initial = background::robust_background_fit(spectrum, settings)?;
        let flat = log_power - &model.eval(freqs, &initial)?;
        log::debug!("Initial background: {:?}", initial.to_vec());

        let candidates = peaks::detect_candidates(freqs, &flat, spectrum.freq_res(), settings)?;
        let detected = candidates.len();
        let candidates =
            peaks::drop_edge_candidates(candidates, spectrum.freq_range(), settings.edge_threshold);
        let candidates = peaks::drop_overlapping_candidates(candidates, settings.min_peak_separation);
        log::debug!(
            "Detected {} peak candidates, {} after edge and overlap filtering",
            detected,
            candidates.len()
        );

        let peaks = peaks::fit_peaks(freqs, &flat, &candidates, spectrum.freq_range(), settings)?;
        let peak_values: Vec<f64> = peaks.iter().flat_map(|p| p.as_array()).collect();
        let peak_curve = gaussian_sum(freqs, &peak_values)?;

        let peak_removed = log_power - &peak_curve;
        let final_params =
            background::fit_background(&model, freqs, &peak_removed, initial, &settings.solver)
                .map_err(|e| e.at_stage(FitStage::FinalBackground))?;

        let fitted = model.eval(freqs, &final_params)? + &peak_curve;
        let residual = log_power - &fitted;
        let error = mean_absolute(&residual);
        let r_squared = r_squared(&residual, log_power);

        let background =
            BackgroundParams::from_slice(settings.background_mode, &final_params.to_vec());
        log::debug!(
            "Fit converged: {} peaks, error {:.4}, r^2 {:.4}",
            peaks.len(),
            error,
            r_squared
        );

        Ok(FitResults {
            background,
            peaks,
            error,
            r_squared,
        })
    }
}

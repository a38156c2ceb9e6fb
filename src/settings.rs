//! Fitter configuration.
//!
//! [`FitSettings`] is plain data with serde support so it can be stored next
//! to results or loaded from JSON. Every constructor path goes through
//! [`FitSettings::validate`].

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpecParamError};
use crate::lm::LmConfig;

/// Functional form of the aperiodic background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundMode {
    /// `offset - slope * log10(f)`
    #[default]
    Fixed,
    /// `offset - log10(knee + f^slope)`
    Knee,
}

impl BackgroundMode {
    /// Number of background parameters for this mode.
    pub fn n_params(&self) -> usize {
        match self {
            BackgroundMode::Fixed => 2,
            BackgroundMode::Knee => 3,
        }
    }
}

/// Starting values for the initial background fit.
///
/// `None` means "estimate from the data": the offset becomes the log power at
/// the lowest frequency and the slope the absolute log-log slope across the
/// spectrum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundGuess {
    pub offset: Option<f64>,
    pub knee: f64,
    pub slope: Option<f64>,
}

impl Default for BackgroundGuess {
    fn default() -> Self {
        Self {
            offset: None,
            knee: 0.0,
            slope: None,
        }
    }
}

/// Settings for a spectral parameterization fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitSettings {
    /// Background functional form. Default: `Fixed`
    pub background_mode: BackgroundMode,

    /// Maximum number of peaks to fit. Default: 6
    pub max_n_peaks: usize,

    /// Lower and upper bound on peak width (Gaussian std, Hz). Default: (0.25, 6.0)
    pub peak_width_limits: (f64, f64),

    /// Absolute threshold on peak height above the background, log10 power. Default: 0.0
    pub min_peak_height: f64,

    /// Relative threshold in units of the flattened spectrum's std. Default: 2.0
    pub peak_threshold: f64,

    /// Minimum distance between candidate peaks, in peak widths. Default: 0.75
    pub min_peak_separation: f64,

    /// Minimum distance of a candidate from the range edges, in peak widths. Default: 1.0
    pub edge_threshold: f64,

    /// How far a center may move during the joint refit, in peak widths. Default: 1.5
    pub center_bound: f64,

    /// Percentile of the flattened spectrum kept for the robust background fit. Default: 2.5
    pub background_percentile: f64,

    /// Initial guesses for the background fit.
    pub background_guess: BackgroundGuess,

    /// Solver budget and tolerances.
    pub solver: LmConfig,
}

impl Default for FitSettings {
    fn default() -> Self {
        Self {
            background_mode: BackgroundMode::Fixed,
            max_n_peaks: 6,
            peak_width_limits: (0.25, 6.0),
            min_peak_height: 0.0,
            peak_threshold: 2.0,
            min_peak_separation: 0.75,
            edge_threshold: 1.0,
            center_bound: 1.5,
            background_percentile: 2.5,
            background_guess: BackgroundGuess::default(),
            solver: LmConfig::default(),
        }
    }
}

impl FitSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_background_mode(mut self, mode: BackgroundMode) -> Self {
        self.background_mode = mode;
        self
    }

    pub fn with_max_n_peaks(mut self, max_n_peaks: usize) -> Self {
        self.max_n_peaks = max_n_peaks;
        self
    }

    pub fn with_peak_width_limits(mut self, min: f64, max: f64) -> Self {
        self.peak_width_limits = (min, max);
        self
    }

    pub fn with_min_peak_height(mut self, height: f64) -> Self {
        self.min_peak_height = height;
        self
    }

    pub fn with_peak_threshold(mut self, threshold: f64) -> Self {
        self.peak_threshold = threshold;
        self
    }

    pub fn with_min_peak_separation(mut self, separation: f64) -> Self {
        self.min_peak_separation = separation;
        self
    }

    pub fn with_edge_threshold(mut self, threshold: f64) -> Self {
        self.edge_threshold = threshold;
        self
    }

    pub fn with_background_guess(mut self, guess: BackgroundGuess) -> Self {
        self.background_guess = guess;
        self
    }

    pub fn with_solver(mut self, solver: LmConfig) -> Self {
        self.solver = solver;
        self
    }

    /// Number of background parameters implied by the mode.
    pub fn n_background_params(&self) -> usize {
        self.background_mode.n_params()
    }

    /// Smallest spectrum length that can be fit with these settings.
    pub fn min_spectrum_len(&self) -> usize {
        3 * self.max_n_peaks + self.n_background_params()
    }

    /// Reject settings the fitter cannot work with.
    pub fn validate(&self) -> Result<()> {
        let (min_width, max_width) = self.peak_width_limits;
        if !(min_width > 0.0) || !min_width.is_finite() {
            return Err(invalid(format!(
                "minimum peak width must be positive and finite, got {}",
                min_width
            )));
        }
        if !(max_width >= min_width) || !max_width.is_finite() {
            return Err(invalid(format!(
                "maximum peak width {} must be finite and at least the minimum {}",
                max_width, min_width
            )));
        }

        for (name, value) in [
            ("min_peak_height", self.min_peak_height),
            ("peak_threshold", self.peak_threshold),
            ("min_peak_separation", self.min_peak_separation),
            ("edge_threshold", self.edge_threshold),
            ("center_bound", self.center_bound),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(format!(
                    "{} must be finite and non-negative, got {}",
                    name, value
                )));
            }
        }

        if !(self.background_percentile > 0.0 && self.background_percentile <= 100.0) {
            return Err(invalid(format!(
                "background_percentile must be in (0, 100], got {}",
                self.background_percentile
            )));
        }

        let guess = &self.background_guess;
        let guesses = [guess.offset, Some(guess.knee), guess.slope];
        if guesses.iter().flatten().any(|v| !v.is_finite()) {
            return Err(invalid("background guesses must be finite".to_string()));
        }

        self.solver.validate()
    }

    /// Read settings from a JSON reader and validate them.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let settings: Self = serde_json::from_reader(reader)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read settings from a JSON file and validate them.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }
}

fn invalid(message: String) -> SpecParamError {
    SpecParamError::InvalidSettings(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = FitSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.max_n_peaks, 6);
        assert_eq!(settings.peak_width_limits, (0.25, 6.0));
        assert_eq!(settings.min_spectrum_len(), 20);
    }

    #[test]
    fn test_knee_mode_params() {
        let settings = FitSettings::new().with_background_mode(BackgroundMode::Knee);
        assert_eq!(settings.n_background_params(), 3);
        assert_eq!(settings.min_spectrum_len(), 21);
    }

    #[test]
    fn test_invalid_width_limits() {
        for (lo, hi) in [(0.0, 6.0), (-1.0, 6.0), (4.0, 2.0), (0.5, f64::INFINITY)] {
            let settings = FitSettings::new().with_peak_width_limits(lo, hi);
            assert!(
                matches!(settings.validate(), Err(SpecParamError::InvalidSettings(_))),
                "limits ({}, {}) should be rejected",
                lo,
                hi
            );
        }
    }

    #[test]
    fn test_invalid_thresholds() {
        assert!(FitSettings::new().with_peak_threshold(-1.0).validate().is_err());
        assert!(FitSettings::new().with_min_peak_height(f64::NAN).validate().is_err());

        let mut settings = FitSettings::new();
        settings.background_percentile = 0.0;
        assert!(settings.validate().is_err());

        let mut solver = LmConfig::default();
        solver.max_iterations = 0;
        assert!(FitSettings::new().with_solver(solver).validate().is_err());
    }

    #[test]
    fn test_json_round_trip_and_partial_input() {
        let json = r#"{ "background_mode": "knee", "max_n_peaks": 3 }"#;
        let settings = FitSettings::from_reader(json.as_bytes()).unwrap();
        assert_eq!(settings.background_mode, BackgroundMode::Knee);
        assert_eq!(settings.max_n_peaks, 3);
        assert_eq!(settings.peak_threshold, 2.0);

        let text = serde_json::to_string(&settings).unwrap();
        let back = FitSettings::from_reader(text.as_bytes()).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn test_invalid_json_settings_rejected() {
        let json = r#"{ "peak_width_limits": [2.0, 1.0] }"#;
        assert!(matches!(
            FitSettings::from_reader(json.as_bytes()),
            Err(SpecParamError::InvalidSettings(_))
        ));
    }
}

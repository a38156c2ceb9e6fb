//! Fit result records.

use ndarray::{array, Array1};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::CurveModel;
use crate::models::{gaussian_sum, BackgroundModel};
use crate::settings::BackgroundMode;

/// Fitted aperiodic background.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum BackgroundParams {
    Fixed { offset: f64, slope: f64 },
    Knee { offset: f64, knee: f64, slope: f64 },
}

impl BackgroundParams {
    /// Build from a flat parameter vector in the layout of `mode`.
    pub(crate) fn from_slice(mode: BackgroundMode, values: &[f64]) -> Self {
        match mode {
            BackgroundMode::Fixed => BackgroundParams::Fixed {
                offset: values[0],
                slope: values[1],
            },
            BackgroundMode::Knee => BackgroundParams::Knee {
                offset: values[0],
                knee: values[1],
                slope: values[2],
            },
        }
    }

    pub fn mode(&self) -> BackgroundMode {
        match self {
            BackgroundParams::Fixed { .. } => BackgroundMode::Fixed,
            BackgroundParams::Knee { .. } => BackgroundMode::Knee,
        }
    }

    /// `[offset, slope]` or `[offset, knee, slope]`.
    pub fn as_array(&self) -> Array1<f64> {
        match *self {
            BackgroundParams::Fixed { offset, slope } => array![offset, slope],
            BackgroundParams::Knee { offset, knee, slope } => array![offset, knee, slope],
        }
    }

    pub fn offset(&self) -> f64 {
        match *self {
            BackgroundParams::Fixed { offset, .. } | BackgroundParams::Knee { offset, .. } => {
                offset
            }
        }
    }

    pub fn slope(&self) -> f64 {
        match *self {
            BackgroundParams::Fixed { slope, .. } | BackgroundParams::Knee { slope, .. } => slope,
        }
    }

    pub fn knee(&self) -> Option<f64> {
        match *self {
            BackgroundParams::Fixed { .. } => None,
            BackgroundParams::Knee { knee, .. } => Some(knee),
        }
    }
}

/// One fitted Gaussian peak. `width` is the standard deviation in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakParams {
    pub center: f64,
    pub amplitude: f64,
    pub width: f64,
}

impl PeakParams {
    pub fn as_array(&self) -> [f64; 3] {
        [self.center, self.amplitude, self.width]
    }
}

/// Outcome of fitting one spectrum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResults {
    pub background: BackgroundParams,
    /// Sorted by ascending center.
    pub peaks: Vec<PeakParams>,
    /// Mean absolute residual in log10 power.
    pub error: f64,
    pub r_squared: f64,
}

impl FitResults {
    pub fn n_peaks(&self) -> usize {
        self.peaks.len()
    }

    /// Peak parameters flattened into `(center, amplitude, width)` triples.
    pub fn peak_values(&self) -> Vec<f64> {
        self.peaks.iter().flat_map(|p| p.as_array()).collect()
    }

    /// Fitted background evaluated at `freqs`.
    pub fn background_curve(&self, freqs: &Array1<f64>) -> Result<Array1<f64>> {
        BackgroundModel::new(self.background.mode()).eval(freqs, &self.background.as_array())
    }

    /// Sum of the fitted peaks evaluated at `freqs`.
    pub fn peak_curve(&self, freqs: &Array1<f64>) -> Result<Array1<f64>> {
        gaussian_sum(freqs, &self.peak_values())
    }

    /// Full model, background plus peaks, in log10 power.
    pub fn model(&self, freqs: &Array1<f64>) -> Result<Array1<f64>> {
        Ok(self.background_curve(freqs)? + self.peak_curve(freqs)?)
    }
}

use std::fmt;

use thiserror::Error;

/// Stage of the spectrum fitting pipeline, used to give failures context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitStage {
    /// First, loose background fit over the whole spectrum.
    InitialBackground,
    /// Background refit restricted to the low-percentile points.
    RobustBackground,
    /// Joint multi-Gaussian refit of the peak candidates.
    PeakFit,
    /// Background refit on the peak-removed spectrum.
    FinalBackground,
}

impl fmt::Display for FitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FitStage::InitialBackground => "initial background fit",
            FitStage::RobustBackground => "robust background fit",
            FitStage::PeakFit => "peak fit",
            FitStage::FinalBackground => "final background fit",
        };
        f.write_str(name)
    }
}

/// Error types for the specparam-rs library.
#[derive(Error, Debug)]
pub enum SpecParamError {
    /// Shape or value problems with the input spectrum.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Rejected fitter configuration.
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// A nonlinear fit inside the pipeline did not converge.
    #[error("Fit failed to converge during {stage}: {message}")]
    FitConvergence { stage: FitStage, message: String },

    /// A model function was evaluated outside its domain.
    #[error("Domain error: {0}")]
    Domain(String),

    /// Error indicating a mismatch in array dimensions.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Error indicating the solver failed to converge.
    #[error("Algorithm failed to converge: {0}")]
    ConvergenceFailure(String),

    /// Linear algebra error.
    #[error("Linear algebra error: {0}")]
    LinearAlgebraError(String),

    /// Operation requested in a state that cannot serve it.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Failure while fitting one spectrum of a group.
    #[error("Spectrum {index}: {source}")]
    Spectrum {
        index: usize,
        #[source]
        source: Box<SpecParamError>,
    },

    /// I/O error wrapper.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl SpecParamError {
    /// Attach the pipeline stage to solver failures.
    ///
    /// Input and domain errors are programming or data errors and pass through
    /// untouched; everything the solver itself raises becomes `FitConvergence`.
    pub fn at_stage(self, stage: FitStage) -> Self {
        match self {
            SpecParamError::ConvergenceFailure(message)
            | SpecParamError::LinearAlgebraError(message)
            | SpecParamError::DimensionMismatch(message) => {
                SpecParamError::FitConvergence { stage, message }
            }
            other => other,
        }
    }

    /// Wrap an error with the index of the spectrum it came from.
    pub fn for_spectrum(self, index: usize) -> Self {
        SpecParamError::Spectrum {
            index,
            source: Box::new(self),
        }
    }
}

/// Result type alias for specparam-rs operations.
pub type Result<T> = std::result::Result<T, SpecParamError>;

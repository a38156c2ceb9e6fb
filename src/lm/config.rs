//! Configuration options for the Levenberg-Marquardt algorithm.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpecParamError};

/// Configuration options for the Levenberg-Marquardt algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LmConfig {
    /// Maximum number of iterations. Default: 500
    pub max_iterations: usize,

    /// Tolerance for relative change in the cost. Default: 1e-10
    pub ftol: f64,

    /// Tolerance for relative change in parameter values. Default: 1e-10
    pub xtol: f64,

    /// Tolerance for the (projected) gradient norm. Default: 1e-10
    pub gtol: f64,

    /// Initial value for the damping parameter. Default: 1e-3
    pub initial_lambda: f64,

    /// Factor by which to increase lambda. Default: 10.0
    pub lambda_up_factor: f64,

    /// Factor by which to decrease lambda. Default: 0.1
    pub lambda_down_factor: f64,

    /// Minimum value for lambda. Default: 1e-10
    pub min_lambda: f64,

    /// Maximum value for lambda. Default: 1e10
    pub max_lambda: f64,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            ftol: 1e-10,
            xtol: 1e-10,
            gtol: 1e-10,
            initial_lambda: 1e-3,
            lambda_up_factor: 10.0,
            lambda_down_factor: 0.1,
            min_lambda: 1e-10,
            max_lambda: 1e10,
        }
    }
}

impl LmConfig {
    /// Check that the budget and tolerances describe a usable solver.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(SpecParamError::InvalidSettings(
                "solver max_iterations must be at least 1".to_string(),
            ));
        }

        for (name, value) in [("ftol", self.ftol), ("xtol", self.xtol), ("gtol", self.gtol)] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(SpecParamError::InvalidSettings(format!(
                    "solver {} must be finite and non-negative, got {}",
                    name, value
                )));
            }
        }

        if !(self.min_lambda > 0.0
            && self.min_lambda <= self.initial_lambda
            && self.initial_lambda <= self.max_lambda
            && self.max_lambda.is_finite())
        {
            return Err(SpecParamError::InvalidSettings(format!(
                "solver damping must satisfy 0 < min_lambda <= initial_lambda <= max_lambda < inf, got {} / {} / {}",
                self.min_lambda, self.initial_lambda, self.max_lambda
            )));
        }

        if !(self.lambda_up_factor > 1.0 && self.lambda_down_factor > 0.0 && self.lambda_down_factor < 1.0) {
            return Err(SpecParamError::InvalidSettings(format!(
                "solver lambda factors must satisfy up > 1 and 0 < down < 1, got {} / {}",
                self.lambda_up_factor, self.lambda_down_factor
            )));
        }

        Ok(())
    }
}

//! Implementation of the Levenberg-Marquardt algorithm.
//!
//! This module contains the core implementation of the bounded
//! Levenberg-Marquardt algorithm for nonlinear least-squares optimization.

use ndarray::Array1;
use std::fmt;

use crate::error::{Result, SpecParamError};
use crate::parameters::ParameterBounds;
use crate::problem::Problem;

use super::config::LmConfig;
use super::convergence::{ConvergenceCriteria, ConvergenceStatus};
use super::step::LmStep;
use super::trust_region::TrustRegion;

/// Result of the Levenberg-Marquardt optimization.
#[derive(Debug, Clone)]
pub struct LmResult {
    /// Optimized parameter values
    pub params: Array1<f64>,

    /// Residuals at the solution
    pub residuals: Array1<f64>,

    /// Sum of squared residuals
    pub cost: f64,

    /// Number of iterations performed
    pub iterations: usize,

    /// Number of function evaluations
    pub func_evals: usize,

    /// How the solver terminated
    pub status: ConvergenceStatus,

    /// Whether the optimization succeeded
    pub success: bool,

    /// A message describing the result
    pub message: String,
}

impl fmt::Display for LmResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Optimization Result:")?;
        writeln!(f, "  Success: {}", self.success)?;
        writeln!(f, "  Message: {}", self.message)?;
        writeln!(f, "  Cost: {:.6e}", self.cost)?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        writeln!(f, "  Function evaluations: {}", self.func_evals)?;
        writeln!(f, "  Parameters: {:?}", self.params)?;
        Ok(())
    }
}

/// The Levenberg-Marquardt optimizer.
#[derive(Debug, Clone, Default)]
pub struct LevenbergMarquardt {
    /// Configuration options
    config: LmConfig,
}

impl LevenbergMarquardt {
    /// Create a new Levenberg-Marquardt optimizer with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new Levenberg-Marquardt optimizer with the given configuration.
    pub fn with_config(config: LmConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    pub fn config(&self) -> &LmConfig {
        &self.config
    }

    /// Set the maximum number of iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    /// Minimize the sum of squared residuals for an unconstrained problem.
    pub fn minimize<P: Problem>(&self, problem: &P, initial_params: Array1<f64>) -> Result<LmResult> {
        let bounds = ParameterBounds::unbounded(problem.parameter_count());
        self.minimize_bounded(problem, initial_params, &bounds)
    }

    /// Minimize the sum of squared residuals subject to box constraints.
    ///
    /// The initial guess is projected into the box. Trial points are projected
    /// as well, so every evaluated point is feasible. A trial point whose model
    /// evaluation leaves the model's domain is treated as a rejected step.
    ///
    /// # Arguments
    ///
    /// * `problem` - The problem to solve
    /// * `initial_params` - Initial guess for the parameter values
    /// * `bounds` - Box constraints, one entry per parameter
    ///
    /// # Returns
    ///
    /// * `Result<LmResult>` - The result of the optimization. Running out of
    ///   iterations is reported through `success == false`, not as an error.
    pub fn minimize_bounded<P: Problem>(
        &self,
        problem: &P,
        initial_params: Array1<f64>,
        bounds: &ParameterBounds,
    ) -> Result<LmResult> {
        let n_params = problem.parameter_count();
        if initial_params.len() != n_params {
            return Err(SpecParamError::DimensionMismatch(format!(
                "Expected {} parameters, got {}",
                n_params,
                initial_params.len()
            )));
        }
        if bounds.len() != n_params {
            return Err(SpecParamError::DimensionMismatch(format!(
                "Expected bounds for {} parameters, got {}",
                n_params,
                bounds.len()
            )));
        }

        let criteria = ConvergenceCriteria::from_config(&self.config);
        let mut trust_region = TrustRegion::from_config(&self.config);

        let mut params = bounds.project(&initial_params);
        let mut residuals = problem.eval(&params)?;
        let mut cost = residuals.dot(&residuals);
        let mut func_evals = 1;
        let mut iterations = 0;

        if !cost.is_finite() {
            return Err(SpecParamError::ConvergenceFailure(
                "Non-finite residuals at the initial guess".to_string(),
            ));
        }

        let status = loop {
            if cost == 0.0 {
                break ConvergenceStatus::FunctionValueConvergence;
            }

            let jacobian = problem.jacobian(&params)?;
            let gradient = jacobian.t().dot(&residuals);
            let active = bounds.active_set(&params, &gradient);

            let gradient_norm = gradient
                .iter()
                .zip(active.iter())
                .filter(|(_, &pinned)| !pinned)
                .map(|(g, _)| g.abs())
                .fold(0.0, f64::max);

            let gradient_status = criteria.check_gradient(gradient_norm);
            if gradient_status.is_terminated() {
                break gradient_status;
            }

            // Search for an acceptable step, raising the damping on each rejection.
            let accepted = loop {
                let step = LmStep::calculate_step(&jacobian, &residuals, trust_region.lambda, &active)?;
                let trial = bounds.project(&(&params + &step.step));
                let taken = &trial - &params;
                let predicted = LmStep::predicted_reduction(&jacobian, &residuals, &taken);

                func_evals += 1;
                let (trial_residuals, trial_cost) = match problem.eval(&trial) {
                    Ok(r) => {
                        let c = r.dot(&r);
                        (Some(r), c)
                    }
                    Err(SpecParamError::Domain(_)) => (None, f64::INFINITY),
                    Err(err) => return Err(err),
                };

                let ratio = TrustRegion::gain_ratio(cost, trial_cost, predicted);
                let improves = trial_cost < cost;
                if trust_region.update_lambda(if improves { ratio } else { 0.0 }) {
                    if let Some(trial_residuals) = trial_residuals {
                        break Some((trial, trial_residuals, trial_cost));
                    }
                }

                if trust_region.is_saturated() {
                    break None;
                }
            };

            let Some((trial, trial_residuals, trial_cost)) = accepted else {
                break ConvergenceStatus::Stalled;
            };

            iterations += 1;
            let status = criteria.check(&params, &trial, cost, trial_cost, iterations);

            params = trial;
            residuals = trial_residuals;
            cost = trial_cost;

            if status.is_terminated() {
                break status;
            }
        };

        let success = status.is_converged();
        log::debug!(
            "LM finished after {} iterations ({} evaluations): {}, cost {:.6e}",
            iterations,
            func_evals,
            status.description(),
            cost
        );

        Ok(LmResult {
            params,
            residuals,
            cost,
            iterations,
            func_evals,
            status,
            success,
            message: status.description().to_string(),
        })
    }
}

//! Termination tests for the Levenberg-Marquardt solver.
//!
//! An accepted step ends the solve when the relative parameter change or the
//! relative cost change falls below tolerance, or when the iteration budget
//! is spent. The projected gradient is tested before each step.

use ndarray::Array1;

use super::config::LmConfig;

/// Why the solver stopped, or `Running` while it has not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceStatus {
    /// The algorithm is still running.
    Running,

    /// The algorithm has converged due to a small parameter change.
    ParameterConvergence,

    /// The algorithm has converged due to a small function value change.
    FunctionValueConvergence,

    /// The algorithm has converged due to a small gradient.
    GradientConvergence,

    /// No step reduces the cost, even at maximum damping.
    Stalled,

    /// The algorithm has terminated due to reaching the maximum number of iterations.
    MaxIterationsReached,
}

impl ConvergenceStatus {
    /// Anything but `Running`.
    pub fn is_terminated(&self) -> bool {
        !matches!(self, ConvergenceStatus::Running)
    }

    /// Returns true if the optimization has converged.
    ///
    /// A stalled solver sits at a point where no damped step improves the
    /// cost, which is a minimum to working precision.
    pub fn is_converged(&self) -> bool {
        matches!(
            self,
            ConvergenceStatus::ParameterConvergence
                | ConvergenceStatus::FunctionValueConvergence
                | ConvergenceStatus::GradientConvergence
                | ConvergenceStatus::Stalled
        )
    }

    /// Human-readable reason, used as the solver result message.
    pub fn description(&self) -> &'static str {
        match self {
            ConvergenceStatus::Running => "Optimization is still running",
            ConvergenceStatus::ParameterConvergence => "Converged: small parameter change",
            ConvergenceStatus::FunctionValueConvergence => "Converged: small function value change",
            ConvergenceStatus::GradientConvergence => "Converged: small gradient",
            ConvergenceStatus::Stalled => "Converged: no improving step at maximum damping",
            ConvergenceStatus::MaxIterationsReached => "Terminated: maximum iterations reached",
        }
    }
}

/// Tolerances and budget checked after every accepted step.
#[derive(Debug, Clone)]
pub struct ConvergenceCriteria {
    /// Tolerance for change in parameter values.
    pub xtol: f64,

    /// Tolerance for change in function value.
    pub ftol: f64,

    /// Tolerance for gradient norm.
    pub gtol: f64,

    /// Maximum number of iterations.
    pub max_iterations: usize,
}

impl Default for ConvergenceCriteria {
    fn default() -> Self {
        Self::from_config(&LmConfig::default())
    }
}

impl ConvergenceCriteria {
    pub fn new(xtol: f64, ftol: f64, gtol: f64, max_iterations: usize) -> Self {
        Self {
            xtol,
            ftol,
            gtol,
            max_iterations,
        }
    }

    /// Criteria taken from a solver configuration.
    pub fn from_config(config: &LmConfig) -> Self {
        Self::new(config.xtol, config.ftol, config.gtol, config.max_iterations)
    }

    /// Checks whether the gradient at the current point is small enough.
    pub fn check_gradient(&self, gradient_norm: f64) -> ConvergenceStatus {
        if gradient_norm <= self.gtol {
            ConvergenceStatus::GradientConvergence
        } else {
            ConvergenceStatus::Running
        }
    }

    /// Checks whether an accepted step has converged.
    ///
    /// # Arguments
    ///
    /// * `params` - The parameter values before the step
    /// * `new_params` - The parameter values after the step
    /// * `cost` - The cost before the step
    /// * `new_cost` - The cost after the step
    /// * `iterations` - The number of completed iterations, this step included
    pub fn check(
        &self,
        params: &Array1<f64>,
        new_params: &Array1<f64>,
        cost: f64,
        new_cost: f64,
        iterations: usize,
    ) -> ConvergenceStatus {
        let param_change = new_params
            .iter()
            .zip(params.iter())
            .map(|(a, b)| (a - b).abs() / b.abs().max(1.0))
            .fold(0.0, f64::max);
        if param_change <= self.xtol {
            return ConvergenceStatus::ParameterConvergence;
        }

        let cost_change = (cost - new_cost).abs() / cost.max(1e-10);
        if cost_change <= self.ftol {
            return ConvergenceStatus::FunctionValueConvergence;
        }

        if iterations >= self.max_iterations {
            return ConvergenceStatus::MaxIterationsReached;
        }

        ConvergenceStatus::Running
    }
}

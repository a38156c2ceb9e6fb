//! Finite difference methods for numerical differentiation.
//!
//! Used as the fallback Jacobian for problems and curve models that do not
//! supply analytic derivatives.

use crate::error::{Result, SpecParamError};
use crate::problem::Problem;
use ndarray::{Array1, Array2};

/// Default relative step size for finite differences (square root of machine epsilon).
const DEFAULT_EPSILON: f64 = 1.49e-8;

/// Compute the Jacobian matrix using forward finite differences.
///
/// The Jacobian is the matrix of partial derivatives of the residuals with
/// respect to the parameters: J[i,j] = ∂residual[i]/∂param[j].
///
/// # Arguments
///
/// * `problem` - The problem to evaluate
/// * `params` - The parameter values at which to evaluate the Jacobian
/// * `epsilon` - The step size for finite differences (optional)
///
/// # Returns
///
/// * `Result<Array2<f64>>` - The Jacobian matrix
pub fn jacobian(
    problem: &dyn Problem,
    params: &Array1<f64>,
    epsilon: Option<f64>,
) -> Result<Array2<f64>> {
    let eps = epsilon.unwrap_or(DEFAULT_EPSILON);
    let n_params = params.len();
    let n_residuals = problem.residual_count();

    let residuals = problem.eval(params)?;
    if residuals.len() != n_residuals {
        return Err(SpecParamError::DimensionMismatch(format!(
            "Expected {} residuals, got {}",
            n_residuals,
            residuals.len()
        )));
    }

    let mut jac = Array2::zeros((n_residuals, n_params));

    for j in 0..n_params {
        let mut params_perturbed = params.clone();

        // Adapt epsilon to parameter scale
        let param_j = params[j];
        let eps_j = eps * param_j.abs().max(1.0);

        params_perturbed[j] += eps_j;
        let residuals_perturbed = problem.eval(&params_perturbed)?;

        for i in 0..n_residuals {
            jac[[i, j]] = (residuals_perturbed[i] - residuals[i]) / eps_j;
        }
    }

    Ok(jac)
}

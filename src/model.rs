//! Curve model trait and its adapter onto the least-squares solver.
//!
//! A [`CurveModel`] maps an x grid and a flat parameter vector to predicted
//! values. [`ModelProblem`] binds a model to observed data so the
//! Levenberg-Marquardt solver can minimize `model(x) - y`.

use ndarray::{Array1, Array2};

use crate::error::{Result, SpecParamError};
use crate::lm::{LevenbergMarquardt, LmConfig, LmResult};
use crate::parameters::ParameterBounds;
use crate::problem::Problem;

/// A parametric curve that can be fit to data.
pub trait CurveModel {
    /// Number of parameters the model expects.
    fn parameter_count(&self) -> usize;

    /// Evaluates the model at the given x values.
    ///
    /// # Arguments
    ///
    /// * `x` - The independent variable values
    /// * `params` - Flat parameter vector of length `parameter_count()`
    ///
    /// # Returns
    ///
    /// * The model's predicted values at the given x values
    fn eval(&self, x: &Array1<f64>, params: &Array1<f64>) -> Result<Array1<f64>>;

    /// Calculates the Jacobian of the model with respect to its parameters.
    ///
    /// `J[i, j] = df(x_i)/dp_j`. Models that return `true` from
    /// [`has_custom_jacobian`](Self::has_custom_jacobian) must override this.
    fn jacobian(&self, _x: &Array1<f64>, _params: &Array1<f64>) -> Result<Array2<f64>> {
        Err(SpecParamError::InvalidState(
            "Model does not provide an analytic Jacobian".to_string(),
        ))
    }

    /// Returns whether this model has a custom Jacobian implementation.
    fn has_custom_jacobian(&self) -> bool {
        false
    }
}

/// An adapter that implements [`Problem`] for a [`CurveModel`] and its data.
///
/// Residuals are `model(x) - y`, so the residual Jacobian equals the model
/// Jacobian.
pub struct ModelProblem<'a, M: CurveModel> {
    model: &'a M,
    x_data: &'a Array1<f64>,
    y_data: &'a Array1<f64>,
}

impl<'a, M: CurveModel> ModelProblem<'a, M> {
    /// Create a new adapter. Fails if `x_data` and `y_data` differ in length.
    pub fn new(model: &'a M, x_data: &'a Array1<f64>, y_data: &'a Array1<f64>) -> Result<Self> {
        if x_data.len() != y_data.len() {
            return Err(SpecParamError::DimensionMismatch(format!(
                "x has {} values but y has {}",
                x_data.len(),
                y_data.len()
            )));
        }
        Ok(Self {
            model,
            x_data,
            y_data,
        })
    }

    /// Get a reference to the model
    pub fn model(&self) -> &M {
        self.model
    }

    /// Get the number of data points
    pub fn ndata(&self) -> usize {
        self.x_data.len()
    }
}

impl<'a, M: CurveModel> Problem for ModelProblem<'a, M> {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        let predicted = self.model.eval(self.x_data, params)?;
        Ok(predicted - self.y_data)
    }

    fn parameter_count(&self) -> usize {
        self.model.parameter_count()
    }

    fn residual_count(&self) -> usize {
        self.x_data.len()
    }

    fn jacobian(&self, params: &Array1<f64>) -> Result<Array2<f64>> {
        if !self.model.has_custom_jacobian() {
            return crate::utils::finite_difference::jacobian(self, params, None);
        }

        let jac = self.model.jacobian(self.x_data, params)?;
        let expected = [self.x_data.len(), self.model.parameter_count()];
        if jac.shape() != expected {
            return Err(SpecParamError::DimensionMismatch(format!(
                "Expected Jacobian of shape {:?}, got {:?}",
                expected,
                jac.shape()
            )));
        }
        Ok(jac)
    }
}

/// Fit `model` to `(x, y)` under box constraints.
///
/// Returns the solver result on convergence and `ConvergenceFailure` when the
/// solver runs out of iterations.
pub fn curve_fit<M: CurveModel>(
    model: &M,
    x: &Array1<f64>,
    y: &Array1<f64>,
    initial: Array1<f64>,
    bounds: &ParameterBounds,
    config: &LmConfig,
) -> Result<LmResult> {
    let problem = ModelProblem::new(model, x, y)?;
    let result = LevenbergMarquardt::with_config(config.clone()).minimize_bounded(
        &problem,
        initial,
        bounds,
    )?;

    if !result.success {
        return Err(SpecParamError::ConvergenceFailure(format!(
            "{} after {} iterations (cost {:.3e})",
            result.message, result.iterations, result.cost
        )));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quadratic;
    use approx::assert_relative_eq;
    use ndarray::array;

    /// Quadratic without an analytic Jacobian, exercising the numeric fallback.
    struct Quadratic;

    impl CurveModel for Quadratic {
        fn parameter_count(&self) -> usize {
            3
        }

        fn eval(&self, x: &Array1<f64>, params: &Array1<f64>) -> Result<Array1<f64>> {
            Ok(quadratic(x, params[0], params[1], params[2]))
        }
    }

    #[test]
    fn test_residuals_are_model_minus_data() {
        let x = array![0.0, 1.0, 2.0];
        let y = array![1.0, 1.0, 1.0];
        let problem = ModelProblem::new(&Quadratic, &x, &y).unwrap();

        let residuals = problem.eval(&array![0.0, 1.0, 0.0]).unwrap();
        assert_eq!(residuals, array![-1.0, 0.0, 1.0]);
        assert_eq!(problem.ndata(), 3);
    }

    #[test]
    fn test_default_jacobian_is_unavailable() {
        let x = array![1.0];
        assert!(Quadratic.jacobian(&x, &array![0.0, 0.0, 0.0]).is_err());
        assert!(!Quadratic.has_custom_jacobian());
    }

    #[test]
    fn test_curve_fit_quadratic() {
        let x = Array1::linspace(-2.0, 2.0, 21);
        let y = quadratic(&x, 0.5, -1.0, 2.0);

        let result = curve_fit(
            &Quadratic,
            &x,
            &y,
            array![0.0, 0.0, 0.0],
            &ParameterBounds::unbounded(3),
            &LmConfig::default(),
        )
        .unwrap();

        assert_relative_eq!(result.params[0], 0.5, epsilon = 1e-6);
        assert_relative_eq!(result.params[1], -1.0, epsilon = 1e-6);
        assert_relative_eq!(result.params[2], 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_length_mismatch() {
        let x = array![1.0, 2.0];
        let y = array![1.0];
        assert!(matches!(
            ModelProblem::new(&Quadratic, &x, &y),
            Err(SpecParamError::DimensionMismatch(_))
        ));
    }
}

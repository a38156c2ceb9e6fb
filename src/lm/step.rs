//! Step calculation for the Levenberg-Marquardt algorithm.
//!
//! This module computes the damped Gauss-Newton step, which blends the
//! Gauss-Newton and gradient descent directions.

use ndarray::{Array1, Array2};

use crate::error::{Result, SpecParamError};
use crate::utils::matrix_convert::{
    nalgebra_vec_to_ndarray, ndarray_to_nalgebra, ndarray_vec_to_nalgebra,
};

/// Result of a Levenberg-Marquardt step calculation.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// The calculated step vector
    pub step: Array1<f64>,

    /// The damping parameter used to calculate the step
    pub lambda: f64,
}

/// Handles step calculation for the Levenberg-Marquardt algorithm.
pub struct LmStep;

impl LmStep {
    /// Calculates the Levenberg-Marquardt step.
    ///
    /// Solves `(JᵀJ + λ·diag(JᵀJ)) δ = −Jᵀr` for the free parameters. Entries
    /// flagged in `active` are pinned on a bound and get a zero step.
    ///
    /// # Arguments
    ///
    /// * `jacobian` - The Jacobian matrix at the current position
    /// * `residuals` - The residuals at the current position
    /// * `lambda` - The damping parameter
    /// * `active` - Parameters held fixed for this step
    pub fn calculate_step(
        jacobian: &Array2<f64>,
        residuals: &Array1<f64>,
        lambda: f64,
        active: &[bool],
    ) -> Result<StepResult> {
        let n = jacobian.ncols();
        if active.len() != n {
            return Err(SpecParamError::DimensionMismatch(format!(
                "Expected {} active flags, got {}",
                n,
                active.len()
            )));
        }

        let j_t_j = jacobian.t().dot(jacobian);
        let j_t_r = jacobian.t().dot(residuals);

        let mut augmented = j_t_j.clone();
        let mut rhs = -&j_t_r;

        for i in 0..n {
            if active[i] {
                augmented.row_mut(i).fill(0.0);
                augmented.column_mut(i).fill(0.0);
                augmented[[i, i]] = 1.0;
                rhs[i] = 0.0;
            }
        }
        for i in 0..n {
            if !active[i] {
                augmented[[i, i]] += lambda * j_t_j[[i, i]].max(1e-10);
            }
        }

        let step = Self::solve(&augmented, &rhs)?;

        if step.iter().any(|v| !v.is_finite()) {
            return Err(SpecParamError::LinearAlgebraError(
                "Damped normal equations produced a non-finite step".to_string(),
            ));
        }

        Ok(StepResult { step, lambda })
    }

    /// Solves the symmetric system `a * x = b`, Cholesky first with an LU fallback.
    fn solve(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
        let a_mat = ndarray_to_nalgebra(a);
        let b_vec = ndarray_vec_to_nalgebra(b);

        if let Some(cholesky) = a_mat.clone().cholesky() {
            return Ok(nalgebra_vec_to_ndarray(&cholesky.solve(&b_vec)));
        }

        a_mat
            .lu()
            .solve(&b_vec)
            .map(|x| nalgebra_vec_to_ndarray(&x))
            .ok_or_else(|| {
                SpecParamError::LinearAlgebraError("Linear system solution failed".to_string())
            })
    }

    /// Reduction in the sum of squares predicted by the linearized model.
    ///
    /// `‖r‖² − ‖r + Jδ‖²`
    pub fn predicted_reduction(
        jacobian: &Array2<f64>,
        residuals: &Array1<f64>,
        step: &Array1<f64>,
    ) -> f64 {
        let linearized = residuals + &jacobian.dot(step);
        residuals.dot(residuals) - linearized.dot(&linearized)
    }
}

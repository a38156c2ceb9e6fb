//! Gaussian peak functions.
//!
//! Peaks are parameterized by `(center, amplitude, width)` where `width` is
//! the standard deviation in Hz. The full width at half maximum is
//! `2 * sqrt(2 * ln 2) * width`, roughly `2.3548 * width`.

use ndarray::{Array1, Array2};

use crate::error::{Result, SpecParamError};
use crate::model::CurveModel;

/// A single Gaussian: `amplitude * exp(-(x - center)^2 / (2 * width^2))`.
///
/// Fails with `Domain` if `width <= 0`.
pub fn gaussian(x: &Array1<f64>, center: f64, amplitude: f64, width: f64) -> Result<Array1<f64>> {
    if !(width > 0.0) {
        return Err(SpecParamError::Domain(format!(
            "Gaussian width must be positive, got {}",
            width
        )));
    }
    Ok(x.mapv(|xi| amplitude * (-(xi - center).powi(2) / (2.0 * width * width)).exp()))
}

/// Sum of Gaussians over consecutive `(center, amplitude, width)` triples.
///
/// An empty parameter slice yields zeros; a length not divisible by 3 fails
/// with `InvalidInput`.
pub fn gaussian_sum(x: &Array1<f64>, params: &[f64]) -> Result<Array1<f64>> {
    if params.len() % 3 != 0 {
        return Err(SpecParamError::InvalidInput(format!(
            "Gaussian parameters come in triples, got {} values",
            params.len()
        )));
    }

    let mut total = Array1::zeros(x.len());
    for triple in params.chunks_exact(3) {
        total += &gaussian(x, triple[0], triple[1], triple[2])?;
    }
    Ok(total)
}

/// Sum of `n_peaks` Gaussians as a curve model.
#[derive(Debug, Clone, Copy)]
pub struct GaussianSumModel {
    n_peaks: usize,
}

impl GaussianSumModel {
    pub fn new(n_peaks: usize) -> Self {
        Self { n_peaks }
    }
}

impl CurveModel for GaussianSumModel {
    fn parameter_count(&self) -> usize {
        3 * self.n_peaks
    }

    fn eval(&self, x: &Array1<f64>, params: &Array1<f64>) -> Result<Array1<f64>> {
        gaussian_sum(x, &params.to_vec())
    }

    fn jacobian(&self, x: &Array1<f64>, params: &Array1<f64>) -> Result<Array2<f64>> {
        let mut jac = Array2::zeros((x.len(), self.parameter_count()));

        for k in 0..self.n_peaks {
            let (center, amplitude, width) = (params[3 * k], params[3 * k + 1], params[3 * k + 2]);
            if !(width > 0.0) {
                return Err(SpecParamError::Domain(format!(
                    "Gaussian width must be positive, got {}",
                    width
                )));
            }
            let w2 = width * width;
            for (i, &xi) in x.iter().enumerate() {
                let dx = xi - center;
                let e = (-dx * dx / (2.0 * w2)).exp();
                jac[[i, 3 * k]] = amplitude * e * dx / w2;
                jac[[i, 3 * k + 1]] = e;
                jac[[i, 3 * k + 2]] = amplitude * e * dx * dx / (w2 * width);
            }
        }
        Ok(jac)
    }

    fn has_custom_jacobian(&self) -> bool {
        true
    }
}

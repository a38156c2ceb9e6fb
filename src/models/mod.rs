//! Model functions for spectral parameterization.
//!
//! All functions take an x grid and return an equal-length array of predicted
//! values. Background functions live in [`background`], peak functions in
//! [`peak`]; the curve models wrapping them for the solver carry analytic
//! Jacobians.

use ndarray::Array1;

mod background;
mod peak;

pub use background::{power_law, power_law_knee, BackgroundModel};
pub use peak::{gaussian, gaussian_sum, GaussianSumModel};

/// Straight line: `offset + slope * x`.
pub fn linear(x: &Array1<f64>, offset: f64, slope: f64) -> Array1<f64> {
    x.mapv(|xi| offset + slope * xi)
}

/// Quadratic: `offset + slope * x + curve * x^2`.
pub fn quadratic(x: &Array1<f64>, offset: f64, slope: f64, curve: f64) -> Array1<f64> {
    x.mapv(|xi| offset + slope * xi + curve * xi * xi)
}

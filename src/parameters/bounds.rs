//! Parameter bounds implementation
//!
//! Box constraints for individual parameters and for a whole parameter
//! vector. The Levenberg-Marquardt solver keeps iterates feasible by
//! projecting every trial point onto the box and by freezing parameters that
//! sit on a bound while the gradient pushes them outward.

use crate::error::{Result, SpecParamError};
use ndarray::Array1;
use std::f64::{INFINITY, NEG_INFINITY};

/// Represents the bounds constraints on a parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Minimum allowed value for the parameter
    pub min: f64,

    /// Maximum allowed value for the parameter
    pub max: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min: NEG_INFINITY,
            max: INFINITY,
        }
    }
}

impl Bounds {
    /// Create a new bounds constraint with min and max values
    ///
    /// # Examples
    ///
    /// ```
    /// use specparam_rs::parameters::Bounds;
    ///
    /// let bounds = Bounds::new(0.0, 10.0).unwrap();
    /// assert_eq!(bounds.min, 0.0);
    /// assert_eq!(bounds.max, 10.0);
    /// assert!(Bounds::new(1.0, 0.0).is_err());
    /// ```
    pub fn new(min: f64, max: f64) -> Result<Self> {
        if min.is_nan() || max.is_nan() || min > max {
            return Err(SpecParamError::InvalidInput(format!(
                "Invalid bounds: min ({}) must not exceed max ({})",
                min, max
            )));
        }

        Ok(Self { min, max })
    }

    /// Create an unbounded constraint (negative infinity to positive infinity)
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Create a bounds constraint with only a minimum value
    pub fn min_only(min: f64) -> Self {
        Self { min, max: INFINITY }
    }

    /// Check if a value is within the bounds
    pub fn is_within_bounds(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Clamp a value to be within the bounds
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// Bounds for every entry of a parameter vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterBounds {
    bounds: Vec<Bounds>,
}

impl ParameterBounds {
    /// Unbounded box for `n` parameters.
    pub fn unbounded(n: usize) -> Self {
        Self {
            bounds: vec![Bounds::unbounded(); n],
        }
    }

    /// Build from per-parameter bounds.
    pub fn from_vec(bounds: Vec<Bounds>) -> Self {
        Self { bounds }
    }

    /// Number of parameters covered.
    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    /// Whether the box covers no parameters.
    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    /// Bounds of parameter `i`.
    pub fn get(&self, i: usize) -> Option<&Bounds> {
        self.bounds.get(i)
    }

    /// Project a parameter vector onto the box.
    pub fn project(&self, params: &Array1<f64>) -> Array1<f64> {
        params
            .iter()
            .zip(self.bounds.iter())
            .map(|(&p, b)| b.clamp(p))
            .collect()
    }

    /// Whether every parameter lies inside its bounds.
    pub fn contains(&self, params: &Array1<f64>) -> bool {
        params.len() == self.bounds.len()
            && params
                .iter()
                .zip(self.bounds.iter())
                .all(|(&p, b)| b.is_within_bounds(p))
    }

    /// Parameters pinned on a bound with the descent direction `-gradient`
    /// pointing out of the box.
    pub fn active_set(&self, params: &Array1<f64>, gradient: &Array1<f64>) -> Vec<bool> {
        params
            .iter()
            .zip(gradient.iter())
            .zip(self.bounds.iter())
            .map(|((&p, &g), b)| (p <= b.min && g > 0.0) || (p >= b.max && g < 0.0))
            .collect()
    }
}

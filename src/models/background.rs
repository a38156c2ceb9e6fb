//! Aperiodic background functions in log10-power space.

use std::f64::consts::LN_10;

use ndarray::{Array1, Array2};

use crate::error::{Result, SpecParamError};
use crate::model::CurveModel;
use crate::settings::BackgroundMode;

fn check_positive(x: &Array1<f64>) -> Result<()> {
    match x.iter().find(|&&xi| xi <= 0.0 || xi.is_nan()) {
        Some(bad) => Err(SpecParamError::Domain(format!(
            "background undefined at frequency {}",
            bad
        ))),
        None => Ok(()),
    }
}

/// Power law without a knee: `offset - slope * log10(x)`.
///
/// Fails with `Domain` if any `x <= 0`.
pub fn power_law(x: &Array1<f64>, offset: f64, slope: f64) -> Result<Array1<f64>> {
    check_positive(x)?;
    Ok(x.mapv(|xi| offset - slope * xi.log10()))
}

/// Power law with a knee: `offset - log10(knee + x^slope)`.
///
/// Fails with `Domain` if any `x <= 0` or `knee + x^slope <= 0`.
pub fn power_law_knee(x: &Array1<f64>, offset: f64, knee: f64, slope: f64) -> Result<Array1<f64>> {
    check_positive(x)?;
    let mut out = Array1::zeros(x.len());
    for (o, &xi) in out.iter_mut().zip(x.iter()) {
        let inner = knee + xi.powf(slope);
        if !(inner > 0.0) {
            return Err(SpecParamError::Domain(format!(
                "knee + f^slope = {} at frequency {}",
                inner, xi
            )));
        }
        *o = offset - inner.log10();
    }
    Ok(out)
}

/// Background curve with the parameter layout of its [`BackgroundMode`]:
/// `[offset, slope]` or `[offset, knee, slope]`.
#[derive(Debug, Clone, Copy)]
pub struct BackgroundModel {
    mode: BackgroundMode,
}

impl BackgroundModel {
    pub fn new(mode: BackgroundMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> BackgroundMode {
        self.mode
    }
}

impl CurveModel for BackgroundModel {
    fn parameter_count(&self) -> usize {
        self.mode.n_params()
    }

    fn eval(&self, x: &Array1<f64>, params: &Array1<f64>) -> Result<Array1<f64>> {
        match self.mode {
            BackgroundMode::Fixed => power_law(x, params[0], params[1]),
            BackgroundMode::Knee => power_law_knee(x, params[0], params[1], params[2]),
        }
    }

    fn jacobian(&self, x: &Array1<f64>, params: &Array1<f64>) -> Result<Array2<f64>> {
        check_positive(x)?;
        let mut jac = Array2::zeros((x.len(), self.parameter_count()));

        match self.mode {
            BackgroundMode::Fixed => {
                for (i, &xi) in x.iter().enumerate() {
                    jac[[i, 0]] = 1.0;
                    jac[[i, 1]] = -xi.log10();
                }
            }
            BackgroundMode::Knee => {
                let (knee, slope) = (params[1], params[2]);
                for (i, &xi) in x.iter().enumerate() {
                    let xs = xi.powf(slope);
                    let denom = (knee + xs) * LN_10;
                    jac[[i, 0]] = 1.0;
                    jac[[i, 1]] = -1.0 / denom;
                    jac[[i, 2]] = -xs * xi.ln() / denom;
                }
            }
        }
        Ok(jac)
    }

    fn has_custom_jacobian(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::finite_difference;
    use crate::model::ModelProblem;
    use crate::problem::Problem;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_power_law_values() {
        let x = array![1.0, 10.0, 100.0];
        let y = power_law(&x, 1.0, 2.0).unwrap();
        assert_relative_eq!(y[0], 1.0);
        assert_relative_eq!(y[1], -1.0);
        assert_relative_eq!(y[2], -3.0);
    }

    #[test]
    fn test_knee_reduces_to_power_law() {
        let x = Array1::linspace(1.0, 40.0, 40);
        let plain = power_law(&x, 0.5, 1.5).unwrap();
        let knee = power_law_knee(&x, 0.5, 0.0, 1.5).unwrap();
        for (a, b) in plain.iter().zip(knee.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_domain_errors() {
        let x = array![0.0, 1.0];
        assert!(matches!(power_law(&x, 0.0, 1.0), Err(SpecParamError::Domain(_))));
        assert!(matches!(
            power_law_knee(&array![1.0, 2.0], 0.0, -5.0, 1.0),
            Err(SpecParamError::Domain(_))
        ));
    }

    #[test]
    fn test_analytic_jacobians_match_numeric() {
        let x = Array1::linspace(1.0, 50.0, 25);
        for (mode, params) in [
            (BackgroundMode::Fixed, array![0.3, 1.7]),
            (BackgroundMode::Knee, array![0.3, 12.0, 1.7]),
        ] {
            let model = BackgroundModel::new(mode);
            let y = Array1::zeros(x.len());
            let problem = ModelProblem::new(&model, &x, &y).unwrap();

            let analytic = problem.jacobian(&params).unwrap();
            let numeric = finite_difference::jacobian(&problem, &params, None).unwrap();
            for (a, n) in analytic.iter().zip(numeric.iter()) {
                assert_relative_eq!(*a, *n, epsilon = 1e-5, max_relative = 1e-5);
            }
        }
    }
}

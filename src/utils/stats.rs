//! Small descriptive statistics used by the fitting pipeline.

use ndarray::Array1;

/// Percentile of `values` with linear interpolation between closest ranks.
///
/// `q` is in percent, `[0, 100]`. NaN values are ordered last. Returns
/// `None` for empty input.
pub fn percentile(values: &Array1<f64>, q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;

    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Mean of the absolute values.
pub fn mean_absolute(values: &Array1<f64>) -> f64 {
    values.mapv(f64::abs).mean().unwrap_or(f64::NAN)
}

/// Coefficient of determination, `1 - var(residual) / var(data)`.
///
/// Data whose variance is zero to rounding has nothing to explain: the score
/// is 1 when the residual is flat as well and 0 otherwise.
pub fn r_squared(residual: &Array1<f64>, data: &Array1<f64>) -> f64 {
    let total = data.var(0.0);
    let unexplained = residual.var(0.0);

    let scale = data.mapv(|v| v * v).mean().unwrap_or(0.0).max(1.0);
    let floor = data.len() as f64 * f64::EPSILON.powi(2) * scale;
    if total > floor {
        1.0 - unexplained / total
    } else if unexplained <= floor {
        1.0
    } else {
        0.0
    }
}

/// Minimum, maximum and mean of a set of values.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Summary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl Summary {
    /// Summarize `values`, or `None` when empty.
    pub fn of(values: &Array1<f64>) -> Option<Self> {
        let mean = values.mean()?;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(Self { min, max, mean })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_r_squared() {
        let data = array![1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(r_squared(&array![0.0, 0.0, 0.0, 0.0], &data), 1.0);
        // var(residual) = 0.25, var(data) = 1.25
        assert_relative_eq!(r_squared(&array![0.5, -0.5, 0.5, -0.5], &data), 0.8);
    }

    #[test]
    fn test_r_squared_of_constant_data() {
        let flat = Array1::from_elem(50, 0.699_f64);
        assert_eq!(r_squared(&Array1::zeros(50), &flat), 1.0);
        assert_eq!(r_squared(&Array1::from_elem(50, 1e-17), &flat), 1.0);
        let zigzag = Array1::from_shape_fn(50, |i| if i % 2 == 0 { 0.1 } else { -0.1 });
        assert_eq!(r_squared(&zigzag, &flat), 0.0);
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = array![4.0, 1.0, 3.0, 2.0, 5.0];
        assert_relative_eq!(percentile(&values, 0.0).unwrap(), 1.0);
        assert_relative_eq!(percentile(&values, 50.0).unwrap(), 3.0);
        assert_relative_eq!(percentile(&values, 100.0).unwrap(), 5.0);
        // rank = 0.025 * 4 = 0.1
        assert_relative_eq!(percentile(&values, 2.5).unwrap(), 1.1, epsilon = 1e-12);
        assert!(percentile(&Array1::zeros(0), 50.0).is_none());
    }

    #[test]
    fn test_mean_absolute_and_summary() {
        let values = array![-1.0, 2.0, -3.0];
        assert_relative_eq!(mean_absolute(&values), 2.0);

        let summary = Summary::of(&values).unwrap();
        assert_eq!(summary.min, -3.0);
        assert_eq!(summary.max, 2.0);
        assert_relative_eq!(summary.mean, -2.0 / 3.0);
        assert!(Summary::of(&Array1::zeros(0)).is_none());
    }
}

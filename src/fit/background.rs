//! Background (aperiodic) fitting stages.

use ndarray::{Array1, ArrayView1};

use crate::error::{FitStage, Result};
use crate::lm::LmConfig;
use crate::model::{curve_fit, CurveModel};
use crate::models::BackgroundModel;
use crate::parameters::ParameterBounds;
use crate::settings::{BackgroundMode, FitSettings};
use crate::spectrum::Spectrum;
use crate::utils::percentile;

/// Starting point for the first background fit.
///
/// Unset guesses are estimated from the data: the offset is the log power at
/// the lowest frequency, the slope the absolute log-log slope between the end
/// points.
pub(crate) fn initial_guess(spectrum: &Spectrum, settings: &FitSettings) -> Array1<f64> {
    let freqs = spectrum.freqs();
    let power = spectrum.log_power();
    let n = freqs.len();
    let guess = &settings.background_guess;

    let offset = guess.offset.unwrap_or(power[0]);
    let slope = guess.slope.unwrap_or_else(|| {
        ((power[n - 1] - power[0]) / (freqs[n - 1].log10() - freqs[0].log10())).abs()
    });

    match settings.background_mode {
        BackgroundMode::Fixed => Array1::from(vec![offset, slope]),
        BackgroundMode::Knee => Array1::from(vec![offset, guess.knee, slope]),
    }
}

/// Fit the background model to `(freqs, values)` starting from `initial`.
pub(crate) fn fit_background(
    model: &BackgroundModel,
    freqs: &Array1<f64>,
    values: &Array1<f64>,
    initial: Array1<f64>,
    solver: &LmConfig,
) -> Result<Array1<f64>> {
    let bounds = ParameterBounds::unbounded(model.parameter_count());
    let result = curve_fit(model, freqs, values, initial, &bounds, solver)?;
    Ok(result.params)
}

/// Background fit that is robust to peaks.
///
/// Fits once, flattens the spectrum, clips negative flattened values to zero
/// and refits on the points at or below the configured percentile of the
/// flattened spectrum. Falls back to the first fit when too few points
/// survive the percentile mask.
pub(crate) fn robust_background_fit(spectrum: &Spectrum, settings: &FitSettings) -> Result<Array1<f64>> {
    let model = BackgroundModel::new(settings.background_mode);
    let freqs = spectrum.freqs();
    let power = spectrum.log_power();

    let first = fit_background(
        &model,
        freqs,
        power,
        initial_guess(spectrum, settings),
        &settings.solver,
    )
    .map_err(|e| e.at_stage(FitStage::InitialBackground))?;

    let flat = (power - &model.eval(freqs, &first)?).mapv(|v| v.max(0.0));
    let threshold = match percentile(&flat, settings.background_percentile) {
        Some(t) => t,
        None => return Ok(first),
    };

    let keep: Vec<usize> = (0..flat.len()).filter(|&i| flat[i] <= threshold).collect();
    if keep.len() < model.parameter_count() {
        log::debug!(
            "Robust background fit kept {} points, using the first fit",
            keep.len()
        );
        return Ok(first);
    }

    let kept_freqs = select(freqs.view(), &keep);
    let kept_power = select(power.view(), &keep);
    log::debug!(
        "Robust background fit on {} of {} points (threshold {:.4})",
        keep.len(),
        flat.len(),
        threshold
    );

    fit_background(&model, &kept_freqs, &kept_power, first, &settings.solver)
        .map_err(|e| e.at_stage(FitStage::RobustBackground))
}

fn select(values: ArrayView1<f64>, indices: &[usize]) -> Array1<f64> {
    indices.iter().map(|&i| values[i]).collect()
}

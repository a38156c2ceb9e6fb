//! Peak detection and the joint multi-Gaussian refit.

use ndarray::Array1;

use crate::error::{FitStage, Result};
use crate::model::curve_fit;
use crate::models::{gaussian, GaussianSumModel};
use crate::parameters::{Bounds, ParameterBounds};
use crate::results::PeakParams;
use crate::settings::FitSettings;

/// `2 * sqrt(2 * ln 2)`: ratio of full width at half maximum to std.
const FWHM_PER_STD: f64 = 2.354_820_045_030_949;

/// Find peak candidates in the flattened spectrum.
///
/// Repeatedly takes the maximum of the residual, estimates a width from the
/// nearer half-height crossing and subtracts the Gaussian before looking
/// again. Stops at `max_n_peaks` candidates or once the maximum falls to the
/// relative or absolute height threshold.
pub(crate) fn detect_candidates(
    freqs: &Array1<f64>,
    flat: &Array1<f64>,
    freq_res: f64,
    settings: &FitSettings,
) -> Result<Vec<PeakParams>> {
    let (min_width, max_width) = settings.peak_width_limits;
    let mut residual = flat.clone();
    let mut candidates = Vec::new();

    // Each pass zeroes the residual at its maximum, so the loop is bounded
    // even when narrow candidates are discarded.
    for _ in 0..residual.len() {
        if candidates.len() >= settings.max_n_peaks {
            break;
        }

        let (max_ind, max_height) = argmax(&residual);
        let noise = residual.std(0.0);
        if max_height <= settings.peak_threshold * noise || max_height <= settings.min_peak_height {
            break;
        }

        let half_height = 0.5 * max_height;
        let left = (0..max_ind).rev().find(|&i| residual[i] <= half_height);
        let right = (max_ind + 1..residual.len()).find(|&i| residual[i] <= half_height);
        let short_side = [left.map(|i| max_ind - i), right.map(|i| i - max_ind)]
            .into_iter()
            .flatten()
            .min();

        let width = match short_side {
            Some(side) => 2.0 * side as f64 * freq_res / FWHM_PER_STD,
            None => 0.5 * (min_width + max_width),
        };

        let center = freqs[max_ind];
        residual = residual - gaussian(freqs, center, max_height, width)?;

        if width < min_width {
            log::debug!(
                "Discarding narrow candidate at {:.2} Hz (width {:.3})",
                center,
                width
            );
            continue;
        }

        candidates.push(PeakParams {
            center,
            amplitude: max_height,
            width: width.min(max_width),
        });
    }

    Ok(candidates)
}

/// Drop candidates whose center lies within `edge_threshold` widths of either
/// end of the frequency range.
pub(crate) fn drop_edge_candidates(
    candidates: Vec<PeakParams>,
    freq_range: (f64, f64),
    edge_threshold: f64,
) -> Vec<PeakParams> {
    let (lo, hi) = freq_range;
    candidates
        .into_iter()
        .filter(|p| {
            let margin = edge_threshold * p.width;
            (p.center - lo).abs() > margin && (hi - p.center).abs() > margin
        })
        .collect()
}

/// Remove overlapping candidates, keeping the larger of each overlapping pair.
///
/// Neighbours (by center) overlap when
/// `center_i + separation * width_i > center_j - separation * width_j`.
/// Repeats until no pair overlaps. The result is sorted by center.
pub(crate) fn drop_overlapping_candidates(
    mut candidates: Vec<PeakParams>,
    separation: f64,
) -> Vec<PeakParams> {
    candidates.sort_by(|a, b| a.center.total_cmp(&b.center));

    loop {
        let overlap = candidates.windows(2).position(|pair| {
            pair[0].center + separation * pair[0].width > pair[1].center - separation * pair[1].width
        });

        let Some(i) = overlap else {
            return candidates;
        };

        let weaker = if candidates[i].amplitude < candidates[i + 1].amplitude {
            i
        } else {
            i + 1
        };
        candidates.remove(weaker);
    }
}

/// Jointly refit all candidates as one multi-Gaussian on the flattened spectrum.
///
/// Centers may move `2 * center_bound` widths from their guess (clipped to the
/// frequency range), amplitudes are non-negative and widths stay within the
/// configured limits. Peaks that end with `amplitude <= 0` or a center outside
/// the range are dropped. The result is sorted by center.
pub(crate) fn fit_peaks(
    freqs: &Array1<f64>,
    flat: &Array1<f64>,
    candidates: &[PeakParams],
    freq_range: (f64, f64),
    settings: &FitSettings,
) -> Result<Vec<PeakParams>> {
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let (lo, hi) = freq_range;
    let (min_width, max_width) = settings.peak_width_limits;

    let mut bounds = Vec::with_capacity(3 * candidates.len());
    for peak in candidates {
        let reach = 2.0 * settings.center_bound * peak.width;
        bounds.push(Bounds::new((peak.center - reach).max(lo), (peak.center + reach).min(hi))?);
        bounds.push(Bounds::min_only(0.0));
        bounds.push(Bounds::new(min_width, max_width)?);
    }
    let bounds = ParameterBounds::from_vec(bounds);

    let initial: Array1<f64> = candidates.iter().flat_map(|p| p.as_array()).collect();
    let model = GaussianSumModel::new(candidates.len());
    let result = curve_fit(&model, freqs, flat, initial, &bounds, &settings.solver)
        .map_err(|e| e.at_stage(FitStage::PeakFit))?;

    let mut peaks: Vec<PeakParams> = result
        .params
        .as_slice()
        .unwrap_or(&[])
        .chunks_exact(3)
        .map(|p| PeakParams {
            center: p[0],
            amplitude: p[1],
            width: p[2],
        })
        .filter(|p| p.amplitude > 0.0 && p.center >= lo && p.center <= hi)
        .collect();

    peaks.sort_by(|a, b| a.center.total_cmp(&b.center));
    log::debug!(
        "Peak refit kept {} of {} candidates after {} iterations",
        peaks.len(),
        candidates.len(),
        result.iterations
    );
    Ok(peaks)
}

fn argmax(values: &Array1<f64>) -> (usize, f64) {
    values
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, v)| if v > best.1 { (i, v) } else { best })
}

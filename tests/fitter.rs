//! Integration tests for single-spectrum fitting.

mod common;

use approx::assert_relative_eq;
use common::{fixed, freqs, init_logging, peak, settings, spectrum};
use ndarray::Array1;
use specparam_rs::lm::LmConfig;
use specparam_rs::synth::gen_power_spectrum;
use specparam_rs::utils::mean_absolute;
use specparam_rs::{
    BackgroundGuess, BackgroundMode, BackgroundParams, FitStage, FitState, SpecParamError,
    SpectrumFitter,
};

#[test]
fn test_pure_power_law() {
    init_logging();
    let power = spectrum(&fixed(0.0, 2.0), &[], 0.001, 1);

    let mut fitter = SpectrumFitter::new(settings().with_max_n_peaks(0)).unwrap();
    let results = fitter.fit(freqs().view(), power.view(), None).unwrap();

    assert!(results.peaks.is_empty());
    assert_relative_eq!(results.background.slope(), 2.0, epsilon = 0.05);
    assert_relative_eq!(results.background.offset(), 0.0, epsilon = 0.05);
    assert!(results.r_squared > 0.99, "r_squared = {}", results.r_squared);
}

#[test]
fn test_single_peak_recovered() {
    init_logging();
    let power = spectrum(&fixed(0.0, 2.0), &[peak(10.0, 0.5, 1.0)], 0.005, 2);

    let mut fitter = SpectrumFitter::new(settings()).unwrap();
    let results = fitter.fit(freqs().view(), power.view(), None).unwrap();

    assert_eq!(results.peaks.len(), 1, "peaks: {:?}", results.peaks);
    let found = results.peaks[0];
    assert_relative_eq!(found.center, 10.0, epsilon = 0.5);
    assert_relative_eq!(found.amplitude, 0.5, max_relative = 0.2);
    assert_relative_eq!(results.background.slope(), 2.0, epsilon = 0.05);
    assert_eq!(fitter.state(), FitState::Converged);
}

#[test]
fn test_peaks_sorted_and_separated() {
    init_logging();
    let peaks = [peak(25.0, 0.6, 2.0), peak(8.0, 0.4, 1.0)];
    let power = spectrum(&fixed(1.0, 1.5), &peaks, 0.0, 3);

    let settings = settings();
    let separation = settings.min_peak_separation;
    let mut fitter = SpectrumFitter::new(settings).unwrap();
    let results = fitter.fit(freqs().view(), power.view(), None).unwrap();

    assert_eq!(results.peaks.len(), 2);
    for pair in results.peaks.windows(2) {
        assert!(pair[0].center < pair[1].center);
        assert!(
            pair[0].center + separation * pair[0].width
                <= pair[1].center - separation * pair[1].width
        );
    }
    assert_relative_eq!(results.peaks[0].center, 8.0, epsilon = 0.1);
    assert_relative_eq!(results.peaks[1].center, 25.0, epsilon = 0.1);
}

#[test]
fn test_error_and_r_squared_match_model() {
    let power = spectrum(&fixed(0.5, 1.8), &[peak(12.0, 0.4, 1.5)], 0.02, 4);

    let mut fitter = SpectrumFitter::new(settings()).unwrap();
    let results = fitter.fit(freqs().view(), power.view(), None).unwrap().clone();

    let log_power = power.mapv(f64::log10);
    let residual = &log_power - &results.model(&freqs()).unwrap();

    assert_relative_eq!(results.error, mean_absolute(&residual), epsilon = 1e-12);
    let expected_r2 = 1.0 - residual.var(0.0) / log_power.var(0.0);
    assert_relative_eq!(results.r_squared, expected_r2, epsilon = 1e-12);
    assert!(results.r_squared > 0.0 && results.r_squared <= 1.0);
}

#[test]
fn test_flat_spectrum_scores_perfect_fit() {
    let power = Array1::from_elem(freqs().len(), 3.0);
    let mut fitter = SpectrumFitter::new(settings()).unwrap();
    let results = fitter.fit(freqs().view(), power.view(), None).unwrap();

    assert!(results.peaks.is_empty());
    assert_relative_eq!(results.background.offset(), 3f64.log10(), epsilon = 1e-12);
    assert_eq!(results.error, 0.0);
    assert_eq!(results.r_squared, 1.0);
}

#[test]
fn test_fit_is_deterministic() {
    let power = spectrum(&fixed(0.0, 1.2), &[peak(10.0, 0.5, 1.0), peak(30.0, 0.3, 2.5)], 0.02, 5);

    let mut first = SpectrumFitter::new(settings()).unwrap();
    let mut second = SpectrumFitter::new(settings()).unwrap();
    let a = first.fit(freqs().view(), power.view(), None).unwrap();
    let b = second.fit(freqs().view(), power.view(), None).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_refit_replaces_previous_result() {
    let mut fitter = SpectrumFitter::new(settings()).unwrap();

    let with_peak = spectrum(&fixed(0.0, 2.0), &[peak(10.0, 0.5, 1.0)], 0.0, 6);
    let without = spectrum(&fixed(0.0, 2.0), &[], 0.0, 6);

    assert_eq!(fitter.fit(freqs().view(), with_peak.view(), None).unwrap().n_peaks(), 1);
    assert_eq!(fitter.fit(freqs().view(), without.view(), None).unwrap().n_peaks(), 0);
}

#[test]
fn test_zero_or_negative_power_rejected() {
    let mut fitter = SpectrumFitter::new(settings()).unwrap();
    let mut power = spectrum(&fixed(0.0, 2.0), &[], 0.0, 7);

    power[10] = 0.0;
    assert!(matches!(
        fitter.fit(freqs().view(), power.view(), None),
        Err(SpecParamError::InvalidInput(_))
    ));

    power[10] = -1.0;
    assert!(matches!(
        fitter.fit(freqs().view(), power.view(), None),
        Err(SpecParamError::InvalidInput(_))
    ));
    assert_eq!(fitter.state(), FitState::Failed);
    assert!(fitter.results().is_none());
}

#[test]
fn test_frequency_range_restricts_fit() {
    let power = spectrum(&fixed(0.0, 2.0), &[peak(20.0, 0.5, 1.0)], 0.0, 8);
    let mut fitter = SpectrumFitter::new(settings()).unwrap();
    fitter.fit(freqs().view(), power.view(), Some((5.0, 35.0))).unwrap();

    let spectrum = fitter.spectrum().unwrap();
    assert_eq!(spectrum.freq_range(), (5.0, 35.0));
    assert_relative_eq!(spectrum.freq_res(), 0.25);
    assert_eq!(fitter.model().unwrap().len(), spectrum.len());
}

#[test]
fn test_knee_background() {
    init_logging();
    let background = BackgroundParams::Knee {
        offset: 2.0,
        knee: 8.0,
        slope: 2.0,
    };
    let freqs = Array1::linspace(1.0, 50.0, 197);
    let power = gen_power_spectrum(&freqs, &background, &[], 0.0, &mut common::rng(9)).unwrap();

    let settings = settings()
        .with_background_mode(BackgroundMode::Knee)
        .with_background_guess(BackgroundGuess {
            offset: None,
            knee: 5.0,
            slope: None,
        });
    let mut fitter = SpectrumFitter::new(settings).unwrap();
    let results = fitter.fit(freqs.view(), power.view(), None).unwrap();

    assert!(results.peaks.is_empty());
    assert_relative_eq!(results.background.slope(), 2.0, epsilon = 0.05);
    assert_relative_eq!(results.background.knee().unwrap(), 8.0, epsilon = 0.5);
}

#[test]
fn test_solver_budget_failure_names_stage() {
    let mut solver = LmConfig::default();
    solver.max_iterations = 1;
    let power = spectrum(&fixed(0.0, 2.0), &[], 0.0, 10);

    let mut fitter = SpectrumFitter::new(settings().with_solver(solver)).unwrap();
    match fitter.fit(freqs().view(), power.view(), None) {
        Err(SpecParamError::FitConvergence { stage, .. }) => {
            assert_eq!(stage, FitStage::InitialBackground)
        }
        other => panic!("expected a convergence failure, got {:?}", other),
    }
    assert_eq!(fitter.state(), FitState::Failed);
}

#[test]
fn test_too_short_spectrum_rejected() {
    let freqs = Array1::linspace(1.0, 10.0, 10);
    let power = Array1::ones(10);
    let mut fitter = SpectrumFitter::new(settings()).unwrap();

    assert!(matches!(
        fitter.fit(freqs.view(), power.view(), None),
        Err(SpecParamError::InvalidInput(_))
    ));
}

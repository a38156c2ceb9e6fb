//! Benchmarks for spectrum parameterization.
//!
//! Covers a single-spectrum fit at growing peak counts and a group fit run
//! sequentially and with rayon.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array1;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use specparam_rs::synth::{gen_freqs, gen_group_power_spectra, gen_power_spectrum};
use specparam_rs::{BackgroundParams, FitSettings, GroupFitter, PeakParams, SpectrumFitter};

fn background() -> BackgroundParams {
    BackgroundParams::Fixed {
        offset: 0.5,
        slope: 1.5,
    }
}

fn peaks(n: usize) -> Vec<PeakParams> {
    (0..n)
        .map(|i| PeakParams {
            center: 8.0 + 10.0 * i as f64,
            amplitude: 0.4,
            width: 1.5,
        })
        .collect()
}

fn freqs() -> Array1<f64> {
    gen_freqs((3.0, 45.0), 0.25).expect("valid frequency grid")
}

fn bench_single_spectrum(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_spectrum");
    let freqs = freqs();
    let settings = FitSettings::default().with_min_peak_height(0.1);

    for n_peaks in [0, 1, 2, 4] {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let power = gen_power_spectrum(&freqs, &background(), &peaks(n_peaks), 0.01, &mut rng)
            .expect("valid spectrum");

        group.bench_with_input(BenchmarkId::new("fit", n_peaks), &power, |b, power| {
            let mut fitter = SpectrumFitter::new(settings.clone()).expect("valid settings");
            b.iter(|| {
                let _ = black_box(fitter.fit(freqs.view(), power.view(), None));
            })
        });
    }

    group.finish();
}

fn bench_group(c: &mut Criterion) {
    let mut group = c.benchmark_group("group");
    group.sample_size(10);

    let freqs = freqs();
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let spectra = gen_group_power_spectra(32, &freqs, &background(), &peaks(2), 0.02, &mut rng)
        .expect("valid spectra");
    let settings = FitSettings::default().with_min_peak_height(0.1);

    group.bench_function("sequential", |b| {
        let mut fitter = GroupFitter::new(settings.clone()).expect("valid settings");
        b.iter(|| {
            let _ = black_box(fitter.fit(freqs.view(), spectra.view(), None));
        })
    });

    #[cfg(feature = "parallel")]
    group.bench_function("parallel", |b| {
        let mut fitter = GroupFitter::new(settings.clone()).expect("valid settings");
        b.iter(|| {
            let _ = black_box(fitter.fit_parallel(freqs.view(), spectra.view(), None));
        })
    });

    group.finish();
}

criterion_group!(benches, bench_single_spectrum, bench_group);
criterion_main!(benches);

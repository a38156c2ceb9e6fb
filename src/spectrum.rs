//! Validated power spectrum input.

use ndarray::{s, Array1, ArrayView1};

use crate::error::{Result, SpecParamError};

/// A power spectrum ready for fitting: trimmed to its frequency range, with
/// power in log10 space.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    freqs: Array1<f64>,
    log_power: Array1<f64>,
    freq_range: (f64, f64),
    freq_res: f64,
}

impl Spectrum {
    /// Validate and prepare a spectrum.
    ///
    /// # Arguments
    ///
    /// * `freqs` - Frequency values in Hz, finite and strictly increasing
    /// * `power` - Linear power values, finite and strictly positive
    /// * `freq_range` - Optional inclusive `(lo, hi)` range to keep
    ///
    /// # Errors
    ///
    /// `InvalidInput` when the arrays differ in length, values are not finite,
    /// frequencies are not strictly increasing, power is not positive, the
    /// range is malformed or outside the data, a kept frequency is `<= 0`, or
    /// fewer than two samples remain.
    pub fn new(
        freqs: ArrayView1<f64>,
        power: ArrayView1<f64>,
        freq_range: Option<(f64, f64)>,
    ) -> Result<Self> {
        if freqs.len() != power.len() {
            return Err(invalid(format!(
                "freqs has {} values but power has {}",
                freqs.len(),
                power.len()
            )));
        }
        if freqs.len() < 2 {
            return Err(invalid(format!(
                "a spectrum needs at least 2 samples, got {}",
                freqs.len()
            )));
        }
        if freqs.iter().any(|f| !f.is_finite()) {
            return Err(invalid("frequencies must be finite".to_string()));
        }
        if freqs.windows(2).into_iter().any(|w| !(w[1] > w[0])) {
            return Err(invalid("frequencies must be strictly increasing".to_string()));
        }
        if let Some(bad) = power.iter().find(|p| !(p.is_finite() && **p > 0.0)) {
            return Err(invalid(format!(
                "power values must be finite and positive, found {}",
                bad
            )));
        }

        let (start, end) = match freq_range {
            Some(range) => trim_indices(&freqs, range)?,
            None => (0, freqs.len()),
        };

        let freqs = freqs.slice(s![start..end]).to_owned();
        let power = power.slice(s![start..end]);

        if freqs.len() < 2 {
            return Err(invalid(format!(
                "only {} samples remain in the frequency range",
                freqs.len()
            )));
        }
        if freqs[0] <= 0.0 {
            return Err(invalid(format!(
                "frequencies must be positive for a power-law background, got {}",
                freqs[0]
            )));
        }

        let n = freqs.len();
        let freq_range = (freqs[0], freqs[n - 1]);
        let freq_res = freqs[1] - freqs[0];

        Ok(Self {
            log_power: power.mapv(f64::log10),
            freqs,
            freq_range,
            freq_res,
        })
    }

    /// Frequencies in Hz.
    pub fn freqs(&self) -> &Array1<f64> {
        &self.freqs
    }

    /// Power in log10 units.
    pub fn log_power(&self) -> &Array1<f64> {
        &self.log_power
    }

    /// Effective `[first, last]` frequency after trimming.
    pub fn freq_range(&self) -> (f64, f64) {
        self.freq_range
    }

    /// Spacing between the first two frequencies.
    pub fn freq_res(&self) -> f64 {
        self.freq_res
    }

    pub fn len(&self) -> usize {
        self.freqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.freqs.is_empty()
    }
}

/// Index range `[start, end)` of the frequencies within `(lo, hi)`, inclusive.
fn trim_indices(freqs: &ArrayView1<f64>, (lo, hi): (f64, f64)) -> Result<(usize, usize)> {
    let first = freqs[0];
    let last = freqs[freqs.len() - 1];

    if !(lo.is_finite() && hi.is_finite()) || lo >= hi {
        return Err(invalid(format!("invalid frequency range ({}, {})", lo, hi)));
    }
    if lo < first || hi > last {
        return Err(invalid(format!(
            "frequency range ({}, {}) lies outside the data [{}, {}]",
            lo, hi, first, last
        )));
    }

    let start = freqs.iter().position(|&f| f >= lo).unwrap_or(freqs.len());
    let end = freqs.iter().rposition(|&f| f <= hi).map_or(0, |i| i + 1);
    Ok((start, end.max(start)))
}

fn invalid(message: String) -> SpecParamError {
    SpecParamError::InvalidInput(message)
}

//! Fitting a group of spectra that share one frequency axis.

use std::fmt;
use std::path::Path;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpecParamError};
use crate::fit::SpectrumFitter;
use crate::results::FitResults;
use crate::settings::{BackgroundMode, FitSettings};
use crate::sink::{load_results_file, ResultsWriter};
use crate::spectrum::Spectrum;
use crate::utils::Summary;

/// Result field to extract across the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataField {
    /// One row per spectrum: `[offset, slope]` or `[offset, knee, slope]`.
    BackgroundParams,
    /// One row per peak over all spectra: `[center, amplitude, width]`.
    PeakParams,
    Error,
    RSquared,
}

/// Data extracted with [`GroupFitter::get_all_data`].
#[derive(Debug, Clone, PartialEq)]
pub enum GroupData {
    Column(Array1<f64>),
    Matrix(Array2<f64>),
}

impl GroupData {
    pub fn into_column(self) -> Option<Array1<f64>> {
        match self {
            GroupData::Column(values) => Some(values),
            GroupData::Matrix(_) => None,
        }
    }

    pub fn into_matrix(self) -> Option<Array2<f64>> {
        match self {
            GroupData::Matrix(values) => Some(values),
            GroupData::Column(_) => None,
        }
    }
}

/// Aggregate description of a group fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub n_spectra: usize,
    pub freq_range: Option<(f64, f64)>,
    pub freq_res: Option<f64>,
    pub knee: bool,
    pub slopes: Summary,
    pub r_squared: Summary,
    pub errors: Summary,
    pub total_peaks: usize,
}

const REPORT_WIDTH: usize = 100;

fn centered(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    writeln!(f, "{:^1$}", text, REPORT_WIDTH)
}

fn describe(s: &Summary) -> String {
    format!("Min: {:6.4}, Max: {:6.4}, Mean: {:5.4}", s.min, s.max, s.mean)
}

impl fmt::Display for GroupSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(REPORT_WIDTH);

        writeln!(f, "{}", rule)?;
        writeln!(f)?;
        centered(f, "SPECPARAM - GROUP RESULTS")?;
        writeln!(f)?;
        centered(f, &format!("Number of spectra in the group: {}", self.n_spectra))?;
        writeln!(f)?;
        if let (Some((lo, hi)), Some(res)) = (self.freq_range, self.freq_res) {
            centered(
                f,
                &format!("Spectra were fit in the range {} - {} Hz", lo.floor(), hi.ceil()),
            )?;
            centered(f, &format!("Frequency resolution is {:1.2} Hz", res))?;
            writeln!(f)?;
        }
        centered(
            f,
            &format!("Spectra were fit {} a knee.", if self.knee { "with" } else { "without" }),
        )?;
        writeln!(f)?;
        centered(f, "Background slope values")?;
        centered(f, &describe(&self.slopes))?;
        writeln!(f)?;
        centered(
            f,
            &format!("In total {} peaks were extracted from the group", self.total_peaks),
        )?;
        writeln!(f)?;
        centered(f, "Fitting performance")?;
        centered(f, &format!("   R2s - {}", describe(&self.r_squared)))?;
        centered(f, &format!("Errors - {}", describe(&self.errors)))?;
        writeln!(f)?;
        write!(f, "{}", rule)
    }
}

/// Runs a [`SpectrumFitter`] over every row of a spectra matrix.
#[derive(Debug, Clone)]
pub struct GroupFitter {
    fitter: SpectrumFitter,
    results: Vec<FitResults>,
    freqs: Option<Array1<f64>>,
    freq_range: Option<(f64, f64)>,
    freq_res: Option<f64>,
}

impl GroupFitter {
    /// Create a group fitter. Fails with `InvalidSettings` if `settings` do not validate.
    pub fn new(settings: FitSettings) -> Result<Self> {
        Ok(Self {
            fitter: SpectrumFitter::new(settings)?,
            results: Vec::new(),
            freqs: None,
            freq_range: None,
            freq_res: None,
        })
    }

    pub fn settings(&self) -> &FitSettings {
        self.fitter.settings()
    }

    /// Results index-aligned with the rows of the last fit.
    pub fn results(&self) -> &[FitResults] {
        &self.results
    }

    pub fn get_results(&self, index: usize) -> Option<&FitResults> {
        self.results.get(index)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Fitted frequencies, available after a fit.
    pub fn freqs(&self) -> Option<&Array1<f64>> {
        self.freqs.as_ref()
    }

    pub fn freq_range(&self) -> Option<(f64, f64)> {
        self.freq_range
    }

    pub fn freq_res(&self) -> Option<f64> {
        self.freq_res
    }

    fn reset(&mut self) {
        self.results.clear();
        self.freqs = None;
        self.freq_range = None;
        self.freq_res = None;
    }

    fn set_frequency_info(&mut self, spectrum: &Spectrum) {
        self.freqs = Some(spectrum.freqs().clone());
        self.freq_range = Some(spectrum.freq_range());
        self.freq_res = Some(spectrum.freq_res());
    }

    /// Fit every row of `spectra` in order.
    ///
    /// Stops at the first failing spectrum and returns its error wrapped with
    /// the row index; the result collection is left empty in that case.
    ///
    /// # Arguments
    ///
    /// * `freqs` - Frequencies shared by all spectra
    /// * `spectra` - Linear power, one spectrum per row
    /// * `freq_range` - Optional inclusive range to fit
    pub fn fit(
        &mut self,
        freqs: ArrayView1<f64>,
        spectra: ArrayView2<f64>,
        freq_range: Option<(f64, f64)>,
    ) -> Result<&[FitResults]> {
        self.fit_rows(freqs, spectra, freq_range, |_, _| Ok(()))
    }

    /// Like [`fit`](Self::fit), writing each result to `sink` as it is produced.
    ///
    /// Records already written stay in the sink if a later spectrum fails.
    pub fn fit_with_sink<W: std::io::Write>(
        &mut self,
        freqs: ArrayView1<f64>,
        spectra: ArrayView2<f64>,
        freq_range: Option<(f64, f64)>,
        sink: &mut ResultsWriter<W>,
    ) -> Result<&[FitResults]> {
        self.fit_rows(freqs, spectra, freq_range, |results, spectrum| {
            sink.write(results, spectrum.freq_range(), spectrum.freq_res())
        })
    }

    fn fit_rows<F>(
        &mut self,
        freqs: ArrayView1<f64>,
        spectra: ArrayView2<f64>,
        freq_range: Option<(f64, f64)>,
        mut on_result: F,
    ) -> Result<&[FitResults]>
    where
        F: FnMut(&FitResults, &Spectrum) -> Result<()>,
    {
        self.reset();
        log::info!("Fitting {} spectra", spectra.nrows());

        let mut results = Vec::with_capacity(spectra.nrows());
        let mut first = None;
        for (index, power) in spectra.outer_iter().enumerate() {
            let spectrum =
                Spectrum::new(freqs, power, freq_range).map_err(|e| e.for_spectrum(index))?;
            let fitted = self
                .fitter
                .fit_spectrum(&spectrum)
                .map_err(|e| e.for_spectrum(index))?;
            on_result(&fitted, &spectrum).map_err(|e| e.for_spectrum(index))?;

            results.push(fitted);
            first.get_or_insert(spectrum);
        }

        if let Some(spectrum) = &first {
            self.set_frequency_info(spectrum);
        }
        self.results = results;
        log::info!("Finished fitting {} spectra", self.results.len());
        Ok(&self.results)
    }

    /// Fit every row in parallel with rayon.
    ///
    /// Results are index-aligned with the rows. If any spectrum fails, the
    /// error of the lowest failing row is returned and the result collection
    /// is left empty.
    #[cfg(feature = "parallel")]
    pub fn fit_parallel(
        &mut self,
        freqs: ArrayView1<f64>,
        spectra: ArrayView2<f64>,
        freq_range: Option<(f64, f64)>,
    ) -> Result<&[FitResults]> {
        use rayon::prelude::*;

        self.reset();
        log::info!("Fitting {} spectra in parallel", spectra.nrows());

        let rows: Vec<ArrayView1<f64>> = spectra.outer_iter().collect();
        let fitter = &self.fitter;
        let outcomes: Vec<Result<FitResults>> = rows
            .into_par_iter()
            .enumerate()
            .map(|(index, power)| {
                Spectrum::new(freqs, power, freq_range)
                    .and_then(|spectrum| fitter.fit_spectrum(&spectrum))
                    .map_err(|e| e.for_spectrum(index))
            })
            .collect();

        let results = outcomes.into_iter().collect::<Result<Vec<_>>>()?;
        if !results.is_empty() {
            let first = Spectrum::new(freqs, spectra.row(0), freq_range)?;
            self.set_frequency_info(&first);
        }

        self.results = results;
        log::info!("Finished fitting {} spectra", self.results.len());
        Ok(&self.results)
    }

    /// Extract one field across all results.
    ///
    /// With `column`, returns that column of a matrix field. Asking for a
    /// column of a scalar field, or one out of range, is `InvalidInput`.
    pub fn get_all_data(&self, field: DataField, column: Option<usize>) -> Result<GroupData> {
        if self.results.is_empty() {
            return Err(SpecParamError::InvalidState(
                "no group results available".to_string(),
            ));
        }

        let matrix = match field {
            DataField::Error | DataField::RSquared => {
                if let Some(col) = column {
                    return Err(SpecParamError::InvalidInput(format!(
                        "{:?} is a scalar field, cannot select column {}",
                        field, col
                    )));
                }
                let values = match field {
                    DataField::Error => self.errors(),
                    _ => self.r_squared(),
                };
                return Ok(GroupData::Column(values));
            }
            DataField::BackgroundParams => self.background_params()?,
            DataField::PeakParams => self.peak_params(),
        };

        match column {
            None => Ok(GroupData::Matrix(matrix)),
            Some(col) if col < matrix.ncols() => Ok(GroupData::Column(matrix.column(col).to_owned())),
            Some(col) => Err(SpecParamError::InvalidInput(format!(
                "column {} out of range for {:?} with {} columns",
                col,
                field,
                matrix.ncols()
            ))),
        }
    }

    /// Mean absolute error of every fit, in input order.
    pub fn errors(&self) -> Array1<f64> {
        self.results.iter().map(|r| r.error).collect()
    }

    pub fn r_squared(&self) -> Array1<f64> {
        self.results.iter().map(|r| r.r_squared).collect()
    }

    pub fn slopes(&self) -> Array1<f64> {
        self.results.iter().map(|r| r.background.slope()).collect()
    }

    /// Background parameters, one row per spectrum.
    ///
    /// Fails with `InvalidState` if the results mix background modes, which
    /// can only happen after loading a hand-edited file.
    pub fn background_params(&self) -> Result<Array2<f64>> {
        let n_cols = self
            .results
            .first()
            .map_or(0, |r| r.background.mode().n_params());
        let values: Vec<f64> = self
            .results
            .iter()
            .flat_map(|r| r.background.as_array().to_vec())
            .collect();

        Array2::from_shape_vec((self.results.len(), n_cols), values).map_err(|_| {
            SpecParamError::InvalidState("results mix background modes".to_string())
        })
    }

    /// All peaks of all spectra, one `[center, amplitude, width]` row each.
    pub fn peak_params(&self) -> Array2<f64> {
        let values: Vec<f64> = self.results.iter().flat_map(|r| r.peak_values()).collect();
        let n_rows = values.len() / 3;
        Array2::from_shape_vec((n_rows, 3), values).unwrap_or_else(|_| Array2::zeros((0, 3)))
    }

    /// Like [`peak_params`](Self::peak_params) with the spectrum index in column 0.
    pub fn peak_params_with_index(&self) -> Array2<f64> {
        let values: Vec<f64> = self
            .results
            .iter()
            .enumerate()
            .flat_map(|(index, r)| {
                r.peaks
                    .iter()
                    .flat_map(move |p| [index as f64, p.center, p.amplitude, p.width])
            })
            .collect();
        let n_rows = values.len() / 4;
        Array2::from_shape_vec((n_rows, 4), values).unwrap_or_else(|_| Array2::zeros((0, 4)))
    }

    /// Summary statistics of the group fit.
    pub fn summary(&self) -> Result<GroupSummary> {
        let no_results = || SpecParamError::InvalidState("no group results available".to_string());

        Ok(GroupSummary {
            n_spectra: self.results.len(),
            freq_range: self.freq_range,
            freq_res: self.freq_res,
            knee: self.settings().background_mode == BackgroundMode::Knee,
            slopes: Summary::of(&self.slopes()).ok_or_else(no_results)?,
            r_squared: Summary::of(&self.r_squared()).ok_or_else(no_results)?,
            errors: Summary::of(&self.errors()).ok_or_else(no_results)?,
            total_peaks: self.results.iter().map(|r| r.n_peaks()).sum(),
        })
    }

    /// Replace the results with the records of a results file.
    ///
    /// Frequency range and resolution come from the first record. A truncated
    /// file yields the records before the damaged line.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let records = load_results_file(path)?;
        self.reset();

        if let Some(first) = records.first() {
            self.freq_range = first.freq_range;
            self.freq_res = first.freq_res;
        }
        self.results = records.into_iter().map(|r| r.results).collect();
        log::info!("Loaded {} results", self.results.len());
        Ok(self.results.len())
    }
}

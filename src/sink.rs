//! Append-only JSON-lines storage for fit results.
//!
//! Each fit is one line. The first line additionally carries the frequency
//! range and resolution shared by the whole group. Records are flushed as they
//! are written, so an interrupted run leaves at most one partial trailing
//! line, which the loader skips.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpecParamError};
use crate::results::FitResults;

/// One line of a results file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkRecord {
    #[serde(flatten)]
    pub results: FitResults,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freq_range: Option<(f64, f64)>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freq_res: Option<f64>,
}

/// Writes fit results as JSON lines.
#[derive(Debug)]
pub struct ResultsWriter<W: Write> {
    writer: W,
    written: usize,
}

impl ResultsWriter<BufWriter<File>> {
    /// Create (or truncate) a results file.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> ResultsWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    /// Append one result. Frequency metadata is only stored on the first line.
    pub fn write(&mut self, results: &FitResults, freq_range: (f64, f64), freq_res: f64) -> Result<()> {
        let first = self.written == 0;
        let record = SinkRecord {
            results: results.clone(),
            freq_range: first.then_some(freq_range),
            freq_res: first.then_some(freq_res),
        };
        self.write_record(&record)
    }

    /// Append a prepared record and flush it.
    ///
    /// JSON has no encoding for NaN or infinity, so a record holding a
    /// non-finite value is rejected with `InvalidInput` and nothing is written.
    pub fn write_record(&mut self, record: &SinkRecord) -> Result<()> {
        check_finite(record)?;
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.written += 1;
        Ok(())
    }

    pub fn records_written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn check_finite(record: &SinkRecord) -> Result<()> {
    let results = &record.results;
    let mut values = vec![("error", results.error), ("r_squared", results.r_squared)];
    values.extend(results.background.as_array().iter().map(|&v| ("background", v)));
    values.extend(results.peak_values().into_iter().map(|v| ("peaks", v)));
    if let Some((lo, hi)) = record.freq_range {
        values.extend([("freq_range", lo), ("freq_range", hi)]);
    }
    values.extend(record.freq_res.map(|res| ("freq_res", res)));

    match values.into_iter().find(|(_, value)| !value.is_finite()) {
        Some((field, value)) => Err(SpecParamError::InvalidInput(format!(
            "cannot store non-finite {} value {}",
            field, value
        ))),
        None => Ok(()),
    }
}

/// Read records until the end of input or the first line that does not parse.
///
/// A corrupt or truncated line ends the load without an error; the records
/// before it are returned. I/O failures other than invalid text are errors.
pub fn load_results<R: BufRead>(reader: R) -> Result<Vec<SinkRecord>> {
    let mut records = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(err) if err.kind() == ErrorKind::InvalidData => {
                log::warn!("Stopping at unreadable line {}: {}", line_no + 1, err);
                break;
            }
            Err(err) => return Err(err.into()),
        };

        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<SinkRecord>(&line) {
            Ok(record) => records.push(record),
            Err(err) => {
                log::warn!(
                    "Stopping at corrupt record on line {} after {} records: {}",
                    line_no + 1,
                    records.len(),
                    err
                );
                break;
            }
        }
    }

    Ok(records)
}

/// Open `path` and read its records with [`load_results`].
pub fn load_results_file<P: AsRef<Path>>(path: P) -> Result<Vec<SinkRecord>> {
    let file = File::open(path)?;
    load_results(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SpecParamError;
    use crate::results::{BackgroundParams, PeakParams};

    fn results(slope: f64) -> FitResults {
        FitResults {
            background: BackgroundParams::Fixed { offset: 1.0, slope },
            peaks: vec![PeakParams {
                center: 10.0,
                amplitude: 0.4,
                width: 1.2,
            }],
            error: 0.02,
            r_squared: 0.98,
        }
    }

    #[test]
    fn test_first_record_carries_metadata() {
        let mut writer = ResultsWriter::new(Vec::new());
        writer.write(&results(1.0), (3.0, 40.0), 0.5).unwrap();
        writer.write(&results(2.0), (3.0, 40.0), 0.5).unwrap();
        assert_eq!(writer.records_written(), 2);

        let bytes = writer.into_inner();
        let records = load_results(bytes.as_slice()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].freq_range, Some((3.0, 40.0)));
        assert_eq!(records[0].freq_res, Some(0.5));
        assert_eq!(records[1].freq_range, None);
        assert_eq!(records[1].results, results(2.0));
    }

    #[test]
    fn test_truncated_tail_is_dropped() {
        let mut writer = ResultsWriter::new(Vec::new());
        for slope in [1.0, 1.5, 2.0] {
            writer.write(&results(slope), (1.0, 50.0), 1.0).unwrap();
        }
        let mut bytes = writer.into_inner();
        let cut = bytes.len() - 20;
        bytes.truncate(cut);

        let records = load_results(bytes.as_slice()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].results.background.slope(), 1.5);
    }

    #[test]
    fn test_load_stops_at_garbage_and_invalid_utf8() {
        let mut bytes = Vec::new();
        serde_json::to_writer(
            &mut bytes,
            &SinkRecord {
                results: results(1.0),
                freq_range: None,
                freq_res: None,
            },
        )
        .unwrap();
        bytes.extend_from_slice(b"\n{not json}\n");
        assert_eq!(load_results(bytes.as_slice()).unwrap().len(), 1);

        let mut bytes = b"\xff\xfe\n".to_vec();
        bytes.extend_from_slice(b"{}\n");
        assert!(load_results(bytes.as_slice()).unwrap().is_empty());
    }

    #[test]
    fn test_non_finite_record_is_not_written() {
        let mut writer = ResultsWriter::new(Vec::new());
        writer.write(&results(1.0), (3.0, 40.0), 0.5).unwrap();

        let mut bad = results(1.5);
        bad.r_squared = f64::NAN;
        assert!(matches!(
            writer.write(&bad, (3.0, 40.0), 0.5),
            Err(SpecParamError::InvalidInput(_))
        ));
        bad.r_squared = 0.9;
        bad.peaks[0].width = f64::INFINITY;
        assert!(writer.write(&bad, (3.0, 40.0), 0.5).is_err());

        writer.write(&results(2.0), (3.0, 40.0), 0.5).unwrap();
        assert_eq!(writer.records_written(), 2);

        let records = load_results(writer.into_inner().as_slice()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].results, results(2.0));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_results_file(dir.path().join("missing.jsonl")),
            Err(SpecParamError::IoError(_))
        ));
    }
}

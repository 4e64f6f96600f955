//! Report writers for the run's exported artifacts.
//!
//! Tabular outputs are CSV, one serialized struct per row; the sequence
//! export is the plain paired-line format consumed by alignment tools.

use std::ffi::OsStr;
use std::fs::{create_dir_all, File};
use std::io::Write;
use std::path::Path;

use csv::Writer;
use serde::Serialize;

use crate::error::EpinetError;
use crate::status::StatusCounts;

// Checks that the path is valid. Creates the file and all parent
// directories if they do not exist. Returns the file if successful.
fn create_validated_csv(path: &Path) -> Result<File, EpinetError> {
    match path.extension().and_then(OsStr::to_str) {
        Some("csv") => {
            if let Some(parent) = path.parent() {
                create_dir_all(parent)?;
            }
            let file = File::create(path)?;
            Ok(file)
        }
        _ => Err(EpinetError::EpinetError(
            "Report output files must be CSVs".to_string(),
        )),
    }
}

/// CSV report writer: one serialized struct per row, flushed as written.
pub struct ReportWriter {
    writer: Writer<File>,
}

impl ReportWriter {
    /// Creates the report file, and any missing parent directories, at the
    /// given path.
    ///
    /// # Errors
    /// Returns an `EpinetError` if the path is not a `.csv` path or cannot
    /// be created.
    pub fn create(path: &Path) -> Result<ReportWriter, EpinetError> {
        let file = create_validated_csv(path)?;
        Ok(ReportWriter {
            writer: Writer::from_writer(file),
        })
    }

    /// Writes one row with columns following the items of the row struct.
    ///
    /// # Errors
    /// Returns an `EpinetError` if serialization or the underlying write
    /// fails.
    pub fn send<T: Serialize>(&mut self, row: &T) -> Result<(), EpinetError> {
        self.writer.serialize(row)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// One row of the exported population-count table. Column names match the
/// platform's historical export.
#[derive(Debug, Serialize)]
pub struct CountsRow {
    #[serde(rename = "Time")]
    pub time: String,
    #[serde(rename = "Susceptible")]
    pub susceptible: usize,
    #[serde(rename = "Infected")]
    pub infected: usize,
    #[serde(rename = "Dead")]
    pub dead: usize,
    #[serde(rename = "Recovered")]
    pub recovered: usize,
    #[serde(rename = "Vaccinated")]
    pub vaccinated: usize,
}

impl CountsRow {
    #[must_use]
    pub fn new(time: String, counts: StatusCounts) -> CountsRow {
        CountsRow {
            time,
            susceptible: counts.susceptible,
            infected: counts.infected,
            dead: counts.dead,
            recovered: counts.recovered,
            vaccinated: counts.vaccinated,
        }
    }
}

/// Writes the sequence-record export (paired header/sequence lines).
///
/// # Errors
/// Returns an `EpinetError` if the file cannot be written.
pub fn write_sequence_export(path: &Path, lines: &[String]) -> Result<(), EpinetError> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    for line in lines {
        writeln!(file, "{line}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn rows_round_trip_through_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("epi-data.csv");
        let mut writer = ReportWriter::create(&path).unwrap();
        writer
            .send(&CountsRow::new(
                "03/05/2022 09:00".to_string(),
                StatusCounts {
                    susceptible: 8,
                    infected: 3,
                    dead: 1,
                    recovered: 2,
                    vaccinated: 0,
                },
            ))
            .unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "Time");
        assert_eq!(&headers[2], "Infected");
        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(&record[0], "03/05/2022 09:00");
        assert_eq!(&record[1], "8");
        assert_eq!(&record[3], "1");
    }

    #[test]
    fn parent_directories_are_created() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("output").join("charts").join("sir.csv");
        ReportWriter::create(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn only_csvs_are_allowed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("epi-data.xlsx");
        assert!(ReportWriter::create(&path).is_err());
    }

    #[test]
    fn sequence_export_writes_paired_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("phylo").join("sequences.fasta");
        let lines = vec![">seq3-4".to_string(), "AACA".to_string()];
        write_sequence_export(&path, &lines).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, ">seq3-4\nAACA\n");
    }
}

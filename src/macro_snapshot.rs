//! Macro-economic snapshot from FRED-style time series.
//!
//! Each series is a CSV file with an `observation_date` column and one value
//! column named after the series (`UNRATE`, `DRCLACBS`). Only the latest
//! non-missing observation of each series is used.

use crate::types::FieldValue;
use crate::{PipelineError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use tracing::info;

/// Name of the date column in every series file
pub const DATE_COLUMN: &str = "observation_date";

/// A single dated observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: f64,
}

/// Current macro-economic indicators fed to the model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacroSnapshot {
    pub unemployment_rate: f64,
    pub delinq_rate: f64,
}

impl MacroSnapshot {
    /// Build the snapshot from the two series files
    pub fn load<P: AsRef<Path>>(
        unemployment_path: P,
        unemployment_column: &str,
        delinquency_path: P,
        delinquency_column: &str,
    ) -> Result<Self> {
        let unemployment = latest_observation_in_file(unemployment_path, unemployment_column)?;
        let delinquency = latest_observation_in_file(delinquency_path, delinquency_column)?;

        info!(
            unemployment_rate = unemployment.value,
            unemployment_date = %unemployment.date,
            delinq_rate = delinquency.value,
            delinq_date = %delinquency.date,
            "Macro snapshot loaded"
        );

        Ok(Self {
            unemployment_rate: unemployment.value,
            delinq_rate: delinquency.value,
        })
    }

    /// Snapshot values as model features
    pub fn feature_fields(&self) -> [(&'static str, FieldValue); 2] {
        [
            ("unemployment_rate", FieldValue::Number(self.unemployment_rate)),
            ("delinq_rate", FieldValue::Number(self.delinq_rate)),
        ]
    }
}

/// Latest non-missing observation of `column` in a CSV file
pub fn latest_observation_in_file<P: AsRef<Path>>(path: P, column: &str) -> Result<Observation> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    latest_observation(file, column, &path.display().to_string())
}

/// Latest non-missing observation of `column` in CSV data.
///
/// Rows with an empty value or FRED's `.` placeholder are dropped, the rest
/// are ordered by date, and the last one wins. Rows need not be sorted on
/// disk.
pub fn latest_observation<R: Read>(reader: R, column: &str, origin: &str) -> Result<Observation> {
    let csv_err = |source: csv::Error| PipelineError::Csv {
        origin: origin.to_string(),
        source,
    };
    let missing_column = |name: &str| PipelineError::MissingColumn {
        origin: origin.to_string(),
        column: name.to_string(),
    };

    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers().map_err(csv_err)?.clone();
    let date_idx = headers
        .iter()
        .position(|h| h.trim() == DATE_COLUMN)
        .ok_or_else(|| missing_column(DATE_COLUMN))?;
    let value_idx = headers
        .iter()
        .position(|h| h.trim() == column)
        .ok_or_else(|| missing_column(column))?;

    let mut observations = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(csv_err)?;
        let raw_value = record.get(value_idx).unwrap_or("").trim();
        if raw_value.is_empty() || raw_value == "." {
            continue;
        }

        let invalid = |value: &str, col: &str| PipelineError::InvalidObservation {
            origin: origin.to_string(),
            column: col.to_string(),
            value: value.to_string(),
        };

        let value: f64 = raw_value.parse().map_err(|_| invalid(raw_value, column))?;
        let raw_date = record.get(date_idx).unwrap_or("").trim();
        let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d")
            .map_err(|_| invalid(raw_date, DATE_COLUMN))?;

        observations.push(Observation { date, value });
    }

    observations.sort_by_key(|o| o.date);

    observations
        .last()
        .copied()
        .ok_or_else(|| PipelineError::EmptySeries {
            origin: origin.to_string(),
            column: column.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_latest_observation_sorted() {
        let data = "observation_date,UNRATE\n2024-01-01,3.7\n2024-02-01,3.9\n2024-03-01,3.8\n";

        let obs = latest_observation(data.as_bytes(), "UNRATE", "test").unwrap();
        assert_eq!(obs.date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(obs.value, 3.8);
    }

    #[test]
    fn test_latest_observation_unsorted() {
        let data = "observation_date,UNRATE\n2024-03-01,3.8\n2024-05-01,4.0\n2024-04-01,3.9\n";

        let obs = latest_observation(data.as_bytes(), "UNRATE", "test").unwrap();
        assert_eq!(obs.value, 4.0);
    }

    #[test]
    fn test_missing_values_dropped() {
        let data = "observation_date,DRCLACBS\n2024-01-01,3.1\n2024-04-01,3.3\n2024-07-01,.\n2024-10-01,\n";

        let obs = latest_observation(data.as_bytes(), "DRCLACBS", "test").unwrap();
        assert_eq!(obs.date, NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
        assert_eq!(obs.value, 3.3);
    }

    #[test]
    fn test_empty_series_is_fatal() {
        let data = "observation_date,UNRATE\n2024-01-01,.\n2024-02-01,\n";

        let err = latest_observation(data.as_bytes(), "UNRATE", "test").unwrap_err();
        assert!(matches!(err, PipelineError::EmptySeries { .. }));
        assert!(err.is_service_unavailable());
    }

    #[test]
    fn test_missing_column() {
        let data = "observation_date,UNRATE\n2024-01-01,3.7\n";

        let err = latest_observation(data.as_bytes(), "DRCLACBS", "test").unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn { ref column, .. } if column == "DRCLACBS"));
    }

    #[test]
    fn test_invalid_value() {
        let data = "observation_date,UNRATE\n2024-01-01,high\n";

        let err = latest_observation(data.as_bytes(), "UNRATE", "test").unwrap_err();
        assert!(matches!(err, PipelineError::InvalidObservation { .. }));
    }

    #[test]
    fn test_snapshot_load_from_files() {
        let mut unrate = tempfile::NamedTempFile::new().unwrap();
        writeln!(unrate, "observation_date,UNRATE\n2025-01-01,4.0\n2024-12-01,4.2").unwrap();
        let mut drcl = tempfile::NamedTempFile::new().unwrap();
        writeln!(drcl, "observation_date,DRCLACBS\n2024-07-01,3.2\n2024-10-01,3.0").unwrap();

        let snapshot =
            MacroSnapshot::load(unrate.path(), "UNRATE", drcl.path(), "DRCLACBS").unwrap();

        assert_eq!(
            snapshot,
            MacroSnapshot {
                unemployment_rate: 4.0,
                delinq_rate: 3.0,
            }
        );
    }
}

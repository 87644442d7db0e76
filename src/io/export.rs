//! File exports: backtest metrics, the yearly dataset, and text reports.
//!
//! All writers create missing parent directories.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::YearlyDataset;
use crate::error::AppError;

/// One metrics row: MAE per strategy per target, plus when it was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRow {
    pub max_trend_mae: Option<f64>,
    pub max_structural_mae: Option<f64>,
    pub min_trend_mae: Option<f64>,
    pub min_structural_mae: Option<f64>,
    pub timestamp: String,
}

impl MetricsRow {
    pub fn stamp(at: DateTime<Utc>) -> String {
        at.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

fn ensure_parent(path: &Path) -> Result<(), AppError> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir)
            .map_err(|e| AppError::config(format!("Failed to create directory '{}': {e}", dir.display()))),
        _ => Ok(()),
    }
}

/// Append one metrics row; the header is written only for a new or empty file.
pub fn append_metrics_csv(path: &Path, row: &MetricsRow) -> Result<(), AppError> {
    ensure_parent(path)?;
    let needs_header = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| AppError::config(format!("Failed to open metrics CSV '{}': {e}", path.display())))?;

    let mut writer = csv::WriterBuilder::new().has_headers(needs_header).from_writer(file);
    writer
        .serialize(row)
        .map_err(|e| AppError::config(format!("Failed to write metrics row: {e}")))?;
    writer
        .flush()
        .map_err(|e| AppError::config(format!("Failed to flush metrics CSV: {e}")))?;
    Ok(())
}

pub fn read_metrics_csv(path: &Path) -> Result<Vec<MetricsRow>, AppError> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| AppError::config(format!("Failed to open metrics CSV '{}': {e}", path.display())))?;
    reader
        .deserialize()
        .collect::<Result<Vec<MetricsRow>, _>>()
        .map_err(|e| AppError::config(format!("Invalid metrics CSV: {e}")))
}

/// Write the yearly dataset (`year,avg_tmax,avg_tmin,rolling_tmax,rolling_tmin,days`).
pub fn write_yearly_csv(path: &Path, data: &YearlyDataset) -> Result<(), AppError> {
    ensure_parent(path)?;
    let file = File::create(path)
        .map_err(|e| AppError::config(format!("Failed to create dataset CSV '{}': {e}", path.display())))?;

    let mut writer = csv::Writer::from_writer(file);
    for record in data.records() {
        writer
            .serialize(record)
            .map_err(|e| AppError::config(format!("Failed to write dataset row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::config(format!("Failed to flush dataset CSV: {e}")))?;
    Ok(())
}

/// Write a UTF-8 text file (markdown summary and similar).
pub fn write_text(path: &Path, contents: &str) -> Result<(), AppError> {
    ensure_parent(path)?;
    let mut file = File::create(path)
        .map_err(|e| AppError::config(format!("Failed to create '{}': {e}", path.display())))?;
    file.write_all(contents.as_bytes())
        .map_err(|e| AppError::config(format!("Failed to write '{}': {e}", path.display())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(mae: f64, timestamp: &str) -> MetricsRow {
        MetricsRow {
            max_trend_mae: Some(mae),
            max_structural_mae: Some(mae + 0.1),
            min_trend_mae: None,
            min_structural_mae: Some(0.3),
            timestamp: timestamp.to_string(),
        }
    }

    #[test]
    fn metrics_append_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data/metrics/latest_metrics.csv");

        append_metrics_csv(&path, &row(0.5, "2025-09-01T00:00:00Z")).unwrap();
        append_metrics_csv(&path, &row(0.7, "2025-09-02T00:00:00Z")).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "max_trend_mae,max_structural_mae,min_trend_mae,min_structural_mae,timestamp"
        );
        assert_eq!(text.matches("max_trend_mae").count(), 1);

        let rows = read_metrics_csv(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].max_trend_mae, Some(0.7));
        assert_eq!(rows[0].min_trend_mae, None);
    }

    #[test]
    fn yearly_csv_has_expected_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("yearly.csv");
        let data = YearlyDataset::from_means(&[(2020, 27.0, 16.0, 31), (2021, 28.0, 17.0, 30)]).unwrap();

        write_yearly_csv(&path, &data).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("year,avg_tmax,avg_tmin,rolling_tmax,rolling_tmin,days")
        );
        assert_eq!(lines.nth(1), Some("2021,28.0,17.0,27.5,16.5,30"));
    }

    #[test]
    fn timestamp_is_rfc3339() {
        let at = DateTime::parse_from_rfc3339("2025-08-31T12:30:00Z").unwrap().with_timezone(&Utc);
        assert_eq!(MetricsRow::stamp(at), "2025-08-31T12:30:00Z");
    }
}

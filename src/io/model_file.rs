//! Saved model JSON.
//!
//! A model file is the explicit fitted state (`ModelParams`) plus enough
//! metadata to tell what it was trained on. It is everything `predict` needs.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::TargetColumn;
use crate::error::AppError;
use crate::models::ModelParams;

pub const TOOL_NAME: &str = "wx";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFile {
    pub tool: String,
    pub created_at: DateTime<Utc>,
    pub target: TargetColumn,
    pub month: u32,
    pub train_start_year: i32,
    pub train_end_year: i32,
    pub model: ModelParams,
}

/// `<dir>/ensemble_max.json` or `<dir>/ensemble_min.json`.
pub fn model_path(dir: &Path, target: TargetColumn) -> PathBuf {
    dir.join(format!("ensemble_{}.json", target.short_name()))
}

pub fn write_model_json(path: &Path, model: &ModelFile) -> Result<(), AppError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .map_err(|e| AppError::config(format!("Failed to create directory '{}': {e}", dir.display())))?;
    }
    let file = File::create(path)
        .map_err(|e| AppError::config(format!("Failed to create model JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, model)
        .map_err(|e| AppError::config(format!("Failed to write model JSON: {e}")))?;
    Ok(())
}

pub fn read_model_json(path: &Path) -> Result<ModelFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::config(format!("Failed to open model JSON '{}': {e}", path.display())))?;
    let model: ModelFile =
        serde_json::from_reader(file).map_err(|e| AppError::config(format!("Invalid model JSON: {e}")))?;
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TrendModelType, TrendParams};

    #[test]
    fn model_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = model_path(&dir.path().join("models"), TargetColumn::AvgLow);
        assert!(path.ends_with("models/ensemble_min.json"));

        let file = ModelFile {
            tool: TOOL_NAME.to_string(),
            created_at: Utc::now(),
            target: TargetColumn::AvgLow,
            month: 8,
            train_start_year: 2010,
            train_end_year: 2025,
            model: ModelParams::Trend(TrendParams {
                model_type: TrendModelType::Linear,
                intercept: 1.0,
                slope: 0.01,
            }),
        };
        write_model_json(&path, &file).unwrap();
        let back = read_model_json(&path).unwrap();
        assert_eq!(back.target, TargetColumn::AvgLow);
        assert_eq!(back.model, file.model);

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"target\": \"avg_tmin\""));
    }

    #[test]
    fn garbage_is_rejected_with_exit_code_2() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(read_model_json(&path).unwrap_err().exit_code(), 2);
    }
}

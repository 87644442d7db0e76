//! JSON run configuration.

use std::fs::File;
use std::path::Path;

use crate::domain::ConfigFile;
use crate::error::AppError;

/// Read a config file; unknown keys are rejected.
pub fn read_config_json(path: &Path) -> Result<ConfigFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::config(format!("Failed to open config '{}': {e}", path.display())))?;
    serde_json::from_reader(file).map_err(|e| AppError::config(format!("Invalid config '{}': {e}", path.display())))
}

//! Error types.
//!
//! - `ForecastError` is raised by the forecasting core (strategies, backtester,
//!   weight selection).
//! - `AppError` is what the binary reports: a message plus a process exit code.

use thiserror::Error;

/// Invalid configuration, CLI input, or local file I/O.
pub const EXIT_CONFIG: u8 = 2;
/// Not enough usable history to produce a meaningful result.
pub const EXIT_INSUFFICIENT_DATA: u8 = 3;
/// The weather archive could not be read after exhausting retries.
pub const EXIT_UPSTREAM: u8 = 4;
/// Model sequencing or numerical failure.
pub const EXIT_MODEL: u8 = 5;

/// Errors raised by the forecasting core.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    /// Unrecognized strategy option or invalid setting.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// `predict` (or serialization) called before `train`.
    #[error("{model} must be trained before use")]
    NotTrained { model: String },

    /// Too little history for the requested operation.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// Input violates the dataset contract (e.g. duplicate years).
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Least-squares solve failed or produced non-finite values.
    #[error("numerical error: {0}")]
    Numerical(String),
}

impl ForecastError {
    pub fn exit_code(&self) -> u8 {
        match self {
            ForecastError::Configuration(_) | ForecastError::InvalidData(_) => EXIT_CONFIG,
            ForecastError::InsufficientData(_) => EXIT_INSUFFICIENT_DATA,
            ForecastError::NotTrained { .. } | ForecastError::Numerical(_) => EXIT_MODEL,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(EXIT_CONFIG, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(EXIT_UPSTREAM, message)
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<ForecastError> for AppError {
    fn from(err: ForecastError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

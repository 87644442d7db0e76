//! Forecasting strategies.
//!
//! Every strategy implements [`Forecaster`]: train on a yearly dataset for one
//! target column, then predict a single value for any year. [`Strategy`] is the
//! closed set the pipeline works with, so ensembles can hold heterogeneous
//! members and saved models can be rebuilt from [`ModelParams`].

pub mod ensemble;
pub mod options;
pub mod structural;
pub mod trend;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{TargetColumn, YearlyDataset};
use crate::error::ForecastError;

pub use ensemble::*;
pub use options::*;
pub use structural::*;
pub use trend::*;

pub trait Forecaster {
    /// Display name used in reports and logs.
    fn name(&self) -> &str;

    /// Fit internal state from every row of `data`.
    fn train(&mut self, data: &YearlyDataset, target: TargetColumn) -> Result<(), ForecastError>;

    /// Point estimate for `year`; extrapolates beyond the training range.
    fn predict(&self, year: i32) -> Result<f64, ForecastError>;

    fn is_trained(&self) -> bool;

    /// Serializable fitted state. Fails with `NotTrained` before `train`.
    fn to_params(&self) -> Result<ModelParams, ForecastError>;
}

/// Persisted fitted state, tagged by strategy kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelParams {
    Trend(TrendParams),
    Structural(StructuralParams),
    Ensemble(EnsembleParams),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Trend,
    Structural,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 2] = [StrategyKind::Trend, StrategyKind::Structural];

    pub fn display_name(self) -> &'static str {
        match self {
            StrategyKind::Trend => TrendForecaster::NAME,
            StrategyKind::Structural => StructuralForecaster::NAME,
        }
    }

    /// Key used in metric column names.
    pub fn key(self) -> &'static str {
        match self {
            StrategyKind::Trend => "trend",
            StrategyKind::Structural => "structural",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for StrategyKind {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trend" | "regression" => Ok(StrategyKind::Trend),
            "structural" | "prophet" => Ok(StrategyKind::Structural),
            other => Err(ForecastError::Configuration(format!(
                "unknown strategy '{other}' (expected trend or structural)"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Strategy {
    Trend(TrendForecaster),
    Structural(StructuralForecaster),
    Ensemble(EnsembleForecaster),
}

impl Strategy {
    /// Construct an untrained single strategy, validating its options.
    pub fn build(kind: StrategyKind, options: &StrategyOptions) -> Result<Self, ForecastError> {
        match kind {
            StrategyKind::Trend => TrendForecaster::from_options(options).map(Strategy::Trend),
            StrategyKind::Structural => StructuralForecaster::from_options(options).map(Strategy::Structural),
        }
    }

    /// Rebuild a trained strategy from persisted params.
    pub fn from_params(params: ModelParams) -> Result<Self, ForecastError> {
        match params {
            ModelParams::Trend(p) => Ok(Strategy::Trend(TrendForecaster::from_params(p))),
            ModelParams::Structural(p) => Ok(Strategy::Structural(StructuralForecaster::from_params(p))),
            ModelParams::Ensemble(p) => EnsembleForecaster::from_params(p).map(Strategy::Ensemble),
        }
    }

    fn inner(&self) -> &dyn Forecaster {
        match self {
            Strategy::Trend(m) => m,
            Strategy::Structural(m) => m,
            Strategy::Ensemble(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Forecaster {
        match self {
            Strategy::Trend(m) => m,
            Strategy::Structural(m) => m,
            Strategy::Ensemble(m) => m,
        }
    }
}

impl Forecaster for Strategy {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn train(&mut self, data: &YearlyDataset, target: TargetColumn) -> Result<(), ForecastError> {
        self.inner_mut().train(data, target)
    }

    fn predict(&self, year: i32) -> Result<f64, ForecastError> {
        self.inner().predict(year)
    }

    fn is_trained(&self) -> bool {
        self.inner().is_trained()
    }

    fn to_params(&self) -> Result<ModelParams, ForecastError> {
        self.inner().to_params()
    }
}

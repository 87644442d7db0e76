//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - observation types (`DailyObservation`, `YearlyRecord`, `YearlyDataset`)
//! - backtest and blending outputs (`BacktestRecord`, `EnsembleWeights`)
//! - the resolved run configuration (`RunConfig`)

pub mod config;
pub mod types;

pub use config::*;
pub use types::*;

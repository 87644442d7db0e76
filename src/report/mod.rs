//! Reporting: the results table, headline banner and markdown summary.

pub mod format;

pub use format::*;

use crate::domain::BacktestRecord;

/// One strategy's backtest records for both targets, in test-year order.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelBacktests {
    pub model: String,
    pub high: Vec<BacktestRecord>,
    pub low: Vec<BacktestRecord>,
}

impl ModelBacktests {
    pub fn new(model: impl Into<String>, high: Vec<BacktestRecord>, low: Vec<BacktestRecord>) -> Self {
        Self {
            model: model.into(),
            high,
            low,
        }
    }

    fn high_for(&self, year: i32) -> Option<&BacktestRecord> {
        self.high.iter().find(|r| r.year == year)
    }

    fn low_for(&self, year: i32) -> Option<&BacktestRecord> {
        self.low.iter().find(|r| r.year == year)
    }
}

/// A point forecast for both targets.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRow {
    pub model: String,
    pub year: i32,
    pub high: f64,
    pub low: f64,
}

//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - passed by reference through backtesting and training
//! - exported to CSV/JSON
//! - reloaded later for predictions

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ForecastError;

/// Trailing window (rows) for the descriptive rolling means.
pub const ROLLING_WINDOW: usize = 5;

/// Weight given to the strategy with the lower backtest error.
pub const DEFAULT_FAVORED_WEIGHT: f64 = 0.6;
/// Weight given to the other strategy.
pub const DEFAULT_UNFAVORED_WEIGHT: f64 = 0.4;

/// A named point whose daily observations contribute to the national average.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
        }
    }
}

/// One day of (nationally averaged) temperatures in °C.
///
/// Missing values stay `None` and are dropped during cleaning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyObservation {
    pub date: NaiveDate,
    pub tmax: Option<f64>,
    pub tmin: Option<f64>,
}

/// Which yearly average a strategy is trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetColumn {
    #[serde(rename = "avg_tmax")]
    AvgHigh,
    #[serde(rename = "avg_tmin")]
    AvgLow,
}

impl TargetColumn {
    pub const ALL: [TargetColumn; 2] = [TargetColumn::AvgHigh, TargetColumn::AvgLow];

    /// Column name in datasets and exports.
    pub fn column_name(self) -> &'static str {
        match self {
            TargetColumn::AvgHigh => "avg_tmax",
            TargetColumn::AvgLow => "avg_tmin",
        }
    }

    /// Prefix used for metric keys and model file names.
    pub fn short_name(self) -> &'static str {
        match self {
            TargetColumn::AvgHigh => "max",
            TargetColumn::AvgLow => "min",
        }
    }

    /// Human-readable label for terminal output.
    pub fn label(self) -> &'static str {
        match self {
            TargetColumn::AvgHigh => "Max",
            TargetColumn::AvgLow => "Min",
        }
    }
}

impl fmt::Display for TargetColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

impl FromStr for TargetColumn {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "avg_tmax" | "tmax" | "max" | "high" => Ok(TargetColumn::AvgHigh),
            "avg_tmin" | "tmin" | "min" | "low" => Ok(TargetColumn::AvgLow),
            other => Err(ForecastError::Configuration(format!(
                "unknown target column '{other}' (expected avg_tmax or avg_tmin)"
            ))),
        }
    }
}

/// One row of the observation store: a year and its monthly averages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyRecord {
    pub year: i32,
    #[serde(rename = "avg_tmax")]
    pub avg_high: f64,
    #[serde(rename = "avg_tmin")]
    pub avg_low: f64,
    #[serde(rename = "rolling_tmax")]
    pub rolling_high: f64,
    #[serde(rename = "rolling_tmin")]
    pub rolling_low: f64,
    /// Number of daily observations behind the averages.
    pub days: usize,
}

impl YearlyRecord {
    pub fn value(&self, target: TargetColumn) -> f64 {
        match target {
            TargetColumn::AvgHigh => self.avg_high,
            TargetColumn::AvgLow => self.avg_low,
        }
    }
}

/// Yearly observations ordered by ascending year, one row per year.
///
/// Years without enough coverage are simply absent; nothing is defaulted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct YearlyDataset {
    records: Vec<YearlyRecord>,
}

impl YearlyDataset {
    /// Build a dataset, sorting by year and rejecting duplicate years.
    pub fn new(mut records: Vec<YearlyRecord>) -> Result<Self, ForecastError> {
        records.sort_by_key(|r| r.year);
        if let Some(pair) = records.windows(2).find(|w| w[0].year == w[1].year) {
            return Err(ForecastError::InvalidData(format!(
                "year {} appears more than once",
                pair[0].year
            )));
        }
        Ok(Self { records })
    }

    /// Build a dataset from `(year, avg_high, avg_low, days)` rows, filling the
    /// trailing rolling means (window 5, minimum periods 1) over rows.
    pub fn from_means(rows: &[(i32, f64, f64, usize)]) -> Result<Self, ForecastError> {
        let mut sorted = rows.to_vec();
        sorted.sort_by_key(|r| r.0);

        let highs: Vec<f64> = sorted.iter().map(|r| r.1).collect();
        let lows: Vec<f64> = sorted.iter().map(|r| r.2).collect();
        let rolling_high = rolling_mean(&highs, ROLLING_WINDOW);
        let rolling_low = rolling_mean(&lows, ROLLING_WINDOW);

        let records = sorted
            .iter()
            .enumerate()
            .map(|(i, &(year, avg_high, avg_low, days))| YearlyRecord {
                year,
                avg_high,
                avg_low,
                rolling_high: rolling_high[i],
                rolling_low: rolling_low[i],
                days,
            })
            .collect();
        Self::new(records)
    }

    pub fn records(&self) -> &[YearlyRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first_year(&self) -> Option<i32> {
        self.records.first().map(|r| r.year)
    }

    pub fn last_year(&self) -> Option<i32> {
        self.records.last().map(|r| r.year)
    }

    pub fn years(&self) -> impl Iterator<Item = i32> + '_ {
        self.records.iter().map(|r| r.year)
    }

    pub fn get(&self, year: i32) -> Option<&YearlyRecord> {
        self.records
            .binary_search_by_key(&year, |r| r.year)
            .ok()
            .map(|idx| &self.records[idx])
    }

    /// All rows strictly before `year` (the expanding training window).
    pub fn before(&self, year: i32) -> YearlyDataset {
        let end = self.records.partition_point(|r| r.year < year);
        YearlyDataset {
            records: self.records[..end].to_vec(),
        }
    }

    /// `(year, value)` pairs for a target column, in year order.
    pub fn series(&self, target: TargetColumn) -> Vec<(f64, f64)> {
        self.records
            .iter()
            .map(|r| (r.year as f64, r.value(target)))
            .collect()
    }
}

fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let slice = &values[start..=i];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

/// Outcome of one backtest trial (one held-out year).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BacktestRecord {
    pub year: i32,
    pub actual: f64,
    pub predicted: f64,
    pub error: f64,
}

impl BacktestRecord {
    pub fn new(year: i32, actual: f64, predicted: f64) -> Self {
        Self {
            year,
            actual,
            predicted,
            error: (actual - predicted).abs(),
        }
    }
}

/// Non-negative blending weights, one per ensemble member.
///
/// Weights are normalized when combining, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct EnsembleWeights(Vec<f64>);

impl EnsembleWeights {
    pub fn new(values: Vec<f64>) -> Result<Self, ForecastError> {
        if values.is_empty() {
            return Err(ForecastError::Configuration("ensemble weights are empty".into()));
        }
        if values.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ForecastError::Configuration(format!(
                "ensemble weights must be finite and non-negative, got {values:?}"
            )));
        }
        if values.iter().sum::<f64>() <= 0.0 {
            return Err(ForecastError::Configuration("ensemble weights sum to zero".into()));
        }
        Ok(Self(values))
    }

    pub fn equal(n: usize) -> Self {
        let n = n.max(1);
        Self(vec![1.0 / n as f64; n])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }
}

impl TryFrom<Vec<f64>> for EnsembleWeights {
    type Error = ForecastError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        EnsembleWeights::new(values)
    }
}

impl From<EnsembleWeights> for Vec<f64> {
    fn from(weights: EnsembleWeights) -> Self {
        weights.0
    }
}

/// The fixed blending rule: the lower-error strategy gets `favored`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightPolicy {
    pub favored: f64,
    pub unfavored: f64,
}

impl Default for WeightPolicy {
    fn default() -> Self {
        Self {
            favored: DEFAULT_FAVORED_WEIGHT,
            unfavored: DEFAULT_UNFAVORED_WEIGHT,
        }
    }
}

impl WeightPolicy {
    /// Weights must be usable ensemble weights, and the lower-error
    /// strategy can never get the smaller share.
    pub fn validate(&self) -> Result<(), ForecastError> {
        EnsembleWeights::new(vec![self.favored, self.unfavored])?;
        if self.favored < self.unfavored {
            return Err(ForecastError::Configuration(format!(
                "favored weight {} must not be below unfavored weight {}",
                self.favored, self.unfavored
            )));
        }
        Ok(())
    }
}

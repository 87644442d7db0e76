//! Trend regression strategy: a straight line through (year, value).
//!
//! The default estimator is Theil–Sen so that a minority of anomalous years
//! cannot drag the line. Plain least squares and a Huber M-estimator are
//! available through the `model_type` option.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{TargetColumn, YearlyDataset};
use crate::error::ForecastError;
use crate::math::{huber_reweight, theil_sen, weighted_line_fit};
use crate::models::{Forecaster, ModelParams, StrategyOptions};

const KNOWN_OPTIONS: [&str; 3] = ["model_type", "huber_k", "huber_iters"];

const DEFAULT_HUBER_K: f64 = 1.5;
const DEFAULT_HUBER_ITERS: usize = 10;

/// Line estimator used by the trend strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendModelType {
    /// Ordinary least squares.
    Linear,
    /// Median of pairwise slopes.
    #[default]
    TheilSen,
    /// Huber M-estimator via iteratively reweighted least squares.
    Huber,
}

impl FromStr for TrendModelType {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" | "ols" => Ok(TrendModelType::Linear),
            "theilsen" | "theil-sen" | "robust" => Ok(TrendModelType::TheilSen),
            "huber" => Ok(TrendModelType::Huber),
            other => Err(ForecastError::Configuration(format!(
                "unknown trend model_type '{other}' (expected linear, theilsen/robust, or huber)"
            ))),
        }
    }
}

impl fmt::Display for TrendModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrendModelType::Linear => "linear",
            TrendModelType::TheilSen => "theilsen",
            TrendModelType::Huber => "huber",
        };
        f.write_str(s)
    }
}

/// Fitted line coefficients (the trend strategy's serialized state).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendParams {
    pub model_type: TrendModelType,
    pub intercept: f64,
    pub slope: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendForecaster {
    model_type: TrendModelType,
    huber_k: f64,
    huber_iters: usize,
    fit: Option<TrendParams>,
}

impl Default for TrendForecaster {
    fn default() -> Self {
        Self::new(TrendModelType::default())
    }
}

impl TrendForecaster {
    pub const NAME: &'static str = "Trend";

    pub fn new(model_type: TrendModelType) -> Self {
        Self {
            model_type,
            huber_k: DEFAULT_HUBER_K,
            huber_iters: DEFAULT_HUBER_ITERS,
            fit: None,
        }
    }

    /// Build from options: `model_type`, `huber_k`, `huber_iters`.
    pub fn from_options(options: &StrategyOptions) -> Result<Self, ForecastError> {
        options.ensure_known("trend", &KNOWN_OPTIONS)?;

        let model_type = match options.get("model_type") {
            Some(raw) => raw.parse()?,
            None => TrendModelType::default(),
        };
        let mut out = Self::new(model_type);

        if let Some(k) = options.parse_f64("huber_k")? {
            if k <= 0.0 {
                return Err(ForecastError::Configuration(format!("huber_k must be > 0, got {k}")));
            }
            out.huber_k = k;
        }
        if let Some(iters) = options.parse_usize("huber_iters")? {
            out.huber_iters = iters;
        }
        Ok(out)
    }

    pub fn from_params(params: TrendParams) -> Self {
        let mut out = Self::new(params.model_type);
        out.fit = Some(params);
        out
    }

    pub fn model_type(&self) -> TrendModelType {
        self.model_type
    }

    pub fn params(&self) -> Option<&TrendParams> {
        self.fit.as_ref()
    }

    fn fit_line(&self, x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
        if x.len() == 1 {
            return Some((y[0], 0.0));
        }
        let ones = vec![1.0; x.len()];
        match self.model_type {
            TrendModelType::Linear => weighted_line_fit(x, y, &ones),
            TrendModelType::TheilSen => theil_sen(x, y),
            TrendModelType::Huber => {
                let mut line = weighted_line_fit(x, y, &ones)?;
                for _ in 0..self.huber_iters {
                    let residuals: Vec<f64> = x
                        .iter()
                        .zip(y)
                        .map(|(&xi, &yi)| yi - (line.0 + line.1 * xi))
                        .collect();
                    let w = huber_reweight(&ones, &residuals, self.huber_k);
                    line = weighted_line_fit(x, y, &w)?;
                }
                Some(line)
            }
        }
    }
}

impl Forecaster for TrendForecaster {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn train(&mut self, data: &YearlyDataset, target: TargetColumn) -> Result<(), ForecastError> {
        let (x, y): (Vec<f64>, Vec<f64>) = data.series(target).into_iter().unzip();
        if x.is_empty() {
            return Err(ForecastError::InsufficientData(
                "trend strategy needs at least one training year".into(),
            ));
        }

        let (intercept, slope) = self.fit_line(&x, &y).ok_or_else(|| {
            ForecastError::Numerical(format!("{} line fit failed on {target}", self.model_type))
        })?;

        debug!(
            model_type = %self.model_type,
            %target,
            n = x.len(),
            slope,
            "trend fitted"
        );

        self.fit = Some(TrendParams {
            model_type: self.model_type,
            intercept,
            slope,
        });
        Ok(())
    }

    fn predict(&self, year: i32) -> Result<f64, ForecastError> {
        let fit = self.fit.as_ref().ok_or_else(|| ForecastError::NotTrained {
            model: Self::NAME.to_string(),
        })?;
        Ok(fit.intercept + fit.slope * year as f64)
    }

    fn is_trained(&self) -> bool {
        self.fit.is_some()
    }

    fn to_params(&self) -> Result<ModelParams, ForecastError> {
        self.fit
            .map(ModelParams::Trend)
            .ok_or_else(|| ForecastError::NotTrained {
                model: Self::NAME.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_dataset(years: std::ops::Range<i32>, start: f64, step: f64) -> YearlyDataset {
        let rows: Vec<(i32, f64, f64, usize)> = years
            .map(|y| {
                let v = start + step * (y - 2010) as f64;
                (y, v, v - 10.0, 31)
            })
            .collect();
        YearlyDataset::from_means(&rows).unwrap()
    }

    #[test]
    fn theilsen_extrapolates_trend() {
        let data = YearlyDataset::from_means(&[
            (2020, 25.0, 15.0, 31),
            (2021, 25.5, 15.0, 31),
            (2022, 26.0, 15.0, 31),
            (2023, 26.5, 15.0, 31),
        ])
        .unwrap();

        let mut model = TrendForecaster::default();
        model.train(&data, TargetColumn::AvgHigh).unwrap();
        let pred = model.predict(2024).unwrap();
        assert!(26.0 < pred && pred < 28.0);
        assert!((pred - 27.0).abs() < 1e-9);
    }

    #[test]
    fn increasing_series_forecast_not_below_last_value() {
        let data = linear_dataset(2010..2022, 20.0, 0.15);
        for model_type in [TrendModelType::Linear, TrendModelType::TheilSen, TrendModelType::Huber] {
            let mut model = TrendForecaster::new(model_type);
            model.train(&data, TargetColumn::AvgHigh).unwrap();
            let last = data.records().last().unwrap().avg_high;
            for year in 2022..2030 {
                assert!(model.predict(year).unwrap() >= last - 1e-9, "{model_type}");
            }
        }
    }

    #[test]
    fn theilsen_resists_anomalous_year() {
        let rows: Vec<(i32, f64, f64, usize)> = (2010..2024)
            .map(|y| {
                let mut v = 20.0 + 0.1 * (y - 2010) as f64;
                if y == 2021 {
                    v += 6.0;
                }
                (y, v, 10.0, 31)
            })
            .collect();
        let data = YearlyDataset::from_means(&rows).unwrap();

        let mut robust = TrendForecaster::new(TrendModelType::TheilSen);
        robust.train(&data, TargetColumn::AvgHigh).unwrap();
        let mut ols = TrendForecaster::new(TrendModelType::Linear);
        ols.train(&data, TargetColumn::AvgHigh).unwrap();

        let truth = 21.6;
        let robust_err = (robust.predict(2026).unwrap() - truth).abs();
        let ols_err = (ols.predict(2026).unwrap() - truth).abs();
        assert!(robust_err < 0.05, "robust error {robust_err}");
        assert!(ols_err > robust_err);
    }

    #[test]
    fn predict_before_train_fails() {
        let model = TrendForecaster::default();
        assert!(matches!(model.predict(2026), Err(ForecastError::NotTrained { .. })));
        assert!(model.to_params().is_err());
    }

    #[test]
    fn predict_is_idempotent() {
        let data = linear_dataset(2010..2020, 20.0, 0.2);
        let mut model = TrendForecaster::default();
        model.train(&data, TargetColumn::AvgLow).unwrap();
        let a = model.predict(2027).unwrap();
        let b = model.predict(2027).unwrap();
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn unknown_model_type_is_configuration_error() {
        let opts = StrategyOptions::new().with("model_type", "lasso");
        assert!(matches!(
            TrendForecaster::from_options(&opts),
            Err(ForecastError::Configuration(_))
        ));

        let opts = StrategyOptions::new().with("model_type", "robust");
        assert_eq!(
            TrendForecaster::from_options(&opts).unwrap().model_type(),
            TrendModelType::TheilSen
        );
    }

    #[test]
    fn empty_training_set_is_insufficient() {
        let mut model = TrendForecaster::default();
        let err = model.train(&YearlyDataset::default(), TargetColumn::AvgHigh).unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientData(_)));
    }
}

//! Bayesian structural strategy: a piecewise-linear trend with changepoints.
//!
//! Model (in scaled units, `t` in `[0, 1]` over the training span):
//!
//! ```text
//! y(t) = m + k t + Σ_j δ_j (t - s_j)_+ + ε,   ε ~ N(0, σ²)
//! m, k ~ N(0, 5)     δ_j ~ Laplace(0, τ)     σ ~ HalfNormal(0.5)
//! ```
//!
//! The MAP estimate is found by coordinate steps that are each closed-form:
//!
//! - `(m, k, δ)` given `σ`: augmented least squares. Data rows are scaled by
//!   `1/σ`, and each prior contributes one pseudo-observation row with target 0.
//!   The Laplace prior is majorized by a quadratic around the previous `δ`
//!   (IRLS), so the `δ_j` row scale is `1/sqrt(τ |δ_j|)`.
//! - `σ` given the residuals: the positive root of `4σ⁴ + nσ² - RSS = 0`.
//!
//! There is no sub-yearly seasonality: the series is one value per year.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::domain::{TargetColumn, YearlyDataset};
use crate::error::ForecastError;
use crate::math::{eval_trend, fill_trend_row, solve_least_squares};
use crate::models::{Forecaster, ModelParams, StrategyOptions};

const KNOWN_OPTIONS: [&str; 3] = ["changepoint_prior_scale", "n_changepoints", "changepoint_range"];

const DEFAULT_CHANGEPOINT_PRIOR_SCALE: f64 = 0.05;
const DEFAULT_N_CHANGEPOINTS: usize = 25;
const DEFAULT_CHANGEPOINT_RANGE: f64 = 0.8;

/// Prior standard deviation of the offset `m` and base rate `k`.
const LEVEL_PRIOR_SCALE: f64 = 5.0;
/// Scale of the half-normal prior on `σ`.
const SIGMA_PRIOR_SCALE: f64 = 0.5;
const SIGMA_FLOOR: f64 = 1e-4;
const DELTA_EPS: f64 = 1e-8;
const MAX_ITERS: usize = 200;
const TOL: f64 = 1e-10;

/// Fitted state of the structural strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralParams {
    pub start_year: i32,
    pub year_span: f64,
    pub y_scale: f64,
    pub k: f64,
    pub m: f64,
    pub changepoints: Vec<f64>,
    pub deltas: Vec<f64>,
    pub sigma_obs: f64,
}

impl StructuralParams {
    fn scaled_time(&self, year: i32) -> f64 {
        (year - self.start_year) as f64 / self.year_span
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructuralForecaster {
    changepoint_prior_scale: f64,
    n_changepoints: usize,
    changepoint_range: f64,
    fit: Option<StructuralParams>,
}

impl Default for StructuralForecaster {
    fn default() -> Self {
        Self {
            changepoint_prior_scale: DEFAULT_CHANGEPOINT_PRIOR_SCALE,
            n_changepoints: DEFAULT_N_CHANGEPOINTS,
            changepoint_range: DEFAULT_CHANGEPOINT_RANGE,
            fit: None,
        }
    }
}

impl StructuralForecaster {
    pub const NAME: &'static str = "Structural";

    /// Build from options: `changepoint_prior_scale`, `n_changepoints`, `changepoint_range`.
    pub fn from_options(options: &StrategyOptions) -> Result<Self, ForecastError> {
        options.ensure_known("structural", &KNOWN_OPTIONS)?;
        let mut out = Self::default();

        if let Some(tau) = options.parse_f64("changepoint_prior_scale")? {
            if tau <= 0.0 {
                return Err(ForecastError::Configuration(format!(
                    "changepoint_prior_scale must be > 0, got {tau}"
                )));
            }
            out.changepoint_prior_scale = tau;
        }
        if let Some(n) = options.parse_usize("n_changepoints")? {
            out.n_changepoints = n;
        }
        if let Some(range) = options.parse_f64("changepoint_range")? {
            if !(range > 0.0 && range <= 1.0) {
                return Err(ForecastError::Configuration(format!(
                    "changepoint_range must be in (0, 1], got {range}"
                )));
            }
            out.changepoint_range = range;
        }
        Ok(out)
    }

    pub fn from_params(params: StructuralParams) -> Self {
        Self {
            fit: Some(params),
            ..Self::default()
        }
    }

    pub fn changepoint_prior_scale(&self) -> f64 {
        self.changepoint_prior_scale
    }

    pub fn params(&self) -> Option<&StructuralParams> {
        self.fit.as_ref()
    }

    fn fit_map(&self, t: &[f64], y: &[f64], changepoints: &[f64]) -> Result<(DVector<f64>, f64), ForecastError> {
        let n = t.len();
        let j = changepoints.len();
        let p = 2 + j;
        let rows = n + p;
        let tau = self.changepoint_prior_scale;

        let mut design = DMatrix::<f64>::zeros(n, p);
        let mut row = vec![0.0; p];
        for (i, &ti) in t.iter().enumerate() {
            fill_trend_row(ti, changepoints, &mut row);
            for (c, v) in row.iter().enumerate() {
                design[(i, c)] = *v;
            }
        }
        let yv = DVector::from_column_slice(y);

        let mut sigma = SIGMA_PRIOR_SCALE;
        let mut delta_scales = vec![tau; j];
        let mut beta = DVector::<f64>::zeros(p);

        for iter in 0..MAX_ITERS {
            let mut xa = DMatrix::<f64>::zeros(rows, p);
            let mut ya = DVector::<f64>::zeros(rows);
            for i in 0..n {
                for c in 0..p {
                    xa[(i, c)] = design[(i, c)] / sigma;
                }
                ya[i] = yv[i] / sigma;
            }
            xa[(n, 0)] = 1.0 / LEVEL_PRIOR_SCALE;
            xa[(n + 1, 1)] = 1.0 / LEVEL_PRIOR_SCALE;
            for (d, &scale) in delta_scales.iter().enumerate() {
                xa[(n + 2 + d, 2 + d)] = 1.0 / scale;
            }

            let next = solve_least_squares(&xa, &ya)
                .ok_or_else(|| ForecastError::Numerical("structural least squares solve failed".into()))?;

            let resid = &yv - &design * &next;
            let rss = resid.norm_squared();
            let nf = n as f64;
            let next_sigma = (2.0 * rss / (nf + (nf * nf + 16.0 * rss).sqrt()))
                .sqrt()
                .max(SIGMA_FLOOR);

            let beta_change = (&next - &beta).amax();
            let sigma_change = (next_sigma - sigma).abs();
            beta = next;
            sigma = next_sigma;

            for (d, scale) in delta_scales.iter_mut().enumerate() {
                *scale = (tau * beta[2 + d].abs().max(DELTA_EPS)).sqrt();
            }

            trace!(iter, sigma, beta_change, "structural MAP step");
            if iter > 0 && beta_change < TOL && sigma_change < TOL {
                break;
            }
        }

        if !(beta.iter().all(|v| v.is_finite()) && sigma.is_finite()) {
            return Err(ForecastError::Numerical("structural fit produced non-finite values".into()));
        }
        Ok((beta, sigma))
    }
}

/// Changepoint locations: evenly spaced row positions within the first
/// `range` share of history, skipping the first row.
pub fn changepoint_positions(t: &[f64], n_changepoints: usize, range: f64) -> Vec<f64> {
    let hist_size = (t.len() as f64 * range).floor() as usize;
    let count = n_changepoints.min(hist_size.saturating_sub(1));
    if count == 0 {
        return Vec::new();
    }
    let last = (hist_size - 1) as f64;
    (1..=count)
        .map(|i| {
            let idx = (i as f64 * last / count as f64).round_ties_even() as usize;
            t[idx.min(t.len() - 1)]
        })
        .collect()
}

impl Forecaster for StructuralForecaster {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn train(&mut self, data: &YearlyDataset, target: TargetColumn) -> Result<(), ForecastError> {
        let (first, last) = match (data.first_year(), data.last_year()) {
            (Some(f), Some(l)) if data.len() >= 2 => (f, l),
            _ => {
                return Err(ForecastError::InsufficientData(format!(
                    "structural strategy needs at least 2 training years, got {}",
                    data.len()
                )));
            }
        };

        let year_span = (last - first) as f64;
        let series = data.series(target);
        let y_scale = series
            .iter()
            .map(|(_, v)| v.abs())
            .fold(0.0_f64, f64::max);
        let y_scale = if y_scale > 0.0 { y_scale } else { 1.0 };

        let t: Vec<f64> = series.iter().map(|(x, _)| (x - first as f64) / year_span).collect();
        let y: Vec<f64> = series.iter().map(|(_, v)| v / y_scale).collect();

        let changepoints = changepoint_positions(&t, self.n_changepoints, self.changepoint_range);
        let (beta, sigma) = self.fit_map(&t, &y, &changepoints)?;

        debug!(
            %target,
            n = t.len(),
            changepoints = changepoints.len(),
            sigma,
            "structural fitted"
        );

        self.fit = Some(StructuralParams {
            start_year: first,
            year_span,
            y_scale,
            m: beta[0],
            k: beta[1],
            deltas: beta.iter().skip(2).copied().collect(),
            changepoints,
            sigma_obs: sigma,
        });
        Ok(())
    }

    fn predict(&self, year: i32) -> Result<f64, ForecastError> {
        let fit = self.fit.as_ref().ok_or_else(|| ForecastError::NotTrained {
            model: Self::NAME.to_string(),
        })?;
        let t = fit.scaled_time(year);
        Ok(eval_trend(t, fit.m, fit.k, &fit.changepoints, &fit.deltas) * fit.y_scale)
    }

    fn is_trained(&self) -> bool {
        self.fit.is_some()
    }

    fn to_params(&self) -> Result<ModelParams, ForecastError> {
        self.fit
            .clone()
            .map(ModelParams::Structural)
            .ok_or_else(|| ForecastError::NotTrained {
                model: Self::NAME.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn dataset(rows: impl Iterator<Item = (i32, f64)>) -> YearlyDataset {
        let rows: Vec<(i32, f64, f64, usize)> = rows.map(|(y, v)| (y, v, v - 10.0, 31)).collect();
        YearlyDataset::from_means(&rows).unwrap()
    }

    #[test]
    fn changepoints_are_capped_by_history() {
        let t: Vec<f64> = (0..5).map(|i| i as f64 / 4.0).collect();
        // floor(5 * 0.8) = 4 rows of history -> at most 3 changepoints.
        let cps = changepoint_positions(&t, 25, 0.8);
        assert_eq!(cps, vec![0.25, 0.5, 0.75]);

        let t2: Vec<f64> = (0..2).map(|i| i as f64).collect();
        assert!(changepoint_positions(&t2, 25, 0.8).is_empty());
    }

    #[test]
    fn linear_series_is_tracked() {
        let data = dataset((2010..2022).map(|y| (y, 20.0 + 0.1 * (y - 2010) as f64)));
        let mut model = StructuralForecaster::default();
        model.train(&data, TargetColumn::AvgHigh).unwrap();

        assert_abs_diff_eq!(model.predict(2022).unwrap(), 21.2, epsilon = 0.5);
        assert_abs_diff_eq!(model.predict(2015).unwrap(), 20.5, epsilon = 0.1);
    }

    #[test]
    fn predict_is_idempotent() {
        let data = dataset((2010..2022).map(|y| (y, 20.0 + 0.1 * (y - 2010) as f64)));
        let mut model = StructuralForecaster::default();
        model.train(&data, TargetColumn::AvgLow).unwrap();
        let a = model.predict(2026).unwrap();
        let b = model.predict(2026).unwrap();
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn changepoint_picks_up_a_late_acceleration() {
        let data = dataset((2000..2030).map(|y| {
            let v = if y <= 2015 { 20.0 } else { 20.0 + 0.5 * (y - 2015) as f64 };
            (y, v)
        }));
        let opts = StrategyOptions::new().with("changepoint_prior_scale", "0.5");
        let mut model = StructuralForecaster::from_options(&opts).unwrap();
        model.train(&data, TargetColumn::AvgHigh).unwrap();

        // Last observed value is 27.0; the post-2015 rate must carry on.
        assert!(model.predict(2031).unwrap() > 27.5);
    }

    #[test]
    fn needs_two_rows() {
        let data = dataset(std::iter::once((2020, 25.0)));
        let mut model = StructuralForecaster::default();
        let err = model.train(&data, TargetColumn::AvgHigh).unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientData(_)));
        assert!(matches!(model.predict(2021), Err(ForecastError::NotTrained { .. })));
    }

    #[test]
    fn params_round_trip_reproduces_predictions() {
        let data = dataset((2010..2024).map(|y| (y, 24.0 + 0.08 * (y - 2010) as f64 + ((y % 3) as f64) * 0.2)));
        let mut model = StructuralForecaster::default();
        model.train(&data, TargetColumn::AvgLow).unwrap();

        let ModelParams::Structural(params) = model.to_params().unwrap() else {
            panic!("expected structural params");
        };
        let json = serde_json::to_string(&params).unwrap();
        let restored = StructuralForecaster::from_params(serde_json::from_str(&json).unwrap());
        assert_abs_diff_eq!(
            model.predict(2026).unwrap(),
            restored.predict(2026).unwrap(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn options_are_validated() {
        let bad = StrategyOptions::new().with("changepoint_prior_scale", "0");
        assert!(matches!(
            StructuralForecaster::from_options(&bad),
            Err(ForecastError::Configuration(_))
        ));
        let unknown = StrategyOptions::new().with("seasonality_mode", "additive");
        assert!(StructuralForecaster::from_options(&unknown).is_err());
    }
}

//! Ensemble weight selection from backtest errors.

use tracing::info;

use crate::backtest::mean_absolute_error;
use crate::domain::{BacktestRecord, EnsembleWeights, WeightPolicy};
use crate::error::ForecastError;

/// Weights `[trend, structural]`: the lower MAE gets `policy.favored`.
///
/// Ties go to the trend strategy. Either run being empty is an error.
pub fn select_weights(
    trend: &[BacktestRecord],
    structural: &[BacktestRecord],
    policy: &WeightPolicy,
) -> Result<EnsembleWeights, ForecastError> {
    let trend_mae = mean_absolute_error(trend).ok_or_else(|| {
        ForecastError::InsufficientData("no valid backtest years for the trend strategy".into())
    })?;
    let structural_mae = mean_absolute_error(structural).ok_or_else(|| {
        ForecastError::InsufficientData("no valid backtest years for the structural strategy".into())
    })?;

    let weights = if trend_mae <= structural_mae {
        vec![policy.favored, policy.unfavored]
    } else {
        vec![policy.unfavored, policy.favored]
    };

    info!(trend_mae, structural_mae, weights = ?weights, "ensemble weights selected");
    EnsembleWeights::new(weights)
}

//! Weighted ensemble of strategies.
//!
//! Every member trains on the identical dataset and target. The prediction is
//! the weighted arithmetic mean `Σ w_i p_i / Σ w_i`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{EnsembleWeights, TargetColumn, YearlyDataset};
use crate::error::ForecastError;
use crate::models::{
    Forecaster, ModelParams, Strategy, StrategyOptions, StructuralForecaster, TrendForecaster,
};

/// Serialized ensemble: weights plus the members' own params, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleParams {
    pub weights: EnsembleWeights,
    pub members: Vec<ModelParams>,
}

#[derive(Debug, Clone)]
pub struct EnsembleForecaster {
    members: Vec<Strategy>,
    weights: EnsembleWeights,
    trained: bool,
}

impl EnsembleForecaster {
    pub const NAME: &'static str = "Ensemble";

    /// Combine `members`; `None` weights means equal weights.
    pub fn new(members: Vec<Strategy>, weights: Option<EnsembleWeights>) -> Result<Self, ForecastError> {
        if members.is_empty() {
            return Err(ForecastError::Configuration("ensemble needs at least one member".into()));
        }
        let weights = weights.unwrap_or_else(|| EnsembleWeights::equal(members.len()));
        if weights.len() != members.len() {
            return Err(ForecastError::Configuration(format!(
                "ensemble has {} members but {} weights",
                members.len(),
                weights.len()
            )));
        }
        let trained = members.iter().all(Forecaster::is_trained);
        Ok(Self {
            members,
            weights,
            trained,
        })
    }

    /// The `[trend, structural]` pair used by the forecast pipeline.
    pub fn standard(
        trend: &StrategyOptions,
        structural: &StrategyOptions,
        weights: EnsembleWeights,
    ) -> Result<Self, ForecastError> {
        let members = vec![
            Strategy::Trend(TrendForecaster::from_options(trend)?),
            Strategy::Structural(StructuralForecaster::from_options(structural)?),
        ];
        Self::new(members, Some(weights))
    }

    pub fn from_params(params: EnsembleParams) -> Result<Self, ForecastError> {
        let members = params
            .members
            .into_iter()
            .map(Strategy::from_params)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(members, Some(params.weights))
    }

    pub fn members(&self) -> &[Strategy] {
        &self.members
    }

    pub fn weights(&self) -> &EnsembleWeights {
        &self.weights
    }

    /// Each member's prediction for `year`, in member order.
    pub fn member_predictions(&self, year: i32) -> Result<Vec<(&str, f64)>, ForecastError> {
        self.members
            .iter()
            .map(|m| Ok((m.name(), m.predict(year)?)))
            .collect()
    }
}

impl Forecaster for EnsembleForecaster {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn train(&mut self, data: &YearlyDataset, target: TargetColumn) -> Result<(), ForecastError> {
        self.trained = false;
        for member in &mut self.members {
            member.train(data, target)?;
        }
        self.trained = true;
        debug!(%target, members = self.members.len(), weights = ?self.weights.as_slice(), "ensemble trained");
        Ok(())
    }

    fn predict(&self, year: i32) -> Result<f64, ForecastError> {
        if !self.trained {
            return Err(ForecastError::NotTrained {
                model: Self::NAME.to_string(),
            });
        }
        let mut acc = 0.0;
        for (member, &w) in self.members.iter().zip(self.weights.as_slice()) {
            acc += w * member.predict(year)?;
        }
        let value = acc / self.weights.sum();
        if value.is_finite() {
            Ok(value)
        } else {
            Err(ForecastError::Numerical(format!("ensemble prediction for {year} is not finite")))
        }
    }

    fn is_trained(&self) -> bool {
        self.trained
    }

    fn to_params(&self) -> Result<ModelParams, ForecastError> {
        if !self.trained {
            return Err(ForecastError::NotTrained {
                model: Self::NAME.to_string(),
            });
        }
        let members = self
            .members
            .iter()
            .map(Forecaster::to_params)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ModelParams::Ensemble(EnsembleParams {
            weights: self.weights.clone(),
            members,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    use crate::models::TrendModelType;

    fn dataset() -> YearlyDataset {
        let rows: Vec<(i32, f64, f64, usize)> = (2010..2024)
            .map(|y| {
                let d = (y - 2010) as f64;
                (y, 20.0 + 0.1 * d + if y % 2 == 0 { 0.3 } else { -0.2 }, 12.0 + 0.05 * d, 31)
            })
            .collect();
        YearlyDataset::from_means(&rows).unwrap()
    }

    #[test]
    fn two_member_blend_is_convex_combination() {
        let data = dataset();
        let w = 0.6;
        let weights = EnsembleWeights::new(vec![w, 1.0 - w]).unwrap();
        let mut ens =
            EnsembleForecaster::standard(&StrategyOptions::new(), &StrategyOptions::new(), weights).unwrap();
        ens.train(&data, TargetColumn::AvgHigh).unwrap();

        let mut m0 = TrendForecaster::default();
        m0.train(&data, TargetColumn::AvgHigh).unwrap();
        let mut m1 = StructuralForecaster::default();
        m1.train(&data, TargetColumn::AvgHigh).unwrap();

        let expected = w * m0.predict(2026).unwrap() + (1.0 - w) * m1.predict(2026).unwrap();
        assert_abs_diff_eq!(ens.predict(2026).unwrap(), expected, epsilon = 1e-9);
    }

    #[test]
    fn predict_is_idempotent() {
        let data = dataset();
        let weights = EnsembleWeights::new(vec![0.6, 0.4]).unwrap();
        let mut ens =
            EnsembleForecaster::standard(&StrategyOptions::new(), &StrategyOptions::new(), weights).unwrap();
        ens.train(&data, TargetColumn::AvgLow).unwrap();
        let a = ens.predict(2026).unwrap();
        let b = ens.predict(2026).unwrap();
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn unnormalized_weights_are_normalized() {
        let data = dataset();
        let members = vec![
            Strategy::Trend(TrendForecaster::new(TrendModelType::Linear)),
            Strategy::Trend(TrendForecaster::new(TrendModelType::TheilSen)),
        ];
        let mut scaled = EnsembleForecaster::new(members.clone(), Some(EnsembleWeights::new(vec![3.0, 1.0]).unwrap())).unwrap();
        let mut unit = EnsembleForecaster::new(members, Some(EnsembleWeights::new(vec![0.75, 0.25]).unwrap())).unwrap();
        scaled.train(&data, TargetColumn::AvgLow).unwrap();
        unit.train(&data, TargetColumn::AvgLow).unwrap();
        assert_abs_diff_eq!(scaled.predict(2030).unwrap(), unit.predict(2030).unwrap(), epsilon = 1e-9);
    }

    #[test]
    fn weight_count_must_match_members() {
        let members = vec![Strategy::Trend(TrendForecaster::default())];
        let err = EnsembleForecaster::new(members, Some(EnsembleWeights::new(vec![0.5, 0.5]).unwrap())).unwrap_err();
        assert!(matches!(err, ForecastError::Configuration(_)));
    }

    #[test]
    fn untrained_ensemble_refuses_to_predict() {
        let ens = EnsembleForecaster::standard(
            &StrategyOptions::new(),
            &StrategyOptions::new(),
            EnsembleWeights::equal(2),
        )
        .unwrap();
        assert!(matches!(ens.predict(2026), Err(ForecastError::NotTrained { .. })));
    }

    #[test]
    fn member_failure_propagates() {
        let single_year = YearlyDataset::from_means(&[(2020, 25.0, 15.0, 31)]).unwrap();
        let mut ens = EnsembleForecaster::standard(
            &StrategyOptions::new(),
            &StrategyOptions::new(),
            EnsembleWeights::equal(2),
        )
        .unwrap();
        let err = ens.train(&single_year, TargetColumn::AvgHigh).unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientData(_)));
        assert!(!ens.is_trained());
    }

    #[test]
    fn params_round_trip_through_json() {
        let data = dataset();
        let mut ens = EnsembleForecaster::standard(
            &StrategyOptions::new(),
            &StrategyOptions::new(),
            EnsembleWeights::new(vec![0.6, 0.4]).unwrap(),
        )
        .unwrap();
        ens.train(&data, TargetColumn::AvgHigh).unwrap();

        let json = serde_json::to_string_pretty(&ens.to_params().unwrap()).unwrap();
        assert!(json.contains("\"kind\": \"ensemble\""));
        let restored = Strategy::from_params(serde_json::from_str(&json).unwrap()).unwrap();
        assert!(restored.is_trained());
        assert_abs_diff_eq!(restored.predict(2026).unwrap(), ens.predict(2026).unwrap(), epsilon = 1e-9);
    }
}

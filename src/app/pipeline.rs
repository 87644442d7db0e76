//! Shared forecast pipeline used by every command.
//!
//! load -> aggregate -> backtest both strategies -> pick weights -> train
//! ensembles on full history -> forecast -> report
//!
//! Commands then only decide what to print and which files to write.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Utc};
use tracing::{info, warn};

use crate::backtest::{mean_absolute_error, run_backtest, select_weights};
use crate::data::{ArchiveClient, SyntheticConfig, build_yearly, generate_daily};
use crate::domain::{
    BacktestRecord, DailyObservation, DataSource, EnsembleWeights, RunConfig, TargetColumn, YearlyDataset,
};
use crate::error::{AppError, ForecastError};
use crate::io::{
    MetricsRow, ModelFile, TOOL_NAME, append_metrics_csv, load_daily_csv, model_path, read_model_json,
    write_model_json, write_text,
};
use crate::models::{
    EnsembleForecaster, Forecaster, Strategy, StrategyKind, StructuralForecaster, TrendForecaster,
};
use crate::report::{ForecastRow, ModelBacktests, format_results_table, render_summary_markdown};

/// Backtests of both strategies for one target column.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetBacktests {
    pub target: TargetColumn,
    pub trend: Vec<BacktestRecord>,
    pub structural: Vec<BacktestRecord>,
}

impl TargetBacktests {
    pub fn mae(&self, kind: StrategyKind) -> Option<f64> {
        match kind {
            StrategyKind::Trend => mean_absolute_error(&self.trend),
            StrategyKind::Structural => mean_absolute_error(&self.structural),
        }
    }
}

/// The four backtests of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutput {
    pub high: TargetBacktests,
    pub low: TargetBacktests,
}

impl ValidationOutput {
    pub fn get(&self, target: TargetColumn) -> &TargetBacktests {
        match target {
            TargetColumn::AvgHigh => &self.high,
            TargetColumn::AvgLow => &self.low,
        }
    }

    /// Per-strategy view, in report order (trend first).
    pub fn model_backtests(&self) -> Vec<ModelBacktests> {
        vec![
            ModelBacktests::new(TrendForecaster::NAME, self.high.trend.clone(), self.low.trend.clone()),
            ModelBacktests::new(
                StructuralForecaster::NAME,
                self.high.structural.clone(),
                self.low.structural.clone(),
            ),
        ]
    }

    pub fn metrics_row(&self, at: DateTime<Utc>) -> MetricsRow {
        MetricsRow {
            max_trend_mae: self.high.mae(StrategyKind::Trend),
            max_structural_mae: self.high.mae(StrategyKind::Structural),
            min_trend_mae: self.low.mae(StrategyKind::Trend),
            min_structural_mae: self.low.mae(StrategyKind::Structural),
            timestamp: MetricsRow::stamp(at),
        }
    }
}

/// A trained ensemble and its forecast for one target.
#[derive(Debug, Clone)]
pub struct TargetForecast {
    pub target: TargetColumn,
    pub weights: EnsembleWeights,
    pub ensemble: EnsembleForecaster,
    pub value: f64,
    /// Each member's own forecast, in member order.
    pub members: Vec<(String, f64)>,
}

/// All computed outputs of a single `wx forecast` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub dataset: YearlyDataset,
    pub validation: ValidationOutput,
    pub high: TargetForecast,
    pub low: TargetForecast,
    pub forecast: ForecastRow,
    pub table: String,
    pub created_at: DateTime<Utc>,
}

impl RunOutput {
    pub fn target(&self, target: TargetColumn) -> &TargetForecast {
        match target {
            TargetColumn::AvgHigh => &self.high,
            TargetColumn::AvgLow => &self.low,
        }
    }
}

/// Files actually written by `write_outputs`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WrittenFiles {
    pub metrics: Option<PathBuf>,
    pub models: Vec<PathBuf>,
    pub summary: Option<PathBuf>,
}

/// Read daily observations from the configured source, restricted to the year range.
pub fn load_daily(config: &RunConfig) -> Result<Vec<DailyObservation>, AppError> {
    let daily = match &config.source {
        DataSource::Archive => {
            let client = ArchiveClient::from_env(config.fetch.clone())?;
            client.fetch_national(&config.locations, config.start_year, config.end_year)?
        }
        DataSource::DailyCsv(path) => {
            let ingest = load_daily_csv(path)?;
            if !ingest.row_errors.is_empty() {
                warn!(
                    path = %path.display(),
                    skipped = ingest.row_errors.len(),
                    rows = ingest.rows_read,
                    "daily CSV rows skipped"
                );
                for err in ingest.row_errors.iter().take(5) {
                    warn!(line = err.line, "{}", err.message);
                }
            }
            ingest.observations
        }
        DataSource::Synthetic { seed } => {
            info!(seed, "generating synthetic daily observations");
            generate_daily(&SyntheticConfig::with_seed(*seed), config.start_year, config.end_year)?
        }
    };

    Ok(daily
        .into_iter()
        .filter(|d| (config.start_year..=config.end_year).contains(&d.date.year()))
        .collect())
}

/// Load, clean and aggregate the yearly dataset.
pub fn load_dataset(config: &RunConfig) -> Result<YearlyDataset, AppError> {
    let daily = load_daily(config)?;
    if daily.is_empty() {
        return Err(ForecastError::InsufficientData(format!(
            "no daily observations in {}..={}",
            config.start_year, config.end_year
        ))
        .into());
    }

    let dataset = build_yearly(&daily, config.target_month, config.min_days_per_year)?;
    info!(
        days = daily.len(),
        years = dataset.len(),
        first = ?dataset.first_year(),
        last = ?dataset.last_year(),
        "yearly dataset ready"
    );
    Ok(dataset)
}

/// Fail with `InsufficientData` unless the dataset has enough years.
pub fn ensure_history(config: &RunConfig, data: &YearlyDataset) -> Result<(), ForecastError> {
    if data.len() < config.min_history_years {
        return Err(ForecastError::InsufficientData(format!(
            "need at least {} years of history, got {}",
            config.min_history_years,
            data.len()
        )));
    }
    Ok(())
}

/// Check both strategies' options before any training happens.
pub fn check_strategy_options(config: &RunConfig) -> Result<(), ForecastError> {
    Strategy::build(StrategyKind::Trend, &config.trend_options)?;
    Strategy::build(StrategyKind::Structural, &config.structural_options)?;
    Ok(())
}

/// Backtest both strategies on both targets.
pub fn run_validation(config: &RunConfig, data: &YearlyDataset) -> Result<ValidationOutput, AppError> {
    check_strategy_options(config)?;
    ensure_history(config, data)?;

    let backtest_target = |target: TargetColumn| -> Result<TargetBacktests, ForecastError> {
        let trend = run_backtest(data, target, &config.test_years, || {
            TrendForecaster::from_options(&config.trend_options)
        })?;
        let structural = run_backtest(data, target, &config.test_years, || {
            StructuralForecaster::from_options(&config.structural_options)
        })?;
        Ok(TargetBacktests {
            target,
            trend,
            structural,
        })
    };

    let validation = ValidationOutput {
        high: backtest_target(TargetColumn::AvgHigh)?,
        low: backtest_target(TargetColumn::AvgLow)?,
    };

    for target in TargetColumn::ALL {
        let tb = validation.get(target);
        info!(
            %target,
            years = tb.trend.len(),
            trend_mae = ?tb.mae(StrategyKind::Trend),
            structural_mae = ?tb.mae(StrategyKind::Structural),
            "backtest complete"
        );
    }
    Ok(validation)
}

fn forecast_target(
    config: &RunConfig,
    data: &YearlyDataset,
    validation: &TargetBacktests,
) -> Result<TargetForecast, ForecastError> {
    let weights = select_weights(&validation.trend, &validation.structural, &config.weight_policy)?;
    let mut ensemble =
        EnsembleForecaster::standard(&config.trend_options, &config.structural_options, weights.clone())?;
    ensemble.train(data, validation.target)?;

    let value = ensemble.predict(config.forecast_year)?;
    let members = ensemble
        .member_predictions(config.forecast_year)?
        .into_iter()
        .map(|(name, v)| (name.to_string(), v))
        .collect::<Vec<_>>();

    info!(
        target = %validation.target,
        year = config.forecast_year,
        value,
        members = ?members,
        "ensemble forecast"
    );

    Ok(TargetForecast {
        target: validation.target,
        weights,
        ensemble,
        value,
        members,
    })
}

/// Validate, blend and forecast from an already loaded dataset.
pub fn run_forecast(config: &RunConfig, dataset: YearlyDataset) -> Result<RunOutput, AppError> {
    let validation = run_validation(config, &dataset)?;

    let high = forecast_target(config, &dataset, &validation.high)?;
    let low = forecast_target(config, &dataset, &validation.low)?;

    let forecast = ForecastRow {
        model: EnsembleForecaster::NAME.to_string(),
        year: config.forecast_year,
        high: high.value,
        low: low.value,
    };
    let table = format_results_table(
        &dataset,
        &validation.model_backtests(),
        std::slice::from_ref(&forecast),
        config.history_rows,
    );

    Ok(RunOutput {
        dataset,
        validation,
        high,
        low,
        forecast,
        table,
        created_at: Utc::now(),
    })
}

/// Load the dataset and run the whole forecast.
pub fn run_pipeline(config: &RunConfig) -> Result<RunOutput, AppError> {
    let dataset = load_dataset(config)?;
    run_forecast(config, dataset)
}

/// Persist metrics, models and the markdown summary per `config.outputs`.
pub fn write_outputs(config: &RunConfig, run: &RunOutput) -> Result<WrittenFiles, AppError> {
    let mut written = WrittenFiles::default();

    if let Some(path) = &config.outputs.metrics {
        append_metrics_csv(path, &run.validation.metrics_row(run.created_at))?;
        info!(path = %path.display(), "metrics exported");
        written.metrics = Some(path.clone());
    }

    if let Some(dir) = &config.outputs.model_dir {
        let (first, last) = match (run.dataset.first_year(), run.dataset.last_year()) {
            (Some(f), Some(l)) => (f, l),
            _ => return Err(ForecastError::InsufficientData("dataset is empty".into()).into()),
        };
        for target in TargetColumn::ALL {
            let path = model_path(dir, target);
            let file = ModelFile {
                tool: TOOL_NAME.to_string(),
                created_at: run.created_at,
                target,
                month: config.target_month,
                train_start_year: first,
                train_end_year: last,
                model: run.target(target).ensemble.to_params()?,
            };
            write_model_json(&path, &file)?;
            written.models.push(path);
        }
        info!(dir = %dir.display(), "models saved");
    }

    if let Some(path) = &config.outputs.summary {
        let md = render_summary_markdown(&config.region, config.target_month, &run.forecast, &run.table);
        write_text(path, &md)?;
        info!(path = %path.display(), "summary written");
        written.summary = Some(path.clone());
    }

    Ok(written)
}

/// Reload a saved model and predict `year`.
pub fn predict_from_file(path: &Path, year: i32) -> Result<(ModelFile, f64), AppError> {
    let file = read_model_json(path)?;
    let model = Strategy::from_params(file.model.clone())?;
    let value = model.predict(year)?;
    Ok((file, value))
}

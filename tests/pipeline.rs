use approx::assert_abs_diff_eq;

use wx_outlook::app::pipeline::{predict_from_file, run_forecast, run_pipeline, write_outputs};
use wx_outlook::backtest::{mean_absolute_error, run_backtest};
use wx_outlook::domain::{DataSource, OutputPaths, RunConfig, TargetColumn, YearlyDataset};
use wx_outlook::io::read_metrics_csv;
use wx_outlook::models::{StructuralForecaster, TrendForecaster};

fn linear_history() -> YearlyDataset {
    let rows: Vec<(i32, f64, f64, usize)> = (2010..=2023)
        .map(|y| {
            let d = (y - 2010) as f64;
            (y, 20.0 + 0.1 * d, 10.0 + 0.1 * d, 31)
        })
        .collect();
    YearlyDataset::from_means(&rows).unwrap()
}

#[test]
fn linear_history_backtests_and_forecasts_closely() {
    let data = linear_history();
    let years = [2022, 2023];

    let trend = run_backtest(&data, TargetColumn::AvgHigh, &years, || Ok(TrendForecaster::default())).unwrap();
    let structural =
        run_backtest(&data, TargetColumn::AvgHigh, &years, || Ok(StructuralForecaster::default())).unwrap();
    assert_eq!(trend.len(), 2);
    assert_eq!(structural.len(), 2);
    for r in trend.iter().chain(&structural) {
        assert!(r.error < 0.5, "{} error {}", r.year, r.error);
    }
    assert!(mean_absolute_error(&trend).unwrap() < 1e-6);

    let config = RunConfig {
        test_years: years.to_vec(),
        outputs: OutputPaths::none(),
        ..RunConfig::default()
    };
    let run = run_forecast(&config, data).unwrap();
    assert_eq!(run.forecast.year, 2026);
    assert_abs_diff_eq!(run.forecast.high, 21.6, epsilon = 0.5);
    assert_abs_diff_eq!(run.forecast.low, 11.6, epsilon = 0.5);
}

#[test]
fn synthetic_run_writes_outputs_and_models_reload() {
    let dir = tempfile::tempdir().unwrap();
    let config = RunConfig {
        source: DataSource::Synthetic { seed: 11 },
        outputs: OutputPaths {
            metrics: Some(dir.path().join("metrics/latest_metrics.csv")),
            model_dir: Some(dir.path().join("models")),
            summary: Some(dir.path().join("PREDICTIONS_SUMMARY.md")),
        },
        ..RunConfig::default()
    };

    let run = run_pipeline(&config).unwrap();
    assert_eq!(run.dataset.first_year(), Some(2010));
    assert!(run.forecast.high > run.forecast.low);

    let written = write_outputs(&config, &run).unwrap();
    assert_eq!(written.models.len(), 2);

    let metrics = read_metrics_csv(&dir.path().join("metrics/latest_metrics.csv")).unwrap();
    assert_eq!(metrics.len(), 1);
    assert!(metrics[0].max_trend_mae.is_some());

    let (file, value) = predict_from_file(&dir.path().join("models/ensemble_max.json"), 2026).unwrap();
    assert_eq!(file.target, TargetColumn::AvgHigh);
    assert_abs_diff_eq!(value, run.forecast.high, epsilon = 1e-9);

    let summary = std::fs::read_to_string(dir.path().join("PREDICTIONS_SUMMARY.md")).unwrap();
    assert!(summary.contains("| Year | Model | Act Max | Pred Max | Act Min | Pred Min | Status |"));
    assert!(summary.contains("| Forecast |"));

    // A second run appends rather than rewriting the header.
    write_outputs(&config, &run).unwrap();
    let metrics = read_metrics_csv(&dir.path().join("metrics/latest_metrics.csv")).unwrap();
    assert_eq!(metrics.len(), 2);
}

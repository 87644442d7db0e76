//! Top-level application orchestration.
//!
//! `src/main.rs` only maps errors to exit codes; this module is the real main:
//! - parses CLI arguments
//! - initialises logging
//! - resolves the run configuration (defaults < config file < flags)
//! - runs the pipeline and prints the report
//! - writes metrics, models and the summary

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::{Cli, Command, DatasetArgs, PredictArgs, RunArgs, SourceArgs};
use crate::domain::{DataSource, OutputPaths, RunConfig};
use crate::error::AppError;
use crate::io::{read_config_json, write_yearly_csv};
use crate::models::{StructuralForecaster, TrendForecaster};
use crate::report::{format_backtest_table, format_forecast_banner, format_weights};

pub mod pipeline;

/// Entry point for the `wx` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_file.as_deref())?;

    let result = match cli.command {
        Command::Forecast(args) => handle_forecast(&args),
        Command::Backtest(args) => handle_backtest(&args),
        Command::Dataset(args) => handle_dataset(&args),
        Command::Predict(args) => handle_predict(&args),
    };
    if let Err(err) = &result {
        error!(exit_code = err.exit_code(), "{}", err.message());
    }
    result
}

/// Install the global subscriber: stderr, optionally a file, filtered by
/// `RUST_LOG` or the verbosity flag.
pub fn init_logging(verbose: u8, log_file: Option<&Path>) -> Result<(), AppError> {
    let default_directive = match verbose {
        0 => "wx_outlook=info",
        1 => "wx_outlook=debug",
        _ => "wx_outlook=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let file_layer = match log_file {
        Some(path) => {
            let file = File::create(path)
                .map_err(|e| AppError::config(format!("Failed to create log file '{}': {e}", path.display())))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(file_layer)
        .try_init()
        .map_err(|e| AppError::config(format!("Failed to initialise logging: {e}")))
}

fn handle_forecast(args: &RunArgs) -> Result<(), AppError> {
    let config = run_config_from_args(args)?;
    info!(region = %config.region, year = config.forecast_year, "starting forecast run");

    let run = pipeline::run_pipeline(&config)?;

    let banner = format_forecast_banner(&config.region, config.target_month, &run.forecast);
    println!("\n{banner}");

    let names = [TrendForecaster::NAME, StructuralForecaster::NAME];
    let weights = [
        (run.high.target, run.high.weights.clone()),
        (run.low.target, run.low.weights.clone()),
    ];
    println!("{}", format_weights(&names, &weights));
    println!("{}", run.table);

    let written = pipeline::write_outputs(&config, &run)?;
    for path in written.metrics.iter().chain(&written.models).chain(&written.summary) {
        println!("wrote {}", path.display());
    }
    Ok(())
}

fn handle_backtest(args: &RunArgs) -> Result<(), AppError> {
    let config = run_config_from_args(args)?;
    let dataset = pipeline::load_dataset(&config)?;
    let validation = pipeline::run_validation(&config, &dataset)?;
    println!("{}", format_backtest_table(&validation.model_backtests()));
    Ok(())
}

fn handle_dataset(args: &DatasetArgs) -> Result<(), AppError> {
    let mut config = RunConfig::default();
    apply_source_args(&mut config, &args.source)?;
    config.validate()?;

    let dataset = pipeline::load_dataset(&config)?;
    write_yearly_csv(&args.out, &dataset)?;
    println!("wrote {} ({} years)", args.out.display(), dataset.len());
    Ok(())
}

fn handle_predict(args: &PredictArgs) -> Result<(), AppError> {
    let (file, value) = pipeline::predict_from_file(&args.model, args.year)?;
    println!(
        "{} {} ({}, trained {}-{}): {value:.2} °C",
        args.year,
        file.target,
        crate::report::month_name(file.month),
        file.train_start_year,
        file.train_end_year,
    );
    Ok(())
}

/// Config file first (if given), then source flags on top.
pub fn apply_source_args(config: &mut RunConfig, args: &SourceArgs) -> Result<(), AppError> {
    if let Some(path) = &args.config {
        config.apply_file(read_config_json(path)?);
    }

    if let Some(path) = &args.daily_csv {
        config.source = DataSource::DailyCsv(path.clone());
    } else if args.synthetic {
        config.source = DataSource::Synthetic { seed: args.seed };
    }
    if let Some(v) = args.start_year {
        config.start_year = v;
    }
    if let Some(v) = args.end_year {
        config.end_year = v;
    }
    if let Some(v) = args.month {
        config.target_month = v;
    }
    if let Some(v) = args.min_days {
        config.min_days_per_year = v;
    }
    if args.allow_missing_locations {
        config.fetch.allow_missing_locations = true;
    }
    Ok(())
}

/// Resolve a full `RunConfig` for `forecast` / `backtest`.
pub fn run_config_from_args(args: &RunArgs) -> Result<RunConfig, AppError> {
    let mut config = RunConfig::default();
    apply_source_args(&mut config, &args.source)?;

    if let Some(years) = &args.test_years {
        config.test_years = years.clone();
    }
    if let Some(v) = args.forecast_year {
        config.forecast_year = v;
    }
    if let Some(model) = &args.trend_model {
        config.trend_options.set("model_type", model.clone());
    }
    if let Some(tau) = args.changepoint_prior_scale {
        config.structural_options.set("changepoint_prior_scale", tau.to_string());
    }
    if let Some(w) = args.favored_weight {
        config.weight_policy.favored = w;
        config.weight_policy.unfavored = 1.0 - w;
    }
    if let Some(p) = &args.metrics_out {
        config.outputs.metrics = Some(p.clone());
    }
    if let Some(p) = &args.model_dir {
        config.outputs.model_dir = Some(p.clone());
    }
    if let Some(p) = &args.summary_out {
        config.outputs.summary = Some(p.clone());
    }
    if args.no_save {
        config.outputs = OutputPaths::none();
    }

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EXIT_CONFIG;
    use std::fs;

    fn parse_run(argv: &[&str]) -> RunArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Command::Forecast(args) | Command::Backtest(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn flags_override_config_file_which_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wx.json");
        fs::write(
            &path,
            r#"{
                "data": { "start_year": 2012, "end_year": 2024 },
                "validation": { "test_years": [2023] },
                "forecast": { "year": 2027 }
            }"#,
        )
        .unwrap();
        let path_str = path.to_str().unwrap();

        let args = parse_run(&["wx", "forecast", "--config", path_str, "--start-year", "2014"]);
        let config = run_config_from_args(&args).unwrap();

        assert_eq!(config.start_year, 2014);
        assert_eq!(config.end_year, 2024);
        assert_eq!(config.test_years, vec![2023]);
        assert_eq!(config.forecast_year, 2027);
        assert_eq!(config.target_month, 8);
    }

    #[test]
    fn favored_weight_sets_both_sides() {
        let args = parse_run(&["wx", "forecast", "--favored-weight", "0.7"]);
        let config = run_config_from_args(&args).unwrap();
        assert_eq!(config.weight_policy.favored, 0.7);
        assert!((config.weight_policy.unfavored - 0.3).abs() < 1e-12);

        let args = parse_run(&["wx", "forecast", "--favored-weight", "1.5"]);
        assert_eq!(run_config_from_args(&args).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn favored_weight_below_half_is_rejected() {
        let args = parse_run(&["wx", "forecast", "--favored-weight", "0.3"]);
        let err = run_config_from_args(&args).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_CONFIG);
        assert!(err.message().contains("favored weight"));
    }

    #[test]
    fn config_file_with_inverted_weights_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wx.json");
        fs::write(
            &path,
            r#"{ "forecast": { "favored_weight": 0.4, "unfavored_weight": 0.6 } }"#,
        )
        .unwrap();

        let args = parse_run(&["wx", "backtest", "--config", path.to_str().unwrap()]);
        assert_eq!(run_config_from_args(&args).unwrap_err().exit_code(), EXIT_CONFIG);
    }

    #[test]
    fn unwritable_log_file_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("wx.log");
        let err = init_logging(0, Some(&path)).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_CONFIG);
    }

    #[test]
    fn no_save_disables_every_output() {
        let args = parse_run(&["wx", "forecast", "--metrics-out", "m.csv", "--no-save"]);
        let config = run_config_from_args(&args).unwrap();
        assert_eq!(config.outputs, OutputPaths::none());
    }

    #[test]
    fn bad_month_is_rejected() {
        let args = parse_run(&["wx", "backtest", "--synthetic", "--month", "13"]);
        assert_eq!(run_config_from_args(&args).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn synthetic_flag_selects_seeded_source() {
        let args = parse_run(&["wx", "backtest", "--synthetic", "--seed", "9"]);
        let config = run_config_from_args(&args).unwrap();
        assert_eq!(config.source, DataSource::Synthetic { seed: 9 });
    }
}

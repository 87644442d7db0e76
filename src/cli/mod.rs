//! Command-line parsing for the national temperature outlook.
//!
//! Parsing and command dispatch stay separate from the modeling code. Every
//! run flag is optional so that unset flags fall through to the config file
//! and then to the built-in defaults.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "wx", version, about = "National monthly temperature outlook (backtested trend + structural ensemble)")]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Also write logs to this file (no ANSI colours).
    #[arg(long, value_name = "FILE", global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load data, backtest both strategies, blend, forecast, and write outputs.
    Forecast(RunArgs),
    /// Backtest both strategies and print the errors. Writes nothing.
    Backtest(RunArgs),
    /// Load and aggregate the yearly dataset, then write it as CSV.
    Dataset(DatasetArgs),
    /// Predict a year from a saved model JSON.
    Predict(PredictArgs),
}

/// Where observations come from and how they are aggregated.
#[derive(Debug, Args, Clone, Default)]
pub struct SourceArgs {
    /// JSON config file (defaults < file < flags).
    #[arg(long, value_name = "JSON")]
    pub config: Option<PathBuf>,

    /// Read daily observations from a CSV instead of the archive.
    #[arg(long, value_name = "CSV", conflicts_with = "synthetic")]
    pub daily_csv: Option<PathBuf>,

    /// Use seeded synthetic observations (no network).
    #[arg(long)]
    pub synthetic: bool,

    /// Seed for `--synthetic`.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// First year to load.
    #[arg(long)]
    pub start_year: Option<i32>,

    /// Last year to load.
    #[arg(long)]
    pub end_year: Option<i32>,

    /// Calendar month to average (1-12).
    #[arg(long)]
    pub month: Option<u32>,

    /// Minimum days of the month a year needs to be kept.
    #[arg(long)]
    pub min_days: Option<usize>,

    /// Skip locations whose archive requests keep failing instead of aborting.
    #[arg(long)]
    pub allow_missing_locations: bool,
}

/// Options shared by `forecast` and `backtest`.
#[derive(Debug, Args, Clone, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Years to hold out, comma separated (e.g. 2024,2025).
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    pub test_years: Option<Vec<i32>>,

    /// Year to forecast.
    #[arg(long)]
    pub forecast_year: Option<i32>,

    /// Trend estimator: theilsen (robust), linear, or huber.
    #[arg(long, value_name = "TYPE")]
    pub trend_model: Option<String>,

    /// Laplace prior scale on structural changepoint deltas.
    #[arg(long)]
    pub changepoint_prior_scale: Option<f64>,

    /// Weight for the lower-error strategy; the other gets 1 - w.
    #[arg(long)]
    pub favored_weight: Option<f64>,

    /// Metrics CSV to append to.
    #[arg(long, value_name = "CSV")]
    pub metrics_out: Option<PathBuf>,

    /// Directory for saved ensemble models.
    #[arg(long, value_name = "DIR")]
    pub model_dir: Option<PathBuf>,

    /// Markdown summary path.
    #[arg(long, value_name = "MD")]
    pub summary_out: Option<PathBuf>,

    /// Do not write metrics, models, or the summary.
    #[arg(long)]
    pub no_save: bool,
}

/// Options for `dataset`.
#[derive(Debug, Args, Clone)]
pub struct DatasetArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Output CSV path.
    #[arg(long, value_name = "CSV")]
    pub out: PathBuf,
}

/// Options for `predict`.
#[derive(Debug, Args, Clone)]
pub struct PredictArgs {
    /// Model JSON written by `wx forecast`.
    #[arg(long, value_name = "JSON")]
    pub model: PathBuf,

    /// Year to predict.
    #[arg(long)]
    pub year: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forecast_flags_parse() {
        let cli = Cli::try_parse_from([
            "wx",
            "-vv",
            "forecast",
            "--synthetic",
            "--test-years",
            "2022,2023",
            "--trend-model",
            "linear",
            "--no-save",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Command::Forecast(args) = cli.command else {
            panic!("expected forecast");
        };
        assert!(args.source.synthetic);
        assert_eq!(args.test_years, Some(vec![2022, 2023]));
        assert_eq!(args.trend_model.as_deref(), Some("linear"));
        assert!(args.no_save);
        assert_eq!(args.forecast_year, None);
    }

    #[test]
    fn csv_and_synthetic_conflict() {
        let res = Cli::try_parse_from(["wx", "backtest", "--synthetic", "--daily-csv", "x.csv"]);
        assert!(res.is_err());
    }

    #[test]
    fn predict_requires_model_and_year() {
        assert!(Cli::try_parse_from(["wx", "predict", "--year", "2026"]).is_err());
        let cli = Cli::try_parse_from(["wx", "predict", "--model", "m.json", "--year", "2026"]).unwrap();
        assert!(matches!(cli.command, Command::Predict(PredictArgs { year: 2026, .. })));
    }
}

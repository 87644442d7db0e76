//! Run configuration.
//!
//! A `RunConfig` is resolved in three layers: built-in defaults, then an
//! optional JSON config file (`ConfigFile`), then CLI flags.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::{Location, WeightPolicy};
use crate::error::ForecastError;
use crate::models::StrategyOptions;

pub const DEFAULT_START_YEAR: i32 = 2010;
pub const DEFAULT_END_YEAR: i32 = 2025;
pub const DEFAULT_TARGET_MONTH: u32 = 8;
pub const DEFAULT_FORECAST_YEAR: i32 = 2026;
pub const DEFAULT_TEST_YEARS: [i32; 2] = [2024, 2025];

/// A year's average is only kept with at least this many daily observations.
pub const DEFAULT_MIN_DAYS_PER_YEAR: usize = 20;
/// The pipeline refuses to forecast from fewer yearly rows than this.
pub const DEFAULT_MIN_HISTORY_YEARS: usize = 5;
/// Trailing historical rows shown in the report.
pub const DEFAULT_HISTORY_ROWS: usize = 5;

pub const DEFAULT_METRICS_PATH: &str = "data/metrics/latest_metrics.csv";
pub const DEFAULT_MODEL_DIR: &str = "models";
pub const DEFAULT_SUMMARY_PATH: &str = "PREDICTIONS_SUMMARY.md";

/// Regional centres averaged into the national series.
pub fn default_locations() -> Vec<Location> {
    vec![
        Location::new("Kyiv", 50.45, 30.52),
        Location::new("Kharkiv", 49.99, 36.23),
        Location::new("Odesa", 46.48, 30.72),
        Location::new("Lviv", 49.84, 24.03),
        Location::new("Dnipro", 48.46, 35.04),
    ]
}

/// Where daily observations come from.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    /// Historical weather archive over HTTP.
    Archive,
    /// A local CSV of daily observations (`date,tmax,tmin`).
    DailyCsv(PathBuf),
    /// Seeded synthetic observations (offline runs and demos).
    Synthetic { seed: u64 },
}

/// Retry and pacing policy for the archive client.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchPolicy {
    pub max_attempts: u32,
    /// Wait after failed attempt `a` (0-based) is `(a + 1) * backoff_step`.
    pub backoff_step: Duration,
    /// Pause after each successful request.
    pub request_delay: Duration,
    pub timeout: Duration,
    /// Skip a location that keeps failing instead of aborting the run.
    pub allow_missing_locations: bool,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_secs(3),
            request_delay: Duration::from_millis(1500),
            timeout: Duration::from_secs(30),
            allow_missing_locations: false,
        }
    }
}

/// Files written by a forecast run. `None` disables that output.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPaths {
    pub metrics: Option<PathBuf>,
    pub model_dir: Option<PathBuf>,
    pub summary: Option<PathBuf>,
}

impl Default for OutputPaths {
    fn default() -> Self {
        Self {
            metrics: Some(PathBuf::from(DEFAULT_METRICS_PATH)),
            model_dir: Some(PathBuf::from(DEFAULT_MODEL_DIR)),
            summary: Some(PathBuf::from(DEFAULT_SUMMARY_PATH)),
        }
    }
}

impl OutputPaths {
    pub fn none() -> Self {
        Self {
            metrics: None,
            model_dir: None,
            summary: None,
        }
    }
}

/// A full run's configuration as understood by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub locations: Vec<Location>,
    /// Shown in the summary title.
    pub region: String,
    pub start_year: i32,
    pub end_year: i32,
    pub target_month: u32,
    pub min_days_per_year: usize,
    pub min_history_years: usize,
    pub test_years: Vec<i32>,
    pub forecast_year: i32,
    pub weight_policy: WeightPolicy,
    pub trend_options: StrategyOptions,
    pub structural_options: StrategyOptions,
    pub history_rows: usize,
    pub source: DataSource,
    pub fetch: FetchPolicy,
    pub outputs: OutputPaths,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            locations: default_locations(),
            region: "Ukraine".to_string(),
            start_year: DEFAULT_START_YEAR,
            end_year: DEFAULT_END_YEAR,
            target_month: DEFAULT_TARGET_MONTH,
            min_days_per_year: DEFAULT_MIN_DAYS_PER_YEAR,
            min_history_years: DEFAULT_MIN_HISTORY_YEARS,
            test_years: DEFAULT_TEST_YEARS.to_vec(),
            forecast_year: DEFAULT_FORECAST_YEAR,
            weight_policy: WeightPolicy::default(),
            trend_options: StrategyOptions::default(),
            structural_options: StrategyOptions::default(),
            history_rows: DEFAULT_HISTORY_ROWS,
            source: DataSource::Archive,
            fetch: FetchPolicy::default(),
            outputs: OutputPaths::default(),
        }
    }
}

impl RunConfig {
    /// Overlay every value present in a config file.
    pub fn apply_file(&mut self, file: ConfigFile) {
        if let Some(data) = file.data {
            if let Some(locations) = data.locations {
                self.locations = locations;
            }
            if let Some(region) = data.region {
                self.region = region;
            }
            if let Some(v) = data.start_year {
                self.start_year = v;
            }
            if let Some(v) = data.end_year {
                self.end_year = v;
            }
            if let Some(v) = data.target_month {
                self.target_month = v;
            }
            if let Some(v) = data.min_days_per_year {
                self.min_days_per_year = v;
            }
            if let Some(v) = data.min_history_years {
                self.min_history_years = v;
            }
        }
        if let Some(validation) = file.validation {
            if let Some(years) = validation.test_years {
                self.test_years = years;
            }
        }
        if let Some(forecast) = file.forecast {
            if let Some(v) = forecast.year {
                self.forecast_year = v;
            }
            if let Some(v) = forecast.favored_weight {
                self.weight_policy.favored = v;
            }
            if let Some(v) = forecast.unfavored_weight {
                self.weight_policy.unfavored = v;
            }
            if let Some(v) = forecast.history_rows {
                self.history_rows = v;
            }
        }
        if let Some(models) = file.models {
            if let Some(opts) = models.trend {
                self.trend_options = opts;
            }
            if let Some(opts) = models.structural {
                self.structural_options = opts;
            }
        }
        if let Some(fetch) = file.fetch {
            if let Some(v) = fetch.max_attempts {
                self.fetch.max_attempts = v;
            }
            if let Some(v) = fetch.backoff_secs {
                self.fetch.backoff_step = Duration::from_secs_f64(v.max(0.0));
            }
            if let Some(v) = fetch.request_delay_ms {
                self.fetch.request_delay = Duration::from_millis(v);
            }
            if let Some(v) = fetch.timeout_secs {
                self.fetch.timeout = Duration::from_secs(v);
            }
            if let Some(v) = fetch.allow_missing_locations {
                self.fetch.allow_missing_locations = v;
            }
        }
        if let Some(output) = file.output {
            if let Some(p) = output.metrics {
                self.outputs.metrics = Some(p);
            }
            if let Some(p) = output.model_dir {
                self.outputs.model_dir = Some(p);
            }
            if let Some(p) = output.summary {
                self.outputs.summary = Some(p);
            }
        }
    }

    /// Reject settings that would make the run meaningless.
    pub fn validate(&self) -> Result<(), ForecastError> {
        if self.locations.is_empty() {
            return Err(ForecastError::Configuration("no locations configured".into()));
        }
        for loc in &self.locations {
            if !(loc.latitude.is_finite() && (-90.0..=90.0).contains(&loc.latitude)) {
                return Err(ForecastError::Configuration(format!(
                    "invalid latitude {} for {}",
                    loc.latitude, loc.name
                )));
            }
            if !(loc.longitude.is_finite() && (-180.0..=180.0).contains(&loc.longitude)) {
                return Err(ForecastError::Configuration(format!(
                    "invalid longitude {} for {}",
                    loc.longitude, loc.name
                )));
            }
        }
        if !(1..=12).contains(&self.target_month) {
            return Err(ForecastError::Configuration(format!(
                "target month must be within 1..=12, got {}",
                self.target_month
            )));
        }
        if self.start_year > self.end_year {
            return Err(ForecastError::Configuration(format!(
                "start year {} is after end year {}",
                self.start_year, self.end_year
            )));
        }
        if self.min_days_per_year == 0 {
            return Err(ForecastError::Configuration("min_days_per_year must be >= 1".into()));
        }
        if self.fetch.max_attempts == 0 {
            return Err(ForecastError::Configuration("fetch max_attempts must be >= 1".into()));
        }
        self.weight_policy.validate()
    }
}

/// On-disk JSON configuration. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub data: Option<DataSection>,
    pub validation: Option<ValidationSection>,
    pub forecast: Option<ForecastSection>,
    pub models: Option<ModelsSection>,
    pub fetch: Option<FetchSection>,
    pub output: Option<OutputSection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataSection {
    pub locations: Option<Vec<Location>>,
    pub region: Option<String>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub target_month: Option<u32>,
    pub min_days_per_year: Option<usize>,
    pub min_history_years: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidationSection {
    pub test_years: Option<Vec<i32>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForecastSection {
    pub year: Option<i32>,
    pub favored_weight: Option<f64>,
    pub unfavored_weight: Option<f64>,
    pub history_rows: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelsSection {
    pub trend: Option<StrategyOptions>,
    pub structural: Option<StrategyOptions>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FetchSection {
    pub max_attempts: Option<u32>,
    pub backoff_secs: Option<f64>,
    pub request_delay_ms: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub allow_missing_locations: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputSection {
    pub metrics: Option<PathBuf>,
    pub model_dir: Option<PathBuf>,
    pub summary: Option<PathBuf>,
}

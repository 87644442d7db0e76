//! Open-Meteo historical archive client.
//!
//! One request per location covering the whole year range; the daily
//! `temperature_2m_max` / `temperature_2m_min` arrays are zipped with `time`.

use std::thread;

use chrono::{Datelike, NaiveDate, Utc};
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::data::aggregate::national_average;
use crate::domain::{DailyObservation, FetchPolicy, Location};
use crate::error::AppError;

const DEFAULT_BASE_URL: &str = "https://archive-api.open-meteo.com/v1/archive";
const BASE_URL_ENV: &str = "WX_ARCHIVE_URL";
const DAILY_FIELDS: &str = "temperature_2m_max,temperature_2m_min";

pub struct ArchiveClient {
    client: Client,
    base_url: String,
    policy: FetchPolicy,
}

impl ArchiveClient {
    /// Build a client; `WX_ARCHIVE_URL` (environment or `.env`) overrides the endpoint.
    pub fn from_env(policy: FetchPolicy) -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        let base_url = std::env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(base_url, policy)
    }

    pub fn new(base_url: impl Into<String>, policy: FetchPolicy) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(policy.timeout)
            .build()
            .map_err(|e| AppError::upstream(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            policy,
        })
    }

    /// Fetch every location and average them into one national daily series.
    ///
    /// A location that still fails after all retries aborts the run unless
    /// `allow_missing_locations` is set, in which case it is skipped.
    pub fn fetch_national(
        &self,
        locations: &[Location],
        start_year: i32,
        end_year: i32,
    ) -> Result<Vec<DailyObservation>, AppError> {
        let mut per_location = Vec::with_capacity(locations.len());

        for location in locations {
            info!(location = %location.name, "fetching daily archive");
            match self.fetch_location(location, start_year, end_year) {
                Ok(obs) => {
                    debug!(location = %location.name, days = obs.len(), "archive fetched");
                    per_location.push(obs);
                }
                Err(err) if self.policy.allow_missing_locations => {
                    warn!(location = %location.name, error = %err, "skipping location");
                }
                Err(err) => return Err(err),
            }
        }

        if per_location.is_empty() {
            return Err(AppError::upstream("No location returned archive data."));
        }
        Ok(national_average(&per_location))
    }

    /// Fetch one location, retrying with a linear backoff.
    pub fn fetch_location(
        &self,
        location: &Location,
        start_year: i32,
        end_year: i32,
    ) -> Result<Vec<DailyObservation>, AppError> {
        let attempts = self.policy.max_attempts.max(1);
        let mut last_err = None;

        for attempt in 0..attempts {
            match self.fetch_once(location, start_year, end_year) {
                Ok(obs) => {
                    thread::sleep(self.policy.request_delay);
                    return Ok(obs);
                }
                Err(err) => {
                    warn!(
                        location = %location.name,
                        attempt = attempt + 1,
                        attempts,
                        error = %err,
                        "archive request failed"
                    );
                    if attempt + 1 < attempts {
                        thread::sleep(self.policy.backoff_step * (attempt + 1));
                    }
                    last_err = Some(err);
                }
            }
        }

        let reason = last_err.map(|e| e.message().to_string()).unwrap_or_default();
        Err(AppError::upstream(format!(
            "Archive fetch for {} failed after {attempts} attempts: {reason}",
            location.name
        )))
    }

    fn fetch_once(
        &self,
        location: &Location,
        start_year: i32,
        end_year: i32,
    ) -> Result<Vec<DailyObservation>, AppError> {
        let (start_date, end_date) = request_window(start_year, end_year, Utc::now().date_naive());

        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("latitude", location.latitude.to_string()),
                ("longitude", location.longitude.to_string()),
                ("start_date", start_date.to_string()),
                ("end_date", end_date.to_string()),
                ("daily", DAILY_FIELDS.to_string()),
                ("timezone", "GMT".to_string()),
            ])
            .send()
            .map_err(|e| AppError::upstream(format!("Archive request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::upstream(format!(
                "Archive request failed with status {}.",
                resp.status()
            )));
        }

        let body: ArchiveResponse = resp
            .json()
            .map_err(|e| AppError::upstream(format!("Failed to parse archive response: {e}")))?;

        body.daily.into_observations()
    }
}

/// `start_date` / `end_date` for a year range; an open current year ends today.
pub fn request_window(start_year: i32, end_year: i32, today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = NaiveDate::from_ymd_opt(start_year, 1, 1).unwrap_or(NaiveDate::MIN);
    let end = if end_year >= today.year() {
        today
    } else {
        NaiveDate::from_ymd_opt(end_year, 12, 31).unwrap_or(today)
    };
    (start, end)
}

#[derive(Debug, Deserialize)]
struct ArchiveResponse {
    daily: DailyBlock,
}

#[derive(Debug, Deserialize)]
struct DailyBlock {
    time: Vec<String>,
    temperature_2m_max: Vec<Option<f64>>,
    temperature_2m_min: Vec<Option<f64>>,
}

impl DailyBlock {
    fn into_observations(self) -> Result<Vec<DailyObservation>, AppError> {
        let n = self.time.len();
        if self.temperature_2m_max.len() != n || self.temperature_2m_min.len() != n {
            return Err(AppError::upstream(format!(
                "Archive arrays disagree in length: time={n}, max={}, min={}",
                self.temperature_2m_max.len(),
                self.temperature_2m_min.len()
            )));
        }

        self.time
            .iter()
            .zip(self.temperature_2m_max)
            .zip(self.temperature_2m_min)
            .map(|((raw, tmax), tmin)| {
                let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .map_err(|e| AppError::upstream(format!("Invalid archive date '{raw}': {e}")))?;
                Ok(DailyObservation {
                    date,
                    tmax: tmax.filter(|v| v.is_finite()),
                    tmin: tmin.filter(|v| v.is_finite()),
                })
            })
            .collect()
    }
}

//! Seeded synthetic daily observations.
//!
//! Produces a plausible national series without network access:
//!
//! - annual cycle peaking in late July
//! - linear warming across years
//! - Gaussian day-to-day noise
//! - rare large spikes and occasional missing readings, which exercise cleaning

use std::f64::consts::PI;

use chrono::{Datelike, NaiveDate};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::DailyObservation;
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticConfig {
    pub seed: u64,
    /// Annual mean of the daily maximum (°C).
    pub base_tmax: f64,
    /// Half the summer/winter swing of the daily maximum.
    pub amplitude: f64,
    /// Day-of-year of the seasonal peak.
    pub peak_day: f64,
    /// Warming per year (°C).
    pub warming_per_year: f64,
    /// Mean gap between daily max and min.
    pub diurnal_range: f64,
    pub noise_sd: f64,
    pub spike_prob: f64,
    pub spike_size: f64,
    pub missing_prob: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            base_tmax: 14.0,
            amplitude: 13.5,
            peak_day: 205.0,
            warming_per_year: 0.06,
            diurnal_range: 10.5,
            noise_sd: 2.0,
            spike_prob: 0.004,
            spike_size: 18.0,
            missing_prob: 0.002,
        }
    }
}

impl SyntheticConfig {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }
}

/// Generate every calendar day from `start_year` through `end_year`.
pub fn generate_daily(config: &SyntheticConfig, start_year: i32, end_year: i32) -> Result<Vec<DailyObservation>, AppError> {
    if end_year < start_year {
        return Err(AppError::config(format!(
            "Synthetic range is empty: {start_year}..={end_year}."
        )));
    }
    if !(0.0..1.0).contains(&config.spike_prob) || !(0.0..1.0).contains(&config.missing_prob) {
        return Err(AppError::config("Synthetic probabilities must be in [0, 1)."));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let noise = Normal::new(0.0, config.noise_sd)
        .map_err(|e| AppError::config(format!("Noise distribution error: {e}")))?;
    let night_noise = Normal::new(0.0, config.noise_sd * 0.75)
        .map_err(|e| AppError::config(format!("Noise distribution error: {e}")))?;

    let (Some(first), Some(last)) = (
        NaiveDate::from_ymd_opt(start_year, 1, 1),
        NaiveDate::from_ymd_opt(end_year, 12, 31),
    ) else {
        return Err(AppError::config(format!("Invalid synthetic year range {start_year}..={end_year}.")));
    };

    let mut out = Vec::with_capacity(((end_year - start_year + 1) * 366) as usize);
    for date in first.iter_days().take_while(|d| *d <= last) {
        let years_in = (date.year() - start_year) as f64;
        let phase = 2.0 * PI * (date.ordinal() as f64 - config.peak_day) / 365.25;
        let expected = config.base_tmax + config.amplitude * phase.cos() + config.warming_per_year * years_in;

        let mut tmax = expected + noise.sample(&mut rng);
        let mut tmin = expected - config.diurnal_range + night_noise.sample(&mut rng);

        if rng.gen_range(0.0..1.0) < config.spike_prob {
            let sign = if rng.gen_range(0.0..1.0) < 0.5 { -1.0 } else { 1.0 };
            tmax += sign * config.spike_size;
            tmin += sign * config.spike_size;
        }

        let tmax = (rng.gen_range(0.0..1.0) >= config.missing_prob).then_some(tmax);
        let tmin = (rng.gen_range(0.0..1.0) >= config.missing_prob).then_some(tmin);
        out.push(DailyObservation { date, tmax, tmin });
    }

    Ok(out)
}

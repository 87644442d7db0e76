//! Daily observations -> yearly monthly averages.
//!
//! Steps, in order:
//!
//! 1. drop days missing either temperature
//! 2. IQR filter on `tmax`, then on `tmin` (whole series, before month selection)
//! 3. keep the target month, group by year
//! 4. drop years below the day threshold
//! 5. yearly means plus trailing rolling means

use std::collections::BTreeMap;

use chrono::Datelike;
use tracing::{debug, info};

use crate::domain::{DailyObservation, YearlyDataset};
use crate::error::ForecastError;
use crate::math::quantile_sorted;

const IQR_FACTOR: f64 = 1.5;

/// A daily row with both temperatures present.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CleanDay {
    pub year: i32,
    pub month: u32,
    pub tmax: f64,
    pub tmin: f64,
}

/// Per-date mean over locations, on the union of dates.
///
/// Each temperature is averaged over the locations that reported it that day.
pub fn national_average(per_location: &[Vec<DailyObservation>]) -> Vec<DailyObservation> {
    let mut acc: BTreeMap<chrono::NaiveDate, [(f64, usize); 2]> = BTreeMap::new();
    for series in per_location {
        for obs in series {
            let slot = acc.entry(obs.date).or_insert([(0.0, 0); 2]);
            if let Some(v) = obs.tmax {
                slot[0].0 += v;
                slot[0].1 += 1;
            }
            if let Some(v) = obs.tmin {
                slot[1].0 += v;
                slot[1].1 += 1;
            }
        }
    }

    let mean = |(sum, n): (f64, usize)| (n > 0).then(|| sum / n as f64);
    acc.into_iter()
        .map(|(date, [hi, lo])| DailyObservation {
            date,
            tmax: mean(hi),
            tmin: mean(lo),
        })
        .collect()
}

/// Drop incomplete days and IQR outliers.
pub fn clean_daily(daily: &[DailyObservation]) -> Vec<CleanDay> {
    let complete: Vec<CleanDay> = daily
        .iter()
        .filter_map(|d| match (d.tmax, d.tmin) {
            (Some(tmax), Some(tmin)) => Some(CleanDay {
                year: d.date.year(),
                month: d.date.month(),
                tmax,
                tmin,
            }),
            _ => None,
        })
        .collect();
    let total = complete.len();

    let after_max = iqr_filter(complete, |d| d.tmax);
    let cleaned = iqr_filter(after_max, |d| d.tmin);

    debug!(
        input = daily.len(),
        complete = total,
        kept = cleaned.len(),
        "daily series cleaned"
    );
    cleaned
}

fn iqr_filter(days: Vec<CleanDay>, value: impl Fn(&CleanDay) -> f64) -> Vec<CleanDay> {
    let mut sorted: Vec<f64> = days.iter().map(&value).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let (Some(q1), Some(q3)) = (quantile_sorted(&sorted, 0.25), quantile_sorted(&sorted, 0.75)) else {
        return days;
    };
    let iqr = q3 - q1;
    let lo = q1 - IQR_FACTOR * iqr;
    let hi = q3 + IQR_FACTOR * iqr;
    days.into_iter()
        .filter(|d| {
            let v = value(d);
            v >= lo && v <= hi
        })
        .collect()
}

/// Average the target month per year, keeping years with at least `min_days` days.
pub fn aggregate_month(days: &[CleanDay], month: u32, min_days: usize) -> Result<YearlyDataset, ForecastError> {
    let mut by_year: BTreeMap<i32, (f64, f64, usize)> = BTreeMap::new();
    for d in days.iter().filter(|d| d.month == month) {
        let slot = by_year.entry(d.year).or_insert((0.0, 0.0, 0));
        slot.0 += d.tmax;
        slot.1 += d.tmin;
        slot.2 += 1;
    }

    let mut dropped = Vec::new();
    let rows: Vec<(i32, f64, f64, usize)> = by_year
        .into_iter()
        .filter_map(|(year, (hi, lo, n))| {
            if n < min_days {
                dropped.push(year);
                return None;
            }
            Some((year, hi / n as f64, lo / n as f64, n))
        })
        .collect();

    if !dropped.is_empty() {
        info!(?dropped, min_days, "years below the day threshold dropped");
    }
    YearlyDataset::from_means(&rows)
}

/// Full cleaning and aggregation for one month.
pub fn build_yearly(daily: &[DailyObservation], month: u32, min_days: usize) -> Result<YearlyDataset, ForecastError> {
    let cleaned = clean_daily(daily);
    aggregate_month(&cleaned, month, min_days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(y: i32, m: u32, d: u32, tmax: Option<f64>, tmin: Option<f64>) -> DailyObservation {
        DailyObservation {
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            tmax,
            tmin,
        }
    }

    fn august(year: i32, days: u32, tmax: f64, tmin: f64) -> Vec<DailyObservation> {
        (1..=days).map(|d| day(year, 8, d, Some(tmax), Some(tmin))).collect()
    }

    #[test]
    fn national_average_uses_available_locations() {
        let a = vec![day(2024, 8, 1, Some(30.0), Some(18.0)), day(2024, 8, 2, Some(28.0), None)];
        let b = vec![day(2024, 8, 1, Some(26.0), Some(16.0)), day(2024, 8, 3, None, Some(15.0))];
        let out = national_average(&[a, b]);

        assert_eq!(out.len(), 3);
        assert_eq!(out[0].tmax, Some(28.0));
        assert_eq!(out[0].tmin, Some(17.0));
        assert_eq!(out[1].tmax, Some(28.0));
        assert_eq!(out[1].tmin, None);
        assert_eq!(out[2].tmax, None);
    }

    #[test]
    fn iqr_filter_removes_spikes() {
        let mut daily: Vec<DailyObservation> = (1..=31)
            .map(|d| day(2020, 8, d, Some(27.0 + (d % 5) as f64 * 0.2), Some(16.0 + (d % 3) as f64 * 0.1)))
            .collect();
        daily[10].tmax = Some(55.0);
        daily[20].tmin = Some(-20.0);

        let cleaned = clean_daily(&daily);
        assert_eq!(cleaned.len(), 29);
        assert!(cleaned.iter().all(|d| d.tmax < 30.0 && d.tmin > 10.0));
    }

    #[test]
    fn incomplete_days_are_dropped() {
        let daily = vec![day(2020, 8, 1, Some(27.0), None), day(2020, 8, 2, Some(27.0), Some(15.0))];
        assert_eq!(clean_daily(&daily).len(), 1);
    }

    #[test]
    fn thin_years_are_absent() {
        let mut daily = august(2019, 31, 27.0, 16.0);
        daily.extend(august(2020, 10, 27.0, 16.0));
        daily.extend(august(2021, 20, 27.0, 16.0));
        // Other months never count toward August.
        daily.extend((1..=30).map(|d| day(2020, 7, d, Some(27.0), Some(16.0))));

        let ds = build_yearly(&daily, 8, 20).unwrap();
        assert_eq!(ds.years().collect::<Vec<_>>(), vec![2019, 2021]);
        assert_eq!(ds.get(2021).unwrap().days, 20);
        assert_eq!(ds.get(2021).unwrap().avg_high, 27.0);
    }

    #[test]
    fn yearly_means_carry_rolling_values() {
        let mut daily = Vec::new();
        for (i, year) in (2015..2022).enumerate() {
            daily.extend(august(year, 31, 25.0 + i as f64 * 0.1, 15.0));
        }
        let ds = build_yearly(&daily, 8, 20).unwrap();
        assert_eq!(ds.len(), 7);
        let first = &ds.records()[0];
        assert!((first.rolling_high - first.avg_high).abs() < 1e-12);
        let last = ds.records().last().unwrap();
        assert!((last.rolling_high - 25.4).abs() < 1e-9);
    }
}

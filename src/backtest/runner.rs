//! Expanding-window backtest.

use tracing::{debug, trace};

use crate::domain::{BacktestRecord, TargetColumn, YearlyDataset};
use crate::error::ForecastError;
use crate::models::Forecaster;

/// Backtest a strategy over `test_years`, in the order given.
///
/// For each year the training set is every row strictly before it. Years that
/// are absent from `data`, or have no earlier rows, are skipped. A fresh
/// strategy comes from `make` for every trial; any error aborts the run.
pub fn run_backtest<S, F>(
    data: &YearlyDataset,
    target: TargetColumn,
    test_years: &[i32],
    mut make: F,
) -> Result<Vec<BacktestRecord>, ForecastError>
where
    S: Forecaster,
    F: FnMut() -> Result<S, ForecastError>,
{
    let mut records = Vec::with_capacity(test_years.len());

    for &year in test_years {
        let Some(row) = data.get(year) else {
            trace!(year, "test year not in dataset, skipped");
            continue;
        };
        let train = data.before(year);
        if train.is_empty() {
            trace!(year, "no training rows before test year, skipped");
            continue;
        }

        let mut model = make()?;
        model.train(&train, target)?;
        let predicted = model.predict(year)?;
        let record = BacktestRecord::new(year, row.value(target), predicted);

        debug!(
            model = model.name(),
            %target,
            year,
            actual = record.actual,
            predicted,
            error = record.error,
            "backtest trial"
        );
        records.push(record);
    }

    Ok(records)
}

/// Mean absolute error of a backtest; `None` when there are no records.
pub fn mean_absolute_error(records: &[BacktestRecord]) -> Option<f64> {
    if records.is_empty() {
        return None;
    }
    Some(records.iter().map(|r| r.error).sum::<f64>() / records.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{StructuralForecaster, TrendForecaster};

    fn linear(years: impl Iterator<Item = i32>) -> YearlyDataset {
        let rows: Vec<(i32, f64, f64, usize)> = years
            .map(|y| (y, 20.0 + 0.1 * (y - 2010) as f64, 10.0 + 0.05 * (y - 2010) as f64, 31))
            .collect();
        YearlyDataset::from_means(&rows).unwrap()
    }

    #[test]
    fn one_record_per_usable_year_in_request_order() {
        let data = linear((2010..2016).chain(2017..2020));
        // 2016 is missing, 2010 has no history, 2030 is absent.
        let years = [2019, 2016, 2010, 2014, 2030];
        let out = run_backtest(&data, TargetColumn::AvgHigh, &years, || Ok(TrendForecaster::default())).unwrap();
        assert_eq!(out.iter().map(|r| r.year).collect::<Vec<_>>(), vec![2019, 2014]);
    }

    #[test]
    fn trials_never_see_the_held_out_year() {
        let mut data_rows: Vec<(i32, f64, f64, usize)> =
            (2010..2020).map(|y| (y, 20.0, 10.0, 31)).collect();
        data_rows.push((2020, 99.0, 10.0, 31));
        let data = YearlyDataset::from_means(&data_rows).unwrap();

        let out = run_backtest(&data, TargetColumn::AvgHigh, &[2020], || Ok(TrendForecaster::default())).unwrap();
        assert_eq!(out[0].predicted, 20.0);
        assert_eq!(out[0].error, 79.0);
    }

    #[test]
    fn linear_series_is_predicted_closely_by_both_strategies() {
        let data = linear(2010..2024);
        let years = [2022, 2023];
        let trend = run_backtest(&data, TargetColumn::AvgHigh, &years, || Ok(TrendForecaster::default())).unwrap();
        let structural =
            run_backtest(&data, TargetColumn::AvgHigh, &years, || Ok(StructuralForecaster::default())).unwrap();
        assert_eq!(trend.len(), 2);
        assert_eq!(structural.len(), 2);
        assert!(trend.iter().chain(&structural).all(|r| r.error < 0.5));
    }

    #[test]
    fn strategy_errors_propagate() {
        let data = linear(2010..2013);
        // Training on a single row is too little for the structural strategy.
        let err = run_backtest(&data, TargetColumn::AvgHigh, &[2012, 2011], || {
            Ok(StructuralForecaster::default())
        })
        .unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientData(_)));
    }

    #[test]
    fn mae_of_empty_run_is_none() {
        assert_eq!(mean_absolute_error(&[]), None);
        let recs = [BacktestRecord::new(2020, 1.0, 2.0), BacktestRecord::new(2021, 1.0, 4.0)];
        assert_eq!(mean_absolute_error(&recs), Some(2.0));
    }
}

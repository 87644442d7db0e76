//! Formatted terminal and markdown output.
//!
//! Formatting lives here so the pipeline only assembles data, and output
//! changes stay local. The results table layout is a compatibility surface:
//! downstream tooling parses its seven columns.

use std::collections::BTreeSet;
use std::fmt::Write;

use chrono::Month;

use crate::backtest::mean_absolute_error;
use crate::domain::{EnsembleWeights, TargetColumn, YearlyDataset};
use crate::report::{ForecastRow, ModelBacktests};

pub const TABLE_HEADER: &str = "| Year | Model | Act Max | Pred Max | Act Min | Pred Min | Status |";
pub const TABLE_SEPARATOR: &str = "|------|-------|---------|----------|---------|----------|--------|";

const MISSING: &str = "-";

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.2}")).unwrap_or_else(|| MISSING.to_string())
}

fn push_row(out: &mut String, year: i32, model: &str, cells: [Option<f64>; 4], status: &str) {
    let [act_max, pred_max, act_min, pred_min] = cells;
    let _ = writeln!(
        out,
        "| {year} | {model} | {} | {} | {} | {} | {status} |",
        fmt_opt(act_max),
        fmt_opt(pred_max),
        fmt_opt(act_min),
        fmt_opt(pred_min),
    );
}

/// English month name, falling back to the number.
pub fn month_name(month: u32) -> String {
    u8::try_from(month)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .map(|m| m.name().to_string())
        .unwrap_or_else(|| format!("month {month}"))
}

/// Build the combined historical / validated / forecast table.
///
/// - historical: the last `history_rows` dataset years not used in validation
/// - validated: each backtested year ascending, one row per model in order
/// - forecast: ascending by year, actuals blank
pub fn format_results_table(
    data: &YearlyDataset,
    validation: &[ModelBacktests],
    forecasts: &[ForecastRow],
    history_rows: usize,
) -> String {
    let validated: BTreeSet<i32> = validation
        .iter()
        .flat_map(|m| m.high.iter().chain(&m.low).map(|r| r.year))
        .collect();

    let mut out = String::new();
    out.push_str(TABLE_HEADER);
    out.push('\n');
    out.push_str(TABLE_SEPARATOR);
    out.push('\n');

    let history: Vec<_> = data
        .records()
        .iter()
        .filter(|r| !validated.contains(&r.year))
        .collect();
    let skip = history.len().saturating_sub(history_rows);
    for rec in history.into_iter().skip(skip) {
        push_row(
            &mut out,
            rec.year,
            "Historical",
            [Some(rec.avg_high), None, Some(rec.avg_low), None],
            "Actual",
        );
    }

    for &year in &validated {
        let actual = data.get(year);
        for model in validation {
            let high = model.high_for(year);
            let low = model.low_for(year);
            let act_max = actual.map(|r| r.avg_high).or(high.map(|r| r.actual));
            let act_min = actual.map(|r| r.avg_low).or(low.map(|r| r.actual));
            push_row(
                &mut out,
                year,
                &model.model,
                [act_max, high.map(|r| r.predicted), act_min, low.map(|r| r.predicted)],
                "Validated",
            );
        }
    }

    let mut ordered: Vec<&ForecastRow> = forecasts.iter().collect();
    ordered.sort_by_key(|f| f.year);
    for f in ordered {
        push_row(&mut out, f.year, &f.model, [None, Some(f.high), None, Some(f.low)], "Forecast");
    }

    out
}

/// Headline for the national forecast.
pub fn format_forecast_banner(region: &str, month: u32, forecast: &ForecastRow) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== wx - {} temperature outlook: {region} ===", month_name(month));
    let _ = writeln!(
        out,
        "{} forecast ({}): avg max {:.2} °C | avg min {:.2} °C",
        forecast.year, forecast.model, forecast.high, forecast.low
    );
    out
}

/// Ensemble weights per target, as `Trend 0.60 / Structural 0.40`.
pub fn format_weights(names: &[&str], weights: &[(TargetColumn, EnsembleWeights)]) -> String {
    let mut out = String::from("Ensemble weights:\n");
    for (target, w) in weights {
        let parts: Vec<String> = names
            .iter()
            .zip(w.as_slice())
            .map(|(name, v)| format!("{name} {v:.2}"))
            .collect();
        let _ = writeln!(out, "- {}: {}", target.label(), parts.join(" / "));
    }
    out
}

/// Per-strategy backtest records and MAE, for the `backtest` command.
pub fn format_backtest_table(models: &[ModelBacktests]) -> String {
    let mut out = String::new();
    for target in TargetColumn::ALL {
        let _ = writeln!(out, "Backtest ({}):", target.label());
        let _ = writeln!(out, "{:<12} {:>6} {:>9} {:>9} {:>7}", "Model", "Year", "Actual", "Predicted", "AbsErr");
        for model in models {
            let records = match target {
                TargetColumn::AvgHigh => &model.high,
                TargetColumn::AvgLow => &model.low,
            };
            for r in records {
                let _ = writeln!(
                    out,
                    "{:<12} {:>6} {:>9.2} {:>9.2} {:>7.2}",
                    model.model, r.year, r.actual, r.predicted, r.error
                );
            }
            let _ = writeln!(out, "{:<12} MAE={}", model.model, fmt_opt(mean_absolute_error(records)));
        }
        out.push('\n');
    }
    out
}

/// Markdown summary: title, headline numbers, then the results table.
pub fn render_summary_markdown(region: &str, month: u32, forecast: &ForecastRow, table: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "# {} {} Temperature Forecast: {region}\n",
        month_name(month),
        forecast.year
    );
    let _ = writeln!(out, "- **Predicted average max:** {:.2} °C", forecast.high);
    let _ = writeln!(out, "- **Predicted average min:** {:.2} °C", forecast.low);
    let _ = writeln!(out, "- **Model:** {}\n", forecast.model);
    out.push_str("## Results\n\n");
    out.push_str(table);
    out
}

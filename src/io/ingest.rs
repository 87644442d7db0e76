//! Daily observation CSV ingest.
//!
//! Accepts the archive's own column names as well as the short ones:
//!
//! - `date` / `time`
//! - `tmax` / `temperature_2m_max`
//! - `tmin` / `temperature_2m_min`
//! - optional `location` / `city`: rows are averaged per date across locations
//!
//! Bad rows are skipped and reported; they never abort the load.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;

use crate::data::national_average;
use crate::domain::DailyObservation;
use crate::error::{AppError, EXIT_INSUFFICIENT_DATA};

const DATE_COLUMNS: [&str; 2] = ["date", "time"];
const TMAX_COLUMNS: [&str; 2] = ["tmax", "temperature_2m_max"];
const TMIN_COLUMNS: [&str; 2] = ["tmin", "temperature_2m_min"];
const LOCATION_COLUMNS: [&str; 2] = ["location", "city"];

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct DailyIngest {
    /// National daily series, ascending by date.
    pub observations: Vec<DailyObservation>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub locations: usize,
}

struct Columns {
    date: usize,
    tmax: usize,
    tmin: usize,
    location: Option<usize>,
}

pub fn load_daily_csv(path: &Path) -> Result<DailyIngest, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::config(format!("Failed to open CSV '{}': {e}", path.display())))?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AppError::config(format!("Failed to read CSV headers: {e}")))?
        .clone();
    let columns = resolve_columns(&headers)?;

    let mut per_location: BTreeMap<String, Vec<DailyObservation>> = BTreeMap::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // records() starts after the header, on line 2.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_row(&record, &columns) {
            Ok((location, obs)) => per_location.entry(location).or_default().push(obs),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    if per_location.is_empty() {
        return Err(AppError::new(
            EXIT_INSUFFICIENT_DATA,
            format!("No valid rows in '{}'.", path.display()),
        ));
    }

    let locations = per_location.len();
    let series: Vec<Vec<DailyObservation>> = per_location.into_values().collect();
    Ok(DailyIngest {
        observations: national_average(&series),
        row_errors,
        rows_read,
        locations,
    })
}

fn resolve_columns(headers: &StringRecord) -> Result<Columns, AppError> {
    let map: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect();

    let find = |aliases: &[&str]| aliases.iter().find_map(|a| map.get(*a).copied());
    let require = |aliases: &[&str]| {
        find(aliases).ok_or_else(|| {
            AppError::config(format!("Missing required CSV column '{}'.", aliases.join("' or '")))
        })
    };

    Ok(Columns {
        date: require(&DATE_COLUMNS[..])?,
        tmax: require(&TMAX_COLUMNS[..])?,
        tmin: require(&TMIN_COLUMNS[..])?,
        location: find(&LOCATION_COLUMNS[..]),
    })
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a BOM.
    name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase()
}

fn parse_row(record: &StringRecord, columns: &Columns) -> Result<(String, DailyObservation), String> {
    let raw_date = record.get(columns.date).unwrap_or("");
    let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d")
        .map_err(|_| format!("invalid date '{raw_date}' (expected YYYY-MM-DD)"))?;

    let tmax = parse_temperature(record.get(columns.tmax), "tmax")?;
    let tmin = parse_temperature(record.get(columns.tmin), "tmin")?;

    let location = columns
        .location
        .and_then(|idx| record.get(idx))
        .unwrap_or("")
        .to_string();

    Ok((location, DailyObservation { date, tmax, tmin }))
}

fn parse_temperature(raw: Option<&str>, name: &str) -> Result<Option<f64>, String> {
    let raw = raw.unwrap_or("").trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") || raw.eq_ignore_ascii_case("null") {
        return Ok(None);
    }
    let v: f64 = raw.parse().map_err(|_| format!("invalid {name} '{raw}'"))?;
    if !v.is_finite() {
        return Err(format!("{name} must be finite"));
    }
    Ok(Some(v))
}

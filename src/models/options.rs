//! Free-form strategy options.
//!
//! Strategies are configured from a flat `key -> value` mapping (config file
//! section or CLI flags). Each strategy declares the keys it recognizes and
//! rejects everything else before any training happens.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::ForecastError;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "BTreeMap<String, serde_json::Value>")]
pub struct StrategyOptions(BTreeMap<String, String>);

impl From<BTreeMap<String, serde_json::Value>> for StrategyOptions {
    fn from(raw: BTreeMap<String, serde_json::Value>) -> Self {
        let map = raw
            .into_iter()
            .map(|(k, v)| {
                let v = match v {
                    serde_json::Value::String(s) => s,
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                };
                (k, v)
            })
            .collect();
        Self(map)
    }
}

impl StrategyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse a `key=value` pair as given on the command line.
    pub fn parse_pair(raw: &str) -> Result<(String, String), ForecastError> {
        let (key, value) = raw.split_once('=').ok_or_else(|| {
            ForecastError::Configuration(format!("expected key=value, got '{raw}'"))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(ForecastError::Configuration(format!("empty option key in '{raw}'")));
        }
        Ok((key.to_string(), value.trim().to_string()))
    }

    /// Fail on any key outside `known`.
    pub fn ensure_known(&self, strategy: &str, known: &[&str]) -> Result<(), ForecastError> {
        if let Some(key) = self.0.keys().find(|k| !known.contains(&k.as_str())) {
            return Err(ForecastError::Configuration(format!(
                "unknown option '{key}' for {strategy} strategy (expected one of: {})",
                known.join(", ")
            )));
        }
        Ok(())
    }

    pub fn parse_f64(&self, key: &str) -> Result<Option<f64>, ForecastError> {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        let v: f64 = raw.parse().map_err(|_| {
            ForecastError::Configuration(format!("option '{key}' expects a number, got '{raw}'"))
        })?;
        if !v.is_finite() {
            return Err(ForecastError::Configuration(format!("option '{key}' must be finite")));
        }
        Ok(Some(v))
    }

    pub fn parse_usize(&self, key: &str) -> Result<Option<usize>, ForecastError> {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        raw.parse().map(Some).map_err(|_| {
            ForecastError::Configuration(format!(
                "option '{key}' expects a non-negative integer, got '{raw}'"
            ))
        })
    }
}

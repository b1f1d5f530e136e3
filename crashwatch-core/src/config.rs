//! Monitor configuration.
//!
//! Every field has a compiled-in default, so a run needs no config file at all.
//! A TOML file may override any subset of keys. The crash trigger itself is
//! [`CRASH_TRIGGER_PCT`] and is not configurable.

use chrono::Timelike;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Crash trigger: the index change (percent) at or below which a tranche fires.
pub const CRASH_TRIGGER_PCT: f64 = -3.0;

/// India VIX level above which the allocation shifts away from midcaps.
pub const VIX_THRESHOLD: f64 = 20.0;

const WEIGHT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// A fund receiving a share of each deployed tranche.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Fund {
    pub name: String,
    /// Share of the tranche under normal volatility.
    pub weight: f64,
    /// Share of the tranche when VIX is above the threshold.
    pub high_vix_weight: f64,
}

impl Fund {
    pub fn new(name: impl Into<String>, weight: f64, high_vix_weight: f64) -> Self {
        Self {
            name: name.into(),
            weight,
            high_vix_weight,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorConfig {
    pub index_symbol: String,
    pub index_name: String,
    /// Empty disables the VIX fetch.
    pub vix_symbol: String,
    pub vix_threshold: f64,
    /// Rupee amount per tranche, in deployment order.
    pub crash_sequence: Vec<u64>,
    pub funds: Vec<Fund>,
    /// Symbols ranked for the top movers lines.
    pub watchlist: Vec<String>,
    /// Market-local `HH:MM` of the end-of-day summary run.
    pub eod_time: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            index_symbol: "^NSEI".into(),
            index_name: "Nifty 50".into(),
            vix_symbol: "^INDIAVIX".into(),
            vix_threshold: VIX_THRESHOLD,
            crash_sequence: vec![20_000, 20_000, 10_000, 20_000, 20_000, 10_000],
            funds: vec![
                Fund::new("Navi Nifty India Manufacturing Index Fund", 0.25, 0.25),
                Fund::new("Navi Flexi Cap Fund", 0.25, 0.325),
                Fund::new("Navi Nifty Midcap 150 Index Fund", 0.25, 0.10),
                Fund::new("Navi Nifty 50 Index Fund", 0.25, 0.325),
            ],
            watchlist: Vec::new(),
            eod_time: "18:30".into(),
        }
    }
}

impl MonitorConfig {
    /// Load and validate a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate TOML. Missing keys keep their defaults.
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.index_symbol.trim().is_empty() {
            return Err(ConfigError::Invalid("index_symbol must not be empty".into()));
        }
        if self.crash_sequence.is_empty() {
            return Err(ConfigError::Invalid("crash_sequence must not be empty".into()));
        }
        if self.funds.is_empty() {
            return Err(ConfigError::Invalid("funds must not be empty".into()));
        }
        if self
            .funds
            .iter()
            .any(|f| f.weight < 0.0 || f.high_vix_weight < 0.0)
        {
            return Err(ConfigError::Invalid("fund weights must be non-negative".into()));
        }
        let normal: f64 = self.funds.iter().map(|f| f.weight).sum();
        let high_vix: f64 = self.funds.iter().map(|f| f.high_vix_weight).sum();
        if (normal - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(ConfigError::Invalid(format!(
                "fund weights must sum to 1.0, got {normal}"
            )));
        }
        if (high_vix - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(ConfigError::Invalid(format!(
                "high_vix_weight values must sum to 1.0, got {high_vix}"
            )));
        }
        self.eod_hour_minute()?;
        Ok(())
    }

    /// `eod_time` parsed as (hour, minute).
    pub fn eod_hour_minute(&self) -> Result<(u32, u32), ConfigError> {
        let parsed = chrono::NaiveTime::parse_from_str(&self.eod_time, "%H:%M")
            .map_err(|e| ConfigError::Invalid(format!("eod_time '{}': {e}", self.eod_time)))?;
        Ok((parsed.hour(), parsed.minute()))
    }

    /// VIX symbol, or `None` when the fetch is disabled.
    pub fn vix_symbol(&self) -> Option<&str> {
        let s = self.vix_symbol.trim();
        (!s.is_empty()).then_some(s)
    }
}

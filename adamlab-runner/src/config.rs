//! TOML run configuration.
//!
//! ```toml
//! [projection]
//! horizon = 30
//! short_history = "clamp"
//! missing_close = "drop"
//!
//! [projection.pivot]
//! mode = "side"
//! side = "low"
//! lookback = 10
//!
//! [calendar]
//! holidays = ["2024-12-25"]
//!
//! [data]
//! data_dir = "data"
//! auto_fetch = false
//! refresh_days = 3
//! fetch_days = 365
//! markets = [".TWO", ".TW", ""]
//!
//! [output]
//! output_dir = "outputs"
//! ```
//!
//! Every section and key is optional.

use adamlab_core::{HolidayCalendar, PivotMode, ProjectionConfig};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid holiday '{line}' in {path}")]
    Holiday { path: PathBuf, line: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Full run configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub projection: ProjectionConfig,
    pub calendar: CalendarConfig,
    pub data: DataConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    pub holidays: Vec<NaiveDate>,
}

/// Where price CSVs live and when to re-fetch them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub data_dir: PathBuf,
    pub auto_fetch: bool,
    /// Re-fetch a cached CSV once it is this many days old.
    pub refresh_days: u64,
    /// History window requested from the provider.
    pub fetch_days: u32,
    /// Ticker suffixes tried in order when no market is given.
    pub markets: Vec<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            auto_fetch: false,
            refresh_days: 3,
            fetch_days: 365,
            markets: vec![".TWO".into(), ".TW".into(), String::new()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub output_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("outputs"),
        }
    }
}

impl RunConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine would refuse anyway, before any I/O happens.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.projection.horizon == 0 {
            return Err(ConfigError::Invalid("projection.horizon must be at least 1".into()));
        }
        if let PivotMode::Side { lookback: 0, .. } = self.projection.pivot {
            return Err(ConfigError::Invalid(
                "projection.pivot.lookback must be at least 1".into(),
            ));
        }
        if self.data.fetch_days == 0 {
            return Err(ConfigError::Invalid("data.fetch_days must be at least 1".into()));
        }
        Ok(())
    }

    pub fn business_calendar(&self) -> HolidayCalendar {
        HolidayCalendar::new(self.calendar.holidays.iter().copied())
    }
}

/// Read a holiday list: one `YYYY-MM-DD` per line, `#` comments and blanks ignored.
pub fn read_holidays(path: &Path) -> Result<Vec<NaiveDate>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|line| {
            NaiveDate::parse_from_str(line, "%Y-%m-%d").map_err(|_| ConfigError::Holiday {
                path: path.to_path_buf(),
                line: line.to_string(),
            })
        })
        .collect()
}

//! Watchlist CSV: one instrument per row.
//!
//! Columns: `ticker,name,sheet_name,csv,pivot_date,lookback,horizon,pivot_side,market`.
//! Missing columns read as blank, unknown columns are ignored and rows with a
//! blank ticker are skipped. Cell values are only checked when a row is
//! resolved, so one bad row fails alone.

use std::io::Read;
use std::path::{Path, PathBuf};

use adamlab_core::sanitize::parse_date;
use adamlab_core::{PivotMode, PivotSide, ProjectionConfig, RawValue};
use serde::Deserialize;
use thiserror::Error;

use crate::runner::InstrumentRequest;

const DEFAULT_LOOKBACK: usize = 10;

#[derive(Debug, Error)]
pub enum WatchlistError {
    #[error("failed to read watchlist {path}: {message}")]
    Io { path: String, message: String },

    #[error("watchlist CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("watchlist line {line} ({ticker}): invalid {field} '{value}'")]
    InvalidCell {
        line: usize,
        ticker: String,
        field: &'static str,
        value: String,
    },

    #[error("watchlist line {line} ({ticker}): sheet '{sheet}' is already written by line {first_line}")]
    DuplicateSheet {
        line: usize,
        ticker: String,
        sheet: String,
        first_line: usize,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Row {
    ticker: String,
    name: String,
    sheet_name: String,
    csv: String,
    pivot_date: String,
    lookback: String,
    horizon: String,
    pivot_side: String,
    market: String,
}

/// One watchlist row, cells trimmed but not yet interpreted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchlistEntry {
    /// 1-based file line (the header is line 1).
    pub line: usize,
    pub ticker: String,
    pub name: String,
    pub sheet_name: String,
    pub csv: String,
    pub pivot_date: String,
    pub lookback: String,
    pub horizon: String,
    pub pivot_side: String,
    pub market: String,
}

fn blank_to_none(s: &str) -> Option<&str> {
    Some(s.trim()).filter(|s| !s.is_empty())
}

impl WatchlistEntry {
    fn invalid(&self, field: &'static str, value: &str) -> WatchlistError {
        WatchlistError::InvalidCell {
            line: self.line,
            ticker: self.ticker.clone(),
            field,
            value: value.to_string(),
        }
    }

    /// Explicit CSV path for this row, bypassing the data directory.
    pub fn csv_path(&self) -> Option<PathBuf> {
        blank_to_none(&self.csv).map(PathBuf::from)
    }

    /// Forced market suffix.
    pub fn market(&self) -> Option<String> {
        blank_to_none(&self.market).map(str::to_string)
    }

    /// Output name: `sheet_name`, else the ticker.
    pub fn sheet(&self) -> &str {
        blank_to_none(&self.sheet_name).unwrap_or(&self.ticker)
    }

    /// Resolve against `base`. Row cells win; blanks inherit from `base`.
    ///
    /// A `pivot_date` selects date mode. Otherwise the row is side mode with
    /// side and lookback from the row, else from `base` when it is side mode,
    /// else `low` and 10.
    pub fn projection_config(
        &self,
        base: &ProjectionConfig,
    ) -> Result<ProjectionConfig, WatchlistError> {
        let mut config = *base;

        if let Some(h) = blank_to_none(&self.horizon) {
            config.horizon = match h.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => return Err(self.invalid("horizon", h)),
            };
        }

        if let Some(d) = blank_to_none(&self.pivot_date) {
            let date = parse_date(&RawValue::Text(d.to_string()))
                .ok_or_else(|| self.invalid("pivot_date", d))?;
            config.pivot = PivotMode::ExplicitDate { date };
            return Ok(config);
        }

        let (base_side, base_lookback) = match base.pivot {
            PivotMode::Side { side, lookback } => (side, lookback),
            PivotMode::ExplicitDate { .. } => (PivotSide::Min, DEFAULT_LOOKBACK),
        };
        let side = match blank_to_none(&self.pivot_side) {
            Some(s) => s.parse::<PivotSide>().map_err(|_| self.invalid("pivot_side", s))?,
            None => base_side,
        };
        let lookback = match blank_to_none(&self.lookback) {
            Some(l) => match l.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => return Err(self.invalid("lookback", l)),
            },
            None => base_lookback,
        };
        config.pivot = PivotMode::Side { side, lookback };
        Ok(config)
    }

    pub fn request(&self, base: &ProjectionConfig) -> Result<InstrumentRequest, WatchlistError> {
        Ok(InstrumentRequest::new(self.ticker.clone(), self.projection_config(base)?)
            .with_sheet_name(self.sheet()))
    }
}

pub fn read_watchlist<R: Read>(reader: R) -> Result<Vec<WatchlistEntry>, WatchlistError> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let mut entries = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let row: Row = record.deserialize(Some(&headers))?;
        let ticker = row.ticker.trim().to_string();
        if ticker.is_empty() {
            continue;
        }
        // file line where the record starts; blank lines and quoted newlines count
        let line = record.position().map_or(0, |p| p.line() as usize);
        entries.push(WatchlistEntry {
            line,
            ticker,
            name: row.name,
            sheet_name: row.sheet_name,
            csv: row.csv,
            pivot_date: row.pivot_date,
            lookback: row.lookback,
            horizon: row.horizon,
            pivot_side: row.pivot_side,
            market: row.market,
        });
    }
    Ok(entries)
}

pub fn load_watchlist(path: &Path) -> Result<Vec<WatchlistEntry>, WatchlistError> {
    let file = std::fs::File::open(path).map_err(|e| WatchlistError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    read_watchlist(file)
}

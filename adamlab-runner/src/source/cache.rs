//! Data-directory cache: `<data_dir>/<ticker>.csv`.
//!
//! With a fetcher attached, a file that is missing or at least `refresh_days`
//! old (by mtime) is re-downloaded before it is read. A failed refresh falls
//! back to the stale file when one exists.
//!
//! A source built with [`CachedSource::with_path`] reads and refreshes one
//! explicit file instead of the ticker file in `data_dir`.

use super::csv_file::CsvSource;
use super::yahoo::{write_bars_csv, YahooSource};
use super::{PriceSource, SourceError};
use adamlab_core::RawRecord;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// True when `path` is missing, unreadable, or `refresh_days` old at `now`.
pub fn needs_refresh(path: &Path, refresh_days: u64, now: SystemTime) -> bool {
    let Ok(modified) = std::fs::metadata(path).and_then(|m| m.modified()) else {
        return true;
    };
    let max_age = Duration::from_secs(refresh_days.saturating_mul(24 * 60 * 60));
    // mtime in the future is treated as fresh
    now.duration_since(modified).map_or(false, |age| age >= max_age)
}

#[derive(Clone)]
pub struct CachedSource {
    data_dir: PathBuf,
    refresh_days: u64,
    fetcher: Option<Arc<YahooSource>>,
    market: Option<String>,
    path: Option<PathBuf>,
}

impl CachedSource {
    /// Read-only cache: files are never fetched.
    pub fn new(data_dir: impl Into<PathBuf>, refresh_days: u64) -> Self {
        Self {
            data_dir: data_dir.into(),
            refresh_days,
            fetcher: None,
            market: None,
            path: None,
        }
    }

    /// Use `path` for every ticker instead of `<data_dir>/<ticker>.csv`.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<YahooSource>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Force a market suffix for fetches.
    pub fn with_market(mut self, market: Option<String>) -> Self {
        self.market = market;
        self
    }

    pub fn path_for(&self, ticker: &str) -> PathBuf {
        if let Some(path) = &self.path {
            return path.clone();
        }
        self.data_dir.join(format!("{}.csv", ticker.trim()))
    }

    /// Fetch `ticker` and overwrite its cache file.
    pub fn refresh(&self, fetcher: &YahooSource, ticker: &str) -> Result<PathBuf, SourceError> {
        let path = self.path_for(ticker);
        let fetched = fetcher.fetch(ticker, self.market.as_deref())?;
        write_bars_csv(&path, &fetched.bars)?;
        tracing::info!(
            ticker,
            symbol = %fetched.symbol,
            bars = fetched.bars.len(),
            path = %path.display(),
            "cache refreshed"
        );
        Ok(path)
    }
}

impl PriceSource for CachedSource {
    fn name(&self) -> &str {
        if self.path.is_some() {
            "csv"
        } else {
            "data_dir"
        }
    }

    fn load(&self, symbol: &str) -> Result<Vec<RawRecord>, SourceError> {
        let path = self.path_for(symbol);

        if let Some(fetcher) = &self.fetcher {
            if needs_refresh(&path, self.refresh_days, SystemTime::now()) {
                if let Err(e) = self.refresh(fetcher, symbol) {
                    if !path.exists() {
                        return Err(e);
                    }
                    tracing::warn!(ticker = symbol, error = %e, "refresh failed, using stale cache");
                }
            }
        }

        CsvSource::new(path).load(symbol)
    }
}

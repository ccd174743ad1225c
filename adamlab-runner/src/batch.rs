//! Watchlist batches.
//!
//! Every entry runs on the rayon pool. One instrument failing never stops the
//! others; its error is kept in the report with its ticker. Fetches from all
//! workers share one circuit breaker through the `YahooSource`.
//!
//! Rows whose sheet names land in the same output directory are not run in
//! parallel: the first row keeps the directory and later ones fail.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use adamlab_core::BusinessCalendar;
use chrono::NaiveDateTime;
use rayon::prelude::*;
use thiserror::Error;

use crate::config::RunConfig;
use crate::runner::{run_instrument, InstrumentSummary, RunError};
use crate::sink::{sheet_dir_name, SinkError, TimelineSink};
use crate::source::{CachedSource, PriceSource, YahooSource};
use crate::watchlist::{WatchlistEntry, WatchlistError};

#[derive(Debug, Error)]
pub enum BatchFailure {
    #[error(transparent)]
    Watchlist(#[from] WatchlistError),

    #[error(transparent)]
    Run(#[from] RunError),
}

#[derive(Debug)]
pub struct BatchOutcome {
    pub ticker: String,
    pub sheet_name: String,
    pub result: Result<InstrumentSummary, BatchFailure>,
}

impl BatchOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug)]
pub struct BatchReport {
    pub run_ts: NaiveDateTime,
    /// In watchlist order.
    pub outcomes: Vec<BatchOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn run_log_name(&self) -> String {
        format!("run_log_{}.csv", self.run_ts.format("%Y%m%d_%H%M%S"))
    }

    /// `ticker,sheet_name,status,rows,pivot_date,dataset_hash,warnings,error`
    pub fn export_run_log(&self) -> Result<String, SinkError> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        wtr.write_record([
            "ticker",
            "sheet_name",
            "status",
            "rows",
            "pivot_date",
            "dataset_hash",
            "warnings",
            "error",
        ])?;
        for o in &self.outcomes {
            let record: [String; 8] = match &o.result {
                Ok(s) => [
                    o.ticker.clone(),
                    o.sheet_name.clone(),
                    "ok".into(),
                    s.rows.to_string(),
                    s.pivot.date.format("%Y-%m-%d").to_string(),
                    s.dataset_hash.0.clone(),
                    s.warnings.join("; "),
                    String::new(),
                ],
                Err(e) => [
                    o.ticker.clone(),
                    o.sheet_name.clone(),
                    "failed".into(),
                    String::new(),
                    String::new(),
                    String::new(),
                    String::new(),
                    e.to_string(),
                ],
            };
            wtr.write_record(&record)?;
        }
        let data = wtr.into_inner().map_err(|e| SinkError::Io {
            path: "<memory>".into(),
            message: e.to_string(),
        })?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    /// Write the run log into `output_dir` and return its path.
    pub fn write_run_log(&self, output_dir: &Path) -> Result<PathBuf, SinkError> {
        let io = |e: std::io::Error| SinkError::Io {
            path: output_dir.display().to_string(),
            message: e.to_string(),
        };
        std::fs::create_dir_all(output_dir).map_err(io)?;
        let path = output_dir.join(self.run_log_name());
        std::fs::write(&path, self.export_run_log()?).map_err(io)?;
        Ok(path)
    }
}

/// Pick the source for one entry: an explicit `csv` cell, else the data directory.
///
/// Either file is refreshed by the same age rule when a fetcher is attached.
pub fn source_for(
    entry: &WatchlistEntry,
    config: &RunConfig,
    fetcher: Option<&Arc<YahooSource>>,
) -> Box<dyn PriceSource> {
    let mut cached = CachedSource::new(&config.data.data_dir, config.data.refresh_days)
        .with_market(entry.market());
    if let Some(path) = entry.csv_path() {
        cached = cached.with_path(path);
    }
    match fetcher {
        Some(f) => Box::new(cached.with_fetcher(Arc::clone(f))),
        None => Box::new(cached),
    }
}

fn run_entry(
    entry: &WatchlistEntry,
    config: &RunConfig,
    fetcher: Option<&Arc<YahooSource>>,
    sink: &dyn TimelineSink,
    calendar: &dyn BusinessCalendar,
    run_ts: NaiveDateTime,
) -> Result<InstrumentSummary, BatchFailure> {
    let request = entry.request(&config.projection)?;
    let source = source_for(entry, config, fetcher);
    Ok(run_instrument(&request, source.as_ref(), sink, calendar, run_ts)?)
}

/// For each entry, the error to report if an earlier row already claimed its sheet directory.
fn sheet_conflicts(entries: &[WatchlistEntry]) -> Vec<Option<WatchlistError>> {
    let mut claimed: HashMap<String, usize> = HashMap::with_capacity(entries.len());
    entries
        .iter()
        .map(|entry| {
            let dir = sheet_dir_name(entry.sheet());
            match claimed.get(&dir) {
                Some(&first_line) => Some(WatchlistError::DuplicateSheet {
                    line: entry.line,
                    ticker: entry.ticker.clone(),
                    sheet: entry.sheet().to_string(),
                    first_line,
                }),
                None => {
                    claimed.insert(dir, entry.line);
                    None
                }
            }
        })
        .collect()
}

/// Run every entry. `fetcher` enables refresh of stale data-directory files.
pub fn run_batch(
    entries: &[WatchlistEntry],
    config: &RunConfig,
    fetcher: Option<Arc<YahooSource>>,
    sink: &dyn TimelineSink,
    calendar: &dyn BusinessCalendar,
    run_ts: NaiveDateTime,
) -> BatchReport {
    tracing::info!(instruments = entries.len(), fetch = fetcher.is_some(), "batch started");

    let outcomes: Vec<BatchOutcome> = entries
        .par_iter()
        .zip(sheet_conflicts(entries))
        .map(|(entry, conflict)| {
            let result = match conflict {
                Some(e) => Err(BatchFailure::Watchlist(e)),
                None => run_entry(entry, config, fetcher.as_ref(), sink, calendar, run_ts),
            };
            if let Err(e) = &result {
                tracing::warn!(
                    ticker = %entry.ticker,
                    line = entry.line,
                    error = %e,
                    "instrument failed"
                );
            }
            BatchOutcome {
                ticker: entry.ticker.clone(),
                sheet_name: entry.sheet().to_string(),
                result,
            }
        })
        .collect();

    let report = BatchReport { run_ts, outcomes };
    tracing::info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        "batch finished"
    );
    report
}

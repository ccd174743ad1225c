//! CSV price files.
//!
//! Header rules: the date column is `Date`, or else the first header starting
//! with `date` (case-insensitive). The close column is `Close`, falling back
//! to `Adj Close`. `Open`, `High`, `Low` and `Volume` become bar cells. Every
//! other column is carried as an extra cell.

use super::{PriceSource, SourceError};
use adamlab_core::{BarCells, RawRecord, RawValue};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Reads one CSV file regardless of the symbol asked for.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PriceSource for CsvSource {
    fn name(&self) -> &str {
        "csv"
    }

    fn load(&self, symbol: &str) -> Result<Vec<RawRecord>, SourceError> {
        let file = std::fs::File::open(&self.path).map_err(|e| SourceError::io(&self.path, e))?;
        let rows = read_records(file, &self.path.display().to_string())?;
        tracing::debug!(symbol, path = %self.path.display(), rows = rows.len(), "loaded csv");
        Ok(rows)
    }
}

fn normalize(header: &str) -> String {
    header.trim_start_matches('\u{feff}').trim().to_ascii_lowercase()
}

fn find_date_column(headers: &[String]) -> Option<usize> {
    headers
        .iter()
        .position(|h| h == "date")
        .or_else(|| headers.iter().position(|h| h.starts_with("date")))
}

fn find_close_column(headers: &[String]) -> Option<usize> {
    headers
        .iter()
        .position(|h| h == "close")
        .or_else(|| headers.iter().position(|h| h == "adj close"))
}

/// Parse CSV text into raw rows. `origin` names the input in errors.
///
/// Short rows read as missing cells; the sanitizer decides what to drop.
pub fn read_records<R: Read>(reader: R, origin: &str) -> Result<Vec<RawRecord>, SourceError> {
    let mut rdr = ::csv::ReaderBuilder::new()
        .flexible(true)
        .trim(::csv::Trim::Fields)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| SourceError::Csv(format!("{origin}: {e}")))?
        .iter()
        .map(normalize)
        .collect();

    let date_col = find_date_column(&headers).ok_or_else(|| SourceError::MissingColumn {
        column: "Date".into(),
        path: origin.to_string(),
    })?;
    let close_col = find_close_column(&headers).ok_or_else(|| SourceError::MissingColumn {
        column: "Close".into(),
        path: origin.to_string(),
    })?;

    let column = |name: &str| headers.iter().position(|h| h == name);
    let bar_cols = [column("open"), column("high"), column("low"), column("volume")];
    let claimed = |i: usize| i == date_col || i == close_col || bar_cols.contains(&Some(i));
    let cell = |record: &::csv::StringRecord, col: Option<usize>| {
        RawValue::from_text(col.and_then(|i| record.get(i)))
    };

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(|e| SourceError::Csv(format!("{origin}: {e}")))?;
        let bar = BarCells {
            open: cell(&record, bar_cols[0]),
            high: cell(&record, bar_cols[1]),
            low: cell(&record, bar_cols[2]),
            volume: cell(&record, bar_cols[3]),
        };
        let extra = (0..record.len())
            .filter(|&i| !claimed(i))
            .map(|i| RawValue::from_text(record.get(i)))
            .collect();
        rows.push(
            RawRecord::new(
                RawValue::from_text(record.get(date_col)),
                RawValue::from_text(record.get(close_col)),
            )
            .with_bar(bar)
            .with_extra(extra),
        );
    }
    Ok(rows)
}

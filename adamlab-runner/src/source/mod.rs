//! Price sources: where raw rows come from.
//!
//! The [`PriceSource`] trait abstracts over CSV files, the Yahoo chart API and
//! the data-directory cache so batches can mix them and tests can mock them.

pub mod cache;
pub mod circuit_breaker;
pub mod csv_file;
pub mod yahoo;

pub use self::cache::{needs_refresh, CachedSource};
pub use self::circuit_breaker::CircuitBreaker;
pub use self::csv_file::{read_records, CsvSource};
pub use self::yahoo::{write_bars_csv, FetchedBar, YahooSource};

use adamlab_core::RawRecord;
use thiserror::Error;

/// Errors raised while loading raw rows.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("missing column '{column}' in {path}")]
    MissingColumn { column: String, path: String },

    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("no data for '{symbol}' (tried {})", tried.join(", "))]
    NoData { symbol: String, tried: Vec<String> },

    #[error("source error: {0}")]
    Other(String),
}

impl SourceError {
    pub(crate) fn io(path: &std::path::Path, err: impl std::fmt::Display) -> Self {
        SourceError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

/// Anything that yields raw price rows for a symbol.
pub trait PriceSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    fn load(&self, symbol: &str) -> Result<Vec<RawRecord>, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_data_lists_candidates() {
        let err = SourceError::NoData {
            symbol: "2330".into(),
            tried: vec!["2330.TWO".into(), "2330.TW".into()],
        };
        assert_eq!(err.to_string(), "no data for '2330' (tried 2330.TWO, 2330.TW)");
    }

    #[test]
    fn source_trait_is_object_safe() {
        struct Fixed;
        impl PriceSource for Fixed {
            fn name(&self) -> &str {
                "fixed"
            }
            fn load(&self, _symbol: &str) -> Result<Vec<RawRecord>, SourceError> {
                Ok(vec![RawRecord::new("2024-01-02", "1")])
            }
        }
        let boxed: Box<dyn PriceSource> = Box::new(Fixed);
        assert_eq!(boxed.name(), "fixed");
        assert_eq!(boxed.load("X").unwrap().len(), 1);
    }
}

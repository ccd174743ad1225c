//! AdamLab Runner: everything around the engine that touches the outside world.
//!
//! - TOML run configuration and holiday files
//! - Price sources: CSV files, Yahoo Finance, the data-directory cache
//! - Artifact sinks writing history/projection/combined tables and a manifest
//! - Watchlist parsing and parallel batch runs with a run log

pub mod batch;
pub mod config;
pub mod runner;
pub mod sink;
pub mod source;
pub mod watchlist;

pub use batch::{run_batch, BatchFailure, BatchOutcome, BatchReport};
pub use config::{read_holidays, ConfigError, RunConfig};
pub use runner::{run_instrument, InstrumentRequest, InstrumentRun, InstrumentSummary, RunError};
pub use sink::{load_manifest, ArtifactPaths, ChartSpec, CsvSink, Manifest, SinkError, TimelineSink};
pub use source::{CachedSource, CircuitBreaker, CsvSource, PriceSource, SourceError, YahooSource};
pub use watchlist::{load_watchlist, WatchlistEntry, WatchlistError};

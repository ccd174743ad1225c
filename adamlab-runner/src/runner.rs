//! Single-instrument orchestration: source → engine → sink.

use adamlab_core::{
    run_pipeline, BusinessCalendar, CoreError, DatasetHash, Pivot, PipelineOutput,
    ProjectionConfig,
};
use chrono::NaiveDateTime;
use thiserror::Error;

use crate::sink::{history_bars, ArtifactPaths, HistoryBar, SinkError, TimelineSink};
use crate::source::{PriceSource, SourceError};

/// Run timestamp format used in titles and logs.
pub const RUN_TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Failures carry the ticker so batch reports can name the instrument.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("{ticker}: failed to load prices: {source}")]
    Source { ticker: String, source: SourceError },

    #[error("{ticker}: {source}")]
    Pipeline { ticker: String, source: CoreError },

    #[error("{ticker}: failed to write artifacts: {source}")]
    Sink { ticker: String, source: SinkError },
}

impl RunError {
    pub fn ticker(&self) -> &str {
        match self {
            RunError::Source { ticker, .. }
            | RunError::Pipeline { ticker, .. }
            | RunError::Sink { ticker, .. } => ticker,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentRequest {
    pub ticker: String,
    /// Output name; defaults to the ticker.
    pub sheet_name: String,
    pub config: ProjectionConfig,
}

impl InstrumentRequest {
    pub fn new(ticker: impl Into<String>, config: ProjectionConfig) -> Self {
        let ticker = ticker.into();
        Self {
            sheet_name: ticker.clone(),
            ticker,
            config,
        }
    }

    pub fn with_sheet_name(mut self, sheet_name: impl Into<String>) -> Self {
        let name = sheet_name.into();
        if !name.trim().is_empty() {
            self.sheet_name = name;
        }
        self
    }
}

/// Everything a sink receives for one instrument.
#[derive(Debug, Clone)]
pub struct InstrumentRun {
    pub ticker: String,
    pub sheet_name: String,
    pub run_ts: NaiveDateTime,
    pub config: ProjectionConfig,
    pub output: PipelineOutput,
    /// Bar cells for each history point.
    pub bars: Vec<HistoryBar>,
}

impl InstrumentRun {
    pub fn run_ts_label(&self) -> String {
        self.run_ts.format(RUN_TS_FORMAT).to_string()
    }
}

#[derive(Debug, Clone)]
pub struct InstrumentSummary {
    pub ticker: String,
    pub sheet_name: String,
    /// Unified timeline rows.
    pub rows: usize,
    pub pivot: Pivot,
    pub dataset_hash: DatasetHash,
    pub warnings: Vec<String>,
    pub artifacts: ArtifactPaths,
}

/// Load, project and write one instrument.
pub fn run_instrument(
    request: &InstrumentRequest,
    source: &dyn PriceSource,
    sink: &dyn TimelineSink,
    calendar: &dyn BusinessCalendar,
    run_ts: NaiveDateTime,
) -> Result<InstrumentSummary, RunError> {
    let ticker = request.ticker.clone();
    tracing::info!(ticker = %ticker, source = source.name(), "loading");

    let rows = source.load(&ticker).map_err(|source| RunError::Source {
        ticker: ticker.clone(),
        source,
    })?;

    let output =
        run_pipeline(&rows, &request.config, calendar).map_err(|source| RunError::Pipeline {
            ticker: ticker.clone(),
            source,
        })?;

    tracing::info!(
        ticker = %ticker,
        pivot = %output.pivot.date,
        history = output.history.len(),
        projected = output.projection.len(),
        hash = output.dataset_hash.short(),
        "projected"
    );

    let run = InstrumentRun {
        ticker: ticker.clone(),
        sheet_name: request.sheet_name.clone(),
        run_ts,
        config: request.config,
        bars: history_bars(&rows, &output.history),
        output,
    };
    let artifacts = sink.write(&run).map_err(|source| RunError::Sink {
        ticker: ticker.clone(),
        source,
    })?;

    let out = run.output;
    Ok(InstrumentSummary {
        ticker,
        sheet_name: run.sheet_name,
        rows: out.timeline.len(),
        pivot: out.pivot,
        dataset_hash: out.dataset_hash,
        warnings: out.diagnostics.iter().map(|d| d.summary()).collect(),
        artifacts,
    })
}

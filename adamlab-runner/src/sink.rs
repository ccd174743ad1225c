//! Artifact sinks: where a finished timeline goes.
//!
//! [`CsvSink`] writes one directory per sheet under the output directory:
//! - `history.csv`: `No.,Date,Open,High,Low,Close,Volume`
//! - `projection.csv`: `No.,Date,Projected`
//! - `combined.csv`: `All_Date,Hist_Close,Projected`, blank where a side has no value
//! - `manifest.json`: run metadata, diagnostics and the chart description
//!
//! Manifests carry a `schema_version`; unknown versions are rejected on load.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use adamlab_core::{
    parse_close, parse_date, BarCells, CleanSeries, DatasetHash, Diagnostics, Pivot,
    ProjectedSeries, ProjectionConfig, RawRecord, RawValue, SanitizeReport, UnifiedTimeline,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::runner::InstrumentRun;

pub const SCHEMA_VERSION: u32 = 1;

pub const DOMAIN_COLUMN: &str = "All_Date";
pub const HISTORY_COLUMN: &str = "Hist_Close";
pub const PROJECTED_COLUMN: &str = "Projected";

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported schema version {found} (max supported: {max})")]
    UnsupportedSchema { found: u32, max: u32 },
}

impl SinkError {
    fn io(path: &Path, err: impl std::fmt::Display) -> Self {
        SinkError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

pub trait TimelineSink: Send + Sync {
    fn write(&self, run: &InstrumentRun) -> Result<ArtifactPaths, SinkError>;
}

/// Files produced for one sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub dir: PathBuf,
    pub history: PathBuf,
    pub projection: PathBuf,
    pub combined: PathBuf,
    pub manifest: PathBuf,
}

impl ArtifactPaths {
    pub fn in_dir(dir: PathBuf) -> Self {
        Self {
            history: dir.join("history.csv"),
            projection: dir.join("projection.csv"),
            combined: dir.join("combined.csv"),
            manifest: dir.join("manifest.json"),
            dir,
        }
    }
}

/// Line chart over the combined table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub title: String,
    pub chart_type: String,
    pub domain: String,
    pub series: Vec<String>,
    /// Rows in `combined.csv`, header included.
    pub row_count: usize,
}

impl ChartSpec {
    pub fn for_run(run: &InstrumentRun) -> Self {
        Self {
            title: format!("{} - Adam Theory - {}", run.sheet_name, run.run_ts_label()),
            chart_type: "LINE".into(),
            domain: DOMAIN_COLUMN.into(),
            series: vec![HISTORY_COLUMN.into(), PROJECTED_COLUMN.into()],
            row_count: run.output.timeline.len() + 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub schema_version: u32,
    pub ticker: String,
    pub sheet_name: String,
    pub run_ts: String,
    pub config: ProjectionConfig,
    pub pivot: Pivot,
    pub dataset_hash: DatasetHash,
    pub report: SanitizeReport,
    pub history_rows: usize,
    pub projected_rows: usize,
    pub diagnostics: Diagnostics,
    pub chart: ChartSpec,
}

impl Manifest {
    pub fn for_run(run: &InstrumentRun) -> Self {
        let out = &run.output;
        Self {
            schema_version: SCHEMA_VERSION,
            ticker: run.ticker.clone(),
            sheet_name: run.sheet_name.clone(),
            run_ts: run.run_ts_label(),
            config: run.config,
            pivot: out.pivot,
            dataset_hash: out.dataset_hash.clone(),
            report: out.report.clone(),
            history_rows: out.history.len(),
            projected_rows: out.projection.len(),
            diagnostics: out.diagnostics.clone(),
            chart: ChartSpec::for_run(run),
        }
    }
}

/// One row of the history table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Attach bar cells from `records` to each point of the clean history.
///
/// A date takes its cells from the same row the sanitizer keeps. Missing or
/// unparseable open/high/low read as the close and a missing volume as 0.
pub fn history_bars(records: &[RawRecord], history: &CleanSeries) -> Vec<HistoryBar> {
    let mut cells: HashMap<NaiveDate, (&BarCells, bool)> = HashMap::new();
    for record in records {
        let Some(date) = parse_date(&record.date) else {
            continue;
        };
        let valid = parse_close(&record.close).is_some();
        let replace = match cells.get(&date) {
            Some(&(_, kept_valid)) => valid && !kept_valid,
            None => true,
        };
        if replace {
            cells.insert(date, (&record.bar, valid));
        }
    }

    history
        .points()
        .iter()
        .map(|p| {
            let bar = cells.get(&p.date).map(|(bar, _)| *bar);
            HistoryBar {
                date: p.date,
                open: number_or(bar.map(|b| &b.open), p.close),
                high: number_or(bar.map(|b| &b.high), p.close),
                low: number_or(bar.map(|b| &b.low), p.close),
                close: p.close,
                volume: number_or(bar.map(|b| &b.volume), 0.0),
            }
        })
        .collect()
}

fn number_or(cell: Option<&RawValue>, fallback: f64) -> f64 {
    cell.and_then(parse_close).unwrap_or(fallback)
}

// ─── CSV export ─────────────────────────────────────────────────────

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String, SinkError> {
    let data = wtr.into_inner().map_err(|e| SinkError::Io {
        path: "<memory>".into(),
        message: e.to_string(),
    })?;
    Ok(String::from_utf8_lossy(&data).into_owned())
}

fn date_cell(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn value_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// `No.,Date,Open,High,Low,Close,Volume`, numbered from 1.
pub fn export_history_csv(bars: &[HistoryBar]) -> Result<String, SinkError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["No.", "Date", "Open", "High", "Low", "Close", "Volume"])?;
    for (i, b) in bars.iter().enumerate() {
        wtr.write_record([
            (i + 1).to_string(),
            date_cell(b.date),
            b.open.to_string(),
            b.high.to_string(),
            b.low.to_string(),
            b.close.to_string(),
            b.volume.to_string(),
        ])?;
    }
    finish(wtr)
}

/// `No.,Date,Projected`, numbered from 1.
pub fn export_projection_csv(projection: &ProjectedSeries) -> Result<String, SinkError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["No.", "Date", PROJECTED_COLUMN])?;
    for (i, p) in projection.points().iter().enumerate() {
        wtr.write_record([(i + 1).to_string(), date_cell(p.date), p.value.to_string()])?;
    }
    finish(wtr)
}

pub fn export_combined_csv(timeline: &UnifiedTimeline) -> Result<String, SinkError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([DOMAIN_COLUMN, HISTORY_COLUMN, PROJECTED_COLUMN])?;
    for row in timeline.rows() {
        wtr.write_record([
            date_cell(row.date),
            value_cell(row.historical),
            value_cell(row.projected),
        ])?;
    }
    finish(wtr)
}

/// Directory name for a sheet: path separators and control characters become `_`.
pub fn sheet_dir_name(sheet_name: &str) -> String {
    let name: String = sheet_name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    match name.as_str() {
        "" | "." | ".." => "_".into(),
        _ => name,
    }
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Writes `<output_dir>/<sheet>/`, replacing files from earlier runs.
#[derive(Debug, Clone)]
pub struct CsvSink {
    output_dir: PathBuf,
}

impl CsvSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

fn write_file(path: &Path, content: &str) -> Result<(), SinkError> {
    std::fs::write(path, content).map_err(|e| SinkError::io(path, e))
}

impl TimelineSink for CsvSink {
    fn write(&self, run: &InstrumentRun) -> Result<ArtifactPaths, SinkError> {
        let paths = ArtifactPaths::in_dir(self.output_dir.join(sheet_dir_name(&run.sheet_name)));
        std::fs::create_dir_all(&paths.dir).map_err(|e| SinkError::io(&paths.dir, e))?;

        write_file(&paths.history, &export_history_csv(&run.bars)?)?;
        write_file(&paths.projection, &export_projection_csv(&run.output.projection)?)?;
        write_file(&paths.combined, &export_combined_csv(&run.output.timeline)?)?;
        let manifest = serde_json::to_string_pretty(&Manifest::for_run(run))?;
        write_file(&paths.manifest, &manifest)?;

        tracing::debug!(sheet = %run.sheet_name, dir = %paths.dir.display(), "artifacts written");
        Ok(paths)
    }
}

/// Load the manifest from an artifact directory.
pub fn load_manifest(dir: &Path) -> Result<Manifest, SinkError> {
    let path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&path).map_err(|e| SinkError::io(&path, e))?;
    let manifest: Manifest = serde_json::from_str(&json)?;
    if manifest.schema_version > SCHEMA_VERSION {
        return Err(SinkError::UnsupportedSchema {
            found: manifest.schema_version,
            max: SCHEMA_VERSION,
        });
    }
    Ok(manifest)
}

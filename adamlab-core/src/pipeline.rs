//! End-to-end engine pipeline: sanitize → pivot → project → merge.
//!
//! No I/O. One immutable [`ProjectionConfig`] is threaded through every
//! stage; the output carries everything a sink needs plus all diagnostics
//! raised along the way.

use serde::{Deserialize, Serialize};

use crate::calendar::BusinessCalendar;
use crate::diagnostics::Diagnostics;
use crate::domain::{CleanSeries, Pivot, RawRecord};
use crate::error::CoreError;
use crate::fingerprint::DatasetHash;
use crate::pivot::{resolve_pivot, PivotMode};
use crate::projection::{ProjectedSeries, Projector, ShortHistoryPolicy, DEFAULT_HORIZON};
use crate::sanitize::{sanitize, MissingClosePolicy, SanitizeReport};
use crate::timeline::{merge, UnifiedTimeline};

/// Engine configuration for one instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    pub pivot: PivotMode,
    pub horizon: usize,
    pub short_history: ShortHistoryPolicy,
    pub missing_close: MissingClosePolicy,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            pivot: PivotMode::default(),
            horizon: DEFAULT_HORIZON,
            short_history: ShortHistoryPolicy::default(),
            missing_close: MissingClosePolicy::default(),
        }
    }
}

/// Everything produced by one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub history: CleanSeries,
    pub pivot: Pivot,
    pub projection: ProjectedSeries,
    pub timeline: UnifiedTimeline,
    pub report: SanitizeReport,
    pub diagnostics: Diagnostics,
    pub dataset_hash: DatasetHash,
}

/// Run all four stages.
///
/// Sanitize and pivot failures return before any later stage runs.
pub fn run_pipeline(
    rows: &[RawRecord],
    config: &ProjectionConfig,
    calendar: &dyn BusinessCalendar,
) -> Result<PipelineOutput, CoreError> {
    let projector = Projector::new(config.horizon, config.short_history)?;

    let sanitized = sanitize(rows, config.missing_close)?;
    let mut diagnostics = sanitized.diagnostics;
    let history = sanitized.series;

    let pivot = resolve_pivot(&history, &config.pivot)?;
    let projection = projector.project(&history, pivot.index, calendar)?;
    diagnostics.extend(projection.diagnostics);

    let merged = merge(&history, &projection.series);
    diagnostics.extend(merged.diagnostics);

    let dataset_hash = DatasetHash::of(&history);

    Ok(PipelineOutput {
        history,
        pivot: projection.pivot,
        projection: projection.series,
        timeline: merged.timeline,
        report: sanitized.report,
        diagnostics,
        dataset_hash,
    })
}

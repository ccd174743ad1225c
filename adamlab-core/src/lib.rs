//! AdamLab Core: the mirror projection engine.
//!
//! This crate contains the projection engine:
//! - Domain types (raw rows, clean series, pivots, projected points)
//! - Sanitizer turning untyped rows into a validated close series
//! - Pivot resolution by explicit date or by lookback extremum
//! - Business-day calendars for projection dates
//! - Mirror projector with a configurable short-history policy
//! - Timeline merger producing chart-ready aligned columns
//!
//! Nothing here performs I/O. Sources and sinks live in `adamlab-runner`.

pub mod calendar;
pub mod diagnostics;
pub mod domain;
pub mod error;
pub mod fingerprint;
pub mod pipeline;
pub mod pivot;
pub mod projection;
pub mod sanitize;
pub mod timeline;

pub use calendar::{BusinessCalendar, HolidayCalendar, WeekdayCalendar};
pub use diagnostics::{Diagnostic, Diagnostics};
pub use domain::{BarCells, CleanSeries, Pivot, PricePoint, ProjectedPoint, RawRecord, RawValue};
pub use error::CoreError;
pub use fingerprint::DatasetHash;
pub use pipeline::{run_pipeline, PipelineOutput, ProjectionConfig};
pub use pivot::{resolve_pivot, PivotMode, PivotSide};
pub use projection::{ProjectedSeries, Projection, Projector, ShortHistoryPolicy, DEFAULT_HORIZON};
pub use sanitize::{parse_close, parse_date, sanitize, MissingClosePolicy, SanitizeReport, Sanitized};
pub use timeline::{merge, Merged, TimelineColumns, TimelineRow, UnifiedTimeline};

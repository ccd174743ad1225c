//! Non-fatal warnings raised while building a projection.
//!
//! Each diagnostic is logged at warn level when raised and also returned to
//! the caller, so projection quality can be audited after the run.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// The pivot had fewer than `horizon` prior points; `clamped` offsets were held flat.
    InsufficientHistory {
        pivot: usize,
        horizon: usize,
        clamped: usize,
    },
    /// Projected dates collided with historical ones; history was kept.
    MergeConflict { dates: Vec<NaiveDate> },
    /// The sanitizer discarded input rows.
    RowsDropped {
        empty: usize,
        bad_dates: usize,
        bad_closes: usize,
        duplicates: usize,
    },
}

impl Diagnostic {
    /// Emit this diagnostic as a `tracing` warning.
    pub fn emit(&self) {
        match self {
            Diagnostic::InsufficientHistory {
                pivot,
                horizon,
                clamped,
            } => tracing::warn!(
                pivot,
                horizon,
                clamped,
                "insufficient history to mirror full horizon, tail held flat"
            ),
            Diagnostic::MergeConflict { dates } => tracing::warn!(
                count = dates.len(),
                first = %dates.first().map(|d| d.to_string()).unwrap_or_default(),
                "projected dates overlap history, historical values kept"
            ),
            Diagnostic::RowsDropped {
                empty,
                bad_dates,
                bad_closes,
                duplicates,
            } => tracing::warn!(
                empty,
                bad_dates,
                bad_closes,
                duplicates,
                "sanitizer dropped input rows"
            ),
        }
    }

    /// One-line summary for reports and run logs.
    pub fn summary(&self) -> String {
        match self {
            Diagnostic::InsufficientHistory {
                pivot,
                horizon,
                clamped,
            } => format!("insufficient history: pivot {pivot}, horizon {horizon}, {clamped} clamped"),
            Diagnostic::MergeConflict { dates } => {
                format!("merge conflict on {} date(s)", dates.len())
            }
            Diagnostic::RowsDropped {
                empty,
                bad_dates,
                bad_closes,
                duplicates,
            } => format!(
                "rows dropped: {empty} empty, {bad_dates} bad dates, {bad_closes} bad closes, {duplicates} duplicates"
            ),
        }
    }
}

/// Collected diagnostics for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log and record.
    pub fn raise(&mut self, diagnostic: Diagnostic) {
        diagnostic.emit();
        self.0.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has_insufficient_history(&self) -> bool {
        self.0
            .iter()
            .any(|d| matches!(d, Diagnostic::InsufficientHistory { .. }))
    }

    pub fn has_merge_conflict(&self) -> bool {
        self.0
            .iter()
            .any(|d| matches!(d, Diagnostic::MergeConflict { .. }))
    }
}

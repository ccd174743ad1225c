//! Unified timeline: history and projection on one date axis.
//!
//! Given the two series, produce one row per distinct date with two
//! independently nullable value columns. This is the layout a two-series
//! line chart reads directly.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::domain::CleanSeries;
use crate::projection::ProjectedSeries;

/// One date on the unified axis. At least one of the two values is set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimelineRow {
    pub date: NaiveDate,
    pub historical: Option<f64>,
    pub projected: Option<f64>,
}

/// Three aligned columns for chart rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineColumns {
    pub dates: Vec<NaiveDate>,
    pub historical: Vec<Option<f64>>,
    pub projected: Vec<Option<f64>>,
}

/// Rows in strictly ascending date order, no duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedTimeline {
    rows: Vec<TimelineRow>,
}

impl UnifiedTimeline {
    pub fn rows(&self) -> &[TimelineRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn historical_count(&self) -> usize {
        self.rows.iter().filter(|r| r.historical.is_some()).count()
    }

    pub fn projected_count(&self) -> usize {
        self.rows.iter().filter(|r| r.projected.is_some()).count()
    }

    pub fn to_columns(&self) -> TimelineColumns {
        TimelineColumns {
            dates: self.rows.iter().map(|r| r.date).collect(),
            historical: self.rows.iter().map(|r| r.historical).collect(),
            projected: self.rows.iter().map(|r| r.projected).collect(),
        }
    }
}

/// Merger output.
#[derive(Debug, Clone)]
pub struct Merged {
    pub timeline: UnifiedTimeline,
    pub diagnostics: Diagnostics,
}

/// Merge history and projection. Historical values win on date collisions.
pub fn merge(hist: &CleanSeries, proj: &ProjectedSeries) -> Merged {
    let mut by_date: BTreeMap<NaiveDate, TimelineRow> = hist
        .points()
        .iter()
        .map(|p| {
            (
                p.date,
                TimelineRow {
                    date: p.date,
                    historical: Some(p.close),
                    projected: None,
                },
            )
        })
        .collect();

    let mut conflicts = Vec::new();
    for p in proj.points() {
        match by_date.get(&p.date) {
            Some(existing) if existing.historical.is_some() => conflicts.push(p.date),
            _ => {
                by_date.insert(
                    p.date,
                    TimelineRow {
                        date: p.date,
                        historical: None,
                        projected: Some(p.value),
                    },
                );
            }
        }
    }

    let mut diagnostics = Diagnostics::new();
    if !conflicts.is_empty() {
        diagnostics.raise(Diagnostic::MergeConflict { dates: conflicts });
    }

    Merged {
        timeline: UnifiedTimeline {
            rows: by_date.into_values().collect(),
        },
        diagnostics,
    }
}

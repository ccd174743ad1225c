//! Mirror projection ("Adam Theory" reflection).
//!
//! With pivot close `P`, forward offset `k` mirrors the point `k` steps
//! before the pivot: `2P - close[pivot - k]`. Projected dates start the
//! business day after the last historical date.
//!
//! When `k > pivot` there is nothing left to mirror. Under
//! [`ShortHistoryPolicy::Clamp`] the value is held at the last mirrored
//! value (or at `P` itself when the pivot is the first point) and an
//! [`Diagnostic::InsufficientHistory`] is raised; under
//! [`ShortHistoryPolicy::Fail`] the projection is rejected.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::BusinessCalendar;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::domain::{CleanSeries, Pivot, ProjectedPoint};
use crate::error::CoreError;

pub const DEFAULT_HORIZON: usize = 30;

/// Behaviour when the pivot has fewer than `horizon` earlier points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortHistoryPolicy {
    /// Hold the tail flat and warn.
    #[default]
    Clamp,
    /// Return `CoreError::InsufficientHistory`.
    Fail,
}

/// Projected values, strictly increasing business dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedSeries(Vec<ProjectedPoint>);

impl ProjectedSeries {
    pub fn points(&self) -> &[ProjectedPoint] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.0.iter().map(|p| p.date)
    }

    pub fn clamped(&self) -> usize {
        self.0.iter().filter(|p| p.clamped).count()
    }
}

/// Projector output.
#[derive(Debug, Clone)]
pub struct Projection {
    pub pivot: Pivot,
    pub series: ProjectedSeries,
    pub diagnostics: Diagnostics,
}

/// Mirror projector for a fixed horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Projector {
    horizon: usize,
    short_history: ShortHistoryPolicy,
}

impl Projector {
    /// `horizon` must be at least 1.
    pub fn new(horizon: usize, short_history: ShortHistoryPolicy) -> Result<Self, CoreError> {
        if horizon == 0 {
            return Err(CoreError::InvalidConfig("horizon must be at least 1".into()));
        }
        Ok(Self {
            horizon,
            short_history,
        })
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn project(
        &self,
        series: &CleanSeries,
        pivot_index: usize,
        calendar: &dyn BusinessCalendar,
    ) -> Result<Projection, CoreError> {
        let anchor = series.get(pivot_index).ok_or_else(|| {
            CoreError::InvalidConfig(format!(
                "pivot index {pivot_index} out of range for series of length {}",
                series.len()
            ))
        })?;
        let pivot = Pivot {
            index: pivot_index,
            date: anchor.date,
            close: anchor.close,
        };

        if pivot_index < self.horizon && self.short_history == ShortHistoryPolicy::Fail {
            return Err(CoreError::InsufficientHistory {
                pivot: pivot_index,
                horizon: self.horizon,
            });
        }

        let closes = series.points();
        let p = pivot.close;
        let mut last_value = p;
        let mut date = series.last().date;
        let mut points = Vec::with_capacity(self.horizon);

        for k in 1..=self.horizon {
            date = calendar.next_business_day(date);
            let (value, clamped) = match pivot_index.checked_sub(k) {
                Some(back) => (2.0 * p - closes[back].close, false),
                None => (last_value, true),
            };
            if !value.is_finite() {
                return Err(CoreError::NonFiniteProjection { offset: k, date });
            }
            last_value = value;
            points.push(ProjectedPoint {
                date,
                value,
                clamped,
            });
        }

        let series = ProjectedSeries(points);
        let mut diagnostics = Diagnostics::new();
        let clamped = series.clamped();
        if clamped > 0 {
            diagnostics.raise(Diagnostic::InsufficientHistory {
                pivot: pivot_index,
                horizon: self.horizon,
                clamped,
            });
        }

        Ok(Projection {
            pivot,
            series,
            diagnostics,
        })
    }
}

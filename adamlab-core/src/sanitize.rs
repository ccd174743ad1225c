//! Sanitizer: raw rows in, strictly well-formed close series out.
//!
//! Order of operations:
//! 1. drop fully empty rows
//! 2. parse dates, drop rows whose date is missing or unparseable
//! 3. coerce closes to finite `f64` (drop or interpolate failures, per policy)
//! 4. de-duplicate by date: the first occurrence with a valid close wins,
//!    else the first occurrence in source order
//! 5. stable sort ascending by date

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::domain::{CleanSeries, PricePoint, RawRecord, RawValue};
use crate::error::CoreError;

/// What to do with rows whose date is valid but whose close is not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingClosePolicy {
    /// Drop the row.
    #[default]
    Drop,
    /// Fill linearly by position between valid neighbours; edges take the nearest valid close.
    Interpolate,
}

/// Row accounting for one sanitize call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizeReport {
    pub input_rows: usize,
    pub empty_rows: usize,
    pub bad_dates: usize,
    pub bad_closes: usize,
    pub interpolated: usize,
    pub duplicates: usize,
    pub kept: usize,
}

impl SanitizeReport {
    pub fn dropped(&self) -> usize {
        self.empty_rows + self.bad_dates + self.bad_closes + self.duplicates
    }
}

/// Sanitizer output.
#[derive(Debug, Clone)]
pub struct Sanitized {
    pub series: CleanSeries,
    pub report: SanitizeReport,
    pub diagnostics: Diagnostics,
}

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M:%S"];

/// Parse a date cell. Datetimes keep only their calendar date.
pub fn parse_date(value: &RawValue) -> Option<NaiveDate> {
    let text = match value {
        RawValue::Date(d) => return Some(*d),
        RawValue::Text(s) => s.trim(),
        RawValue::Missing | RawValue::Number(_) => return None,
    };
    if text.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(text, fmt) {
            return Some(d);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt.date());
        }
    }
    // "2024-01-02 00:00:00+08:00" and similar offset-suffixed exports
    text.get(..10)
        .filter(|_| text.len() > 10)
        .and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok())
}

/// Coerce a close cell to a finite number.
pub fn parse_close(value: &RawValue) -> Option<f64> {
    let parsed = match value {
        RawValue::Number(v) => Some(*v),
        RawValue::Text(s) => s.trim().replace(',', "").parse::<f64>().ok(),
        RawValue::Missing | RawValue::Date(_) => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Sanitize raw rows into a [`CleanSeries`].
///
/// Fails with [`CoreError::EmptySeries`] if nothing survives.
pub fn sanitize(rows: &[RawRecord], policy: MissingClosePolicy) -> Result<Sanitized, CoreError> {
    let mut report = SanitizeReport {
        input_rows: rows.len(),
        ..SanitizeReport::default()
    };

    let mut candidates: Vec<(NaiveDate, Option<f64>)> = Vec::with_capacity(rows.len());
    let mut slot_of: HashMap<NaiveDate, usize> = HashMap::with_capacity(rows.len());
    for row in rows {
        if row.is_empty() {
            report.empty_rows += 1;
            continue;
        }
        let Some(date) = parse_date(&row.date) else {
            report.bad_dates += 1;
            continue;
        };
        let close = parse_close(&row.close);
        if close.is_none() && policy == MissingClosePolicy::Drop {
            report.bad_closes += 1;
            continue;
        }
        match slot_of.get(&date) {
            Some(&slot) => {
                report.duplicates += 1;
                // a later valid close replaces an earlier unusable one
                if candidates[slot].1.is_none() {
                    candidates[slot].1 = close;
                }
            }
            None => {
                slot_of.insert(date, candidates.len());
                candidates.push((date, close));
            }
        }
    }

    candidates.sort_by_key(|(date, _)| *date);

    let points = match policy {
        MissingClosePolicy::Drop => candidates
            .into_iter()
            .filter_map(|(date, close)| close.map(|c| PricePoint::new(date, c)))
            .collect(),
        MissingClosePolicy::Interpolate => interpolate(candidates, &mut report),
    };
    report.kept = points.len();

    tracing::debug!(
        input = report.input_rows,
        kept = report.kept,
        dropped = report.dropped(),
        interpolated = report.interpolated,
        "sanitized raw rows"
    );

    let series = CleanSeries::new(points)?;

    let mut diagnostics = Diagnostics::new();
    if report.dropped() > 0 {
        diagnostics.raise(Diagnostic::RowsDropped {
            empty: report.empty_rows,
            bad_dates: report.bad_dates,
            bad_closes: report.bad_closes,
            duplicates: report.duplicates,
        });
    }

    Ok(Sanitized {
        series,
        report,
        diagnostics,
    })
}

/// Fill `None` closes on a date-sorted, de-duplicated candidate list.
///
/// With no valid close at all every candidate counts as a bad close and the
/// result is empty.
fn interpolate(
    candidates: Vec<(NaiveDate, Option<f64>)>,
    report: &mut SanitizeReport,
) -> Vec<PricePoint> {
    let known: Vec<usize> = candidates
        .iter()
        .enumerate()
        .filter_map(|(i, (_, c))| c.map(|_| i))
        .collect();
    if known.is_empty() {
        report.bad_closes += candidates.len();
        return Vec::new();
    }

    let value_at = |i: usize| candidates[i].1.unwrap_or(f64::NAN);
    let mut next_known = 0usize;
    let mut points = Vec::with_capacity(candidates.len());

    for (i, (date, close)) in candidates.iter().enumerate() {
        if let Some(c) = close {
            points.push(PricePoint::new(*date, *c));
            if known.get(next_known) == Some(&i) {
                next_known += 1;
            }
            continue;
        }
        let prev = next_known.checked_sub(1).map(|k| known[k]);
        let next = known.get(next_known).copied();
        let filled = match (prev, next) {
            (Some(a), Some(b)) => {
                let (va, vb) = (value_at(a), value_at(b));
                va + (vb - va) * (i - a) as f64 / (b - a) as f64
            }
            (Some(a), None) => value_at(a),
            (None, Some(b)) => value_at(b),
            (None, None) => continue,
        };
        report.interpolated += 1;
        points.push(PricePoint::new(*date, filled));
    }
    points
}

//! Property tests for engine invariants.
//!
//! Uses proptest to verify:
//! 1. Sanitized output is finite and strictly date-ordered; clean input is a fixed point
//! 2. Side pivots hit the window extremum, latest on ties
//! 3. Full-history projections are exact reflections on business days
//! 4. Short-history projections hold a flat tail and raise a diagnostic
//! 5. Merged timelines cover every distinct date exactly once

use adamlab_core::{
    merge, resolve_pivot, sanitize, BusinessCalendar, CleanSeries, MissingClosePolicy, PivotMode,
    PivotSide, PricePoint, Projector, RawRecord, RawValue, ShortHistoryPolicy, WeekdayCalendar,
};
use chrono::{Datelike, NaiveDate, Weekday};
use proptest::prelude::*;
use std::collections::BTreeSet;

// ── Strategies (proptest) ────────────────────────────────────────────

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 2).unwrap()
}

fn arb_close() -> impl Strategy<Value = f64> {
    (1.0..500.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

/// Raw cells covering valid, blank, junk and non-finite values.
fn arb_close_cell() -> impl Strategy<Value = RawValue> {
    prop_oneof![
        4 => arb_close().prop_map(RawValue::Number),
        2 => arb_close().prop_map(|c| RawValue::Text(c.to_string())),
        1 => Just(RawValue::Missing),
        1 => Just(RawValue::Text("n/a".into())),
        1 => Just(RawValue::Number(f64::NAN)),
        1 => Just(RawValue::Number(f64::INFINITY)),
    ]
}

fn arb_date_cell() -> impl Strategy<Value = RawValue> {
    prop_oneof![
        6 => (0i64..60).prop_map(|off| RawValue::Date(base_date() + chrono::Duration::days(off))),
        2 => (0i64..60).prop_map(|off| {
            RawValue::Text((base_date() + chrono::Duration::days(off)).format("%Y-%m-%d").to_string())
        }),
        1 => Just(RawValue::Missing),
        1 => Just(RawValue::Text("garbage".into())),
    ]
}

fn arb_raw_rows() -> impl Strategy<Value = Vec<RawRecord>> {
    prop::collection::vec(
        (arb_date_cell(), arb_close_cell()).prop_map(|(d, c)| RawRecord::new(d, c)),
        0..80,
    )
}

/// A clean series on consecutive business days.
fn arb_series(min_len: usize, max_len: usize) -> impl Strategy<Value = CleanSeries> {
    prop::collection::vec(arb_close(), min_len..max_len).prop_map(|closes| {
        let points = closes
            .into_iter()
            .enumerate()
            .map(|(i, c)| PricePoint::new(WeekdayCalendar.add_business_days(base_date(), i), c))
            .collect();
        CleanSeries::new(points).unwrap()
    })
}

// ── 1. Sanitizer ─────────────────────────────────────────────────────

proptest! {
    #[test]
    fn sanitized_output_is_finite_and_ordered(rows in arb_raw_rows()) {
        match sanitize(&rows, MissingClosePolicy::Drop) {
            Ok(out) => {
                for p in out.series.points() {
                    prop_assert!(p.close.is_finite());
                }
                for w in out.series.points().windows(2) {
                    prop_assert!(w[0].date < w[1].date);
                }
                prop_assert_eq!(out.report.kept + out.report.dropped(), rows.len());
            }
            Err(e) => prop_assert_eq!(e, adamlab_core::CoreError::EmptySeries),
        }
    }

    #[test]
    fn interpolated_output_is_finite_and_ordered(rows in arb_raw_rows()) {
        if let Ok(out) = sanitize(&rows, MissingClosePolicy::Interpolate) {
            for p in out.series.points() {
                prop_assert!(p.close.is_finite());
            }
            for w in out.series.points().windows(2) {
                prop_assert!(w[0].date < w[1].date);
            }
        }
    }

    #[test]
    fn sanitizing_clean_series_is_identity(series in arb_series(1, 50)) {
        let rows: Vec<RawRecord> = series
            .points()
            .iter()
            .map(|p| RawRecord::new(p.date, p.close))
            .collect();
        let out = sanitize(&rows, MissingClosePolicy::Drop).unwrap();
        prop_assert_eq!(out.series, series);
        prop_assert!(out.diagnostics.is_empty());
    }
}

// ── 2. Pivot ─────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn side_pivot_is_window_extremum(
        series in arb_series(1, 60),
        lookback in 1usize..80,
        max in any::<bool>(),
    ) {
        let side = if max { PivotSide::Max } else { PivotSide::Min };
        let pivot = resolve_pivot(&series, &PivotMode::Side { side, lookback }).unwrap();
        let start = series.len().saturating_sub(lookback);
        let window = &series.points()[start..];

        prop_assert!(pivot.index >= start && pivot.index < series.len());
        let target = window
            .iter()
            .map(|p| p.close)
            .fold(if max { f64::MIN } else { f64::MAX }, |a, b| if max { a.max(b) } else { a.min(b) });
        prop_assert_eq!(pivot.close, target);
        // nothing later in the window has the same value
        for p in &series.points()[pivot.index + 1..] {
            prop_assert_ne!(p.close, target);
        }
    }
}

// ── 3 & 4. Projector ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn full_history_projection_is_exact(
        series in arb_series(2, 80),
        horizon in 1usize..40,
        pivot_seed in any::<prop::sample::Index>(),
    ) {
        prop_assume!(series.len() > horizon);
        // pivot in [horizon, len)
        let pivot = horizon + pivot_seed.index(series.len() - horizon);
        let proj = Projector::new(horizon, ShortHistoryPolicy::Clamp)
            .unwrap()
            .project(&series, pivot, &WeekdayCalendar)
            .unwrap();

        let p = series.points()[pivot].close;
        prop_assert_eq!(proj.series.len(), horizon);
        prop_assert!(proj.diagnostics.is_empty());
        let mut prev = series.last().date;
        for (k, point) in proj.series.points().iter().enumerate() {
            prop_assert!(point.date > prev);
            prop_assert!(!matches!(point.date.weekday(), Weekday::Sat | Weekday::Sun));
            prop_assert_eq!(point.value, 2.0 * p - series.points()[pivot - (k + 1)].close);
            prev = point.date;
        }
    }

    #[test]
    fn short_history_projection_holds_flat_tail(
        series in arb_series(1, 30),
        extra in 1usize..20,
        pivot_seed in any::<prop::sample::Index>(),
    ) {
        let pivot = pivot_seed.index(series.len());
        let horizon = pivot + extra;
        let proj = Projector::new(horizon, ShortHistoryPolicy::Clamp)
            .unwrap()
            .project(&series, pivot, &WeekdayCalendar)
            .unwrap();

        let values: Vec<f64> = proj.series.points().iter().map(|x| x.value).collect();
        let p = series.points()[pivot].close;
        let last_mirrored = if pivot == 0 { p } else { 2.0 * p - series.points()[0].close };
        prop_assert_eq!(values.len(), horizon);
        for v in &values[pivot..] {
            prop_assert_eq!(*v, last_mirrored);
        }
        prop_assert_eq!(proj.series.clamped(), extra);
        prop_assert!(proj.diagnostics.has_insufficient_history());
    }
}

// ── 5. Merger ────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn merge_covers_distinct_dates(
        series in arb_series(1, 60),
        horizon in 1usize..40,
        pivot_seed in any::<prop::sample::Index>(),
    ) {
        let pivot = pivot_seed.index(series.len());
        let proj = Projector::new(horizon, ShortHistoryPolicy::Clamp)
            .unwrap()
            .project(&series, pivot, &WeekdayCalendar)
            .unwrap();
        let merged = merge(&series, &proj.series);

        let distinct: BTreeSet<NaiveDate> = series.dates().chain(proj.series.dates()).collect();
        prop_assert_eq!(merged.timeline.len(), distinct.len());
        prop_assert!(merged.diagnostics.is_empty());
        for w in merged.timeline.rows().windows(2) {
            prop_assert!(w[0].date < w[1].date);
        }
        for r in merged.timeline.rows() {
            prop_assert!(r.historical.is_some() || r.projected.is_some());
        }
    }
}

//! Pivot resolution: which historical point anchors the reflection.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::{CleanSeries, Pivot};
use crate::error::CoreError;

/// Which extremum to anchor on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PivotSide {
    #[serde(alias = "low")]
    Min,
    #[serde(alias = "high")]
    Max,
}

impl FromStr for PivotSide {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "min" | "low" => Ok(PivotSide::Min),
            "max" | "high" => Ok(PivotSide::Max),
            other => Err(CoreError::InvalidConfig(format!(
                "unknown pivot side '{other}' (expected low/min or high/max)"
            ))),
        }
    }
}

impl fmt::Display for PivotSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PivotSide::Min => write!(f, "low"),
            PivotSide::Max => write!(f, "high"),
        }
    }
}

/// How the pivot is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PivotMode {
    /// The exact date, or the nearest earlier trading date.
    #[serde(rename = "date")]
    ExplicitDate { date: NaiveDate },
    /// Extremum of the last `lookback` closes.
    Side { side: PivotSide, lookback: usize },
}

impl Default for PivotMode {
    fn default() -> Self {
        PivotMode::Side {
            side: PivotSide::Min,
            lookback: 10,
        }
    }
}

/// Resolve a pivot. The returned index is always in bounds.
pub fn resolve_pivot(series: &CleanSeries, mode: &PivotMode) -> Result<Pivot, CoreError> {
    let index = match *mode {
        PivotMode::ExplicitDate { date } => resolve_date(series, date)?,
        PivotMode::Side { side, lookback } => resolve_side(series, side, lookback)?,
    };
    let point = series.points()[index];
    tracing::debug!(index, date = %point.date, close = point.close, "resolved pivot");
    Ok(Pivot {
        index,
        date: point.date,
        close: point.close,
    })
}

fn resolve_date(series: &CleanSeries, date: NaiveDate) -> Result<usize, CoreError> {
    let first = series.first().date;
    if date < first {
        return Err(CoreError::PivotNotFound {
            requested: date,
            first,
        });
    }
    // Number of points on or before `date`; at least one because date >= first.
    let on_or_before = series.points().partition_point(|p| p.date <= date);
    Ok(on_or_before - 1)
}

fn resolve_side(series: &CleanSeries, side: PivotSide, lookback: usize) -> Result<usize, CoreError> {
    if lookback == 0 {
        return Err(CoreError::InvalidConfig("lookback must be at least 1".into()));
    }
    let start = series.len().saturating_sub(lookback);
    let window = &series.points()[start..];

    let mut best = 0usize;
    for (i, p) in window.iter().enumerate().skip(1) {
        let current = window[best].close;
        // Ties move forward so the latest date wins.
        let better = match side {
            PivotSide::Min => p.close <= current,
            PivotSide::Max => p.close >= current,
        };
        if better {
            best = i;
        }
    }
    Ok(start + best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PricePoint;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    /// Closes on consecutive January days starting at the 1st.
    fn series(closes: &[f64]) -> CleanSeries {
        CleanSeries::new(
            closes
                .iter()
                .enumerate()
                .map(|(i, &c)| PricePoint::new(d(i as u32 + 1), c))
                .collect(),
        )
        .unwrap()
    }

    fn side(side: PivotSide, lookback: usize) -> PivotMode {
        PivotMode::Side { side, lookback }
    }

    #[test]
    fn max_in_last_three() {
        let s = series(&[10.0, 12.0, 8.0, 11.0, 9.0]);
        let p = resolve_pivot(&s, &side(PivotSide::Max, 3)).unwrap();
        assert_eq!(p.index, 3);
        assert_eq!(p.close, 11.0);
    }

    #[test]
    fn min_over_whole_series_when_lookback_exceeds_len() {
        let s = series(&[10.0, 12.0, 8.0, 11.0, 9.0]);
        let p = resolve_pivot(&s, &side(PivotSide::Min, 100)).unwrap();
        assert_eq!(p.index, 2);
    }

    #[test]
    fn ties_resolve_to_latest() {
        let s = series(&[5.0, 9.0, 5.0, 9.0, 7.0]);
        assert_eq!(resolve_pivot(&s, &side(PivotSide::Min, 5)).unwrap().index, 2);
        assert_eq!(resolve_pivot(&s, &side(PivotSide::Max, 5)).unwrap().index, 3);
    }

    #[test]
    fn zero_lookback_rejected() {
        let s = series(&[1.0]);
        assert!(matches!(
            resolve_pivot(&s, &side(PivotSide::Min, 0)),
            Err(CoreError::InvalidConfig(_))
        ));
    }

    #[test]
    fn explicit_date_exact_match() {
        let s = series(&[1.0, 2.0, 3.0]);
        let p = resolve_pivot(&s, &PivotMode::ExplicitDate { date: d(2) }).unwrap();
        assert_eq!(p.index, 1);
    }

    #[test]
    fn explicit_date_falls_back_to_prior() {
        let s = CleanSeries::new(vec![
            PricePoint::new(d(2), 1.0),
            PricePoint::new(d(5), 2.0),
            PricePoint::new(d(8), 3.0),
        ])
        .unwrap();
        let p = resolve_pivot(&s, &PivotMode::ExplicitDate { date: d(7) }).unwrap();
        assert_eq!(p.date, d(5));
        let p = resolve_pivot(&s, &PivotMode::ExplicitDate { date: d(30) }).unwrap();
        assert_eq!(p.index, 2);
    }

    #[test]
    fn explicit_date_before_history_fails() {
        let s = CleanSeries::new(vec![PricePoint::new(d(5), 1.0)]).unwrap();
        assert_eq!(
            resolve_pivot(&s, &PivotMode::ExplicitDate { date: d(4) }).unwrap_err(),
            CoreError::PivotNotFound {
                requested: d(4),
                first: d(5)
            }
        );
    }

    #[test]
    fn side_parses_aliases() {
        assert_eq!("low".parse::<PivotSide>().unwrap(), PivotSide::Min);
        assert_eq!("HIGH".parse::<PivotSide>().unwrap(), PivotSide::Max);
        assert_eq!("max".parse::<PivotSide>().unwrap(), PivotSide::Max);
        assert!("middle".parse::<PivotSide>().is_err());
    }

    #[test]
    fn mode_deserializes_from_toml_shapes() {
        let m: PivotMode =
            serde_json::from_str(r#"{"mode":"side","side":"high","lookback":5}"#).unwrap();
        assert_eq!(m, side(PivotSide::Max, 5));
        let m: PivotMode = serde_json::from_str(r#"{"mode":"date","date":"2024-01-03"}"#).unwrap();
        assert_eq!(m, PivotMode::ExplicitDate { date: d(3) });
    }
}

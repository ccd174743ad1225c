//! Validated price series and projection output types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A single daily close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }
}

/// Non-empty series with strictly increasing dates and finite closes.
///
/// Only constructible through [`CleanSeries::new`], so downstream stages can
/// index without re-checking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanSeries(Vec<PricePoint>);

impl CleanSeries {
    /// Validate and wrap a point vector.
    ///
    /// Empty input yields `EmptySeries`; unordered dates or non-finite closes
    /// yield `InvalidConfig` naming the offending position.
    pub fn new(points: Vec<PricePoint>) -> Result<Self, CoreError> {
        if points.is_empty() {
            return Err(CoreError::EmptySeries);
        }
        for (i, p) in points.iter().enumerate() {
            if !p.close.is_finite() {
                return Err(CoreError::InvalidConfig(format!(
                    "non-finite close at position {i} ({})",
                    p.date
                )));
            }
        }
        for (i, w) in points.windows(2).enumerate() {
            if w[0].date >= w[1].date {
                return Err(CoreError::InvalidConfig(format!(
                    "dates not strictly increasing at position {}: {} then {}",
                    i + 1,
                    w[0].date,
                    w[1].date
                )));
            }
        }
        Ok(Self(points))
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PricePoint> {
        self.0.get(index)
    }

    pub fn first(&self) -> &PricePoint {
        &self.0[0]
    }

    pub fn last(&self) -> &PricePoint {
        &self.0[self.0.len() - 1]
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.0.iter().map(|p| p.date)
    }

    pub fn into_points(self) -> Vec<PricePoint> {
        self.0
    }
}

impl<'de> Deserialize<'de> for CleanSeries {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let points = Vec::<PricePoint>::deserialize(deserializer)?;
        CleanSeries::new(points).map_err(serde::de::Error::custom)
    }
}

/// One mirrored future value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectedPoint {
    pub date: NaiveDate,
    pub value: f64,
    /// True when the value was held flat because history ran out.
    pub clamped: bool,
}

/// The resolved reflection anchor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pivot {
    pub index: usize,
    pub date: NaiveDate,
    pub close: f64,
}

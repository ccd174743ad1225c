//! Untyped input rows, as handed over by a data source.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One untyped cell from a data source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum RawValue {
    #[default]
    Missing,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl RawValue {
    /// True for `Missing` and for blank text.
    pub fn is_missing(&self) -> bool {
        match self {
            RawValue::Missing => true,
            RawValue::Text(s) => s.trim().is_empty(),
            RawValue::Number(_) | RawValue::Date(_) => false,
        }
    }

    /// Build from an optional string cell, treating blanks as missing.
    pub fn from_text(cell: Option<&str>) -> Self {
        match cell {
            Some(s) if !s.trim().is_empty() => RawValue::Text(s.to_string()),
            _ => RawValue::Missing,
        }
    }

    /// Build from an optional number; NaN stays a number so the sanitizer can count it.
    pub fn from_number(value: Option<f64>) -> Self {
        value.map_or(RawValue::Missing, RawValue::Number)
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::from_text(Some(s))
    }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        RawValue::Number(v)
    }
}

impl From<NaiveDate> for RawValue {
    fn from(d: NaiveDate) -> Self {
        RawValue::Date(d)
    }
}

/// Bar cells carried next to the close. The engine never reads them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BarCells {
    pub open: RawValue,
    pub high: RawValue,
    pub low: RawValue,
    pub volume: RawValue,
}

impl BarCells {
    pub fn is_empty(&self) -> bool {
        [&self.open, &self.high, &self.low, &self.volume]
            .iter()
            .all(|v| v.is_missing())
    }
}

/// A raw (date, close) row with the bar cells and any other columns the source carried.
///
/// Bar and extra cells only matter to the engine for the "fully empty row" check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub date: RawValue,
    pub close: RawValue,
    #[serde(default)]
    pub bar: BarCells,
    #[serde(default)]
    pub extra: Vec<RawValue>,
}

impl RawRecord {
    pub fn new(date: impl Into<RawValue>, close: impl Into<RawValue>) -> Self {
        Self {
            date: date.into(),
            close: close.into(),
            bar: BarCells::default(),
            extra: Vec::new(),
        }
    }

    pub fn with_bar(mut self, bar: BarCells) -> Self {
        self.bar = bar;
        self
    }

    pub fn with_extra(mut self, extra: Vec<RawValue>) -> Self {
        self.extra = extra;
        self
    }

    /// True when every field, bar and extras included, is missing.
    pub fn is_empty(&self) -> bool {
        self.date.is_missing()
            && self.close.is_missing()
            && self.bar.is_empty()
            && self.extra.iter().all(RawValue::is_missing)
    }
}

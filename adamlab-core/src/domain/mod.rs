//! Domain types for AdamLab

pub mod raw;
pub mod series;

pub use raw::{BarCells, RawRecord, RawValue};
pub use series::{CleanSeries, Pivot, PricePoint, ProjectedPoint};

//! Fatal errors raised by the engine stages.
//!
//! Non-fatal degradations are not errors; they travel as
//! [`Diagnostic`](crate::diagnostics::Diagnostic) values alongside the result.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors that abort the pipeline for one instrument.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("no usable historical data after sanitization")]
    EmptySeries,

    #[error("pivot date {requested} precedes the first historical date {first}")]
    PivotNotFound {
        requested: NaiveDate,
        first: NaiveDate,
    },

    #[error(
        "insufficient history to mirror: pivot index {pivot} covers fewer than {horizon} offsets"
    )]
    InsufficientHistory { pivot: usize, horizon: usize },

    #[error("projected value at offset {offset} ({date}) is not finite")]
    NonFiniteProjection { offset: usize, date: NaiveDate },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

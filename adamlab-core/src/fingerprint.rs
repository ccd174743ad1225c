//! Dataset fingerprinting for run logs.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::CleanSeries;

/// Deterministic dataset hash (BLAKE3 over the clean series)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetHash(pub String);

impl DatasetHash {
    /// Hash dates and close bytes in series order.
    pub fn of(series: &CleanSeries) -> Self {
        let mut hasher = blake3::Hasher::new();
        for p in series.points() {
            hasher.update(p.date.to_string().as_bytes());
            hasher.update(&p.close.to_le_bytes());
        }
        Self(hasher.finalize().to_hex().to_string())
    }

    /// First 12 hex chars, for console output.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(12);
        &self.0[..end]
    }
}

impl fmt::Display for DatasetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

use crate::domain::comparison::ComparisonRow;
use crate::domain::product::ProductObservation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rows excluded at load time, per source table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectCounts {
    pub products: usize,
    pub comparison: usize,
    pub history: usize,
}

impl RejectCounts {
    pub fn total(&self) -> usize {
        self.products + self.comparison + self.history
    }
}

/// One consistent load of every upstream table. Read-only for the whole computation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateDataset {
    pub products: Vec<ProductObservation>,
    pub comparison: Vec<ComparisonRow>,
    pub history: Vec<ProductObservation>,
    pub rejected: RejectCounts,
    pub loaded_at: DateTime<Utc>,
}

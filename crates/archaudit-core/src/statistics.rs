//! Run statistics.

use serde::{Deserialize, Serialize};

/// Counters accumulated over one reconciliation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStatistics {
    /// Total work units (dataset IDs) the plan covers.
    #[serde(default)]
    pub datasets_total: u64,
    /// Work units completed so far.
    #[serde(default)]
    pub datasets_processed: u64,
    /// Upload groups compared against the archive.
    #[serde(default)]
    pub groups_compared: u64,
    /// Discrepancy records written to the report.
    #[serde(default)]
    pub discrepancies_emitted: u64,
    /// Ledger rows with unparseable byte counts.
    #[serde(default)]
    pub parse_warnings: u32,
    /// Wall-clock duration in seconds.
    #[serde(default)]
    pub duration_seconds: u64,
}

impl RunStatistics {
    /// Create new empty statistics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Completed fraction of the plan, as a percentage.
    #[must_use]
    pub fn progress_percentage(&self) -> f64 {
        if self.datasets_total == 0 {
            0.0
        } else {
            (self.datasets_processed as f64 / self.datasets_total as f64) * 100.0
        }
    }
}

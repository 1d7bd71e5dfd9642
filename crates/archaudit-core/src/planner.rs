//! Dataset-ID range planning.
//!
//! Decides which dataset IDs a run examines and slices them into ordered,
//! bounded windows.

use std::collections::BTreeSet;

use crate::error::{AuditError, AuditResult};

/// What the run scans: a continuous ID range or an explicit ID set.
#[derive(Debug, Clone)]
pub enum ScanScope {
    /// Scan `start..=end` (end defaults to the highest verified dataset ID).
    Range { start: i32, end: Option<i32> },
    /// Scan only the listed dataset IDs.
    Explicit(Vec<i32>),
}

/// An inclusive window of dataset IDs processed in one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetWindow {
    /// First dataset ID in the window.
    pub start: i32,
    /// Last dataset ID in the window.
    pub end: i32,
}

/// Computes the scan bounds for a run.
#[derive(Debug, Clone)]
pub struct DatasetRangePlanner {
    batch_size: i32,
    scope: ScanScope,
}

impl DatasetRangePlanner {
    /// Create a planner with the given window size and scope.
    #[must_use]
    pub fn new(batch_size: i32, scope: ScanScope) -> Self {
        Self { batch_size, scope }
    }

    /// Resolve the scan bounds against the highest verified dataset ID the
    /// ledger knows about. Fails before any further remote work if the
    /// resulting range is empty or the configuration is invalid.
    pub fn plan(&self, max_verified_id: i32) -> AuditResult<RangePlan> {
        if self.batch_size < 1 {
            return Err(AuditError::configuration(format!(
                "batch size must be at least 1, got {}",
                self.batch_size
            )));
        }

        match &self.scope {
            ScanScope::Explicit(ids) => {
                let ids: BTreeSet<i32> = ids.iter().copied().collect();
                if ids.is_empty() {
                    return Err(AuditError::configuration(
                        "explicit dataset ID list is empty",
                    ));
                }
                let lower = *ids.iter().next().unwrap();
                let upper = (*ids.iter().next_back().unwrap()).min(max_verified_id);
                let total_units = ids.len() as u64;
                Ok(RangePlan {
                    lower,
                    upper,
                    total_units,
                    batch_size: self.batch_size,
                    explicit: Some(ids),
                })
            }
            ScanScope::Range { start, end } => {
                if *start == 0 {
                    return Err(AuditError::configuration(
                        "dataset ID range start must be non-zero",
                    ));
                }
                let upper = end.unwrap_or(max_verified_id).min(max_verified_id);
                let total = i64::from(upper) - i64::from(*start) + 1;
                if total < 1 {
                    return Err(AuditError::configuration(format!(
                        "dataset ID range {start}-{upper} is empty \
                         (max verified dataset ID is {max_verified_id})"
                    )));
                }
                Ok(RangePlan {
                    lower: *start,
                    upper,
                    total_units: total as u64,
                    batch_size: self.batch_size,
                    explicit: None,
                })
            }
        }
    }
}

/// A resolved scan: bounds, work-unit total, and the window sequence.
#[derive(Debug, Clone)]
pub struct RangePlan {
    lower: i32,
    upper: i32,
    total_units: u64,
    batch_size: i32,
    explicit: Option<BTreeSet<i32>>,
}

impl RangePlan {
    /// Lowest dataset ID the run scans.
    #[must_use]
    pub fn lower(&self) -> i32 {
        self.lower
    }

    /// Highest dataset ID the run scans.
    #[must_use]
    pub fn upper(&self) -> i32 {
        self.upper
    }

    /// Total work units: the explicit set size, or the range width.
    #[must_use]
    pub fn total_units(&self) -> u64 {
        self.total_units
    }

    /// The explicit dataset-ID filter, when one constrains the scan.
    #[must_use]
    pub fn explicit_filter(&self) -> Option<&BTreeSet<i32>> {
        self.explicit.as_ref()
    }

    /// Work units completed once the window ending at `window_end` is done.
    #[must_use]
    pub fn units_through(&self, window_end: i32) -> u64 {
        let done = match &self.explicit {
            Some(ids) => ids.iter().filter(|id| **id <= window_end).count() as u64,
            None => (i64::from(window_end) - i64::from(self.lower) + 1).max(0) as u64,
        };
        done.min(self.total_units)
    }

    /// Ordered sequence of dataset-ID windows covering the scan.
    #[must_use]
    pub fn windows(&self) -> WindowIter<'_> {
        WindowIter {
            plan: self,
            cursor: Some(self.lower),
        }
    }
}

/// Iterator over a plan's dataset-ID windows.
///
/// A continuous range advances by full window width; an explicit ID set
/// advances to the next ID greater than the current window's end, so sparse
/// sets do not force scanning empty ranges.
#[derive(Debug)]
pub struct WindowIter<'a> {
    plan: &'a RangePlan,
    cursor: Option<i32>,
}

impl Iterator for WindowIter<'_> {
    type Item = DatasetWindow;

    fn next(&mut self) -> Option<DatasetWindow> {
        let start = self.cursor?;
        if start > self.plan.upper {
            self.cursor = None;
            return None;
        }
        let end = start
            .saturating_add(self.plan.batch_size - 1)
            .min(self.plan.upper);

        use std::ops::Bound;
        self.cursor = match &self.plan.explicit {
            Some(ids) => ids
                .range((Bound::Excluded(end), Bound::Unbounded))
                .next()
                .copied(),
            None => end.checked_add(1),
        };

        Some(DatasetWindow { start, end })
    }
}

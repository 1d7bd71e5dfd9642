//! Paced sub-batching of archive lookups.
//!
//! The archive listing service only takes a handful of dataset IDs per call
//! and throttles aggressive callers, so a window's IDs are streamed in small
//! sub-batches with a minimum wall-clock interval between the end of one
//! call and the start of the next.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::AuditResult;
use crate::sources::ArchiveSource;
use crate::types::ArchivedFile;

/// Sleep granularity while waiting out the pacing interval.
const PACE_STEP: Duration = Duration::from_millis(100);

/// Issues archive listing calls in fixed-size, rate-limited sub-batches.
#[derive(Debug)]
pub struct LookupBatcher {
    batch_size: usize,
    min_interval: Duration,
    last_call_end: Option<Instant>,
}

impl LookupBatcher {
    /// Create a batcher with the given sub-batch size and minimum interval
    /// between consecutive archive calls.
    #[must_use]
    pub fn new(batch_size: usize, min_interval: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            min_interval,
            last_call_end: None,
        }
    }

    /// Sub-batch size in dataset IDs.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// List archived files for one sub-batch, waiting out the pacing
    /// interval first.
    pub async fn list_files(
        &mut self,
        archive: &dyn ArchiveSource,
        dataset_ids: &[i32],
    ) -> AuditResult<Vec<ArchivedFile>> {
        self.pace().await;
        debug!(datasets = dataset_ids.len(), "querying archive listing");
        let result = archive.list_files(dataset_ids).await;
        self.last_call_end = Some(Instant::now());
        result
    }

    async fn pace(&self) {
        let Some(last_end) = self.last_call_end else {
            return;
        };
        loop {
            let elapsed = last_end.elapsed();
            if elapsed >= self.min_interval {
                return;
            }
            let remaining = self.min_interval - elapsed;
            tokio::time::sleep(remaining.min(PACE_STEP)).await;
        }
    }
}

//! Reconciliation run orchestration.
//!
//! Drives the window loop: plan the dataset-ID scan, pull and aggregate
//! ledger rows per window, stream paced archive lookups, compare, and
//! append discrepancies to the report sink. Windows are strictly
//! sequential; all per-window collections are dropped once the window's
//! discrepancies have been emitted.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::aggregator::UploadGroupAggregator;
use crate::batcher::LookupBatcher;
use crate::comparator::compare_dataset;
use crate::error::AuditResult;
use crate::planner::{DatasetRangePlanner, ScanScope};
use crate::report::ReportSink;
use crate::sources::{ArchiveSource, LedgerSource};
use crate::statistics::RunStatistics;
use crate::types::ArchivedFile;

/// Configuration for a reconciliation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Dataset IDs per ledger window.
    #[serde(default = "default_batch_size")]
    pub batch_size: i32,
    /// Dataset IDs per archive listing call.
    #[serde(default = "default_lookup_batch_size")]
    pub lookup_batch_size: usize,
    /// Minimum milliseconds between consecutive archive calls.
    #[serde(default = "default_lookup_interval_ms")]
    pub lookup_interval_ms: u64,
    /// Skip archive calls and comparisons (dry run).
    #[serde(default)]
    pub preview: bool,
    /// First dataset ID to scan (ignored when `dataset_ids` is non-empty).
    #[serde(default = "default_start_dataset_id")]
    pub start_dataset_id: i32,
    /// Last dataset ID to scan; defaults to the highest verified ID.
    #[serde(default)]
    pub end_dataset_id: Option<i32>,
    /// Explicit dataset IDs to examine instead of a continuous range.
    #[serde(default)]
    pub dataset_ids: Vec<i32>,
}

fn default_batch_size() -> i32 {
    1000
}

fn default_lookup_batch_size() -> usize {
    5
}

fn default_lookup_interval_ms() -> u64 {
    500
}

fn default_start_dataset_id() -> i32 {
    1
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            lookup_batch_size: default_lookup_batch_size(),
            lookup_interval_ms: default_lookup_interval_ms(),
            preview: false,
            start_dataset_id: default_start_dataset_id(),
            end_dataset_id: None,
            dataset_ids: Vec::new(),
        }
    }
}

/// Receives progress checkpoints from the run loop. Invoked at sub-batch
/// and window completion; the implementation decides rendering and
/// throttling policy.
pub trait ProgressReporter: Send + Sync {
    /// Called with monotonically non-decreasing `units_completed`.
    fn on_progress(&self, units_completed: u64, total_units: u64);
}

/// Progress reporter that ignores all checkpoints.
#[derive(Debug, Default)]
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn on_progress(&self, _units_completed: u64, _total_units: u64) {}
}

/// Orchestrates reconciliation runs.
pub struct ReconciliationEngine {
    config: EngineConfig,
}

impl ReconciliationEngine {
    /// Create an engine with the given configuration.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Configuration in effect.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Execute one reconciliation run.
    ///
    /// Aborts on the first ledger, archive, or sink failure; the returned
    /// error names the dataset-ID window being processed so a rerun can
    /// resume from it.
    pub async fn run(
        &self,
        ledger: &dyn LedgerSource,
        archive: &dyn ArchiveSource,
        sink: &mut dyn ReportSink,
        progress: &dyn ProgressReporter,
    ) -> AuditResult<RunStatistics> {
        let started = Instant::now();

        let max_verified = ledger.max_verified_dataset_id().await?;
        let scope = if self.config.dataset_ids.is_empty() {
            ScanScope::Range {
                start: self.config.start_dataset_id,
                end: self.config.end_dataset_id,
            }
        } else {
            ScanScope::Explicit(self.config.dataset_ids.clone())
        };
        let plan = DatasetRangePlanner::new(self.config.batch_size, scope).plan(max_verified)?;

        info!(
            lower = plan.lower(),
            upper = plan.upper(),
            total_units = plan.total_units(),
            max_verified,
            preview = self.config.preview,
            "planned reconciliation scan"
        );

        let mut stats = RunStatistics {
            datasets_total: plan.total_units(),
            ..RunStatistics::new()
        };
        let mut aggregator = UploadGroupAggregator::new(plan.explicit_filter().cloned());
        let mut batcher = LookupBatcher::new(
            self.config.lookup_batch_size,
            Duration::from_millis(self.config.lookup_interval_ms),
        );
        let mut completed: u64 = 0;

        for window in plan.windows() {
            debug!(start = window.start, end = window.end, "processing dataset window");

            let rows = ledger
                .upload_records(window.start, window.end)
                .await
                .map_err(|e| {
                    error!(start = window.start, end = window.end, "ledger query failed");
                    e.with_window(window.start, window.end)
                })?;
            let grouped = aggregator.aggregate(rows);

            if self.config.preview {
                info!(
                    start = window.start,
                    end = window.end,
                    datasets = grouped.len(),
                    "preview: skipping archive lookups"
                );
                completed = plan.units_through(window.end);
                stats.datasets_processed = completed;
                progress.on_progress(completed, stats.datasets_total);
                continue;
            }

            let window_units = plan.units_through(window.end) - completed;
            let ids: Vec<i32> = grouped.keys().copied().collect();
            let mut files_by_dataset: HashMap<i32, Vec<ArchivedFile>> = HashMap::new();
            let mut ids_fetched: u64 = 0;

            for chunk in ids.chunks(batcher.batch_size()) {
                let files = batcher.list_files(archive, chunk).await.map_err(|e| {
                    error!(
                        start = window.start,
                        end = window.end,
                        datasets = chunk.len(),
                        "archive lookup failed"
                    );
                    e.with_window(window.start, window.end)
                })?;
                for file in files.into_iter().filter(|f| !f.is_directory) {
                    files_by_dataset.entry(file.dataset_id).or_default().push(file);
                }

                ids_fetched += chunk.len() as u64;
                progress.on_progress(
                    completed + ids_fetched.min(window_units),
                    stats.datasets_total,
                );
            }

            let timestamp = Utc::now();
            for (dataset_id, groups) in &grouped {
                let files = files_by_dataset
                    .get(dataset_id)
                    .map_or(&[][..], Vec::as_slice);
                let records = compare_dataset(groups, files, timestamp);
                stats.groups_compared += groups.len() as u64;
                stats.discrepancies_emitted += records.len() as u64;
                for record in &records {
                    sink.append_row(record)
                        .map_err(|e| e.with_window(window.start, window.end))?;
                }
            }
            sink.flush()
                .map_err(|e| e.with_window(window.start, window.end))?;

            completed = plan.units_through(window.end);
            stats.datasets_processed = completed;
            progress.on_progress(completed, stats.datasets_total);
        }

        stats.parse_warnings = aggregator.parse_warnings();
        stats.duration_seconds = started.elapsed().as_secs();
        info!(
            datasets_processed = stats.datasets_processed,
            groups_compared = stats.groups_compared,
            discrepancies = stats.discrepancies_emitted,
            parse_warnings = stats.parse_warnings,
            duration_seconds = stats.duration_seconds,
            "reconciliation run complete"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuditError;
    use crate::types::{DiscrepancyRecord, MatchScore, UploadRecord};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct FakeLedger {
        max_verified: i32,
        rows: Vec<UploadRecord>,
    }

    #[async_trait]
    impl LedgerSource for FakeLedger {
        async fn max_verified_dataset_id(&self) -> AuditResult<i32> {
            Ok(self.max_verified)
        }

        async fn upload_records(&self, start: i32, end: i32) -> AuditResult<Vec<UploadRecord>> {
            Ok(self
                .rows
                .iter()
                .filter(|r| r.dataset_id >= start && r.dataset_id <= end)
                .cloned()
                .collect())
        }
    }

    struct FakeArchive {
        files: Vec<ArchivedFile>,
        calls: AtomicU32,
        fail: bool,
    }

    #[async_trait]
    impl ArchiveSource for FakeArchive {
        async fn list_files(&self, dataset_ids: &[i32]) -> AuditResult<Vec<ArchivedFile>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AuditError::archive("listing service unavailable"));
            }
            Ok(self
                .files
                .iter()
                .filter(|f| dataset_ids.contains(&f.dataset_id))
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    struct VecSink {
        rows: Vec<DiscrepancyRecord>,
    }

    impl ReportSink for VecSink {
        fn append_row(&mut self, record: &DiscrepancyRecord) -> AuditResult<()> {
            self.rows.push(record.clone());
            Ok(())
        }

        fn flush(&mut self) -> AuditResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct VecProgress {
        checkpoints: Mutex<Vec<(u64, u64)>>,
    }

    impl ProgressReporter for VecProgress {
        fn on_progress(&self, units_completed: u64, total_units: u64) {
            self.checkpoints
                .lock()
                .unwrap()
                .push((units_completed, total_units));
        }
    }

    fn upload(dataset_id: i32, subdirectory: &str, files_new: i32, bytes: &str) -> UploadRecord {
        UploadRecord {
            entry_id: dataset_id * 10,
            job: dataset_id * 100,
            dataset_id,
            subdirectory: subdirectory.to_string(),
            files_new,
            files_updated: 0,
            bytes: bytes.to_string(),
            status_num: 5,
            transaction_id: dataset_id,
            entered_at: Utc::now(),
        }
    }

    fn archived(dataset_id: i32, path: &str, size: i64, is_directory: bool) -> ArchivedFile {
        ArchivedFile {
            dataset_id,
            subdirectory_path: path.to_string(),
            size_bytes: size,
            is_directory,
        }
    }

    fn test_config() -> EngineConfig {
        EngineConfig {
            lookup_interval_ms: 0,
            ..EngineConfig::default()
        }
    }

    #[tokio::test]
    async fn test_run_emits_rows_in_dataset_order() {
        let ledger = FakeLedger {
            max_verified: 100,
            rows: vec![
                upload(20, "", 1, "10"),
                upload(10, "", 2, "200"),
                upload(10, "QC", 1, "50"),
            ],
        };
        let archive = FakeArchive {
            files: vec![
                archived(10, "", 120, false),
                archived(10, "", 80, false),
                archived(10, "QC", 50, false),
                archived(10, "QC", 1, true),
                archived(20, "", 10, false),
            ],
            calls: AtomicU32::new(0),
            fail: false,
        };
        let mut sink = VecSink::default();

        let engine = ReconciliationEngine::new(test_config());
        let stats = engine
            .run(&ledger, &archive, &mut sink, &NoopProgress)
            .await
            .unwrap();

        assert_eq!(stats.datasets_total, 100);
        assert_eq!(stats.groups_compared, 3);
        assert_eq!(stats.discrepancies_emitted, 3);

        let keys: Vec<(i32, &str)> = sink
            .rows
            .iter()
            .map(|r| (r.dataset_id, r.subdirectory.as_str()))
            .collect();
        assert_eq!(keys, vec![(10, ""), (10, "QC"), (20, "")]);

        // Directory entry under QC must not count as a file.
        assert_eq!(sink.rows[1].actual_files, 1);
        assert_eq!(sink.rows[0].score, MatchScore::Perfect);
    }

    #[tokio::test]
    async fn test_run_is_idempotent_modulo_timestamp() {
        let ledger = FakeLedger {
            max_verified: 50,
            rows: vec![upload(5, "", 3, "300"), upload(9, "QC", 2, "100")],
        };
        let files = vec![
            archived(5, "", 100, false),
            archived(9, "QC", 40, false),
        ];

        let mut runs = Vec::new();
        for _ in 0..2 {
            let archive = FakeArchive {
                files: files.clone(),
                calls: AtomicU32::new(0),
                fail: false,
            };
            let mut sink = VecSink::default();
            let engine = ReconciliationEngine::new(test_config());
            engine
                .run(&ledger, &archive, &mut sink, &NoopProgress)
                .await
                .unwrap();
            let rendered: Vec<String> = sink
                .rows
                .iter()
                .map(|r| {
                    format!(
                        "{}|{}|{}|{}|{}|{}|{}",
                        r.dataset_id,
                        r.subdirectory,
                        r.expected_files,
                        r.actual_files,
                        r.expected_bytes,
                        r.actual_bytes,
                        r.score.render(),
                    )
                })
                .collect();
            runs.push(rendered);
        }
        assert_eq!(runs[0], runs[1]);
    }

    #[tokio::test]
    async fn test_archive_failure_aborts_with_window() {
        let ledger = FakeLedger {
            max_verified: 2000,
            rows: vec![upload(1500, "", 1, "10")],
        };
        let archive = FakeArchive {
            files: vec![],
            calls: AtomicU32::new(0),
            fail: true,
        };
        let mut sink = VecSink::default();

        let engine = ReconciliationEngine::new(test_config());
        let err = engine
            .run(&ledger, &archive, &mut sink, &NoopProgress)
            .await
            .unwrap_err();

        assert_eq!(err.window(), Some((1001, 2000)));
        assert!(sink.rows.is_empty());
    }

    #[tokio::test]
    async fn test_sink_failure_aborts_with_window() {
        let ledger = FakeLedger {
            max_verified: 100,
            rows: vec![upload(10, "", 2, "200")],
        };
        let archive = FakeArchive {
            files: vec![archived(10, "", 200, false)],
            calls: AtomicU32::new(0),
            fail: false,
        };

        struct FailingSink;

        impl ReportSink for FailingSink {
            fn append_row(&mut self, _record: &DiscrepancyRecord) -> AuditResult<()> {
                Err(std::io::Error::other("disk full").into())
            }

            fn flush(&mut self) -> AuditResult<()> {
                Ok(())
            }
        }

        let engine = ReconciliationEngine::new(test_config());
        let err = engine
            .run(&ledger, &archive, &mut FailingSink, &NoopProgress)
            .await
            .unwrap_err();

        assert_eq!(err.window(), Some((1, 100)));
        assert!(err.to_string().contains("disk full"));
    }

    #[tokio::test]
    async fn test_preview_skips_archive_and_comparison() {
        let ledger = FakeLedger {
            max_verified: 100,
            rows: vec![upload(10, "", 2, "200")],
        };
        let archive = FakeArchive {
            files: vec![archived(10, "", 200, false)],
            calls: AtomicU32::new(0),
            fail: false,
        };
        let mut sink = VecSink::default();

        let engine = ReconciliationEngine::new(EngineConfig {
            preview: true,
            ..test_config()
        });
        let stats = engine
            .run(&ledger, &archive, &mut sink, &NoopProgress)
            .await
            .unwrap();

        assert_eq!(archive.calls.load(Ordering::SeqCst), 0);
        assert!(sink.rows.is_empty());
        assert_eq!(stats.discrepancies_emitted, 0);
        assert_eq!(stats.datasets_processed, 100);
    }

    #[tokio::test]
    async fn test_explicit_ids_limit_scan_and_progress() {
        let ledger = FakeLedger {
            max_verified: 50,
            rows: vec![
                upload(5, "", 1, "10"),
                upload(7, "", 1, "10"),
                upload(9, "", 1, "10"),
            ],
        };
        let archive = FakeArchive {
            files: vec![
                archived(5, "", 10, false),
                archived(9, "", 10, false),
            ],
            calls: AtomicU32::new(0),
            fail: false,
        };
        let mut sink = VecSink::default();
        let progress = VecProgress::default();

        let engine = ReconciliationEngine::new(EngineConfig {
            dataset_ids: vec![5, 9, 100],
            lookup_batch_size: 1,
            ..test_config()
        });
        let stats = engine
            .run(&ledger, &archive, &mut sink, &progress)
            .await
            .unwrap();

        // Dataset 7 is not in the explicit set.
        let ids: Vec<i32> = sink.rows.iter().map(|r| r.dataset_id).collect();
        assert_eq!(ids, vec![5, 9]);

        // One archive call per sub-batch of one dataset ID.
        assert_eq!(archive.calls.load(Ordering::SeqCst), 2);

        assert_eq!(stats.datasets_total, 3);
        assert_eq!(stats.datasets_processed, 2);

        let checkpoints = progress.checkpoints.lock().unwrap();
        assert!(checkpoints.iter().all(|(_, total)| *total == 3));
        assert!(checkpoints.windows(2).all(|w| w[0].0 <= w[1].0));
    }

    #[tokio::test]
    async fn test_invalid_range_fails_before_archive_calls() {
        let ledger = FakeLedger {
            max_verified: 50,
            rows: vec![],
        };
        let archive = FakeArchive {
            files: vec![],
            calls: AtomicU32::new(0),
            fail: false,
        };
        let mut sink = VecSink::default();

        let engine = ReconciliationEngine::new(EngineConfig {
            start_dataset_id: 100,
            ..test_config()
        });
        let err = engine
            .run(&ledger, &archive, &mut sink, &NoopProgress)
            .await
            .unwrap_err();

        assert!(matches!(err, AuditError::Configuration { .. }));
        assert_eq!(archive.calls.load(Ordering::SeqCst), 0);
    }
}

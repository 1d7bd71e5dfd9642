//! # Archive Upload Reconciliation Engine
//!
//! Reconciles two independent records of "what files exist for a dataset":
//! the authoritative upload ledger and the archive's own listing of what it
//! actually stored, flagging missing files, byte-count discrepancies, and
//! extra or duplicate content.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   windows   ┌──────────────┐   groups    ┌──────────────┐
//! │   Planner    │────────────►│  Aggregator  │────────────►│   Batcher    │
//! │ (ID ranges)  │             │ (ledger rows)│             │ (paced calls)│
//! └──────────────┘             └──────────────┘             └──────┬───────┘
//!                                                                  │ listings
//!                                                                  ▼
//!                              ┌──────────────┐   records   ┌──────────────┐
//!                              │  ReportSink  │◄────────────│  Comparator  │
//!                              │  (TSV file)  │             │  (scoring)   │
//!                              └──────────────┘             └──────────────┘
//! ```
//!
//! The engine drives the loop window by window; the ledger and archive are
//! reached only through the [`sources`] traits, so the core carries no
//! database or HTTP dependency.

pub mod aggregator;
pub mod batcher;
pub mod comparator;
pub mod engine;
pub mod error;
pub mod planner;
pub mod report;
pub mod sources;
pub mod statistics;
pub mod types;

pub use aggregator::{DatasetGroups, UploadGroup, UploadGroupAggregator};
pub use batcher::LookupBatcher;
pub use comparator::{apply_root_anomaly, compare_dataset, score_group, ROOT_ANOMALY_WARNING};
pub use engine::{EngineConfig, NoopProgress, ProgressReporter, ReconciliationEngine};
pub use error::{AuditError, AuditResult};
pub use planner::{DatasetRangePlanner, DatasetWindow, RangePlan, ScanScope};
pub use report::{format_row, ReportSink, TsvReportSink, REPORT_HEADER};
pub use sources::{ArchiveSource, LedgerSource};
pub use statistics::RunStatistics;
pub use types::{ArchivedFile, DiscrepancyRecord, MatchScore, UploadRecord, RATIO_EPSILON};

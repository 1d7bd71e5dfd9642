//! Discrepancy report output.
//!
//! Rows are tab-delimited; the column order is fixed for compatibility with
//! downstream review tooling.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::AuditResult;
use crate::types::DiscrepancyRecord;

/// Header row of the discrepancy report.
pub const REPORT_HEADER: &str = "StatusDate\tEntryID\tJob\tDatasetID\tSubdirectory\tStatusNum\
\tTransactionID\tEntered\tFiles\tFilesInArchive\tBytes\tBytesInArchive\tMatchRatio\tComment";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format one record as a report row (no trailing newline).
#[must_use]
pub fn format_row(record: &DiscrepancyRecord) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        record.timestamp.format(TIMESTAMP_FORMAT),
        record.entry_id,
        record.job,
        record.dataset_id,
        record.subdirectory,
        record.status_num,
        record.transaction_id,
        record.entered_at.format(TIMESTAMP_FORMAT),
        record.expected_files,
        record.actual_files,
        record.expected_bytes,
        record.actual_bytes,
        record.score.render(),
        record.comment,
    )
}

/// Append-only, ordered sink for discrepancy records.
pub trait ReportSink {
    /// Append one record.
    fn append_row(&mut self, record: &DiscrepancyRecord) -> AuditResult<()>;

    /// Flush buffered rows to durable storage.
    fn flush(&mut self) -> AuditResult<()>;
}

/// Tab-delimited report file. Supports resuming into an existing partially
/// written stream: the header is written only when the file is new or empty.
#[derive(Debug)]
pub struct TsvReportSink {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl TsvReportSink {
    /// Open (or create) the report file for appending.
    pub fn open(path: impl AsRef<Path>) -> AuditResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let is_empty = file.metadata()?.len() == 0;

        let mut sink = Self {
            writer: BufWriter::new(file),
            path,
        };
        if is_empty {
            writeln!(sink.writer, "{REPORT_HEADER}")?;
        } else {
            info!(path = %sink.path.display(), "resuming existing report file");
        }
        Ok(sink)
    }

    /// Path of the report file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReportSink for TsvReportSink {
    fn append_row(&mut self, record: &DiscrepancyRecord) -> AuditResult<()> {
        writeln!(self.writer, "{}", format_row(record))?;
        Ok(())
    }

    fn flush(&mut self) -> AuditResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}

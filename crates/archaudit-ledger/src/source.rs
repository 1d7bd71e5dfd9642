//! Upload-ledger queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;

use archaudit_core::{AuditError, AuditResult, LedgerSource, UploadRecord};

/// Status number marking an upload as verified (fully ingested by the
/// archive).
pub const DEFAULT_VERIFIED_STATUS: i32 = 5;

/// Upload ledger backed by Postgres.
///
/// The windowed query deduplicates server-side to one row per
/// `(dataset_id, subdirectory)`, keeping the row with the highest touched
/// file count.
#[derive(Debug, Clone)]
pub struct PgLedgerSource {
    pool: PgPool,
    verified_status: i32,
}

impl PgLedgerSource {
    /// Create a ledger source using the default verified-status marker.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            verified_status: DEFAULT_VERIFIED_STATUS,
        }
    }

    /// Override the status number that marks an upload as verified.
    #[must_use]
    pub fn with_verified_status(mut self, verified_status: i32) -> Self {
        self.verified_status = verified_status;
        self
    }
}

#[async_trait]
impl LedgerSource for PgLedgerSource {
    async fn max_verified_dataset_id(&self) -> AuditResult<i32> {
        let max: Option<i32> = sqlx::query_scalar(
            r"
            SELECT MAX(dataset_id)
            FROM upload_ledger
            WHERE status_num = $1
            ",
        )
        .bind(self.verified_status)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AuditError::ledger(format!("max verified dataset ID query: {e}")))?;

        Ok(max.unwrap_or(0))
    }

    async fn upload_records(
        &self,
        dataset_id_start: i32,
        dataset_id_end: i32,
    ) -> AuditResult<Vec<UploadRecord>> {
        let rows: Vec<UploadRecordRow> = sqlx::query_as(
            r"
            SELECT entry_id, job, dataset_id, subdirectory, files_new,
                   files_updated, bytes, status_num, transaction_id, entered_at
            FROM (
                SELECT entry_id, job, dataset_id, subdirectory, files_new,
                       files_updated, bytes, status_num, transaction_id, entered_at,
                       ROW_NUMBER() OVER (
                           PARTITION BY dataset_id, subdirectory
                           ORDER BY files_new + files_updated DESC, entry_id
                       ) AS dedup_rank
                FROM upload_ledger
                WHERE dataset_id BETWEEN $1 AND $2
            ) ranked
            WHERE dedup_rank = 1
            ORDER BY dataset_id, subdirectory, entry_id
            ",
        )
        .bind(dataset_id_start)
        .bind(dataset_id_end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AuditError::ledger(format!(
                "upload record query for datasets {dataset_id_start}-{dataset_id_end}: {e}"
            ))
        })?;

        debug!(
            start = dataset_id_start,
            end = dataset_id_end,
            rows = rows.len(),
            "fetched upload ledger window"
        );
        Ok(rows.into_iter().map(UploadRecordRow::into_record).collect())
    }
}

/// Row from the ledger query.
#[derive(Debug, sqlx::FromRow)]
struct UploadRecordRow {
    entry_id: i32,
    job: i32,
    dataset_id: i32,
    subdirectory: Option<String>,
    files_new: i32,
    files_updated: i32,
    bytes: Option<String>,
    status_num: i32,
    transaction_id: i32,
    entered_at: DateTime<Utc>,
}

impl UploadRecordRow {
    fn into_record(self) -> UploadRecord {
        UploadRecord {
            entry_id: self.entry_id,
            job: self.job,
            dataset_id: self.dataset_id,
            // NULL subdirectory means the dataset root.
            subdirectory: self.subdirectory.unwrap_or_default(),
            files_new: self.files_new,
            files_updated: self.files_updated,
            bytes: self.bytes.unwrap_or_default(),
            status_num: self.status_num,
            transaction_id: self.transaction_id,
            entered_at: self.entered_at,
        }
    }
}

//! Collaborator contracts for the upload ledger and the archive listing
//! service. The engine only sees these traits; concrete implementations
//! live in `archaudit-ledger` and `archaudit-store`.

use async_trait::async_trait;

use crate::error::AuditResult;
use crate::types::{ArchivedFile, UploadRecord};

/// The authoritative upload ledger.
#[async_trait]
pub trait LedgerSource: Send + Sync {
    /// Highest dataset ID with a verified (fully ingested) upload status.
    /// This is the hard upper bound of any scan.
    async fn max_verified_dataset_id(&self) -> AuditResult<i32>;

    /// Upload rows for an inclusive dataset-ID window, deduplicated at the
    /// source to the highest-file-count row per `(dataset, subdirectory)`
    /// and ordered by dataset ID.
    async fn upload_records(
        &self,
        dataset_id_start: i32,
        dataset_id_end: i32,
    ) -> AuditResult<Vec<UploadRecord>>;
}

/// The remote archive's listing service.
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    /// Files (and directory entries, which the engine filters out) the
    /// archive physically holds for the given dataset IDs.
    async fn list_files(&self, dataset_ids: &[i32]) -> AuditResult<Vec<ArchivedFile>>;
}

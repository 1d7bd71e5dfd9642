//! Archive listing client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use archaudit_core::{ArchiveSource, ArchivedFile, AuditError, AuditResult};

use crate::config::ArchiveStoreConfig;

/// HTTP client for the archive's file listing endpoint.
pub struct ArchiveClient {
    config: ArchiveStoreConfig,
    client: Client,
}

impl std::fmt::Debug for ArchiveClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveClient")
            .field("base_url", &self.config.base_url)
            .finish()
    }
}

impl ArchiveClient {
    /// Create a client from validated configuration.
    pub fn new(config: ArchiveStoreConfig) -> AuditResult<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AuditError::configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl ArchiveSource for ArchiveClient {
    async fn list_files(&self, dataset_ids: &[i32]) -> AuditResult<Vec<ArchivedFile>> {
        if dataset_ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!(
            "{}/api/v1/files/search",
            self.config.base_url.trim_end_matches('/')
        );
        let mut request = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "dataset_ids": dataset_ids }));
        if let Some(token) = &self.config.api_token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| AuditError::archive(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = if status == StatusCode::TOO_MANY_REQUESTS {
                "archive is throttling requests"
            } else {
                "archive returned an error status"
            };
            return Err(AuditError::archive(format!("{detail}: HTTP {status}")));
        }

        let entries: Vec<ArchiveFileEntry> = response
            .json()
            .await
            .map_err(|e| AuditError::archive(format!("malformed listing response: {e}")))?;

        debug!(
            datasets = dataset_ids.len(),
            entries = entries.len(),
            "archive listing received"
        );
        Ok(entries.into_iter().map(ArchiveFileEntry::into_file).collect())
    }
}

/// Wire format of one listing entry.
#[derive(Debug, Deserialize)]
struct ArchiveFileEntry {
    dataset_id: i32,
    #[serde(default)]
    subdir: String,
    #[serde(default)]
    size: i64,
    #[serde(default)]
    is_folder: bool,
}

impl ArchiveFileEntry {
    fn into_file(self) -> ArchivedFile {
        ArchivedFile {
            dataset_id: self.dataset_id,
            subdirectory_path: normalize_subdir(&self.subdir),
            size_bytes: self.size,
            is_directory: self.is_folder,
        }
    }
}

/// Normalize a listing path to forward slashes with no leading or trailing
/// separator; the empty string denotes the dataset root.
fn normalize_subdir(path: &str) -> String {
    path.replace('\\', "/").trim_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_subdir() {
        assert_eq!(normalize_subdir(""), "");
        assert_eq!(normalize_subdir("/"), "");
        assert_eq!(normalize_subdir("QC"), "QC");
        assert_eq!(normalize_subdir("/QC/plots/"), "QC/plots");
        assert_eq!(normalize_subdir("QC\\plots"), "QC/plots");
    }
}

//! Archive listing service configuration.

use serde::{Deserialize, Serialize};

use archaudit_core::{AuditError, AuditResult};

fn default_timeout_secs() -> u64 {
    30
}

/// Connection settings for the archive listing service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveStoreConfig {
    /// Base URL of the service, e.g. `https://archive.example.org`.
    pub base_url: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Optional bearer token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
}

impl ArchiveStoreConfig {
    /// Create a configuration for the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: default_timeout_secs(),
            api_token: None,
        }
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set the bearer token.
    #[must_use]
    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> AuditResult<()> {
        if self.base_url.is_empty() {
            return Err(AuditError::configuration("archive base URL is empty"));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(AuditError::configuration(format!(
                "archive base URL must be http(s): {}",
                self.base_url
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_http_urls() {
        assert!(ArchiveStoreConfig::new("https://archive.example.org")
            .validate()
            .is_ok());
        assert!(ArchiveStoreConfig::new("http://localhost:8080")
            .validate()
            .is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_urls() {
        assert!(ArchiveStoreConfig::new("").validate().is_err());
        assert!(ArchiveStoreConfig::new("ftp://archive").validate().is_err());
    }
}

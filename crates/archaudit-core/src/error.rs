//! Error types for reconciliation runs.

use thiserror::Error;

/// Errors that can occur during a reconciliation run.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Invalid run configuration (bad dataset-ID range, empty ID set).
    #[error("Invalid configuration: {message}")]
    Configuration { message: String },

    /// Upload ledger query failed.
    #[error("Ledger query failed: {message}")]
    Ledger { message: String },

    /// Archive listing call failed.
    #[error("Archive lookup failed: {message}")]
    Archive { message: String },

    /// Failure while processing a specific dataset-ID window. Carries the
    /// window so a rerun can resume from it.
    #[error("while processing dataset window {start}-{end}: {source}")]
    Window {
        start: i32,
        end: i32,
        #[source]
        source: Box<AuditError>,
    },

    /// Report sink I/O error.
    #[error("Report sink error: {0}")]
    Report(#[from] std::io::Error),
}

impl AuditError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a ledger error.
    pub fn ledger(message: impl Into<String>) -> Self {
        Self::Ledger {
            message: message.into(),
        }
    }

    /// Create an archive error.
    pub fn archive(message: impl Into<String>) -> Self {
        Self::Archive {
            message: message.into(),
        }
    }

    /// Wrap an error with the dataset-ID window being processed when it
    /// occurred. Already-windowed errors are returned unchanged.
    #[must_use]
    pub fn with_window(self, start: i32, end: i32) -> Self {
        match self {
            windowed @ Self::Window { .. } => windowed,
            other => Self::Window {
                start,
                end,
                source: Box::new(other),
            },
        }
    }

    /// The dataset-ID window attached to this error, if any.
    #[must_use]
    pub fn window(&self) -> Option<(i32, i32)> {
        match self {
            Self::Window { start, end, .. } => Some((*start, *end)),
            _ => None,
        }
    }
}

/// Result type for reconciliation operations.
pub type AuditResult<T> = Result<T, AuditError>;

//! Postgres implementation of the upload-ledger collaborator.

pub mod source;

pub use source::{PgLedgerSource, DEFAULT_VERIFIED_STATUS};

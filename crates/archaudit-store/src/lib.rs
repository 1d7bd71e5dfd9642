//! HTTP implementation of the archive listing collaborator.

pub mod client;
pub mod config;

pub use client::ArchiveClient;
pub use config::ArchiveStoreConfig;

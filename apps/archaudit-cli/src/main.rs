//! archaudit - verify archived dataset files against the upload ledger.
//!
//! Scans a dataset-ID range (or an explicit ID list), compares the upload
//! ledger's expected file and byte counts against the archive's listing,
//! and appends discrepancy rows to a tab-delimited report.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use archaudit_core::{EngineConfig, ProgressReporter, ReconciliationEngine, TsvReportSink};
use archaudit_ledger::PgLedgerSource;
use archaudit_store::{ArchiveClient, ArchiveStoreConfig};

/// Verify archived dataset files against the upload ledger.
#[derive(Parser, Debug)]
#[command(name = "archaudit")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Postgres connection string for the upload ledger
    #[arg(long, env = "ARCHAUDIT_DB_URL")]
    db_url: String,

    /// Base URL of the archive listing service
    #[arg(long, env = "ARCHAUDIT_ARCHIVE_URL")]
    archive_url: String,

    /// Bearer token for the archive listing service
    #[arg(long, env = "ARCHAUDIT_ARCHIVE_TOKEN")]
    archive_token: Option<String>,

    /// First dataset ID to scan
    #[arg(long, default_value_t = 1)]
    start: i32,

    /// Last dataset ID to scan (defaults to the highest verified ID)
    #[arg(long)]
    end: Option<i32>,

    /// Explicit dataset IDs to examine instead of a range
    #[arg(long, value_delimiter = ',')]
    dataset_ids: Vec<i32>,

    /// Dataset IDs per ledger window
    #[arg(long, default_value_t = 1000)]
    batch_size: i32,

    /// Dataset IDs per archive listing call
    #[arg(long, default_value_t = 5)]
    lookup_batch_size: usize,

    /// Minimum milliseconds between archive calls
    #[arg(long, default_value_t = 500)]
    lookup_interval_ms: u64,

    /// Skip archive calls and comparisons (dry run)
    #[arg(long)]
    preview: bool,

    /// Report file to create or resume
    #[arg(long, default_value = "reports/archive_audit.tsv")]
    output: PathBuf,

    /// Ledger status number marking an upload as verified
    #[arg(long)]
    verified_status: Option<i32>,
}

/// Logs progress at most every few seconds plus the final checkpoint.
struct LogProgress {
    last_logged: Mutex<Instant>,
}

impl LogProgress {
    fn new() -> Self {
        Self {
            last_logged: Mutex::new(Instant::now()),
        }
    }
}

impl ProgressReporter for LogProgress {
    fn on_progress(&self, units_completed: u64, total_units: u64) {
        let mut last = self.last_logged.lock().unwrap();
        if last.elapsed() < Duration::from_secs(5) && units_completed < total_units {
            return;
        }
        *last = Instant::now();
        let percent = if total_units == 0 {
            100.0
        } else {
            units_completed as f64 / total_units as f64 * 100.0
        };
        info!(units_completed, total_units, "progress: {percent:.1}%");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    if let Some(parent) = cli.output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating report directory {}", parent.display()))?;
        }
    }

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&cli.db_url)
        .await
        .context("connecting to the upload ledger database")?;
    let mut ledger = PgLedgerSource::new(pool);
    if let Some(status) = cli.verified_status {
        ledger = ledger.with_verified_status(status);
    }

    let mut store_config = ArchiveStoreConfig::new(&cli.archive_url);
    if let Some(token) = &cli.archive_token {
        store_config = store_config.with_api_token(token);
    }
    let archive = ArchiveClient::new(store_config)?;

    let mut sink = TsvReportSink::open(&cli.output)
        .with_context(|| format!("opening report file {}", cli.output.display()))?;

    let engine = ReconciliationEngine::new(EngineConfig {
        batch_size: cli.batch_size,
        lookup_batch_size: cli.lookup_batch_size,
        lookup_interval_ms: cli.lookup_interval_ms,
        preview: cli.preview,
        start_dataset_id: cli.start,
        end_dataset_id: cli.end,
        dataset_ids: cli.dataset_ids,
    });

    let stats = engine
        .run(&ledger, &archive, &mut sink, &LogProgress::new())
        .await?;

    info!(
        report = %cli.output.display(),
        datasets_processed = stats.datasets_processed,
        discrepancies = stats.discrepancies_emitted,
        parse_warnings = stats.parse_warnings,
        "done"
    );
    Ok(())
}

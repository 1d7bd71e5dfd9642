//! End-to-end run tests: engine output streamed into a real TSV report.

use async_trait::async_trait;

use archaudit_core::{
    ArchiveSource, ArchivedFile, AuditResult, EngineConfig, LedgerSource, NoopProgress,
    ReconciliationEngine, TsvReportSink, UploadRecord, REPORT_HEADER,
};

struct StaticLedger {
    max_verified: i32,
    rows: Vec<UploadRecord>,
}

#[async_trait]
impl LedgerSource for StaticLedger {
    async fn max_verified_dataset_id(&self) -> AuditResult<i32> {
        Ok(self.max_verified)
    }

    async fn upload_records(&self, start: i32, end: i32) -> AuditResult<Vec<UploadRecord>> {
        Ok(self
            .rows
            .iter()
            .filter(|r| r.dataset_id >= start && r.dataset_id <= end)
            .cloned()
            .collect())
    }
}

struct StaticArchive {
    files: Vec<ArchivedFile>,
}

#[async_trait]
impl ArchiveSource for StaticArchive {
    async fn list_files(&self, dataset_ids: &[i32]) -> AuditResult<Vec<ArchivedFile>> {
        Ok(self
            .files
            .iter()
            .filter(|f| dataset_ids.contains(&f.dataset_id))
            .cloned()
            .collect())
    }
}

fn upload(dataset_id: i32, subdirectory: &str, files_new: i32, bytes: &str) -> UploadRecord {
    UploadRecord {
        entry_id: dataset_id,
        job: dataset_id * 10,
        dataset_id,
        subdirectory: subdirectory.to_string(),
        files_new,
        files_updated: 0,
        bytes: bytes.to_string(),
        status_num: 5,
        transaction_id: dataset_id,
        entered_at: chrono::Utc::now(),
    }
}

fn archived(dataset_id: i32, path: &str, size: i64) -> ArchivedFile {
    ArchivedFile {
        dataset_id,
        subdirectory_path: path.to_string(),
        size_bytes: size,
        is_directory: false,
    }
}

fn fast_config() -> EngineConfig {
    EngineConfig {
        lookup_interval_ms: 0,
        ..EngineConfig::default()
    }
}

#[tokio::test]
async fn test_run_writes_tab_delimited_report() {
    let ledger = StaticLedger {
        max_verified: 20,
        rows: vec![
            upload(10, "", 2, "200"),
            upload(10, "QC", 5, "1000"),
            upload(15, "", 1, "50"),
        ],
    };
    let archive = StaticArchive {
        files: vec![
            archived(10, "", 150),
            archived(10, "", 50),
            archived(10, "QC", 400),
            archived(10, "QC", 100),
            archived(10, "qc/plots", 100),
            archived(10, "QC", 100),
            archived(10, "QC", 100),
        ],
    };

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.tsv");
    let mut sink = TsvReportSink::open(&path).unwrap();

    let engine = ReconciliationEngine::new(fast_config());
    let stats = engine
        .run(&ledger, &archive, &mut sink, &NoopProgress)
        .await
        .unwrap();

    assert_eq!(stats.discrepancies_emitted, 3);

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines[0], REPORT_HEADER);
    assert_eq!(lines.len(), 4);

    // Dataset 10 root: 2 files expected, 2 found, bytes match exactly.
    let root: Vec<&str> = lines[1].split('\t').collect();
    assert_eq!(root[3], "10");
    assert_eq!(root[4], "");
    assert_eq!(root[12], "1.00");
    assert_eq!(root[13], "");

    // Dataset 10 QC: 5 files expected, 5 found across QC and qc/plots,
    // fewer bytes than the ledger recorded.
    let qc: Vec<&str> = lines[2].split('\t').collect();
    assert_eq!(qc[4], "QC");
    assert_eq!(qc[8], "5");
    assert_eq!(qc[9], "5");
    assert_eq!(qc[12], "0.80");
    assert_eq!(qc[13], "Files match, but fewer bytes");

    // Dataset 15 is absent from the archive.
    let absent: Vec<&str> = lines[3].split('\t').collect();
    assert_eq!(absent[3], "15");
    assert_eq!(absent[12], "0.00");
    assert_eq!(absent[13], "Missing");
}

#[tokio::test]
async fn test_rerun_resumes_report_without_second_header() {
    let ledger = StaticLedger {
        max_verified: 5,
        rows: vec![upload(5, "", 1, "10")],
    };
    let archive = StaticArchive {
        files: vec![archived(5, "", 10)],
    };

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.tsv");

    for _ in 0..2 {
        let mut sink = TsvReportSink::open(&path).unwrap();
        let engine = ReconciliationEngine::new(fast_config());
        engine
            .run(&ledger, &archive, &mut sink, &NoopProgress)
            .await
            .unwrap();
    }

    let contents = std::fs::read_to_string(&path).unwrap();
    let headers = contents
        .lines()
        .filter(|line| *line == REPORT_HEADER)
        .count();
    assert_eq!(headers, 1);
    assert_eq!(contents.lines().count(), 3);
}

//! Grouping of upload-ledger rows.
//!
//! Folds one window's ledger rows into per-dataset, per-subdirectory summary
//! groups. Repeated upload attempts for the same key keep the running
//! maximum of file and byte counts, never the sum: re-uploads are assumed to
//! supersede prior attempts, and the largest attempt is taken as the most
//! complete.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::types::UploadRecord;

/// Byte parse warnings logged before further ones are suppressed.
const MAX_PARSE_WARNINGS: u32 = 10;

/// Summary of all upload attempts for one `(dataset_id, subdirectory)` key.
#[derive(Debug, Clone)]
pub struct UploadGroup {
    representative: UploadRecord,
    max_files_touched: i64,
    max_bytes: i64,
    records: Vec<UploadRecord>,
}

impl UploadGroup {
    fn new(record: UploadRecord, bytes: i64) -> Self {
        Self {
            max_files_touched: record.files_touched(),
            max_bytes: bytes,
            representative: record.clone(),
            records: vec![record],
        }
    }

    fn absorb(&mut self, record: UploadRecord, bytes: i64) {
        self.max_files_touched = self.max_files_touched.max(record.files_touched());
        self.max_bytes = self.max_bytes.max(bytes);
        self.records.push(record);
    }

    /// The ledger row used for report metadata (first contributing record).
    #[must_use]
    pub fn representative(&self) -> &UploadRecord {
        &self.representative
    }

    /// Largest file count over all contributing records.
    #[must_use]
    pub fn max_files_touched(&self) -> i64 {
        self.max_files_touched
    }

    /// Largest byte count over all contributing records.
    #[must_use]
    pub fn max_bytes(&self) -> i64 {
        self.max_bytes
    }

    /// Contributing records in ledger read order.
    #[must_use]
    pub fn records(&self) -> &[UploadRecord] {
        &self.records
    }
}

/// Per-dataset groups for one window, keyed by subdirectory. The root
/// subdirectory (empty string) sorts first.
pub type DatasetGroups = BTreeMap<String, UploadGroup>;

/// Folds raw ledger rows into [`UploadGroup`]s.
///
/// Kept across windows so the parse-warning cap applies to the whole run.
#[derive(Debug)]
pub struct UploadGroupAggregator {
    filter: Option<BTreeSet<i32>>,
    parse_warnings: u32,
}

impl UploadGroupAggregator {
    /// Create an aggregator, optionally constrained to an explicit
    /// dataset-ID set.
    #[must_use]
    pub fn new(filter: Option<BTreeSet<i32>>) -> Self {
        Self {
            filter,
            parse_warnings: 0,
        }
    }

    /// Group one window's rows by `(dataset_id, subdirectory)`.
    ///
    /// Rows outside the explicit filter are dropped. Rows that touched no
    /// files are skipped so a group always has a positive expected file
    /// count. Unparseable byte counts are treated as zero and counted as a
    /// parse warning.
    pub fn aggregate(&mut self, records: Vec<UploadRecord>) -> BTreeMap<i32, DatasetGroups> {
        let mut grouped: BTreeMap<i32, DatasetGroups> = BTreeMap::new();

        for record in records {
            if let Some(filter) = &self.filter {
                if !filter.contains(&record.dataset_id) {
                    continue;
                }
            }
            if record.files_touched() == 0 {
                debug!(
                    entry_id = record.entry_id,
                    dataset_id = record.dataset_id,
                    "skipping ledger row that touched no files"
                );
                continue;
            }

            let bytes = self.parse_bytes(&record);
            let groups = grouped.entry(record.dataset_id).or_default();
            match groups.entry(record.subdirectory.clone()) {
                Entry::Occupied(mut entry) => entry.get_mut().absorb(record, bytes),
                Entry::Vacant(entry) => {
                    entry.insert(UploadGroup::new(record, bytes));
                }
            }
        }

        grouped
    }

    /// Total byte parse warnings seen so far this run.
    #[must_use]
    pub fn parse_warnings(&self) -> u32 {
        self.parse_warnings
    }

    fn parse_bytes(&mut self, record: &UploadRecord) -> i64 {
        match record.bytes.trim().parse::<i64>() {
            Ok(bytes) => bytes,
            Err(_) => {
                self.parse_warnings += 1;
                if self.parse_warnings <= MAX_PARSE_WARNINGS {
                    warn!(
                        entry_id = record.entry_id,
                        dataset_id = record.dataset_id,
                        bytes = %record.bytes,
                        "unparseable byte count in ledger row, treating as zero"
                    );
                }
                if self.parse_warnings == MAX_PARSE_WARNINGS {
                    warn!("further byte parse warnings will be suppressed");
                }
                0
            }
        }
    }
}

//! Reconciliation scoring.
//!
//! Compares a dataset's aggregated upload groups against the files the
//! archive reports for it and emits one discrepancy record per group.

use chrono::{DateTime, Utc};

use crate::aggregator::{DatasetGroups, UploadGroup};
use crate::types::{ArchivedFile, DiscrepancyRecord, MatchScore};

/// Warning attached to a root group when the archive holds files for the
/// dataset but none in its root directory.
pub const ROOT_ANOMALY_WARNING: &str =
    "Empty dataset directory (found files in subdirectories but not in the root directory)";

/// Score one group's expected counts against what the archive holds.
///
/// `is_root` relaxes the extra-files-and-extra-bytes case: root-folder file
/// counts are computed conservatively and routinely include extras.
#[must_use]
pub fn score_group(
    expected_files: i64,
    expected_bytes: i64,
    actual_files: i64,
    actual_bytes: i64,
    is_root: bool,
) -> (MatchScore, String) {
    if actual_files == 0 {
        return (MatchScore::Ratio(0.0), "Missing".to_string());
    }

    if actual_files == expected_files {
        return if actual_bytes == expected_bytes {
            (MatchScore::Perfect, String::new())
        } else if actual_bytes < expected_bytes {
            let ratio = if expected_bytes > 0 {
                actual_bytes as f64 / expected_bytes as f64
            } else {
                0.0
            };
            (
                MatchScore::Ratio(ratio),
                "Files match, but fewer bytes".to_string(),
            )
        } else {
            (
                MatchScore::Perfect,
                "Files match, but extra bytes".to_string(),
            )
        };
    }

    if actual_files > expected_files {
        if actual_bytes == expected_bytes {
            return (
                MatchScore::Perfect,
                "Extra files, but bytes match".to_string(),
            );
        }
        if actual_bytes > expected_bytes {
            return if is_root {
                (MatchScore::Perfect, String::new())
            } else {
                (
                    MatchScore::Perfect,
                    "Extra files and extra bytes".to_string(),
                )
            };
        }
    }

    // Fewer files than expected, or more files yet fewer bytes.
    let ratio = if expected_files > 0 {
        actual_files as f64 / expected_files as f64
    } else {
        0.0
    };
    (MatchScore::Ratio(ratio), "Missing files".to_string())
}

/// Overlay the root-folder anomaly onto a root group's score: concatenate
/// the warning, and demote an otherwise-perfect score to the out-of-band
/// sentinel so report consumers can tell it apart from a clean match.
#[must_use]
pub fn apply_root_anomaly(score: MatchScore, comment: &str) -> (MatchScore, String) {
    let combined = if comment.is_empty() {
        ROOT_ANOMALY_WARNING.to_string()
    } else {
        format!("{comment}; {ROOT_ANOMALY_WARNING}")
    };
    let score = if score.is_perfect() {
        MatchScore::FlaggedPerfect
    } else {
        score
    };
    (score, combined)
}

/// Reconcile one dataset's upload groups against its archive listing.
///
/// `files` must already be restricted to this dataset and hold no directory
/// entries. Records come out in subdirectory order with the root group
/// first. When the root directory is empty in the archive, the dataset is
/// treated as absent and only the root record is emitted.
#[must_use]
pub fn compare_dataset(
    groups: &DatasetGroups,
    files: &[ArchivedFile],
    timestamp: DateTime<Utc>,
) -> Vec<DiscrepancyRecord> {
    let mut records = Vec::with_capacity(groups.len());

    let root_files = files
        .iter()
        .filter(|f| f.subdirectory_path.is_empty())
        .count() as i64;
    let root_bytes: i64 = files
        .iter()
        .filter(|f| f.subdirectory_path.is_empty())
        .map(|f| f.size_bytes)
        .sum();

    if let Some(group) = groups.get("") {
        let (mut score, mut comment) = score_group(
            group.max_files_touched(),
            group.max_bytes(),
            root_files,
            root_bytes,
            true,
        );
        if root_files == 0 && !files.is_empty() {
            (score, comment) = apply_root_anomaly(score, &comment);
        }
        records.push(build_record(
            group, root_files, root_bytes, score, comment, timestamp,
        ));

        if root_files == 0 {
            // Nothing in the dataset's root location; probing its
            // subfolders cannot succeed either.
            return records;
        }
    }

    for (subdirectory, group) in groups.iter().filter(|(key, _)| !key.is_empty()) {
        let needle = subdirectory.to_lowercase();
        let prefix = format!("{needle}/");
        let subset: Vec<&ArchivedFile> = files
            .iter()
            .filter(|f| {
                let path = f.subdirectory_path.to_lowercase();
                path == needle || path.starts_with(&prefix)
            })
            .collect();

        let actual_files = subset.len() as i64;
        let actual_bytes: i64 = subset.iter().map(|f| f.size_bytes).sum();
        let (score, comment) = score_group(
            group.max_files_touched(),
            group.max_bytes(),
            actual_files,
            actual_bytes,
            false,
        );
        records.push(build_record(
            group,
            actual_files,
            actual_bytes,
            score,
            comment,
            timestamp,
        ));
    }

    records
}

fn build_record(
    group: &UploadGroup,
    actual_files: i64,
    actual_bytes: i64,
    score: MatchScore,
    comment: String,
    timestamp: DateTime<Utc>,
) -> DiscrepancyRecord {
    let rep = group.representative();
    DiscrepancyRecord {
        timestamp,
        entry_id: rep.entry_id,
        job: rep.job,
        dataset_id: rep.dataset_id,
        subdirectory: rep.subdirectory.clone(),
        status_num: rep.status_num,
        transaction_id: rep.transaction_id,
        entered_at: rep.entered_at,
        expected_files: group.max_files_touched(),
        actual_files,
        expected_bytes: group.max_bytes(),
        actual_bytes,
        score,
        comment,
    }
}

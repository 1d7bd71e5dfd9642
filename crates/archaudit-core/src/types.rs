//! Core data model: ledger rows, archive listings, and discrepancy output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tolerance for floating-point "ratio equals 1" checks.
pub const RATIO_EPSILON: f64 = 1e-6;

/// A single row from the upload ledger.
///
/// Immutable once loaded; lives for the duration of one processing window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRecord {
    /// Ledger entry ID.
    pub entry_id: i32,
    /// Upload job number.
    pub job: i32,
    /// Dataset the upload belongs to.
    pub dataset_id: i32,
    /// Subdirectory under the dataset's archive location; empty string
    /// denotes the dataset's own root directory.
    pub subdirectory: String,
    /// Files newly added by this upload attempt.
    pub files_new: i32,
    /// Files updated by this upload attempt.
    pub files_updated: i32,
    /// Byte count as stored in the ledger (text column; parsed during
    /// aggregation so unparseable values can be tolerated).
    pub bytes: String,
    /// Upload status number.
    pub status_num: i32,
    /// Archive transaction ID.
    pub transaction_id: i32,
    /// When the ledger row was entered.
    pub entered_at: DateTime<Utc>,
}

impl UploadRecord {
    /// Total files this upload attempt touched.
    #[must_use]
    pub fn files_touched(&self) -> i64 {
        i64::from(self.files_new) + i64::from(self.files_updated)
    }
}

/// A file entry reported by the archive listing service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedFile {
    /// Dataset the file belongs to.
    pub dataset_id: i32,
    /// Forward-slash separated path of the subdirectory holding the file;
    /// empty string denotes the dataset root.
    pub subdirectory_path: String,
    /// File size in bytes.
    pub size_bytes: i64,
    /// Whether this entry is a directory rather than a file. Directory
    /// entries are excluded before reconciliation.
    pub is_directory: bool,
}

/// Agreement score between expected and actual file sets for one group.
///
/// The `-1` sentinel is out-of-band: it never participates in numeric
/// comparisons and only appears when the score is rendered for the report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchScore {
    /// Exact or better-than-expected agreement.
    Perfect,
    /// Fractional agreement in [0, 1].
    Ratio(f64),
    /// Numerically perfect but flagged as suspicious by the root-folder
    /// anomaly check; rendered as the literal `-1`.
    FlaggedPerfect,
}

impl MatchScore {
    /// Whether this score counts as a perfect match, tolerating
    /// floating-point error on fractional scores.
    #[must_use]
    pub fn is_perfect(&self) -> bool {
        match self {
            Self::Perfect => true,
            Self::Ratio(r) => (r - 1.0).abs() < RATIO_EPSILON,
            Self::FlaggedPerfect => false,
        }
    }

    /// Render for the report: two decimal places, except the sentinel
    /// which prints as the literal integer `-1`.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Perfect => "1.00".to_string(),
            Self::Ratio(r) => format!("{r:.2}"),
            Self::FlaggedPerfect => "-1".to_string(),
        }
    }
}

/// One reconciliation finding for a `(dataset, subdirectory)` group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscrepancyRecord {
    /// When the comparison ran.
    pub timestamp: DateTime<Utc>,
    /// Ledger entry ID of the representative record.
    pub entry_id: i32,
    /// Upload job number of the representative record.
    pub job: i32,
    /// Dataset ID.
    pub dataset_id: i32,
    /// Subdirectory the group covers (empty = dataset root).
    pub subdirectory: String,
    /// Upload status number of the representative record.
    pub status_num: i32,
    /// Archive transaction ID of the representative record.
    pub transaction_id: i32,
    /// When the representative ledger row was entered.
    pub entered_at: DateTime<Utc>,
    /// Files the ledger says were uploaded.
    pub expected_files: i64,
    /// Files the archive actually holds for the group.
    pub actual_files: i64,
    /// Bytes the ledger says were uploaded.
    pub expected_bytes: i64,
    /// Bytes the archive actually holds for the group.
    pub actual_bytes: i64,
    /// Agreement score.
    pub score: MatchScore,
    /// Free-text warning code; empty for a clean match, compound codes
    /// joined with `"; "`.
    pub comment: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_files_touched_sums_new_and_updated() {
        let record = UploadRecord {
            entry_id: 1,
            job: 100,
            dataset_id: 42,
            subdirectory: String::new(),
            files_new: 7,
            files_updated: 3,
            bytes: "1024".to_string(),
            status_num: 5,
            transaction_id: 9001,
            entered_at: Utc::now(),
        };
        assert_eq!(record.files_touched(), 10);
    }

    #[test]
    fn test_match_score_render() {
        assert_eq!(MatchScore::Perfect.render(), "1.00");
        assert_eq!(MatchScore::Ratio(0.4).render(), "0.40");
        assert_eq!(MatchScore::Ratio(0.0).render(), "0.00");
        assert_eq!(MatchScore::FlaggedPerfect.render(), "-1");
    }

    #[test]
    fn test_match_score_is_perfect_uses_epsilon() {
        assert!(MatchScore::Perfect.is_perfect());
        assert!(MatchScore::Ratio(1.0 - 1e-9).is_perfect());
        assert!(!MatchScore::Ratio(0.999).is_perfect());
        assert!(!MatchScore::FlaggedPerfect.is_perfect());
    }
}

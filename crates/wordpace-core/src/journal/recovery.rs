//! Startup recovery scan over a prior trial-outcome artifact.

use std::path::{Path, PathBuf};

use super::stream::{header_index, read_records};
use crate::error::JournalError;

/// A row skipped while scanning for the resume point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    /// 1-based line within the artifact.
    pub line: usize,
    pub value: String,
}

/// What a prior artifact says about an interrupted session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryScan {
    pub path: PathBuf,
    pub header_found: bool,
    /// Largest trial number found; 0 when none.
    pub resume_point: u32,
    /// Number of rows with an integer trial number.
    pub completed_rows: usize,
    pub skipped: Vec<SkippedRow>,
}

impl RecoveryScan {
    pub fn has_progress(&self) -> bool {
        self.resume_point > 0
    }
}

/// Scan `path` for the resume point.
///
/// Returns `Ok(None)` if the artifact does not exist. Rows before the first
/// row containing a `trial_num` cell are ignored. Control markers and summary
/// lines have a blank or `#` leading cell and are passed over silently; any
/// other non-integer leading cell is reported in [`RecoveryScan::skipped`].
pub fn scan_trial_artifact(path: &Path) -> Result<Option<RecoveryScan>, JournalError> {
    if !path.exists() {
        return Ok(None);
    }

    let records = read_records(path)?;
    let header = header_index(&records);
    if header.is_none() {
        tracing::warn!(path = %path.display(), "No header row in prior artifact; scanning from the top");
    }
    let start = header.map(|i| i + 1).unwrap_or(0);

    let mut scan = RecoveryScan {
        path: path.to_path_buf(),
        header_found: header.is_some(),
        resume_point: 0,
        completed_rows: 0,
        skipped: Vec::new(),
    };

    for (offset, record) in records[start..].iter().enumerate() {
        let lead = record.get(0).unwrap_or_default().trim();
        if lead.is_empty() || lead.starts_with('#') {
            continue;
        }
        match lead.parse::<u32>() {
            Ok(trial_num) => {
                scan.completed_rows += 1;
                scan.resume_point = scan.resume_point.max(trial_num);
            }
            Err(_) => {
                let line = start + offset + 1;
                tracing::warn!(
                    path = %path.display(),
                    line,
                    value = lead,
                    "Skipping row with non-integer trial_num"
                );
                scan.skipped.push(SkippedRow {
                    line,
                    value: lead.to_string(),
                });
            }
        }
    }

    Ok(Some(scan))
}

/// Scan every candidate artifact and keep the one furthest along.
pub fn scan_candidates(paths: &[PathBuf]) -> Result<Option<RecoveryScan>, JournalError> {
    let mut best: Option<RecoveryScan> = None;
    for path in paths {
        if let Some(scan) = scan_trial_artifact(path)? {
            let further = best
                .as_ref()
                .map_or(true, |b| scan.resume_point > b.resume_point);
            if further {
                best = Some(scan);
            }
        }
    }
    Ok(best)
}

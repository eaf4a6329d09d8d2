use std::fmt;
use std::path::PathBuf;

use super::models::{OperationStatus, StagedFileEntry};

/// Why a file was left alone. Skips are expected outcomes, not failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The path did not exist when staging
    Missing,
    /// The path exists but is not a regular file
    NotAFile,
    /// The path matches a protected token
    Protected,
    /// The staged copy is gone (already restored or deleted)
    StagedFileMissing,
    /// Something now occupies the original location; never overwritten
    OriginalOccupied,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Missing => "file not found",
            Self::NotAFile => "not a regular file",
            Self::Protected => "protected path",
            Self::StagedFileMissing => "staged file not found",
            Self::OriginalOccupied => "original location occupied",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// A single file whose move, restore or removal failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Why an undo or confirm request was not carried out at all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    /// The ledger has no such operation
    NotFound,
    /// The operation already reached a terminal status
    InvalidTransition(OperationStatus),
}

impl fmt::Display for Refusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str("operation not found"),
            Self::InvalidTransition(status) => {
                write!(f, "operation is {}, only staged operations can change", status)
            }
        }
    }
}

/// Outcome of `stage`
#[derive(Debug, Clone, Default)]
pub struct StageReport {
    pub operation_id: String,
    pub staged: Vec<StagedFileEntry>,
    pub skipped: Vec<SkippedFile>,
    pub failed: Vec<FileFailure>,
}

impl StageReport {
    pub fn files_staged(&self) -> usize {
        self.staged.len()
    }

    /// True if at least one file was moved into staging
    pub fn success(&self) -> bool {
        !self.staged.is_empty()
    }

    pub fn bytes_staged(&self) -> u64 {
        self.staged.iter().map(|e| e.size_bytes).sum()
    }
}

/// What `stage` would do with a batch, computed without touching any file
#[derive(Debug, Clone, Default)]
pub struct StagePreview {
    pub ready: Vec<PathBuf>,
    pub ready_bytes: u64,
    pub skipped: Vec<SkippedFile>,
    pub failed: Vec<FileFailure>,
}

/// Outcome of `undo` or `confirm`.
///
/// `processed` counts files restored (undo) or removed (confirm).
#[derive(Debug, Clone, Default)]
pub struct TransitionReport {
    pub operation_id: String,
    pub processed: usize,
    pub total_entries: usize,
    pub skipped: Vec<SkippedFile>,
    pub failed: Vec<FileFailure>,
    pub refused: Option<Refusal>,
    pub directory_removed: bool,
}

impl TransitionReport {
    pub(crate) fn new(operation_id: &str, total_entries: usize) -> Self {
        Self {
            operation_id: operation_id.to_string(),
            total_entries,
            ..Self::default()
        }
    }

    pub(crate) fn refused(operation_id: &str, refusal: Refusal) -> Self {
        Self {
            operation_id: operation_id.to_string(),
            refused: Some(refusal),
            ..Self::default()
        }
    }

    /// True if at least one file was restored or removed
    pub fn success(&self) -> bool {
        self.processed > 0
    }
}

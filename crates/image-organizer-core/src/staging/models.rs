use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;

/// Opaque caller-supplied key/value data stored with an operation
pub type OperationMetadata = Map<String, Value>;

/// Lifecycle state of a staging operation.
///
/// `Staged` moves exactly once to `Undone` or `Deleted`; both are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Staged,
    Undone,
    Deleted,
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Staged)
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Staged => "staged",
            Self::Undone => "undone",
            Self::Deleted => "deleted",
        };
        f.pad(name)
    }
}

/// One file moved into the staging area
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedFileEntry {
    /// Where the file lived before staging
    pub original_path: PathBuf,

    /// Where the file lives now, inside the operation's directory
    pub staged_path: PathBuf,

    /// File size in bytes
    #[serde(rename = "size")]
    pub size_bytes: u64,

    /// When the file was moved
    #[serde(rename = "timestamp")]
    pub staged_at: DateTime<Utc>,
}

/// A single stage action and everything needed to undo or confirm it.
///
/// Serialized as the operation's `operation.json` descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletionOperation {
    pub operation_id: String,

    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,

    /// Free-text classification, e.g. "duplicate removal"
    pub reason: String,

    pub files_staged: usize,

    #[serde(rename = "files")]
    pub entries: Vec<StagedFileEntry>,

    #[serde(rename = "metadata", default)]
    pub extra_metadata: OperationMetadata,

    pub status: OperationStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub undo_timestamp: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files_restored: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files_deleted: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_recycle_bin: Option<bool>,
}

impl DeletionOperation {
    /// A freshly staged operation
    pub fn new(
        operation_id: String,
        reason: impl Into<String>,
        entries: Vec<StagedFileEntry>,
        extra_metadata: OperationMetadata,
    ) -> Self {
        Self {
            operation_id,
            created_at: Utc::now(),
            reason: reason.into(),
            files_staged: entries.len(),
            entries,
            extra_metadata,
            status: OperationStatus::Staged,
            undo_timestamp: None,
            files_restored: None,
            deletion_timestamp: None,
            files_deleted: None,
            used_recycle_bin: None,
        }
    }

    /// Total bytes held in staging by this operation
    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|e| e.size_bytes).sum()
    }

    /// Record a status transition and its counters
    pub fn apply(&mut self, transition: StatusTransition, at: DateTime<Utc>) {
        self.status = transition.status();
        match transition {
            StatusTransition::Undone { files_restored } => {
                self.undo_timestamp = Some(at);
                self.files_restored = Some(files_restored);
            }
            StatusTransition::Deleted {
                files_deleted,
                used_recycle_bin,
            } => {
                self.deletion_timestamp = Some(at);
                self.files_deleted = Some(files_deleted);
                self.used_recycle_bin = Some(used_recycle_bin);
            }
        }
    }
}

/// The two ways a staged operation can end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTransition {
    Undone {
        files_restored: usize,
    },
    Deleted {
        files_deleted: usize,
        used_recycle_bin: bool,
    },
}

impl StatusTransition {
    pub fn status(&self) -> OperationStatus {
        match self {
            Self::Undone { .. } => OperationStatus::Undone,
            Self::Deleted { .. } => OperationStatus::Deleted,
        }
    }
}

/// Event recorded in the operations log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerEvent {
    Created,
    Undone,
    Deleted,
    Purged,
}

/// One line of the append-only operations log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationLogEntry {
    pub timestamp: DateTime<Utc>,
    pub operation_id: String,
    pub event: LedgerEvent,
    pub reason: String,
    pub files_count: usize,
    pub status: Option<OperationStatus>,
}

impl OperationLogEntry {
    pub fn for_operation(operation: &DeletionOperation, event: LedgerEvent) -> Self {
        let files_count = match event {
            LedgerEvent::Undone => operation.files_restored.unwrap_or(0),
            LedgerEvent::Deleted => operation.files_deleted.unwrap_or(0),
            LedgerEvent::Created | LedgerEvent::Purged => operation.files_staged,
        };

        Self {
            timestamp: Utc::now(),
            operation_id: operation.operation_id.clone(),
            event,
            reason: operation.reason.clone(),
            files_count,
            status: Some(operation.status),
        }
    }
}

use chrono::Utc;
use log::{debug, info, warn};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::logging::log_fs_modification;
use crate::utils::fs::write_json_atomic;

use super::models::{
    DeletionOperation, LedgerEvent, OperationLogEntry, OperationMetadata, StagedFileEntry,
    StatusTransition,
};

/// Descriptor file written into every operation directory
pub const DESCRIPTOR_FILE: &str = "operation.json";

/// Operation ids sort lexicographically in creation order
const OPERATION_ID_FORMAT: &str = "%Y%m%d_%H%M%S_%6f";

/// A freshly created, still empty operation directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationSlot {
    pub operation_id: String,
    pub directory: PathBuf,
}

/// Durable record of staging operations.
///
/// Each operation owns `<staging_root>/<operation_id>/` holding the staged
/// files and an `operation.json` descriptor. Every state transition is also
/// appended as one JSON line to the operations log.
#[derive(Debug, Clone)]
pub struct StagingLedger {
    staging_root: PathBuf,
    operations_log: PathBuf,
}

impl StagingLedger {
    /// Open a ledger, creating the staging root if needed
    pub fn new(staging_root: impl Into<PathBuf>, operations_log: impl Into<PathBuf>) -> Result<Self> {
        let staging_root = staging_root.into();
        fs::create_dir_all(&staging_root).map_err(|source| Error::StagingRoot {
            path: staging_root.clone(),
            source,
        })?;

        Ok(Self {
            staging_root,
            operations_log: operations_log.into(),
        })
    }

    /// Open the ledger at the locations named by `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.staging_dir(), config.operations_log())
    }

    pub fn staging_root(&self) -> &Path {
        &self.staging_root
    }

    pub fn operations_log(&self) -> &Path {
        &self.operations_log
    }

    /// Directory belonging to `operation_id`
    pub fn operation_dir(&self, operation_id: &str) -> PathBuf {
        self.staging_root.join(operation_id)
    }

    /// Reserve a new operation id and its directory.
    ///
    /// Directory creation is the reservation: if another caller got the same
    /// timestamp first, a numeric suffix is tried until `create_dir` succeeds.
    pub fn allocate_operation(&self) -> Result<OperationSlot> {
        let base = Utc::now().format(OPERATION_ID_FORMAT).to_string();
        let mut operation_id = base.clone();
        let mut counter = 1u32;

        loop {
            let directory = self.operation_dir(&operation_id);
            match fs::create_dir(&directory) {
                Ok(()) => {
                    debug!("Allocated operation directory {}", directory.display());
                    return Ok(OperationSlot {
                        operation_id,
                        directory,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    operation_id = format!("{}_{}", base, counter);
                    counter += 1;
                }
                Err(source) => {
                    return Err(Error::StagingRoot {
                        path: directory,
                        source,
                    })
                }
            }
        }
    }

    /// Write the descriptor of a new operation before any file is moved.
    ///
    /// From here on the descriptor always lists every file that may have been
    /// moved into the slot, so an interrupted stage can still be undone.
    pub fn begin_operation(
        &self,
        slot: &OperationSlot,
        reason: &str,
        extra_metadata: OperationMetadata,
    ) -> Result<DeletionOperation> {
        let operation = DeletionOperation::new(
            slot.operation_id.clone(),
            reason,
            Vec::new(),
            extra_metadata,
        );
        self.write_descriptor(&operation)?;
        Ok(operation)
    }

    /// Persist `entry` as part of `operation`. Call before moving the file.
    pub fn record_entry(
        &self,
        operation: &mut DeletionOperation,
        entry: StagedFileEntry,
    ) -> Result<()> {
        operation.entries.push(entry);
        operation.files_staged = operation.entries.len();

        if let Err(e) = self.write_descriptor(operation) {
            operation.entries.pop();
            operation.files_staged = operation.entries.len();
            return Err(e);
        }
        Ok(())
    }

    /// Drop the most recently recorded entry after its move failed
    pub fn discard_last_entry(&self, operation: &mut DeletionOperation) -> Result<()> {
        operation.entries.pop();
        operation.files_staged = operation.entries.len();
        self.write_descriptor(operation)
    }

    /// Log the creation of an operation whose files are all in place
    pub fn finish_operation(&self, operation: &DeletionOperation) {
        self.append_log(&OperationLogEntry::for_operation(
            operation,
            LedgerEvent::Created,
        ));
        info!(
            "Recorded operation {} ({} files, reason: {})",
            operation.operation_id, operation.files_staged, operation.reason
        );
    }

    /// Write the descriptor for already staged entries and log its creation
    pub fn create_operation(
        &self,
        slot: OperationSlot,
        entries: Vec<StagedFileEntry>,
        reason: &str,
        extra_metadata: OperationMetadata,
    ) -> Result<String> {
        let operation = DeletionOperation::new(slot.operation_id, reason, entries, extra_metadata);

        self.write_descriptor(&operation)?;
        self.finish_operation(&operation);
        Ok(operation.operation_id)
    }

    /// Load an operation's descriptor
    pub fn read_operation(&self, operation_id: &str) -> Result<DeletionOperation> {
        let descriptor = self.descriptor_path(operation_id)?;
        if !descriptor.is_file() {
            return Err(Error::OperationNotFound(operation_id.to_string()));
        }

        let content = fs::read(&descriptor)?;
        Ok(serde_json::from_slice(&content)?)
    }

    /// Move an operation to a terminal status, rewriting its descriptor atomically
    pub fn update_status(
        &self,
        operation_id: &str,
        transition: StatusTransition,
    ) -> Result<DeletionOperation> {
        let mut operation = self.read_operation(operation_id)?;
        if operation.status.is_terminal() {
            return Err(Error::InvalidTransition {
                operation_id: operation_id.to_string(),
                status: operation.status,
            });
        }
        operation.apply(transition, Utc::now());
        self.write_descriptor(&operation)?;

        let event = match transition {
            StatusTransition::Undone { .. } => LedgerEvent::Undone,
            StatusTransition::Deleted { .. } => LedgerEvent::Deleted,
        };
        self.append_log(&OperationLogEntry::for_operation(&operation, event));

        Ok(operation)
    }

    /// Remove an operation directory that holds nothing but its descriptor.
    ///
    /// Returns false, leaving everything in place, if any other entry remains.
    /// Directories are never removed recursively here.
    pub fn retire_operation(&self, operation_id: &str) -> Result<bool> {
        let descriptor = self.descriptor_path(operation_id)?;
        let directory = self.operation_dir(operation_id);

        for entry in fs::read_dir(&directory)? {
            let entry = entry?;
            if entry.path() != descriptor {
                return Ok(false);
            }
        }

        if descriptor.exists() {
            fs::remove_file(&descriptor)?;
        }
        fs::remove_dir(&directory)?;
        log_fs_modification("retire operation", &directory, Some(operation_id));
        Ok(true)
    }

    /// All readable operations, oldest first
    pub fn list_operations(&self) -> Result<Vec<DeletionOperation>> {
        let mut operations = Vec::new();

        for directory in self.operation_dirs()? {
            let Some(operation_id) = directory.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            match self.read_operation(operation_id) {
                Ok(operation) => operations.push(operation),
                Err(Error::OperationNotFound(_)) => {
                    warn!(
                        "No descriptor in {}, skipping; inspect it by hand",
                        directory.display()
                    );
                }
                Err(e) => {
                    warn!(
                        "Error reading operation metadata {}: {}",
                        directory.display(),
                        e
                    );
                }
            }
        }

        operations.sort_by(|a, b| a.operation_id.cmp(&b.operation_id));
        Ok(operations)
    }

    /// Delete operation directories last modified more than `max_age` ago.
    ///
    /// Status is not consulted. Directories that still hold files but have no
    /// readable descriptor are left alone. Returns the number removed.
    pub fn purge_older_than(&self, max_age: Duration) -> Result<usize> {
        let now = SystemTime::now();
        let mut purged = 0;

        for directory in self.operation_dirs()? {
            let modified = match fs::metadata(&directory).and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) => {
                    warn!("Cannot read age of {}: {}", directory.display(), e);
                    continue;
                }
            };

            let age = now.duration_since(modified).unwrap_or_default();
            if age <= max_age {
                continue;
            }

            let operation_id = directory
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let snapshot = self.read_operation(&operation_id).ok();
            if snapshot.is_none() && !is_empty_dir(&directory) {
                warn!(
                    "Not purging {}: it holds files but no readable descriptor",
                    directory.display()
                );
                continue;
            }

            match fs::remove_dir_all(&directory) {
                Ok(()) => {
                    purged += 1;
                    log_fs_modification("purge operation", &directory, None);
                    let entry = match snapshot {
                        Some(operation) => {
                            OperationLogEntry::for_operation(&operation, LedgerEvent::Purged)
                        }
                        None => OperationLogEntry {
                            timestamp: Utc::now(),
                            operation_id,
                            event: LedgerEvent::Purged,
                            reason: String::new(),
                            files_count: 0,
                            status: None,
                        },
                    };
                    self.append_log(&entry);
                }
                Err(e) => warn!("Failed to clean {}: {}", directory.display(), e),
            }
        }

        if purged > 0 {
            info!("Cleaned {} old staging operations", purged);
        }
        Ok(purged)
    }

    /// Operation directories under the staging root, sorted by name
    fn operation_dirs(&self) -> Result<Vec<PathBuf>> {
        if !self.staging_root.exists() {
            return Ok(Vec::new());
        }

        let mut dirs = Vec::new();
        for entry in fs::read_dir(&self.staging_root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                dirs.push(entry.path());
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    fn write_descriptor(&self, operation: &DeletionOperation) -> Result<()> {
        write_json_atomic(&self.descriptor_path(&operation.operation_id)?, operation)?;
        Ok(())
    }

    fn descriptor_path(&self, operation_id: &str) -> Result<PathBuf> {
        let plain = !operation_id.is_empty()
            && operation_id != "."
            && operation_id != ".."
            && !operation_id.contains(['/', '\\']);
        if !plain {
            return Err(Error::OperationNotFound(operation_id.to_string()));
        }
        Ok(self.operation_dir(operation_id).join(DESCRIPTOR_FILE))
    }

    /// Append one line to the operations log; failures are logged, not fatal
    fn append_log(&self, entry: &OperationLogEntry) {
        let appended = (|| -> Result<()> {
            if let Some(parent) = self.operations_log.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut line = serde_json::to_string(entry)?;
            line.push('\n');

            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.operations_log)?;
            file.write_all(line.as_bytes())?;
            Ok(())
        })();

        if let Err(e) = appended {
            warn!("Failed to log operation {}: {}", entry.operation_id, e);
        }
    }
}

fn is_empty_dir(directory: &Path) -> bool {
    fs::read_dir(directory)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}

use chrono::Utc;
use log::{debug, error, info, warn};
use serde_json::Value;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::Config;
use crate::deduplication::ReviewDecision;
use crate::error::{Error, Result};
use crate::logging::{log_file_error, log_fs_modification};
use crate::safety::ProtectionPolicy;
use crate::utils::fs::{move_file, path_occupied, unique_path_in};

use super::ledger::{OperationSlot, StagingLedger};
use super::models::{
    DeletionOperation, OperationMetadata, OperationStatus, StagedFileEntry, StatusTransition,
};
use super::report::{
    FileFailure, Refusal, SkipReason, SkippedFile, StagePreview, StageReport, TransitionReport,
};
use super::trash::{trash_from_config, RecoverableTrash};

/// Stages files for deletion and later undoes or confirms the staging.
///
/// Every call works file by file: a file that cannot be handled is skipped or
/// recorded as a failure and the rest of the batch carries on. Only problems
/// with the ledger itself are returned as errors.
pub struct SafeDeleter {
    ledger: StagingLedger,
    policy: ProtectionPolicy,
    trash: Box<dyn RecoverableTrash>,
}

impl SafeDeleter {
    pub fn new(
        ledger: StagingLedger,
        policy: ProtectionPolicy,
        trash: Box<dyn RecoverableTrash>,
    ) -> Self {
        Self {
            ledger,
            policy,
            trash,
        }
    }

    /// Build a deleter with ledger, policy and trash taken from `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            StagingLedger::from_config(config)?,
            ProtectionPolicy::new(config.clone()),
            trash_from_config(config),
        ))
    }

    pub fn ledger(&self) -> &StagingLedger {
        &self.ledger
    }

    pub fn policy(&self) -> &ProtectionPolicy {
        &self.policy
    }

    /// Move `paths` into a new staging operation.
    ///
    /// Missing, non-regular and protected paths are skipped; move failures are
    /// recorded. The operation is written even if nothing was staged.
    ///
    /// The descriptor is written before the first move and each file is
    /// recorded in it before it is moved, so an interrupted stage leaves an
    /// operation that can still be undone.
    pub fn stage<P: AsRef<Path>>(
        &self,
        paths: &[P],
        reason: &str,
        metadata: OperationMetadata,
    ) -> Result<StageReport> {
        let slot = self.ledger.allocate_operation()?;
        info!(
            "Staging {} files for deletion (operation: {})",
            paths.len(),
            slot.operation_id
        );

        let mut operation = match self.ledger.begin_operation(&slot, reason, metadata) {
            Ok(operation) => operation,
            Err(e) => {
                error!("Could not record operation {}: {}", slot.operation_id, e);
                if fs::remove_dir(&slot.directory).is_ok() {
                    debug!("Removed unused operation directory {}", slot.directory.display());
                }
                return Err(e);
            }
        };

        let mut report = StageReport {
            operation_id: slot.operation_id.clone(),
            ..StageReport::default()
        };

        for path in paths {
            self.stage_one(path.as_ref(), &slot, &mut operation, &mut report);
        }

        report.staged = operation.entries.clone();
        self.ledger.finish_operation(&operation);

        info!(
            "Staged {} files (operation: {}, skipped: {}, failed: {})",
            report.files_staged(),
            report.operation_id,
            report.skipped.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Stage the `delete` side of a review decision, recording what was kept
    pub fn stage_decision(&self, decision: &ReviewDecision, reason: &str) -> Result<StageReport> {
        let mut metadata = OperationMetadata::new();
        metadata.insert(
            "keep".to_string(),
            Value::Array(
                decision
                    .keep
                    .iter()
                    .map(|p| Value::String(p.to_string_lossy().into_owned()))
                    .collect(),
            ),
        );
        self.stage(&decision.delete, reason, metadata)
    }

    /// Check `paths` the way `stage` would, without moving anything
    pub fn preview<P: AsRef<Path>>(&self, paths: &[P]) -> StagePreview {
        let mut preview = StagePreview::default();
        for path in paths {
            match self.screen(path.as_ref()) {
                Ok(candidate) => {
                    preview.ready_bytes += candidate.size_bytes;
                    preview.ready.push(candidate.path);
                }
                Err(Rejection::Skipped(skipped)) => preview.skipped.push(skipped),
                Err(Rejection::Failed(failure)) => preview.failed.push(failure),
            }
        }
        preview
    }

    /// Decide whether `path` may be staged
    fn screen(&self, path: &Path) -> std::result::Result<Candidate, Rejection> {
        let path = absolute(path).map_err(|e| {
            log_file_error(path, "stage", &e);
            Rejection::Failed(FileFailure {
                path: path.to_path_buf(),
                error: e.to_string(),
            })
        })?;

        let Ok(metadata) = fs::metadata(&path) else {
            warn!("File not found, skipping: {}", path.display());
            return Err(Rejection::skipped(path, SkipReason::Missing));
        };

        let file_name = match path.file_name() {
            Some(name) if metadata.is_file() => name.to_os_string(),
            _ => {
                warn!("Not a regular file, skipping: {}", path.display());
                return Err(Rejection::skipped(path, SkipReason::NotAFile));
            }
        };

        if self.policy.is_protected(&path) {
            warn!("Skipping protected file: {}", path.display());
            return Err(Rejection::skipped(path, SkipReason::Protected));
        }

        Ok(Candidate {
            path,
            file_name,
            size_bytes: metadata.len(),
        })
    }

    fn stage_one(
        &self,
        path: &Path,
        slot: &OperationSlot,
        operation: &mut DeletionOperation,
        report: &mut StageReport,
    ) {
        let candidate = match self.screen(path) {
            Ok(candidate) => candidate,
            Err(Rejection::Skipped(skipped)) => return report.skipped.push(skipped),
            Err(Rejection::Failed(failure)) => return report.failed.push(failure),
        };

        let staged_path = unique_path_in(&slot.directory, &candidate.file_name);
        let entry = StagedFileEntry {
            original_path: candidate.path.clone(),
            staged_path: staged_path.clone(),
            size_bytes: candidate.size_bytes,
            staged_at: Utc::now(),
        };

        if let Err(e) = self.ledger.record_entry(operation, entry) {
            error!(
                "Could not record {} in operation {}, leaving it in place: {}",
                candidate.path.display(),
                slot.operation_id,
                e
            );
            return report.failed.push(FileFailure {
                path: candidate.path,
                error: e.to_string(),
            });
        }

        match move_file(&candidate.path, &staged_path) {
            Ok(()) => {
                log_fs_modification(
                    "stage",
                    &candidate.path,
                    Some(&staged_path.to_string_lossy()),
                );
            }
            Err(e) => {
                log_file_error(&candidate.path, "stage", &e);
                if let Err(discard) = self.ledger.discard_last_entry(operation) {
                    warn!(
                        "Operation {} still lists {}, which was never moved: {}",
                        slot.operation_id,
                        candidate.path.display(),
                        discard
                    );
                }
                report.failed.push(FileFailure {
                    path: candidate.path,
                    error: e.to_string(),
                });
            }
        }
    }

    /// Restore every staged file of `operation_id` to its original location.
    ///
    /// Files whose staged copy is gone, or whose original location is now
    /// occupied, are skipped. The operation becomes `undone`.
    pub fn undo(&self, operation_id: &str) -> Result<TransitionReport> {
        let operation = match self.load_staged(operation_id)? {
            Ok(operation) => operation,
            Err(refusal) => return Ok(TransitionReport::refused(operation_id, refusal)),
        };

        let mut report = TransitionReport::new(operation_id, operation.entries.len());

        for entry in &operation.entries {
            if !path_occupied(&entry.staged_path) {
                warn!("Staged file not found: {}", entry.staged_path.display());
                report.skipped.push(SkippedFile {
                    path: entry.staged_path.clone(),
                    reason: SkipReason::StagedFileMissing,
                });
                continue;
            }

            if path_occupied(&entry.original_path) {
                warn!(
                    "Original location occupied, cannot restore: {}",
                    entry.original_path.display()
                );
                report.skipped.push(SkippedFile {
                    path: entry.original_path.clone(),
                    reason: SkipReason::OriginalOccupied,
                });
                continue;
            }

            match restore(entry) {
                Ok(()) => {
                    report.processed += 1;
                    log_fs_modification(
                        "restore",
                        &entry.original_path,
                        Some(&entry.staged_path.to_string_lossy()),
                    );
                }
                Err(e) => {
                    log_file_error(&entry.staged_path, "restore", &e);
                    report.failed.push(FileFailure {
                        path: entry.staged_path.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        self.ledger.update_status(
            operation_id,
            StatusTransition::Undone {
                files_restored: report.processed,
            },
        )?;

        info!(
            "Restored {}/{} files (operation: {})",
            report.processed, report.total_entries, operation_id
        );
        Ok(report)
    }

    /// Remove the staged files of `operation_id` for good.
    ///
    /// With `use_recoverable_trash` the files go to the trash, otherwise they
    /// are unlinked. The operation becomes `deleted`, and its directory is
    /// removed only if nothing but the descriptor is left in it.
    pub fn confirm(&self, operation_id: &str, use_recoverable_trash: bool) -> Result<TransitionReport> {
        let operation = match self.load_staged(operation_id)? {
            Ok(operation) => operation,
            Err(refusal) => return Ok(TransitionReport::refused(operation_id, refusal)),
        };

        let mut report = TransitionReport::new(operation_id, operation.entries.len());
        let destination = if use_recoverable_trash {
            self.trash.describe()
        } else {
            "permanent".to_string()
        };

        for entry in &operation.entries {
            let staged = &entry.staged_path;
            if !path_occupied(staged) {
                warn!("File not found: {}", staged.display());
                report.skipped.push(SkippedFile {
                    path: staged.clone(),
                    reason: SkipReason::StagedFileMissing,
                });
                continue;
            }

            let removed = if use_recoverable_trash {
                self.trash.send(staged)
            } else {
                fs::remove_file(staged).map_err(Error::from)
            };

            match removed {
                Ok(()) => {
                    report.processed += 1;
                    log_fs_modification("delete", staged, Some(&destination));
                }
                Err(e) => {
                    log_file_error(staged, "delete", &e);
                    report.failed.push(FileFailure {
                        path: staged.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        self.ledger.update_status(
            operation_id,
            StatusTransition::Deleted {
                files_deleted: report.processed,
                used_recycle_bin: use_recoverable_trash,
            },
        )?;

        report.directory_removed = match self.ledger.retire_operation(operation_id) {
            Ok(removed) => removed,
            Err(e) => {
                warn!("Could not clean up operation {}: {}", operation_id, e);
                false
            }
        };

        info!(
            "Deleted {}/{} files ({})",
            report.processed, report.total_entries, destination
        );
        Ok(report)
    }

    /// Every operation in the ledger, oldest first
    pub fn list_staged_operations(&self) -> Result<Vec<DeletionOperation>> {
        self.ledger.list_operations()
    }

    /// Purge operations older than `max_age`, whatever their status
    pub fn clean_old_operations(&self, max_age: Duration) -> Result<usize> {
        self.ledger.purge_older_than(max_age)
    }

    /// Load an operation that may still change state.
    ///
    /// The outer `Result` carries ledger failures, the inner one a refusal.
    fn load_staged(
        &self,
        operation_id: &str,
    ) -> Result<std::result::Result<DeletionOperation, Refusal>> {
        match self.ledger.read_operation(operation_id) {
            Ok(operation) if operation.status == OperationStatus::Staged => Ok(Ok(operation)),
            Ok(operation) => {
                warn!(
                    "Operation {} is {}, refusing to change it",
                    operation_id, operation.status
                );
                Ok(Err(Refusal::InvalidTransition(operation.status)))
            }
            Err(Error::OperationNotFound(_)) => {
                error!("Operation not found: {}", operation_id);
                Ok(Err(Refusal::NotFound))
            }
            Err(e) => Err(e),
        }
    }
}

/// A file that passed screening
struct Candidate {
    path: PathBuf,
    file_name: OsString,
    size_bytes: u64,
}

enum Rejection {
    Skipped(SkippedFile),
    Failed(FileFailure),
}

impl Rejection {
    fn skipped(path: PathBuf, reason: SkipReason) -> Self {
        Self::Skipped(SkippedFile { path, reason })
    }
}

fn absolute(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn restore(entry: &StagedFileEntry) -> io::Result<()> {
    if let Some(parent) = entry.original_path.parent() {
        fs::create_dir_all(parent)?;
    }
    move_file(&entry.staged_path, &entry.original_path)
}

#[allow(clippy::module_inception)]
#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use chrono::Utc;
    use serde_json::Value;
    use tempfile::{tempdir, TempDir};

    use super::super::{
        LedgerEvent, OperationLogEntry, OperationMetadata, OperationStatus, StagedFileEntry,
        StagingLedger, StatusTransition, DESCRIPTOR_FILE,
    };
    use crate::error::Error;

    fn ledger() -> (TempDir, StagingLedger) {
        let dir = tempdir().unwrap();
        let ledger = StagingLedger::new(
            dir.path().join("staging"),
            dir.path().join("operations.log"),
        )
        .unwrap();
        (dir, ledger)
    }

    fn entry(dir: &Path, name: &str) -> StagedFileEntry {
        StagedFileEntry {
            original_path: PathBuf::from("/photos").join(name),
            staged_path: dir.join(name),
            size_bytes: 42,
            staged_at: Utc::now(),
        }
    }

    fn log_lines(ledger: &StagingLedger) -> Vec<OperationLogEntry> {
        fs::read_to_string(ledger.operations_log())
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_new_creates_staging_root() {
        let (dir, ledger) = ledger();
        assert!(ledger.staging_root().is_dir());
        assert_eq!(ledger.staging_root(), dir.path().join("staging"));
    }

    #[test]
    fn test_new_fails_when_root_is_a_file() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("staging");
        fs::write(&blocker, b"not a directory").unwrap();

        let result = StagingLedger::new(blocker.join("inner"), dir.path().join("ops.log"));
        assert!(matches!(result, Err(Error::StagingRoot { .. })));
    }

    #[test]
    fn test_allocated_ids_are_distinct_and_ordered() {
        let (_dir, ledger) = ledger();

        let slots: Vec<_> = (0..5).map(|_| ledger.allocate_operation().unwrap()).collect();

        for pair in slots.windows(2) {
            assert!(pair[0].operation_id < pair[1].operation_id);
            assert_ne!(pair[0].directory, pair[1].directory);
        }
        for slot in &slots {
            assert!(slot.directory.is_dir());
            assert_eq!(slot.directory.parent().unwrap(), ledger.staging_root());
        }
    }

    #[test]
    fn test_create_and_read_operation() {
        let (_dir, ledger) = ledger();
        let slot = ledger.allocate_operation().unwrap();
        let entries = vec![entry(&slot.directory, "a.jpg"), entry(&slot.directory, "b.jpg")];

        let mut metadata = OperationMetadata::new();
        metadata.insert("keep".to_string(), Value::from(vec!["/photos/c.jpg"]));

        let id = ledger
            .create_operation(slot.clone(), entries.clone(), "duplicate removal", metadata)
            .unwrap();
        assert_eq!(id, slot.operation_id);

        let operation = ledger.read_operation(&id).unwrap();
        assert_eq!(operation.status, OperationStatus::Staged);
        assert_eq!(operation.files_staged, 2);
        assert_eq!(operation.entries, entries);
        assert_eq!(operation.reason, "duplicate removal");
        assert_eq!(operation.extra_metadata["keep"][0], "/photos/c.jpg");
        assert_eq!(operation.total_size(), 84);
    }

    #[test]
    fn test_descriptor_uses_documented_field_names() {
        let (_dir, ledger) = ledger();
        let slot = ledger.allocate_operation().unwrap();
        let entries = vec![entry(&slot.directory, "a.jpg")];
        let id = ledger
            .create_operation(slot.clone(), entries, "duplicate", OperationMetadata::new())
            .unwrap();

        let raw: Value =
            serde_json::from_slice(&fs::read(slot.directory.join(DESCRIPTOR_FILE)).unwrap())
                .unwrap();

        assert_eq!(raw["operation_id"], id.as_str());
        assert_eq!(raw["status"], "staged");
        assert_eq!(raw["files_staged"], 1);
        assert!(raw["timestamp"].is_string());
        assert!(raw["metadata"].is_object());
        assert_eq!(raw["files"][0]["size"], 42);
        assert!(raw["files"][0]["original_path"].is_string());
        assert!(raw["files"][0]["staged_path"].is_string());
        assert!(raw["files"][0]["timestamp"].is_string());
        assert!(raw.get("undo_timestamp").is_none());
    }

    #[test]
    fn test_update_status_records_transition() {
        let (_dir, ledger) = ledger();
        let slot = ledger.allocate_operation().unwrap();
        let id = ledger
            .create_operation(slot, Vec::new(), "duplicate", OperationMetadata::new())
            .unwrap();

        let updated = ledger
            .update_status(
                &id,
                StatusTransition::Deleted {
                    files_deleted: 3,
                    used_recycle_bin: true,
                },
            )
            .unwrap();
        assert_eq!(updated.status, OperationStatus::Deleted);

        let reread = ledger.read_operation(&id).unwrap();
        assert_eq!(reread.status, OperationStatus::Deleted);
        assert_eq!(reread.files_deleted, Some(3));
        assert_eq!(reread.used_recycle_bin, Some(true));
        assert!(reread.deletion_timestamp.is_some());
        assert!(reread.undo_timestamp.is_none());

        let lines = log_lines(&ledger);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].event, LedgerEvent::Created);
        assert_eq!(lines[1].event, LedgerEvent::Deleted);
        assert_eq!(lines[1].files_count, 3);
        assert_eq!(lines[1].status, Some(OperationStatus::Deleted));

        let again = ledger.update_status(&id, StatusTransition::Undone { files_restored: 0 });
        assert!(matches!(
            again,
            Err(Error::InvalidTransition {
                status: OperationStatus::Deleted,
                ..
            })
        ));
        assert_eq!(log_lines(&ledger).len(), 2);
    }

    #[test]
    fn test_read_unknown_operation() {
        let (_dir, ledger) = ledger();

        assert!(matches!(
            ledger.read_operation("20000101_000000_000000"),
            Err(Error::OperationNotFound(_))
        ));
        assert!(matches!(
            ledger.read_operation("../outside"),
            Err(Error::OperationNotFound(_))
        ));
        assert!(matches!(ledger.read_operation(""), Err(Error::OperationNotFound(_))));
    }

    #[test]
    fn test_list_operations_skips_unreadable_directories() {
        let (_dir, ledger) = ledger();

        let first = ledger.allocate_operation().unwrap();
        let first_id = ledger
            .create_operation(first, Vec::new(), "first", OperationMetadata::new())
            .unwrap();
        let second = ledger.allocate_operation().unwrap();
        let second_id = ledger
            .create_operation(second, Vec::new(), "second", OperationMetadata::new())
            .unwrap();

        // No descriptor at all
        ledger.allocate_operation().unwrap();
        // Corrupt descriptor
        let corrupt = ledger.allocate_operation().unwrap();
        fs::write(corrupt.directory.join(DESCRIPTOR_FILE), b"{ truncated").unwrap();
        // Stray file in the root
        fs::write(ledger.staging_root().join("notes.txt"), b"hello").unwrap();

        let operations = ledger.list_operations().unwrap();
        let ids: Vec<_> = operations.iter().map(|o| o.operation_id.clone()).collect();
        assert_eq!(ids, vec![first_id, second_id]);
    }

    #[test]
    fn test_retire_only_removes_directory_with_just_descriptor() {
        let (_dir, ledger) = ledger();
        let slot = ledger.allocate_operation().unwrap();
        let id = ledger
            .create_operation(slot.clone(), Vec::new(), "x", OperationMetadata::new())
            .unwrap();

        fs::write(slot.directory.join("leftover.jpg"), b"data").unwrap();
        assert!(!ledger.retire_operation(&id).unwrap());
        assert!(slot.directory.join("leftover.jpg").exists());
        assert!(slot.directory.join(DESCRIPTOR_FILE).exists());

        fs::remove_file(slot.directory.join("leftover.jpg")).unwrap();
        assert!(ledger.retire_operation(&id).unwrap());
        assert!(!slot.directory.exists());
    }

    #[test]
    fn test_purge_keeps_recent_operations() {
        let (_dir, ledger) = ledger();
        let slot = ledger.allocate_operation().unwrap();
        ledger
            .create_operation(slot.clone(), Vec::new(), "x", OperationMetadata::new())
            .unwrap();

        let purged = ledger
            .purge_older_than(Duration::from_secs(24 * 60 * 60))
            .unwrap();

        assert_eq!(purged, 0);
        assert!(slot.directory.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_purge_removes_old_operations_regardless_of_status() {
        use std::time::SystemTime;

        let (_dir, ledger) = ledger();
        let old = ledger.allocate_operation().unwrap();
        let old_id = ledger
            .create_operation(old.clone(), Vec::new(), "old", OperationMetadata::new())
            .unwrap();
        fs::write(old.directory.join("still-staged.jpg"), b"data").unwrap();

        let recent = ledger.allocate_operation().unwrap();
        ledger
            .create_operation(recent.clone(), Vec::new(), "recent", OperationMetadata::new())
            .unwrap();

        let two_days_ago = SystemTime::now() - Duration::from_secs(2 * 24 * 60 * 60);
        fs::File::open(&old.directory)
            .unwrap()
            .set_modified(two_days_ago)
            .unwrap();

        let purged = ledger
            .purge_older_than(Duration::from_secs(24 * 60 * 60))
            .unwrap();

        assert_eq!(purged, 1);
        assert!(!old.directory.exists());
        assert!(recent.directory.exists());

        let purge_line = log_lines(&ledger)
            .into_iter()
            .find(|l| l.event == LedgerEvent::Purged)
            .unwrap();
        assert_eq!(purge_line.operation_id, old_id);
        assert_eq!(purge_line.status, Some(OperationStatus::Staged));
    }

    #[test]
    fn test_descriptor_tracks_entries_as_they_are_recorded() {
        let (_dir, ledger) = ledger();
        let slot = ledger.allocate_operation().unwrap();

        let mut operation = ledger
            .begin_operation(&slot, "duplicate removal", OperationMetadata::new())
            .unwrap();
        assert!(slot.directory.join(DESCRIPTOR_FILE).is_file());
        assert_eq!(ledger.read_operation(&slot.operation_id).unwrap().files_staged, 0);
        assert!(!ledger.operations_log().exists());

        ledger
            .record_entry(&mut operation, entry(&slot.directory, "a.jpg"))
            .unwrap();
        ledger
            .record_entry(&mut operation, entry(&slot.directory, "b.jpg"))
            .unwrap();
        let on_disk = ledger.read_operation(&slot.operation_id).unwrap();
        assert_eq!(on_disk.files_staged, 2);
        assert_eq!(on_disk.status, OperationStatus::Staged);

        ledger.discard_last_entry(&mut operation).unwrap();
        let on_disk = ledger.read_operation(&slot.operation_id).unwrap();
        assert_eq!(on_disk.files_staged, 1);
        assert_eq!(on_disk.entries[0].staged_path, slot.directory.join("a.jpg"));

        ledger.finish_operation(&operation);
        let lines = log_lines(&ledger);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].event, LedgerEvent::Created);
        assert_eq!(lines[0].files_count, 1);
    }

    #[test]
    fn test_record_entry_failure_leaves_operation_unchanged() {
        let (_dir, ledger) = ledger();
        let slot = ledger.allocate_operation().unwrap();
        let mut operation = ledger
            .begin_operation(&slot, "x", OperationMetadata::new())
            .unwrap();
        fs::remove_dir_all(&slot.directory).unwrap();

        let result = ledger.record_entry(&mut operation, entry(&slot.directory, "a.jpg"));

        assert!(result.is_err());
        assert!(operation.entries.is_empty());
        assert_eq!(operation.files_staged, 0);
    }

    #[test]
    fn test_list_operations_includes_interrupted_stage() {
        let (_dir, ledger) = ledger();
        let slot = ledger.allocate_operation().unwrap();
        let mut operation = ledger
            .begin_operation(&slot, "x", OperationMetadata::new())
            .unwrap();
        ledger
            .record_entry(&mut operation, entry(&slot.directory, "a.jpg"))
            .unwrap();

        let operations = ledger.list_operations().unwrap();

        assert_eq!(operations.len(), 1);
        assert_eq!(operations[0].operation_id, slot.operation_id);
        assert_eq!(operations[0].files_staged, 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_purge_keeps_old_directory_with_files_but_no_descriptor() {
        use std::time::SystemTime;

        let (_dir, ledger) = ledger();
        let orphan = ledger.allocate_operation().unwrap();
        fs::write(orphan.directory.join("IMG_0001.jpg"), b"data").unwrap();
        let empty = ledger.allocate_operation().unwrap();

        let two_days_ago = SystemTime::now() - Duration::from_secs(2 * 24 * 60 * 60);
        for directory in [&orphan.directory, &empty.directory] {
            fs::File::open(directory)
                .unwrap()
                .set_modified(two_days_ago)
                .unwrap();
        }

        let purged = ledger
            .purge_older_than(Duration::from_secs(24 * 60 * 60))
            .unwrap();

        assert_eq!(purged, 1);
        assert!(orphan.directory.join("IMG_0001.jpg").is_file());
        assert!(!empty.directory.exists());
    }
}

#![allow(dead_code)]

use image_organizer_core::staging::{DirectoryTrash, RecoverableTrash, SafeDeleter, StagingLedger};
use image_organizer_core::{Config, Error, ProtectionPolicy, Result};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A throwaway photo library with its own data directory and trash
pub struct TestLibrary {
    pub root: TempDir,
    pub config: Config,
}

impl TestLibrary {
    pub fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let root = tempfile::tempdir().unwrap();
        let mut config = Config::in_dir(root.path().join("data"));
        config.safety.trash_dir = Some(root.path().join("trash"));

        Self { root, config }
    }

    pub fn photos(&self) -> PathBuf {
        self.root.path().join("photos")
    }

    pub fn trash_dir(&self) -> PathBuf {
        self.root.path().join("trash")
    }

    /// Write a file under the photo library, creating parent folders
    pub fn add_photo(&self, relative: &str, content: &[u8]) -> PathBuf {
        let path = self.photos().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    pub fn deleter(&self) -> SafeDeleter {
        self.deleter_with_trash(Box::new(DirectoryTrash::new(self.trash_dir())))
    }

    pub fn deleter_with_trash(&self, trash: Box<dyn RecoverableTrash>) -> SafeDeleter {
        SafeDeleter::new(
            StagingLedger::from_config(&self.config).unwrap(),
            ProtectionPolicy::new(self.config.clone()),
            trash,
        )
    }

    pub fn log_lines(&self) -> Vec<serde_json::Value> {
        fs::read_to_string(self.config.operations_log())
            .unwrap_or_default()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

/// Trash directory that refuses one file name
pub struct RejectingTrash {
    pub inner: DirectoryTrash,
    pub rejected: &'static str,
}

impl RecoverableTrash for RejectingTrash {
    fn send(&self, path: &Path) -> Result<()> {
        if path.file_name() == Some(OsStr::new(self.rejected)) {
            return Err(Error::Trash(format!("{}: permission denied", path.display())));
        }
        self.inner.send(path)
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }
}

pub fn count_files(dir: &Path) -> usize {
    fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

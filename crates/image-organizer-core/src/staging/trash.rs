use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::utils::fs::{move_file, unique_path_in};

/// Destination for confirmed deletions that can still be recovered by hand
pub trait RecoverableTrash {
    /// Move `path` out of the staging area into the trash
    fn send(&self, path: &Path) -> Result<()>;

    /// Short human-readable name used in logs
    fn describe(&self) -> String;
}

/// The operating system's recycle bin / trash can
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTrash;

impl RecoverableTrash for SystemTrash {
    fn send(&self, path: &Path) -> Result<()> {
        trash::delete(path).map_err(|e| Error::Trash(format!("{}: {}", path.display(), e)))
    }

    fn describe(&self) -> String {
        "recycle bin".to_string()
    }
}

/// A plain directory acting as trash, for headless machines and tests
#[derive(Debug, Clone)]
pub struct DirectoryTrash {
    directory: PathBuf,
}

impl DirectoryTrash {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl RecoverableTrash for DirectoryTrash {
    fn send(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(&self.directory)?;
        let file_name = path
            .file_name()
            .ok_or_else(|| Error::Trash(format!("{} has no file name", path.display())))?;

        let target = unique_path_in(&self.directory, file_name);
        move_file(path, &target)?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("trash directory {}", self.directory.display())
    }
}

/// Trash selected by `safety.trash_dir`, falling back to the system trash
pub fn trash_from_config(config: &Config) -> Box<dyn RecoverableTrash> {
    match &config.safety.trash_dir {
        Some(dir) => Box::new(DirectoryTrash::new(dir.clone())),
        None => Box::new(SystemTrash),
    }
}

// -- Tests --

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::utils::fs::write_json_atomic;

/// Name of the per-user directory holding config, staging area and logs
pub const DATA_DIR_NAME: &str = ".image-organizer";

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Perceptual hash used by the external similarity engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashMethod {
    Phash,
    Dhash,
    Ahash,
    Whash,
}

/// Enable flag for one storage platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformToggle {
    pub enabled: bool,
}

/// Storage platforms taking part in duplicate detection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Platforms {
    pub local: PlatformToggle,
    pub google_drive: PlatformToggle,
}

impl Default for Platforms {
    fn default() -> Self {
        Self {
            local: PlatformToggle { enabled: true },
            google_drive: PlatformToggle { enabled: false },
        }
    }
}

/// Settings governing how staged files are finally removed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetySettings {
    /// Whether a reviewer must look at each group before staging
    pub require_visual_confirmation: bool,

    /// Send confirmed deletions to the recoverable trash instead of unlinking
    pub use_recycle_bin: bool,

    /// Age after which staging operations are purged by `clean`
    pub max_undo_history_days: u64,

    /// Directory used as recoverable trash instead of the OS recycle bin
    pub trash_dir: Option<PathBuf>,
}

impl Default for SafetySettings {
    fn default() -> Self {
        Self {
            require_visual_confirmation: true,
            use_recycle_bin: true,
            max_undo_history_days: 30,
            trash_dir: None,
        }
    }
}

/// Configuration for the image organizer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Folder names or substrings that must never be staged (case-insensitive)
    pub protected_folders: Vec<String>,

    /// Hamming distance threshold handed to the similarity engine
    pub similarity_threshold: u32,

    /// Perceptual hash method handed to the similarity engine
    pub hash_method: HashMethod,

    /// Enabled platforms
    pub platforms: Platforms,

    /// Deletion safety settings
    pub safety: SafetySettings,

    /// Base directory for staging area, operations log and application logs
    pub data_dir: Option<PathBuf>,

    /// File this configuration was loaded from, if any
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            protected_folders: vec![
                "Family Photos".to_string(),
                "Wedding".to_string(),
                "Kids".to_string(),
                "Vacation".to_string(),
                "Important".to_string(),
            ],
            similarity_threshold: 10,
            hash_method: HashMethod::Phash,
            platforms: Platforms::default(),
            safety: SafetySettings::default(),
            data_dir: None,
            source: None,
        }
    }
}

/// Default per-user data directory (`~/.image-organizer`)
pub fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(DATA_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(DATA_DIR_NAME))
}

/// Whole days as a `Duration`, saturating instead of overflowing
pub fn days_to_duration(days: u64) -> Duration {
    Duration::from_secs(days.saturating_mul(SECONDS_PER_DAY))
}

/// Default configuration file (`~/.image-organizer/config.json`)
pub fn default_config_file() -> PathBuf {
    default_data_dir().join("config.json")
}

impl Config {
    /// Configuration rooted at `data_dir`, not backed by any file
    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Some(data_dir.into()),
            ..Self::default()
        }
    }

    /// Load configuration from the default location
    pub fn load_default() -> Result<Self> {
        Self::load(&default_config_file())
    }

    /// Load configuration from `path`.
    ///
    /// A missing file is created with defaults. A file that is not valid JSON
    /// is left untouched and defaults are used instead; such a configuration
    /// is not bound to the file, so saving it never overwrites the broken one.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config file found at {}. Creating with defaults.", path.display());
            let mut config = Config::default();
            config.save_to_file(path)?;
            config.source = Some(path.to_path_buf());
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        match serde_json::from_str::<Config>(&content) {
            Ok(mut config) => {
                debug!("Loaded configuration from {}", path.display());
                config.source = Some(path.to_path_buf());
                Ok(config)
            }
            Err(e) => {
                warn!(
                    "Invalid config file {}: {}. Using defaults; changes will not be saved.",
                    path.display(),
                    e
                );
                Ok(Config::default())
            }
        }
    }

    /// Persist to the file this configuration was loaded from.
    ///
    /// In-memory configurations have nothing to persist to and succeed silently.
    pub fn save(&self) -> Result<()> {
        match &self.source {
            Some(path) => self.save_to_file(path),
            None => Ok(()),
        }
    }

    /// Save configuration to a file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        write_json_atomic(path, self)?;
        debug!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.protected_folders.iter().any(|t| t.trim().is_empty()) {
            return Err(Error::Configuration(
                "Protected folder entries must not be empty".to_string(),
            ));
        }

        // 64-bit perceptual hashes
        if self.similarity_threshold > 64 {
            return Err(Error::Configuration(
                "Similarity threshold must be between 0 and 64".to_string(),
            ));
        }

        if self.safety.max_undo_history_days == 0 {
            return Err(Error::Configuration(
                "max_undo_history_days must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Base directory for all persisted state
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    /// Root directory holding one subdirectory per staging operation
    pub fn staging_dir(&self) -> PathBuf {
        self.data_dir().join("staging")
    }

    /// Append-only JSON-lines audit trail, a sibling of the staging root
    pub fn operations_log(&self) -> PathBuf {
        self.data_dir().join("operations.log")
    }

    /// Directory for rolling application logs
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir().join("logs")
    }

    /// Retention window for staging operations
    pub fn max_undo_age(&self) -> Duration {
        days_to_duration(self.safety.max_undo_history_days)
    }
}

// -- Tests --

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_creates_missing_file_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config::load(&path).unwrap();

        assert!(path.exists());
        assert_eq!(config.source.as_deref(), Some(path.as_path()));
        assert_eq!(config.protected_folders.len(), 5);
        assert!(config.safety.use_recycle_bin);
    }

    #[test]
    fn test_invalid_json_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let config = Config::load(&path).unwrap();

        assert_eq!(config.similarity_threshold, 10);
        assert!(config.source.is_none());
        // The broken file is left for the user to inspect
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[test]
    fn test_saving_fallback_config_keeps_broken_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let mut config = Config::load(&path).unwrap();
        config.protected_folders.push("Graduation".to_string());
        config.save().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[test]
    fn test_huge_undo_window_saturates() {
        let mut config = Config::default();
        config.safety.max_undo_history_days = u64::MAX;

        assert_eq!(config.max_undo_age(), Duration::from_secs(u64::MAX));
        assert_eq!(days_to_duration(2), Duration::from_secs(2 * 24 * 60 * 60));
    }

    #[test]
    fn test_partial_file_fills_missing_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"protected_folders": ["Archive"], "safety": {"use_recycle_bin": false}}"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();

        assert_eq!(config.protected_folders, vec!["Archive".to_string()]);
        assert!(!config.safety.use_recycle_bin);
        assert_eq!(config.safety.max_undo_history_days, 30);
        assert_eq!(config.hash_method, HashMethod::Phash);
    }

    #[test]
    fn test_save_round_trips_through_source() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::load(&path).unwrap();
        config.similarity_threshold = 4;
        config.save().unwrap();

        let reloaded = Config::load(&path).unwrap();
        assert_eq!(reloaded.similarity_threshold, 4);
    }

    #[test]
    fn test_layout_is_derived_from_data_dir() {
        let config = Config::in_dir("/tmp/organizer");

        assert_eq!(config.staging_dir(), PathBuf::from("/tmp/organizer/staging"));
        assert_eq!(
            config.operations_log(),
            PathBuf::from("/tmp/organizer/operations.log")
        );
        assert_eq!(config.log_dir(), PathBuf::from("/tmp/organizer/logs"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.similarity_threshold = 65;
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));

        config.similarity_threshold = 10;
        config.protected_folders.push("  ".to_string());
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }
}

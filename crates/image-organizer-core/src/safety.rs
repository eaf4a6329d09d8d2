use log::info;
use std::path::Path;

use crate::config::Config;
use crate::error::{Error, Result};

/// Decides whether a path may ever be staged for deletion.
///
/// A path is protected when any configured token appears anywhere in its
/// string form, compared case-insensitively. A token matches file names as
/// well as folder names, so matching errs toward protecting too much.
#[derive(Debug, Clone)]
pub struct ProtectionPolicy {
    config: Config,
}

impl ProtectionPolicy {
    /// Create a policy backed by `config`; changes are saved through it
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Current protected tokens, in configuration order
    pub fn tokens(&self) -> &[String] {
        &self.config.protected_folders
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Check if a path falls under any protected token
    pub fn is_protected(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy().to_lowercase();
        self.config
            .protected_folders
            .iter()
            .any(|token| path_str.contains(&token.to_lowercase()))
    }

    /// Add a protected token. Returns false if it was already present.
    pub fn add(&mut self, token: &str) -> Result<bool> {
        let token = token.trim();
        if token.is_empty() {
            return Err(Error::Configuration(
                "Protected folder must not be empty".to_string(),
            ));
        }
        if self.position(token).is_some() {
            return Ok(false);
        }

        self.config.protected_folders.push(token.to_string());
        self.config.save()?;
        info!("Added protected folder: {}", token);
        Ok(true)
    }

    /// Remove a protected token. Returns false if it was not present.
    pub fn remove(&mut self, token: &str) -> Result<bool> {
        let Some(index) = self.position(token.trim()) else {
            return Ok(false);
        };

        let removed = self.config.protected_folders.remove(index);
        self.config.save()?;
        info!("Removed protected folder: {}", removed);
        Ok(true)
    }

    fn position(&self, token: &str) -> Option<usize> {
        let wanted = token.to_lowercase();
        self.config
            .protected_folders
            .iter()
            .position(|t| t.to_lowercase() == wanted)
    }
}

// -- Tests --

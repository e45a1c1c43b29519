//! Application settings persisted as JSON in the user config directory.
//!
//! The core treats settings purely as input: the store root and the
//! default recipient feed the indexer and the edit workflow, everything
//! else is display preference carried for the front end.

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Password store root; empty means `~/.password-store`.
    pub password_store_path: String,
    /// Recipient hint prefilled when auto-detection fails.
    pub default_recipient: String,
    /// Commit store changes automatically after a successful save.
    pub auto_commit: bool,
    pub show_notifications: bool,
    /// Extra substrings stripped from decrypted output before display.
    pub filter_markers: Vec<String>,
    // Display preferences, opaque to the core
    pub theme: String,
    pub window_width: u32,
    pub window_height: u32,
    pub split_offset: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            password_store_path: String::new(),
            default_recipient: String::new(),
            auto_commit: true,
            show_notifications: true,
            filter_markers: Vec::new(),
            theme: "light".to_string(),
            window_width: 800,
            window_height: 600,
            split_offset: 0.3,
        }
    }
}

impl Settings {
    /// Load settings from the default config path, writing defaults there
    /// when no file exists yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path()?)
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let settings = Self::default();
            settings.save_to(path)?;
            return Ok(settings);
        }

        let data = fs::read_to_string(path)?;
        serde_json::from_str(&data)
            .map_err(|e| StoreError::Settings(format!("Failed to parse config file: {e}")))
    }

    /// Save settings to the default config path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path()?)
    }

    /// Save settings to a specific file, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let data = serde_json::to_string_pretty(self)
            .map_err(|e| StoreError::Settings(format!("Failed to serialize settings: {e}")))?;
        fs::write(path, data)?;
        Ok(())
    }

    /// Resolve the password store root: the configured path if set,
    /// otherwise `~/.password-store`.
    pub fn store_root(&self) -> Result<PathBuf> {
        if !self.password_store_path.is_empty() {
            return Ok(PathBuf::from(&self.password_store_path));
        }

        let home = dirs::home_dir()
            .ok_or_else(|| StoreError::Settings("Cannot determine home directory".to_string()))?;
        Ok(home.join(".password-store"))
    }

    /// Default recipient hint, if configured.
    pub fn default_recipient_hint(&self) -> Option<String> {
        if self.default_recipient.is_empty() {
            None
        } else {
            Some(self.default_recipient.clone())
        }
    }
}

/// Path to the settings file in the user config directory.
pub fn config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| StoreError::Settings("Cannot determine config directory".to_string()))?;
    Ok(config_dir.join("passview").join("settings.json"))
}

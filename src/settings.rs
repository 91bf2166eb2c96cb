//! Persistent application settings.
//!
//! Loads settings.json from the data directory at startup. Unknown or
//! missing fields fall back to defaults so old files keep working.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// User-configurable settings persisted as JSON.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Settings {
    /// Whether the capture hotkey is active. The tray menu toggles this.
    #[serde(rename = "app-enabled", default = "default_enabled")]
    pub app_enabled: bool,
    /// OpenAI API key for the answer service. None until the user sets it.
    #[serde(rename = "openai-api-key", default)]
    pub openai_api_key: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_enabled: default_enabled(),
            openai_api_key: None,
        }
    }
}

/// Settings store bound to a file on disk.
///
/// The pipeline takes a snapshot of the settings at the start of each run,
/// so a toggle mid-run only affects the next capture.
pub struct SettingsStore {
    path: PathBuf,
    settings: Settings,
}

impl SettingsStore {
    /// Loads settings from the given path, falling back to defaults when the
    /// file is missing or unparseable (a broken file is logged, not fatal).
    pub fn load(path: &Path) -> Self {
        let settings = match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(settings) => {
                    crate::log(&format!("Settings loaded from {}", path.display()));
                    settings
                }
                Err(e) => {
                    crate::log(&format!(
                        "Failed to parse {}: {}. Using defaults.",
                        path.display(),
                        e
                    ));
                    Settings::default()
                }
            },
            Err(_) => {
                crate::log("settings.json not found. Using default settings.");
                Settings::default()
            }
        };

        Self {
            path: path.to_path_buf(),
            settings,
        }
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    /// Returns a snapshot for a single pipeline run.
    pub fn snapshot(&self) -> Settings {
        self.settings.clone()
    }

    /// Flips the enabled flag and persists it. Returns the new value.
    pub fn toggle_enabled(&mut self) -> Result<bool> {
        self.settings.app_enabled = !self.settings.app_enabled;
        self.save()?;
        Ok(self.settings.app_enabled)
    }

    fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert!(settings.app_enabled);
        assert!(settings.openai_api_key.is_none());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert!(settings.app_enabled);
        assert!(settings.openai_api_key.is_none());
    }

    #[test]
    fn test_roundtrip() {
        let settings = Settings {
            app_enabled: false,
            openai_api_key: Some("sk-test".to_string()),
        };
        let json = serde_json::to_string(&settings).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert!(!back.app_enabled);
        assert_eq!(back.openai_api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_store_load_missing_file_and_toggle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut store = SettingsStore::load(&path);
        assert!(store.get().app_enabled);

        assert!(!store.toggle_enabled().unwrap());
        assert!(path.exists());

        let reloaded = SettingsStore::load(&path);
        assert!(!reloaded.get().app_enabled);
    }
}

//! Persistent user settings (`loom.json` in the config dir).
//!
//! Missing or unreadable files fall back to defaults; unknown or missing
//! fields are tolerated so older settings files keep loading.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::entities::timeline::{DEFAULT_FPS, DEFAULT_FRAME_COUNT, TimelineDefaults};
use crate::export::ExportSettings;
use crate::paths::{self, PathConfig};

pub const SETTINGS_FILE: &str = "loom.json";

/// Application settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoomSettings {
    // Timeline parameters for projects that do not set their own
    pub fps: u32,
    pub frame_count: u32,
    pub loop_enabled: bool,

    // Export
    pub export: ExportSettings,
    /// Directory relative image paths resolve against; `None` = project dir
    pub asset_root: Option<std::path::PathBuf>,
}

impl Default for LoomSettings {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            frame_count: DEFAULT_FRAME_COUNT,
            loop_enabled: true,
            export: ExportSettings::default(),
            asset_root: None,
        }
    }
}

impl LoomSettings {
    pub fn timeline_defaults(&self) -> TimelineDefaults {
        TimelineDefaults {
            frame_count: self.frame_count,
            fps: self.fps,
            looping: self.loop_enabled,
        }
    }

    /// Load from the resolved config dir; defaults if absent or invalid.
    pub fn load(config: &PathConfig) -> Self {
        let path = paths::config_file(SETTINGS_FILE, config);
        match Self::load_from(&path) {
            Ok(Some(settings)) => settings,
            Ok(None) => {
                debug!("No settings at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                warn!("{:#}; using defaults", e);
                Self::default()
            }
        }
    }

    /// `Ok(None)` if the file does not exist.
    pub fn load_from(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        let settings = serde_json::from_str(&json)
            .with_context(|| format!("Invalid settings file: {}", path.display()))?;
        debug!("Settings loaded from {}", path.display());
        Ok(Some(settings))
    }

    pub fn save(&self, config: &PathConfig) -> Result<()> {
        paths::ensure_dirs(config)?;
        self.save_to(&paths::config_file(SETTINGS_FILE, config))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write settings: {}", path.display()))?;
        debug!("Settings saved to {}", path.display());
        Ok(())
    }
}

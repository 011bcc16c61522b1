//! Client settings storage
//!
//! Stores view defaults (fade transparency, focus range, time format) in a
//! JSON file in the app data directory. A missing or unreadable file yields
//! the defaults; it is never an error to start without one.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::filter::{FilterAction, FilterDefs};

/// Environment variable that overrides the data directory
pub const DATA_DIR_ENV: &str = "NETCREATE_DATA_DIR";

const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Opacity of nodes that fail a filter in FADE mode (default: 0.2)
    #[serde(default = "default_transparency")]
    pub node_transparency: f64,
    /// Opacity of faded edges (default: 0.2)
    #[serde(default = "default_transparency")]
    pub edge_transparency: f64,
    /// Hops kept around the focus node (default: 2)
    #[serde(default = "default_focus_range")]
    pub focus_range: u32,
    #[serde(default)]
    pub filter_action: FilterAction,
    /// chrono format string for comment timestamps
    #[serde(default = "default_time_format")]
    pub time_format: String,
    /// Commenter id used when none is given on the command line
    #[serde(default)]
    pub user_id: Option<String>,
}

fn default_transparency() -> f64 {
    0.2
}

fn default_focus_range() -> u32 {
    2
}

fn default_time_format() -> String {
    "%b %-d, %Y, %-I:%M %p".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            node_transparency: default_transparency(),
            edge_transparency: default_transparency(),
            focus_range: default_focus_range(),
            filter_action: FilterAction::default(),
            time_format: default_time_format(),
            user_id: None,
        }
    }
}

impl Settings {
    /// Load settings from disk or fall back to defaults
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Settings::default();
        }
        match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("settings file {} is invalid, using defaults: {}", path.display(), e);
                Settings::default()
            }),
            Err(e) => {
                tracing::warn!("failed to read settings {}: {}", path.display(), e);
                Settings::default()
            }
        }
    }

    /// Save settings to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, content)?;
        Ok(())
    }

    /// Empty filter definitions carrying these view defaults.
    pub fn empty_filter_defs(&self) -> FilterDefs {
        let mut defs = FilterDefs::new(
            self.node_transparency.clamp(0.0, 1.0),
            self.edge_transparency.clamp(0.0, 1.0),
            self.focus_range,
        );
        defs.filter_action = self.filter_action;
        defs
    }
}

/// Data directory: `$NETCREATE_DATA_DIR`, else `<platform data dir>/netcreate`.
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::data_dir()
        .map(|p| p.join("netcreate"))
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn settings_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SETTINGS_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&settings_path(dir.path()));
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.focus_range, 2);
        assert_eq!(settings.node_transparency, 0.2);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = settings_path(&dir.path().join("sub"));
        let settings = Settings {
            focus_range: 4,
            filter_action: FilterAction::Reduce,
            user_id: Some("BEN".into()),
            ..Settings::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path), settings);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = settings_path(dir.path());
        std::fs::write(&path, r#"{"node_transparency": 0.5}"#).unwrap();
        let settings = Settings::load(&path);
        assert_eq!(settings.node_transparency, 0.5);
        assert_eq!(settings.edge_transparency, 0.2);
        assert_eq!(settings.time_format, default_time_format());
    }

    #[test]
    fn test_corrupt_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = settings_path(dir.path());
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(Settings::load(&path), Settings::default());
    }

    #[test]
    fn test_empty_filter_defs_use_settings() {
        let settings = Settings { edge_transparency: 0.4, focus_range: 3, ..Settings::default() };
        let defs = settings.empty_filter_defs();
        assert_eq!(defs.edges.transparency, 0.4);
        assert_eq!(defs.focus.range, 3);
        assert!(defs.nodes.filters.is_empty());
    }

    #[test]
    fn test_out_of_range_transparency_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let path = settings_path(dir.path());
        std::fs::write(&path, r#"{"node_transparency": 5.0, "edge_transparency": -1.0}"#).unwrap();
        let defs = Settings::load(&path).empty_filter_defs();
        assert_eq!(defs.nodes.transparency, 1.0);
        assert_eq!(defs.edges.transparency, 0.0);
    }
}

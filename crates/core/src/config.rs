//! Application configuration.
//!
//! Values are layered: built-in defaults, then `~/.config/ttrplan/config.json`
//! when present, then `TTRPLAN__*` environment variables.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::board::MapExtent;

/// Directory under the user's config dir holding everything this app writes.
pub const CONFIG_DIR: &str = "ttrplan";
const CONFIG_FILE: &str = "config.json";
const ENV_PREFIX: &str = "TTRPLAN";

/// Runtime settings for the planner client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the data/solver backend.
    pub server_url: String,
    /// Number of alternative solutions requested from the solver.
    pub num_alternatives: u32,
    /// Timeout applied to every backend request.
    pub request_timeout_secs: u64,
    /// Width of the reference map image; derived from city coordinates when unset.
    pub map_width: Option<f64>,
    /// Height of the reference map image; derived from city coordinates when unset.
    pub map_height: Option<f64>,
    /// Where calibration tables are written.
    pub export_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5000".to_string(),
            num_alternatives: 2,
            request_timeout_secs: 30,
            map_width: None,
            map_height: None,
            export_dir: config_dir().join("exports"),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path())
    }

    /// Load configuration from `path`; a missing file falls back to defaults.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .with_context(|| format!("failed to read configuration {}", path.display()))?;
        let config: AppConfig = settings
            .try_deserialize()
            .with_context(|| format!("invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Map extent pinned by configuration, if both dimensions are set.
    pub fn map_extent(&self) -> Option<MapExtent> {
        match (self.map_width, self.map_height) {
            (Some(width), Some(height)) if width > 0.0 && height > 0.0 => {
                Some(MapExtent::sized(width, height))
            }
            _ => None,
        }
    }
}

/// Root of the application's configuration directory.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR)
}

/// Default configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE)
}

/// Write the default configuration file when none exists yet.
pub fn ensure_default_config() -> Result<()> {
    ensure_default_config_at(config_path()).map(|_| ())
}

/// Write defaults to `path` unless it exists. Returns whether a file was written.
pub fn ensure_default_config_at(path: impl AsRef<Path>) -> Result<bool> {
    let path = path.as_ref();
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    let serialized = serde_json::to_string_pretty(&AppConfig::default())
        .context("failed to serialize default configuration")?;
    fs::write(path, serialized)
        .with_context(|| format!("failed to write config {}", path.display()))?;
    info!(path = %path.display(), "Wrote default configuration");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() -> Result<()> {
        let dir = tempdir()?;
        let config = AppConfig::load_from(dir.path().join("absent.json"))?;
        assert_eq!(config.num_alternatives, 2);
        assert_eq!(config.server_url, "http://127.0.0.1:5000");
        assert!(config.map_extent().is_none());
        Ok(())
    }

    #[test]
    fn file_overrides_selected_fields() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"server_url": "http://solver.local:8080", "map_width": 1600.0, "map_height": 1000.0}"#,
        )?;
        let config = AppConfig::load_from(&path)?;
        assert_eq!(config.server_url, "http://solver.local:8080");
        assert_eq!(config.num_alternatives, 2);
        let extent = config.map_extent().expect("extent from config");
        assert_eq!(extent.width(), 1600.0);
        assert_eq!(extent.height(), 1000.0);
        Ok(())
    }

    #[test]
    fn default_config_written_once() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("config.json");
        assert!(ensure_default_config_at(&path)?);
        assert!(!ensure_default_config_at(&path)?);
        let written = AppConfig::load_from(&path)?;
        assert_eq!(written, AppConfig::load_from(&path)?);
        assert_eq!(written.request_timeout_secs, 30);
        Ok(())
    }
}

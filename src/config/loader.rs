// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration loading from files.
//!
//! Handles loading tracker configuration from JSON and YAML files.

use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};

use super::types::TrackerConfig;

/// Config file names to search for (in order).
pub const CONFIG_FILES: &[&str] = &["dials.json", "dials.yaml", "dials.yml", ".dials/config.json"];

/// Find the first config file present in `workspace_root`.
pub fn find_config_file(workspace_root: &Path) -> Option<PathBuf> {
    CONFIG_FILES
        .iter()
        .map(|filename| workspace_root.join(filename))
        .find(|path| path.exists())
}

/// Load workspace configuration from the workspace root.
///
/// Returns `Ok(None)` when no config file exists.
pub fn load_workspace_config(workspace_root: &Path) -> Result<Option<TrackerConfig>> {
    match find_config_file(workspace_root) {
        Some(path) => load_config_file(&path).map(Some),
        None => Ok(None),
    }
}

/// Load a configuration file (JSON or YAML) and validate it.
pub fn load_config_file(path: &Path) -> Result<TrackerConfig> {
    let content = std::fs::read_to_string(path)?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    let config: TrackerConfig = match extension.to_lowercase().as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&content)?,
        "json" => serde_json::from_str(&content)?,
        other => {
            return Err(ConfigError::InvalidFormat(format!(
                "unsupported config extension '{}' for {}",
                other,
                path.display()
            )))
        }
    };

    config.validate()?;
    Ok(config)
}

/// Save configuration as pretty JSON.
pub fn save_config_file(path: &Path, config: &TrackerConfig) -> Result<()> {
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

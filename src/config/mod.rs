// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tracker configuration.
//!
//! Configuration can be built in code or loaded from the first of
//! `dials.json`, `dials.yaml`, `dials.yml` or `.dials/config.json` found in a
//! workspace root. Missing files and missing fields fall back to defaults.

mod loader;
mod types;

pub use loader::{
    find_config_file, load_config_file, load_workspace_config, save_config_file, CONFIG_FILES,
};
pub use types::TrackerConfig;

use crate::error::Result;
use std::path::Path;

/// Load the workspace configuration, or the defaults if there is none.
pub fn load_config(workspace_root: &Path) -> Result<TrackerConfig> {
    Ok(load_workspace_config(workspace_root)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use tempfile::TempDir;

    #[test]
    fn test_load_config_with_no_files() {
        let temp = TempDir::new().unwrap();
        let config = load_config(temp.path()).unwrap();
        assert_eq!(config, TrackerConfig::default());
    }

    #[test]
    fn test_load_config_from_nested_file() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join(".dials")).unwrap();
        std::fs::write(
            temp.path().join(".dials/config.json"),
            r#"{"label": "nested"}"#,
        )
        .unwrap();

        let config = load_config(temp.path()).unwrap();
        assert_eq!(config.label, "nested");
    }

    #[test]
    fn test_load_config_propagates_parse_errors() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("dials.json"), "{not json").unwrap();

        assert!(matches!(
            load_config(temp.path()),
            Err(ConfigError::JsonError(_))
        ));
    }
}

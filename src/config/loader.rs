// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration loading from files.
//!
//! Handles loading configuration from JSON and YAML files in various locations.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ConfigError;
use crate::metrics::RenameRule;

use super::types::FileConfig;

/// Config file names to search for (in order).
pub const CONFIG_FILES: &[&str] = &["appmon.json", "appmon.yaml", "appmon.yml", ".appmon/config.json"];

/// Global config directory name.
pub const GLOBAL_CONFIG_DIR: &str = ".appmon";

/// Global config file name.
pub const GLOBAL_CONFIG_FILE: &str = "config.json";

/// Get the global config file path.
pub fn get_global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(GLOBAL_CONFIG_DIR).join(GLOBAL_CONFIG_FILE))
}

/// The global config file, if one exists.
pub fn find_global_config_file() -> Option<PathBuf> {
    get_global_config_path().filter(|path| path.exists())
}

/// Load global configuration from ~/.appmon/config.json.
pub fn load_global_config() -> Result<Option<FileConfig>, ConfigError> {
    find_global_config_file()
        .map(|path| load_config_file(&path))
        .transpose()
}

/// Find the config file in `dir`, if any.
pub fn find_config_file(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
}

/// Load configuration from the first config file found in `dir`.
pub fn load_workspace_config(dir: &Path) -> Result<Option<FileConfig>, ConfigError> {
    match find_config_file(dir) {
        Some(path) => load_config_file(&path).map(Some),
        None => Ok(None),
    }
}

/// Load a configuration file (JSON or YAML).
///
/// A relative `renameRulesPath` is resolved against the directory holding
/// the file.
pub fn load_config_file(path: &Path) -> Result<FileConfig, ConfigError> {
    debug!(path = %path.display(), "Loading config file");
    let content = std::fs::read_to_string(path)?;
    let mut config: FileConfig = if is_yaml(path) {
        serde_yaml::from_str(&content)?
    } else {
        serde_json::from_str(&content)?
    };

    if let Some(base) = path.parent() {
        config.rename_rules_path = config.rename_rules_path.map(|rules| base.join(rules));
    }
    Ok(config)
}

/// Load a rename rule list (`[[{name, scope?}, id], ...]`), JSON or YAML.
pub fn load_rename_rules(path: &Path) -> Result<Vec<RenameRule>, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let rules: Vec<RenameRule> = if is_yaml(path) {
        serde_yaml::from_str(&content)?
    } else {
        serde_json::from_str(&content)?
    };
    debug!(path = %path.display(), rules = rules.len(), "Loaded rename rules");
    Ok(rules)
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .as_deref(),
        Some("yaml" | "yml")
    )
}

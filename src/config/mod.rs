// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration module for the agent.
//!
//! Handles loading, merging, and validation of configuration from multiple sources:
//! - Global config: ~/.appmon/config.json
//! - Workspace config: appmon.json, appmon.yaml, appmon.yml, or .appmon/config.json
//! - Overrides: command-line arguments and `APPMON_*` environment variables
//!
//! Configuration is merged with precedence (overrides > workspace > global > defaults).

mod loader;
mod merger;
mod types;

pub use loader::{
    find_config_file, find_global_config_file, get_global_config_path, load_config_file,
    load_global_config, load_rename_rules, load_workspace_config, CONFIG_FILES, GLOBAL_CONFIG_DIR,
    GLOBAL_CONFIG_FILE,
};
pub use merger::{merge_config, Overrides};
pub use types::{
    AgentConfig, FileConfig, LogSettings, LoggingFileConfig, DEFAULT_HARVEST_INTERVAL_SECS,
};

use crate::error::ConfigError;
use std::path::Path;

/// Load, merge and validate all configuration sources for `dir`.
///
/// Rules from `renameRulesPath` (relative paths resolve against the config
/// file that names them) are appended after the inline rules, so they win on
/// duplicate keys.
pub fn load_config(dir: &Path, overrides: Overrides) -> Result<AgentConfig, ConfigError> {
    load_config_from(find_global_config_file().as_deref(), dir, overrides)
}

/// [`load_config`] with an explicit global config file instead of
/// `~/.appmon/config.json`.
pub fn load_config_from(
    global: Option<&Path>,
    dir: &Path,
    overrides: Overrides,
) -> Result<AgentConfig, ConfigError> {
    let global = global.map(load_config_file).transpose()?;
    let workspace = load_workspace_config(dir)?;
    let mut config = merge_config(global, workspace, overrides);

    if let Some(path) = &config.rename_rules_path {
        let rules = load_rename_rules(path)?;
        config.rename_rules.extend(rules);
    }

    config.validate()?;
    Ok(config)
}

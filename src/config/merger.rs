// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration merging.
//!
//! Handles merging configurations from different sources with proper precedence.

use super::types::{AgentConfig, FileConfig};

/// Overrides taken from the command line or environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub app_name: Option<String>,
    pub log_level: Option<String>,
    pub harvest_interval_secs: Option<u64>,
}

impl Overrides {
    /// Read `APPMON_APP_NAME`, `APPMON_LOG_LEVEL` and `APPMON_HARVEST_INTERVAL`.
    ///
    /// An interval that does not parse as an integer is ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            app_name: lookup("APPMON_APP_NAME"),
            log_level: lookup("APPMON_LOG_LEVEL"),
            harvest_interval_secs: lookup("APPMON_HARVEST_INTERVAL").and_then(|v| v.parse().ok()),
        }
    }

    /// Fill unset fields from `fallback`.
    pub fn or(self, fallback: Overrides) -> Overrides {
        Overrides {
            app_name: self.app_name.or(fallback.app_name),
            log_level: self.log_level.or(fallback.log_level),
            harvest_interval_secs: self.harvest_interval_secs.or(fallback.harvest_interval_secs),
        }
    }
}

/// Merge configuration sources with precedence.
///
/// Precedence (highest to lowest):
/// 1. Overrides (CLI, environment)
/// 2. Workspace config (appmon.json)
/// 3. Global config (~/.appmon/config.json)
/// 4. Default values
pub fn merge_config(
    global: Option<FileConfig>,
    workspace: Option<FileConfig>,
    overrides: Overrides,
) -> AgentConfig {
    let mut result = AgentConfig::default();

    for config in [global, workspace].into_iter().flatten() {
        apply_file_config(&mut result, config);
    }
    apply_overrides(&mut result, overrides);

    result
}

fn apply_file_config(result: &mut AgentConfig, config: FileConfig) {
    if let Some(app_name) = config.app_name {
        result.app_name = app_name;
    }
    if let Some(interval) = config.harvest_interval_secs {
        result.harvest_interval_secs = interval;
    }
    if let Some(rules) = config.rename_rules {
        result.rename_rules = rules;
    }
    if config.rename_rules_path.is_some() {
        result.rename_rules_path = config.rename_rules_path;
    }
    if let Some(logging) = config.logging {
        if let Some(level) = logging.level {
            result.logging.level = level;
        }
        if logging.filter.is_some() {
            result.logging.filter = logging.filter;
        }
        if let Some(ansi) = logging.ansi {
            result.logging.ansi = ansi;
        }
        if let Some(compact) = logging.compact {
            result.logging.compact = compact;
        }
    }
}

fn apply_overrides(result: &mut AgentConfig, overrides: Overrides) {
    if let Some(app_name) = overrides.app_name {
        result.app_name = app_name;
    }
    if let Some(level) = overrides.log_level {
        result.logging.level = level;
    }
    if let Some(interval) = overrides.harvest_interval_secs {
        result.harvest_interval_secs = interval;
    }
}

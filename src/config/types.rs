// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration type definitions.
//!
//! Defines the structure of file and resolved configuration,
//! supporting JSON and YAML formats.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::agent::DEFAULT_APP_NAME;
use crate::error::ConfigError;
use crate::metrics::RenameRule;
use crate::telemetry::LoggingConfig;

/// Default seconds between harvests.
pub const DEFAULT_HARVEST_INTERVAL_SECS: u64 = 60;

/// Agent configuration as written in a file. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileConfig {
    /// Application name reported with every harvest
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,

    /// Logging settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingFileConfig>,

    /// Seconds between harvests
    #[serde(skip_serializing_if = "Option::is_none")]
    pub harvest_interval_secs: Option<u64>,

    /// Inline rename rules, `[[{name, scope?}, id], ...]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rename_rules: Option<Vec<RenameRule>>,

    /// File holding rename rules in the same format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rename_rules_path: Option<PathBuf>,
}

/// Logging section of a config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingFileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ansi: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub compact: Option<bool>,
}

/// Resolved logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogSettings {
    pub level: String,
    pub filter: Option<String>,
    pub ansi: bool,
    pub compact: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            filter: None,
            ansi: true,
            compact: true,
        }
    }
}

/// Fully resolved agent configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    pub app_name: String,
    pub logging: LogSettings,
    pub harvest_interval_secs: u64,
    pub rename_rules: Vec<RenameRule>,
    pub rename_rules_path: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            logging: LogSettings::default(),
            harvest_interval_secs: DEFAULT_HARVEST_INTERVAL_SECS,
            rename_rules: Vec::new(),
            rename_rules_path: None,
        }
    }
}

impl AgentConfig {
    /// Check values that deserialize fine but cannot be used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_name.trim().is_empty() {
            return Err(ConfigError::invalid_value("appName", "must not be empty"));
        }
        if self.harvest_interval_secs == 0 {
            return Err(ConfigError::invalid_value(
                "harvestIntervalSecs",
                "must be greater than zero",
            ));
        }
        self.log_level()?;
        Ok(())
    }

    /// Parsed log level.
    pub fn log_level(&self) -> Result<Level, ConfigError> {
        Level::from_str(&self.logging.level).map_err(|_| {
            ConfigError::invalid_value(
                "logging.level",
                format!("unknown level '{}'", self.logging.level),
            )
        })
    }

    /// Harvest interval as a duration.
    pub fn harvest_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.harvest_interval_secs)
    }

    /// Subscriber settings derived from this configuration.
    pub fn logging_config(&self) -> Result<LoggingConfig, ConfigError> {
        let mut config = LoggingConfig::default()
            .with_level(self.log_level()?)
            .with_ansi(self.logging.ansi)
            .with_compact(self.logging.compact);
        if let Some(filter) = &self.logging.filter {
            config = config.with_filter(filter.clone());
        }
        Ok(config)
    }
}

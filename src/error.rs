// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for the appmon telemetry core.
//!
//! This module provides strongly-typed errors for different parts of the agent,
//! using `thiserror` for ergonomic error definitions and `anyhow` for error propagation.

use thiserror::Error;

/// Errors that can occur while recording a measurement.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricError {
    #[error("Invalid measurement for {field}: {value}")]
    InvalidMeasurement { field: &'static str, value: f64 },
}

impl MetricError {
    /// Create an invalid measurement error.
    pub fn invalid(field: &'static str, value: f64) -> Self {
        Self::InvalidMeasurement { field, value }
    }
}

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("IO error reading config: {0}")]
    IoError(String),

    #[error("YAML parsing error: {0}")]
    YamlError(String),

    #[error("JSON parsing error: {0}")]
    JsonError(String),
}

impl ConfigError {
    /// Create an invalid value error.
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::IoError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::YamlError(err.to_string())
    }
}

/// Errors that can occur while handing harvested metrics to a sink.
#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("Metric sink failed: {0}")]
    SinkFailed(String),

    #[error("Metric sink rejected payload: {0}")]
    Rejected(String),
}

impl HarvestError {
    /// Check if the harvested data should be kept for the next cycle.
    ///
    /// A rejected payload would be rejected again, so it is discarded.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SinkFailed(_))
    }
}

/// Result type alias using anyhow for flexible error handling.
pub type Result<T> = anyhow::Result<T>;

// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Logging subscriber setup.

use std::io;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Settings for the process-wide log subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Level used when neither `filter` nor `RUST_LOG` is set.
    pub level: Level,

    /// Filter directive, e.g. `appmon=debug,hyper=warn`.
    pub filter: Option<String>,

    /// Emit segment span close events.
    pub span_events: bool,

    pub include_target: bool,
    pub include_file_line: bool,
    pub ansi: bool,
    pub compact: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            filter: None,
            span_events: false,
            include_target: true,
            include_file_line: false,
            ansi: true,
            compact: true,
        }
    }
}

impl LoggingConfig {
    /// Verbose output with segment timings.
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            span_events: true,
            include_file_line: true,
            compact: false,
            ..Self::default()
        }
    }

    /// Warnings only, no colors.
    pub fn production() -> Self {
        Self {
            level: Level::WARN,
            include_target: false,
            ansi: false,
            ..Self::default()
        }
    }

    /// Everything the agent logs, nothing from dependencies.
    pub fn testing() -> Self {
        Self {
            level: Level::TRACE,
            filter: Some("appmon=trace".to_string()),
            span_events: true,
            include_file_line: true,
            ansi: false,
            compact: false,
            ..Self::default()
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }

    pub fn with_compact(mut self, compact: bool) -> Self {
        self.compact = compact;
        self
    }

    /// Build the filter. An explicit directive wins over `RUST_LOG`; an
    /// unparseable directive falls back to the configured level.
    pub fn env_filter(&self) -> EnvFilter {
        let fallback = || EnvFilter::new(self.level.as_str());
        match &self.filter {
            Some(directive) => EnvFilter::try_new(directive).unwrap_or_else(|_| fallback()),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback()),
        }
    }
}

/// Returned by [`init_logging`]; keep it alive for the life of the process.
#[must_use = "dropping the guard early ends logging setup scope"]
#[derive(Debug)]
pub struct LoggingGuard {
    _private: (),
}

/// Install the global subscriber.
///
/// Fails if a subscriber is already installed.
///
/// ```rust,ignore
/// let config = appmon::config::load_config(&cwd, Overrides::from_env())?;
/// let _guard = appmon::telemetry::init_logging(&config.logging_config()?)?;
/// ```
pub fn init_logging(config: &LoggingConfig) -> io::Result<LoggingGuard> {
    let span_events = if config.span_events {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let fmt_layer = fmt::layer()
        .with_ansi(config.ansi)
        .with_target(config.include_target)
        .with_file(config.include_file_line)
        .with_line_number(config.include_file_line)
        .with_span_events(span_events);

    let registry = tracing_subscriber::registry().with(config.env_filter());
    let result = if config.compact {
        registry.with(fmt_layer.compact()).try_init()
    } else {
        registry.with(fmt_layer).try_init()
    };
    result.map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

    Ok(LoggingGuard { _private: () })
}

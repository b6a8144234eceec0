// ABOUTME: Structured logging initialization built on tracing-subscriber
// ABOUTME: Level and format come from the environment with sensible defaults
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Readiness Intelligence

use std::env;

use tracing_subscriber::EnvFilter;

use crate::errors::{AppError, AppResult};

/// Output format for log events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-line output for development
    Pretty,
    /// Single-line output for terminals
    Compact,
    /// Newline-delimited JSON for log shippers
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> AppResult<Self> {
        match value.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(AppError::config(format!("unknown log format '{other}'"))),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `readiness_engine=debug`
    pub level: String,
    /// Event output format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormat::Compact,
        }
    }
}

impl LoggingConfig {
    /// Build from `RUST_LOG` and `LOG_FORMAT`, falling back to defaults
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when `LOG_FORMAT` names an unknown format.
    pub fn from_env() -> AppResult<Self> {
        let defaults = Self::default();
        let level = env::var("RUST_LOG").unwrap_or(defaults.level);
        let format = match env::var("LOG_FORMAT") {
            Ok(value) => LogFormat::parse(&value)?,
            Err(_) => defaults.format,
        };
        Ok(Self { level, format })
    }
}

/// Install the global tracing subscriber
///
/// Call once at process start; later calls fail because the global
/// subscriber is already set.
///
/// # Errors
///
/// Returns `ConfigError` when the filter directive is invalid or a
/// subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> AppResult<()> {
    let filter = EnvFilter::try_new(&config.level)
        .map_err(|e| AppError::config(format!("invalid log filter '{}': {e}", config.level)))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match config.format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(|e| AppError::config(format!("failed to install subscriber: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_formats() {
        assert_eq!(LogFormat::parse("pretty").unwrap(), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("JSON").unwrap(), LogFormat::Json);
        assert!(LogFormat::parse("xml").is_err());
    }
}

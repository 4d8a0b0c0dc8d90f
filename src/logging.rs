//! Structured logging setup.
//!
//! Everything in the crate logs through `tracing` with structured fields;
//! this module installs the subscriber once at start-up. Output is pretty
//! text for a terminal or one JSON object per line for log collectors.
//!
//! | Variable                    | Default  | Meaning                           |
//! |-----------------------------|----------|-----------------------------------|
//! | `EDGE_LOG_LEVEL`            | `info`   | trace/debug/info/warn/error       |
//! | `EDGE_LOG_FORMAT`           | `pretty` | `pretty` or `json`                |
//! | `EDGE_LOG_TARGET_FILTER`    | unset    | extra directives, comma-separated |
//! | `EDGE_LOG_INCLUDE_LOCATION` | `false`  | add file:line to events           |
//! | `EDGE_LOG_ASYNC`            | `false`  | write through a background thread |
//!
//! `RUST_LOG`, when set, replaces the level from `EDGE_LOG_LEVEL`.

use anyhow::{Context, Result};
use std::env;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// trace/debug/info/warn/error
    pub log_level: String,
    pub format: LogFormat,
    /// Extra filter directives, comma-separated (e.g. `edgeserve::rpc=debug`)
    pub target_filter: Option<String>,
    /// Include file:line location
    pub include_location: bool,
    /// Write through `tracing-appender`'s non-blocking worker
    pub async_logging: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            format: LogFormat::Pretty,
            target_filter: None,
            include_location: false,
            async_logging: false,
        }
    }
}

impl LogConfig {
    /// Parse configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`LogConfig::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            log_level: lookup("EDGE_LOG_LEVEL").unwrap_or(defaults.log_level),
            format: lookup("EDGE_LOG_FORMAT")
                .map(|s| LogFormat::parse(&s))
                .unwrap_or(defaults.format),
            target_filter: lookup("EDGE_LOG_TARGET_FILTER").filter(|s| !s.trim().is_empty()),
            include_location: lookup("EDGE_LOG_INCLUDE_LOCATION")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.include_location),
            async_logging: lookup("EDGE_LOG_ASYNC")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.async_logging),
        }
    }

    fn level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    fn env_filter(&self) -> EnvFilter {
        let mut filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level().as_str()));
        if let Some(targets) = &self.target_filter {
            for directive in targets.split(',').map(str::trim).filter(|d| !d.is_empty()) {
                match directive.parse() {
                    Ok(d) => filter = filter.add_directive(d),
                    Err(_) => eprintln!("Warning: Invalid log filter directive: {directive}"),
                }
            }
        }
        filter
    }
}

fn fmt_layer<S, W>(config: &LogConfig, writer: W) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    W: for<'w> tracing_subscriber::fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
    }
}

/// Install the global subscriber.
///
/// With `async_logging` the returned guard must be held until exit, or
/// buffered lines are lost.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_logging_with_config(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let registry = tracing_subscriber::registry().with(config.env_filter());

    if config.async_logging {
        let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stdout());
        registry
            .with(fmt_layer(config, non_blocking))
            .try_init()
            .context("Failed to initialize async logging")?;
        Ok(Some(guard))
    } else {
        registry
            .with(fmt_layer(config, std::io::stdout))
            .try_init()
            .context("Failed to initialize sync logging")?;
        Ok(None)
    }
}

/// [`init_logging_with_config`] with [`LogConfig::from_env`].
pub fn init_logging() -> Result<Option<WorkerGuard>> {
    init_logging_with_config(&LogConfig::from_env())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("bogus"), LogFormat::Pretty);
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = LogConfig::from_lookup(|_| None);
        assert_eq!(config, LogConfig::default());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let vars: HashMap<&str, &str> = [
            ("EDGE_LOG_LEVEL", "debug"),
            ("EDGE_LOG_FORMAT", "json"),
            ("EDGE_LOG_TARGET_FILTER", "edgeserve::rpc=trace"),
            ("EDGE_LOG_INCLUDE_LOCATION", "true"),
            ("EDGE_LOG_ASYNC", "not-a-bool"),
        ]
        .into_iter()
        .collect();
        let config = LogConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.target_filter.as_deref(), Some("edgeserve::rpc=trace"));
        assert!(config.include_location);
        assert!(!config.async_logging);
        assert_eq!(config.level(), Level::DEBUG);
    }
}

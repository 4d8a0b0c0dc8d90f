//! # Runtime Configuration Module
//!
//! Settings for the `serve` command, merged from four sources. Later sources
//! win:
//!
//! 1. built-in defaults
//! 2. a JSON-lines config file: every non-empty line is a JSON object whose
//!    keys are merged over the previous lines
//! 3. `EDGE_*` environment variables
//! 4. command-line flags (applied by the CLI)
//!
//! ## Environment Variables
//!
//! | Variable               | Field             | Default        |
//! |------------------------|-------------------|----------------|
//! | `EDGE_HTTP_ADDR`       | `http_addr`       | `0.0.0.0:8080` |
//! | `EDGE_RPC_ADDR`        | `rpc_addr`        | `0.0.0.0:5001` |
//! | `EDGE_BROWSE_ROOT`     | `browse_root`     | unset          |
//! | `EDGE_BROWSE_PREFIX`   | `browse_prefix`   | `/files`       |
//! | `EDGE_HTTP_RECV_BUFFER`| `http_recv_buffer`| `2048`         |
//! | `EDGE_CHUNK_SIZE`      | `chunk_size`      | `2048`         |
//! | `EDGE_RPC_BUFFER_SIZE` | `rpc_buffer_size` | `1024`         |
//! | `EDGE_EXPOSE_FNDOC`    | `expose_fndoc`    | `true`         |
//! | `EDGE_TICK_MS`         | `tick_ms`         | `10`           |
//!
//! Unparseable numeric or boolean values are reported with a warning and
//! the previous value is kept.
//!
//! ## Usage
//!
//! ```rust
//! use edgeserve::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! println!("HTTP on {}", config.http_addr);
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

/// Runtime configuration for both servers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub http_addr: String,
    pub rpc_addr: String,
    /// Directory served by the file browser; no browser when unset
    pub browse_root: Option<PathBuf>,
    pub browse_prefix: String,
    /// Bytes per socket read on HTTP connections
    pub http_recv_buffer: usize,
    /// Bytes per chunk when streaming files
    pub chunk_size: usize,
    /// RPC receive buffer; longer datagrams are truncated
    pub rpc_buffer_size: usize,
    /// Attach handler docs to failed RPC replies
    pub expose_fndoc: bool,
    /// Idle sleep of the service loop in milliseconds
    pub tick_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:8080".to_string(),
            rpc_addr: "0.0.0.0:5001".to_string(),
            browse_root: None,
            browse_prefix: "/files".to_string(),
            http_recv_buffer: 2048,
            chunk_size: 2048,
            rpc_buffer_size: 1024,
            expose_fndoc: true,
            tick_ms: 10,
        }
    }
}

fn parse_or_keep<T: FromStr + Copy>(key: &str, raw: &str, current: T) -> T {
    match raw.trim().parse() {
        Ok(v) => v,
        Err(_) => {
            warn!(key = %key, value = %raw, "Ignoring unparseable config value");
            current
        }
    }
}

impl RuntimeConfig {
    /// Defaults overlaid with `EDGE_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_from(|key| env::var(key).ok());
        config
    }

    /// Defaults, then the JSON-lines file at `path` (if given), then the
    /// environment.
    ///
    /// A missing file is reported and skipped; a malformed line is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = path {
            match fs::read_to_string(path) {
                Ok(text) => {
                    config = config
                        .merge_json_lines(&text)
                        .with_context(|| format!("invalid config file {}", path.display()))?;
                    info!(path = %path.display(), "Config file loaded");
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!(path = %path.display(), "Config file not found, using defaults");
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("cannot read config file {}", path.display()))
                }
            }
        }
        config.apply_env_from(|key| env::var(key).ok());
        Ok(config)
    }

    /// Merge each JSON object line over the current settings.
    pub fn merge_json_lines(self, text: &str) -> Result<Self> {
        let mut merged: Map<String, Value> = match serde_json::to_value(&self)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let value: Value = serde_json::from_str(line)
                .with_context(|| format!("line {} is not valid JSON", lineno + 1))?;
            let Value::Object(fields) = value else {
                anyhow::bail!("line {} is not a JSON object", lineno + 1);
            };
            merged.extend(fields);
        }
        let mut config: Self =
            serde_json::from_value(Value::Object(merged)).context("config values have the wrong type")?;
        config.browse_prefix = normalize_prefix(&config.browse_prefix);
        Ok(config)
    }

    /// Overlay `EDGE_*` variables read through `lookup`.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("EDGE_HTTP_ADDR") {
            self.http_addr = v;
        }
        if let Some(v) = lookup("EDGE_RPC_ADDR") {
            self.rpc_addr = v;
        }
        if let Some(v) = lookup("EDGE_BROWSE_ROOT") {
            self.browse_root = (!v.trim().is_empty()).then(|| PathBuf::from(v));
        }
        if let Some(v) = lookup("EDGE_BROWSE_PREFIX") {
            self.browse_prefix = normalize_prefix(&v);
        }
        if let Some(v) = lookup("EDGE_HTTP_RECV_BUFFER") {
            self.http_recv_buffer = parse_or_keep("EDGE_HTTP_RECV_BUFFER", &v, self.http_recv_buffer);
        }
        if let Some(v) = lookup("EDGE_CHUNK_SIZE") {
            self.chunk_size = parse_or_keep("EDGE_CHUNK_SIZE", &v, self.chunk_size);
        }
        if let Some(v) = lookup("EDGE_RPC_BUFFER_SIZE") {
            self.rpc_buffer_size = parse_or_keep("EDGE_RPC_BUFFER_SIZE", &v, self.rpc_buffer_size);
        }
        if let Some(v) = lookup("EDGE_EXPOSE_FNDOC") {
            self.expose_fndoc = parse_or_keep("EDGE_EXPOSE_FNDOC", &v, self.expose_fndoc);
        }
        if let Some(v) = lookup("EDGE_TICK_MS") {
            self.tick_ms = parse_or_keep("EDGE_TICK_MS", &v, self.tick_ms);
        }
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

/// Leading `/`, no trailing `/`; empty means `/`.
pub fn normalize_prefix(prefix: &str) -> String {
    format!("/{}", prefix.trim().trim_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let c = RuntimeConfig::default();
        assert_eq!(c.http_addr, "0.0.0.0:8080");
        assert_eq!(c.rpc_addr, "0.0.0.0:5001");
        assert_eq!(c.browse_prefix, "/files");
        assert_eq!(c.chunk_size, 2048);
        assert_eq!(c.rpc_buffer_size, 1024);
        assert!(c.expose_fndoc);
        assert_eq!(c.tick(), Duration::from_millis(10));
    }

    #[test]
    fn test_json_lines_merge_in_order() {
        let text = "{\"http_addr\": \"127.0.0.1:9000\", \"tick_ms\": 50}\n\n{\"tick_ms\": 20, \"browse_prefix\": \"data/\"}\n";
        let c = RuntimeConfig::default().merge_json_lines(text).unwrap();
        assert_eq!(c.http_addr, "127.0.0.1:9000");
        assert_eq!(c.tick_ms, 20);
        assert_eq!(c.browse_prefix, "/data");
        assert_eq!(c.rpc_addr, "0.0.0.0:5001");
    }

    #[test]
    fn test_json_lines_rejects_bad_lines() {
        assert!(RuntimeConfig::default().merge_json_lines("[1,2]").is_err());
        assert!(RuntimeConfig::default().merge_json_lines("{oops").is_err());
        assert!(RuntimeConfig::default()
            .merge_json_lines("{\"tick_ms\": \"soon\"}")
            .is_err());
    }

    #[test]
    fn test_env_overlay() {
        let vars: HashMap<&str, &str> = [
            ("EDGE_RPC_ADDR", "127.0.0.1:6000"),
            ("EDGE_BROWSE_ROOT", "/srv/data"),
            ("EDGE_BROWSE_PREFIX", "share"),
            ("EDGE_EXPOSE_FNDOC", "false"),
            ("EDGE_CHUNK_SIZE", "lots"),
        ]
        .into_iter()
        .collect();
        let mut c = RuntimeConfig::default();
        c.apply_env_from(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(c.rpc_addr, "127.0.0.1:6000");
        assert_eq!(c.browse_root, Some(PathBuf::from("/srv/data")));
        assert_eq!(c.browse_prefix, "/share");
        assert!(!c.expose_fndoc);
        assert_eq!(c.chunk_size, 2048);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let c = RuntimeConfig::load(Some(&dir.path().join("absent.jsonl"))).unwrap();
        assert_eq!(c.browse_prefix, RuntimeConfig::from_env().browse_prefix);
    }

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("files"), "/files");
        assert_eq!(normalize_prefix("/files/"), "/files");
        assert_eq!(normalize_prefix(""), "/");
    }
}

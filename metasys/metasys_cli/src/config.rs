//! Configuration file for the `metasys` tool.
//!
//! Every field has a default, so an empty file (or no file) is valid:
//!
//! ```toml
//! log_level = "info"
//! buffer_size = 8192
//!
//! [serve]
//! timeout_ms = 1000
//! max_events = 16
//!
//! [serve.listen]
//! backlog = 64
//! reuse_addr = true
//! ```

use metasys_core::{Error, LogLevel, Result};
use metasys_net::ListenOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Settings shared by all subcommands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Level passed to the logger unless `--log-level` overrides it
    #[serde(default)]
    pub log_level: LogLevel,

    /// Size of the copy buffer used by `cat` and `serve`
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Settings for `serve`
    #[serde(default)]
    pub serve: ServeConfig,
}

/// Settings for the echo server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServeConfig {
    /// Listener options; the socket is always made non-blocking
    #[serde(default)]
    pub listen: ListenOptions,

    /// Epoll wait timeout, -1 to block
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: i32,

    /// Events collected per wait
    #[serde(default = "default_max_events")]
    pub max_events: usize,
}

fn default_buffer_size() -> usize {
    4096
}

fn default_timeout_ms() -> i32 {
    -1
}

fn default_max_events() -> usize {
    32
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            listen: ListenOptions::default(),
            timeout_ms: default_timeout_ms(),
            max_events: default_max_events(),
        }
    }
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            buffer_size: default_buffer_size(),
            serve: ServeConfig::default(),
        }
    }
}

impl CliConfig {
    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Pretty-printed JSON form.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Reject values no subcommand can work with.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(Error::Config("buffer_size must be positive".to_string()));
        }
        if self.serve.max_events == 0 {
            return Err(Error::Config("serve.max_events must be positive".to_string()));
        }
        if self.serve.timeout_ms < -1 {
            return Err(Error::Config(format!(
                "serve.timeout_ms must be -1 or more, got {}",
                self.serve.timeout_ms
            )));
        }
        self.serve.listen.validate()
    }
}

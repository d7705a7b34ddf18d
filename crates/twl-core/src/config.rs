//! Listener configuration, loadable from TOML.
//!
//! Every field has a default, so an empty file (or no file) yields the
//! settings of the public Twitch chat endpoint:
//!
//! ```toml
//! server = "irc.chat.twitch.tv"
//! port = 6667
//! read_buffer_size = 16384
//! poll_timeout_ms = 1000
//! connect_timeout_secs = 10
//! write_timeout_ms = 1000
//! log_format = "raw"
//!
//! [rate_limit]
//! messages = 800
//! window_secs = 60
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Default chat server host.
pub const DEFAULT_SERVER: &str = "irc.chat.twitch.tv";

/// Default plain-text IRC port.
pub const DEFAULT_PORT: u16 = 6667;

/// Maximum bytes taken from a connection per read.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 16384;

/// How log lines are written to each channel's file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Received text is appended verbatim
    #[default]
    Raw,
    /// Each appended chunk is prefixed with a UTC timestamp
    Timestamped,
}

/// Global message budget: at most `messages` loop ticks per `window_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub messages: u32,
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            messages: 800,
            window_secs: 60,
        }
    }
}

/// Settings for connecting, polling and pacing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Chat server host name
    pub server: String,
    /// Chat server port
    pub port: u16,
    /// Bytes read from a ready connection at once
    pub read_buffer_size: usize,
    /// Upper bound on one readiness wait
    pub poll_timeout_ms: u64,
    /// Upper bound on opening one connection
    pub connect_timeout_secs: u64,
    /// Upper bound on one handshake or keep-alive write
    pub write_timeout_ms: u64,
    pub log_format: LogFormat,
    pub rate_limit: RateLimitConfig,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            port: DEFAULT_PORT,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            poll_timeout_ms: 1000,
            connect_timeout_secs: 10,
            write_timeout_ms: 1000,
            log_format: LogFormat::Raw,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl ListenerConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(s: &str) -> CoreResult<Self> {
        let config: ListenerConfig =
            toml::from_str(s).map_err(|e| CoreError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CoreError::ConfigRead {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Checks that every value can drive the listener.
    pub fn validate(&self) -> CoreResult<()> {
        if self.server.trim().is_empty() {
            return Err(invalid("server", "must not be empty"));
        }
        if self.port == 0 {
            return Err(invalid("port", "must be non-zero"));
        }
        if self.read_buffer_size == 0 {
            return Err(invalid("read_buffer_size", "must be non-zero"));
        }
        if self.poll_timeout_ms == 0 {
            return Err(invalid("poll_timeout_ms", "must be non-zero"));
        }
        if self.write_timeout_ms == 0 {
            return Err(invalid("write_timeout_ms", "must be non-zero"));
        }
        if self.connect_timeout_secs == 0 {
            return Err(invalid("connect_timeout_secs", "must be non-zero"));
        }
        if self.rate_limit.messages == 0 {
            return Err(invalid("rate_limit.messages", "must be non-zero"));
        }
        if self.rate_limit.window_secs == 0 {
            return Err(invalid("rate_limit.window_secs", "must be non-zero"));
        }
        Ok(())
    }

    /// Returns the `host:port` address to connect to.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server, self.port)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

fn invalid(field: &'static str, reason: &str) -> CoreError {
    CoreError::InvalidConfig {
        field,
        reason: reason.to_string(),
    }
}

//! Server configuration.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, SockError};

/// Environment variable overriding [`ServerConfig::bind_addr`]
pub const ENV_HOST: &str = "SOCKET_HOST";
/// Environment variable overriding [`ServerConfig::port`]
pub const ENV_PORT: &str = "SOCKET_PORT";
/// Environment variable overriding [`ServerConfig::max_buffer_size`]
pub const ENV_BUFFER_SIZE: &str = "SOCKET_BUFFER_SIZE";

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the listener binds to, also echoed in the handshake response
    pub bind_addr: String,
    pub port: u16,
    /// Upper bound for a single socket read (not for a whole message)
    pub max_buffer_size: usize,
    /// Pause after a loop pass that did nothing. `None` busy-polls.
    pub idle_sleep: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 9000,
            max_buffer_size: 2048,
            idle_sleep: None,
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `SOCKET_HOST`, `SOCKET_PORT` and
    /// `SOCKET_BUFFER_SIZE` when set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(host) = lookup(ENV_HOST) {
            config.bind_addr = host;
        }
        if let Some(port) = lookup(ENV_PORT) {
            config.port = parse_var(ENV_PORT, &port)?;
        }
        if let Some(size) = lookup(ENV_BUFFER_SIZE) {
            config.max_buffer_size = parse_var(ENV_BUFFER_SIZE, &size)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bind_addr.trim().is_empty() {
            return Err(SockError::config("bind address is empty"));
        }
        if self.max_buffer_size == 0 {
            return Err(SockError::config("max_buffer_size must be at least 1"));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| SockError::config(format!("{}={:?} is not valid", key, value)))
}

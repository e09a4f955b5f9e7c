//! Server Configuration
//!
//! Defaults suit local play; each field can be overridden from the
//! environment.

use std::net::SocketAddr;
use std::time::Duration;

/// Env var for the listen address.
pub const ENV_BIND_ADDR: &str = "EXPLODING_CATS_BIND_ADDR";
/// Env var for the connection cap.
pub const ENV_MAX_CONNECTIONS: &str = "EXPLODING_CATS_MAX_CONNECTIONS";
/// Env var for the idle timeout in seconds.
pub const ENV_IDLE_TIMEOUT_SECS: &str = "EXPLODING_CATS_IDLE_TIMEOUT_SECS";
/// Env var for the per-connection outbound queue size.
pub const ENV_CHANNEL_CAPACITY: &str = "EXPLODING_CATS_CHANNEL_CAPACITY";

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Connections silent for longer than this are dropped.
    pub idle_timeout: Duration,
    /// Outbound messages buffered per connection.
    pub channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 1000,
            idle_timeout: Duration::from_secs(300),
            channel_capacity: 64,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Variable set to something unparsable.
    #[error("Invalid value for {var}: {value:?} ({reason})")]
    InvalidValue {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
        /// Parse failure.
        reason: String,
    },

    /// Variable parsed but is out of range.
    #[error("{var} must be greater than zero")]
    MustBePositive {
        /// Variable name.
        var: &'static str,
    },
}

impl ServerConfig {
    /// Read overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through `lookup`; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_BIND_ADDR) {
            config.bind_addr = parse(ENV_BIND_ADDR, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_CONNECTIONS) {
            config.max_connections = positive(ENV_MAX_CONNECTIONS, parse(ENV_MAX_CONNECTIONS, &raw)?)?;
        }
        if let Some(raw) = lookup(ENV_IDLE_TIMEOUT_SECS) {
            let secs: u64 = parse(ENV_IDLE_TIMEOUT_SECS, &raw)?;
            if secs == 0 {
                return Err(ConfigError::MustBePositive { var: ENV_IDLE_TIMEOUT_SECS });
            }
            config.idle_timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = lookup(ENV_CHANNEL_CAPACITY) {
            config.channel_capacity = positive(ENV_CHANNEL_CAPACITY, parse(ENV_CHANNEL_CAPACITY, &raw)?)?;
        }

        Ok(config)
    }
}

fn parse<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
        var,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn positive(var: &'static str, value: usize) -> Result<usize, ConfigError> {
    if value == 0 {
        Err(ConfigError::MustBePositive { var })
    } else {
        Ok(value)
    }
}

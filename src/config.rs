//! Server configuration parsed from environment variables.
//!
//! All variables are optional:
//! - `HOST`: bind address, default `0.0.0.0`
//! - `PORT`: bind port, default `9000`
//! - `OUTBOUND_QUEUE_CAPACITY`: per-connection outbound queue depth, default 64
//! - `MAX_USERNAME_LEN`: longest accepted display name in chars, default 64
//! - `SHUTDOWN_GRACE_SECS`: how long shutdown waits for connections, default 5
//! - `LOG_LEVEL`: tracing filter used when `RUST_LOG` is unset, default `info`

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 9000;
pub const DEFAULT_OUTBOUND_QUEUE_CAPACITY: usize = 64;
pub const DEFAULT_MAX_USERNAME_LEN: usize = 64;
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
    #[error("{var} must be at least 1")]
    Zero { var: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub outbound_queue_capacity: usize,
    pub max_username_len: usize,
    pub shutdown_grace: Duration,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            outbound_queue_capacity: DEFAULT_OUTBOUND_QUEUE_CAPACITY,
            max_username_len: DEFAULT_MAX_USERNAME_LEN,
            shutdown_grace: Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS),
            log_level: DEFAULT_LOG_LEVEL.to_owned(),
        }
    }
}

impl Config {
    /// Build config from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any variable is set but cannot be parsed, or
    /// if a size that must be positive is zero.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let host = parse_var(&lookup, "HOST", defaults.host)?;
        let port = parse_var(&lookup, "PORT", defaults.port)?;
        let outbound_queue_capacity =
            non_zero(parse_var(&lookup, "OUTBOUND_QUEUE_CAPACITY", defaults.outbound_queue_capacity)?, "OUTBOUND_QUEUE_CAPACITY")?;
        let max_username_len =
            non_zero(parse_var(&lookup, "MAX_USERNAME_LEN", defaults.max_username_len)?, "MAX_USERNAME_LEN")?;
        let shutdown_grace =
            Duration::from_secs(parse_var(&lookup, "SHUTDOWN_GRACE_SECS", DEFAULT_SHUTDOWN_GRACE_SECS)?);
        let log_level = lookup("LOG_LEVEL")
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.log_level);

        Ok(Self { host, port, outbound_queue_capacity, max_username_len, shutdown_grace, log_level })
    }

    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
    }
}

fn non_zero(value: usize, var: &'static str) -> Result<usize, ConfigError> {
    if value == 0 { Err(ConfigError::Zero { var }) } else { Ok(value) }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

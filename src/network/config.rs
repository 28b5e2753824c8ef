//! Server Configuration
//!
//! Read once at startup from environment variables.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;

use thiserror::Error;

use crate::DEFAULT_PORT;

/// Default request body limit (bytes).
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024;

/// How `/move` treats missing or non-numeric `x`/`y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordinatePolicy {
    /// Reject with `400`.
    #[default]
    Strict,
    /// Substitute the source-space centre for the bad axis.
    Lenient,
}

impl fmt::Display for CoordinatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Lenient => write!(f, "lenient"),
        }
    }
}

impl FromStr for CoordinatePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            other => Err(ConfigError::InvalidPolicy(other.to_string())),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// `PORT` is not a valid port number.
    #[error("invalid PORT value: {0:?}")]
    InvalidPort(String),
    /// Unknown coordinate policy name.
    #[error("invalid coordinate policy: {0:?} (expected \"strict\" or \"lenient\")")]
    InvalidPolicy(String),
    /// Body limit is not a positive integer.
    #[error("invalid body limit: {0:?}")]
    InvalidBodyLimit(String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Missing-coordinate policy for `/move`.
    pub coordinate_policy: CoordinatePolicy,
    /// Largest accepted request body.
    pub max_body_bytes: usize,
    /// Deployment label, logged at startup.
    pub environment: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            coordinate_policy: CoordinatePolicy::default(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            environment: "development".to_string(),
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables.
    ///
    /// - `PORT`: listen port (binds `0.0.0.0`)
    /// - `BRIDGE_COORDINATE_POLICY`: `strict` or `lenient`
    /// - `BRIDGE_MAX_BODY_BYTES`: request body limit
    /// - `BRIDGE_ENV`: deployment label
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(port) = lookup("PORT") {
            let port: u16 = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(port.clone()))?;
            config.bind_addr.set_port(port);
        }

        if let Some(policy) = lookup("BRIDGE_COORDINATE_POLICY") {
            config.coordinate_policy = policy.parse()?;
        }

        if let Some(limit) = lookup("BRIDGE_MAX_BODY_BYTES") {
            config.max_body_bytes = match limit.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => return Err(ConfigError::InvalidBodyLimit(limit)),
            };
        }

        if let Some(env) = lookup("BRIDGE_ENV") {
            config.environment = env;
        }

        Ok(config)
    }
}

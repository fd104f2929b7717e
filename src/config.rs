//! Service configuration.
//!
//! Loaded from TOML; every field has a default, so an empty document is a
//! valid configuration:
//!
//! ```toml
//! service_name = "matchbox"
//!
//! [server]
//! address = "0.0.0.0:8080"
//!
//! [metrics]
//! counter_name = "matchbox_requests"
//!
//! [log]
//! level = "info"
//! format = "json"
//! ```
//!
//! `MATCHBOX_ADDRESS` and `MATCHBOX_LOG_LEVEL` override the file when set
//! (see [`Config::apply_env`]).

use std::env;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{ConfigError, Error};
use crate::telemetry::REQUESTS_COUNTER;

pub const ENV_ADDRESS: &str = "MATCHBOX_ADDRESS";
pub const ENV_LOG_LEVEL: &str = "MATCHBOX_LOG_LEVEL";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Written by the root handler as the identification body.
    pub service_name: String,
    pub server: ServerConfig,
    pub metrics: MetricsConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub address: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsConfig {
    pub counter_name: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// A `tracing` level: trace, debug, info, warn or error.
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "matchbox".to_owned(),
            server: ServerConfig::default(),
            metrics: MetricsConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { address: "0.0.0.0:8080".to_owned() }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { counter_name: REQUESTS_COUNTER.to_owned() }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".to_owned(), format: LogFormat::Text }
    }
}

impl Config {
    /// Parses and validates a TOML document.
    pub fn from_toml(doc: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(doc)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates the file at `path`, then applies
    /// environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let wrap = |source: ConfigError| Error::Config { path: path.to_owned(), source };

        let doc = std::fs::read_to_string(path).map_err(|e| wrap(e.into()))?;
        let mut config = Self::from_toml(&doc).map_err(wrap)?;
        config.apply_env().map_err(wrap)?;
        Ok(config)
    }

    /// Applies `MATCHBOX_ADDRESS` / `MATCHBOX_LOG_LEVEL` and re-validates.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(address) = env::var(ENV_ADDRESS) {
            self.server.address = address;
        }
        if let Ok(level) = env::var(ENV_LOG_LEVEL) {
            self.log.level = level;
        }
        self.validate()
    }

    /// The parsed listen address.
    pub fn socket_addr(&self) -> Result<SocketAddr, Error> {
        self.server
            .address
            .parse()
            .map_err(|_| Error::InvalidAddress(self.server.address.clone()))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.address.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Invalid {
                field: "server.address",
                reason: format!("`{}` is not a host:port socket address", self.server.address),
            });
        }
        if tracing::Level::from_str(&self.log.level).is_err() {
            return Err(ConfigError::Invalid {
                field: "log.level",
                reason: format!("unknown level `{}`", self.log.level),
            });
        }
        if self.metrics.counter_name.is_empty() {
            return Err(ConfigError::Invalid {
                field: "metrics.counter_name",
                reason: "must not be empty".to_owned(),
            });
        }
        Ok(())
    }
}

//! Unified error type.

use std::path::PathBuf;

/// The error type returned by the crate's fallible operations.
///
/// Request-level outcomes (404, a Group that could not be resolved) are never
/// `Error`s: they are HTTP responses, or simply an entity missing from the
/// request context. This type covers startup and infrastructure failures:
/// reading configuration, binding a port, installing telemetry.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config file {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },

    #[error("invalid listen address `{0}`")]
    InvalidAddress(String),

    #[error("metrics: {0}")]
    Metrics(String),

    #[error("logging: {0}")]
    Logging(String),
}

/// Why a configuration document was rejected.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Read(#[from] std::io::Error),

    #[error(transparent)]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

//! Global `tracing` subscriber setup.

use tracing_subscriber::EnvFilter;

use crate::config::{LogConfig, LogFormat};
use crate::error::Error;

/// Installs the process-wide subscriber described by `config`.
///
/// `RUST_LOG`, when set, takes precedence over `config.level`. Fails if a
/// global subscriber was already installed.
pub fn init(config: &LogConfig) -> Result<(), Error> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| Error::Logging(e.to_string()))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    installed.map_err(|e| Error::Logging(e.to_string()))
}

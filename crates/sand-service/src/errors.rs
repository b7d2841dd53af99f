//! Startup errors for the SAND service binary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] sand::error::ConfigError),

    #[error("Invalid bind address: {0}")]
    BindAddress(String),

    #[error("Metrics error: {0}")]
    Metrics(String),
}

//! Service binary configuration.

use crate::errors::ServerError;
use sand::config::{split_list, ServiceConfig};
use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;

/// Default bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8090";

/// Default scopes required by the protected routes.
pub const DEFAULT_PROTECTED_SCOPES: &str = "read";

/// Default action checked for the protected routes.
pub const DEFAULT_PROTECTED_ACTION: &str = "read";

/// Binary configuration: the SAND Service role plus HTTP server settings.
#[derive(Debug, Clone)]
pub struct Config {
    /// Service-role credentials and verification settings.
    pub service: ServiceConfig,

    /// Server bind address.
    pub bind_address: SocketAddr,

    /// Scopes a caller's token must carry for the protected routes.
    pub protected_scopes: Vec<String>,

    /// Action verified for the protected routes.
    pub protected_action: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// See [`Config::from_vars`].
    pub fn from_env() -> Result<Self, ServerError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a map of variables (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Config` for an invalid SAND configuration and
    /// `ServerError::BindAddress` if `SAND_BIND_ADDRESS` does not parse.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ServerError> {
        let service = ServiceConfig::from_vars(vars)?;

        let bind_str = vars
            .get("SAND_BIND_ADDRESS")
            .map_or(DEFAULT_BIND_ADDRESS, String::as_str);
        let bind_address = bind_str
            .parse()
            .map_err(|e| ServerError::BindAddress(format!("'{bind_str}': {e}")))?;

        let protected_scopes = split_list(
            vars.get("SAND_PROTECTED_SCOPES")
                .map_or(DEFAULT_PROTECTED_SCOPES, String::as_str),
        );

        let protected_action = vars
            .get("SAND_PROTECTED_ACTION")
            .cloned()
            .unwrap_or_else(|| DEFAULT_PROTECTED_ACTION.to_string());

        Ok(Self {
            service,
            bind_address,
            protected_scopes,
            protected_action,
        })
    }
}

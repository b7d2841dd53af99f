//! Client and Service configuration.
//!
//! Configuration is loaded from environment variables, or built directly in
//! code. The client secret is redacted in Debug output.

use crate::backoff::DEFAULT_RETRY_COUNT;
use crate::cache::{DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL};
use crate::cache_key::DEFAULT_CACHE_ROOT;
use crate::error::ConfigError;
use crate::secret::{ExposeSecret, SecretString};
use reqwest::Url;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default token endpoint path on the authorization server.
pub const DEFAULT_TOKEN_PATH: &str = "/oauth2/token";

/// Default verification endpoint path on the authorization server.
pub const DEFAULT_TOKEN_VERIFY_PATH: &str = "/warden/token/allowed";

/// Default scopes for the Service's own access token.
pub const DEFAULT_SERVICE_SCOPES: &[&str] = &["hydra"];

/// Default HTTP request timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Client-role configuration: credentials plus cache and retry tuning.
#[derive(Clone)]
pub struct ClientConfig {
    /// OAuth client ID registered with the authorization server.
    pub client_id: String,

    /// OAuth client secret.
    pub client_secret: SecretString,

    /// Authorization server base URL (e.g., `https://auth.example.com`).
    pub token_site: String,

    /// Token endpoint path, appended to `token_site`.
    pub token_path: String,

    /// Root segment of every cache key.
    pub cache_root: String,

    /// Retry count used when callers ask for the default.
    pub default_retries: u32,

    /// Maximum entries per cache.
    pub cache_capacity: u64,

    /// Write-time TTL of cache entries.
    pub cache_ttl: Duration,

    /// HTTP request timeout.
    pub http_timeout: Duration,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("token_site", &self.token_site)
            .field("token_path", &self.token_path)
            .field("cache_root", &self.cache_root)
            .field("default_retries", &self.default_retries)
            .field("cache_capacity", &self.cache_capacity)
            .field("cache_ttl", &self.cache_ttl)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl ClientConfig {
    /// Create a configuration with default path, cache and retry settings.
    #[must_use]
    pub fn new(client_id: String, client_secret: SecretString, token_site: String) -> Self {
        Self {
            client_id,
            client_secret,
            token_site,
            token_path: DEFAULT_TOKEN_PATH.to_string(),
            cache_root: DEFAULT_CACHE_ROOT.to_string(),
            default_retries: DEFAULT_RETRY_COUNT,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_ttl: DEFAULT_CACHE_TTL,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    /// Set the token endpoint path.
    #[must_use]
    pub fn with_token_path(mut self, token_path: impl Into<String>) -> Self {
        self.token_path = token_path.into();
        self
    }

    /// Set the cache key root.
    #[must_use]
    pub fn with_cache_root(mut self, cache_root: impl Into<String>) -> Self {
        self.cache_root = cache_root.into();
        self
    }

    /// Set the default retry count.
    #[must_use]
    pub fn with_default_retries(mut self, retries: u32) -> Self {
        self.default_retries = retries;
        self
    }

    /// Set cache capacity and write-time TTL.
    #[must_use]
    pub fn with_cache(mut self, capacity: u64, ttl: Duration) -> Self {
        self.cache_capacity = capacity;
        self.cache_ttl = ttl;
        self
    }

    /// Set the HTTP timeout.
    #[must_use]
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// See [`ClientConfig::from_vars`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a map of variables (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if a required variable is absent,
    /// `ConfigError::InvalidValue` if a numeric variable does not parse or is
    /// zero, and any error from [`ClientConfig::validate`].
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let client_id = required(vars, "SAND_CLIENT_ID")?;
        let client_secret = SecretString::from(required(vars, "SAND_CLIENT_SECRET")?);
        let token_site = required(vars, "SAND_TOKEN_SITE")?;

        let mut config = Self::new(client_id, client_secret, token_site);

        if let Some(path) = vars.get("SAND_TOKEN_PATH") {
            config.token_path.clone_from(path);
        }
        if let Some(root) = vars.get("SAND_CACHE_ROOT") {
            config.cache_root.clone_from(root);
        }

        config.default_retries =
            parse_positive(vars, "SAND_DEFAULT_RETRIES", DEFAULT_RETRY_COUNT)?;
        config.cache_capacity =
            parse_positive(vars, "SAND_CACHE_CAPACITY", DEFAULT_CACHE_CAPACITY)?;
        config.cache_ttl = Duration::from_secs(parse_positive(
            vars,
            "SAND_CACHE_TTL_SECONDS",
            DEFAULT_CACHE_TTL.as_secs(),
        )?);
        config.http_timeout = Duration::from_secs(parse_positive(
            vars,
            "SAND_HTTP_TIMEOUT_SECONDS",
            DEFAULT_HTTP_TIMEOUT.as_secs(),
        )?);

        config.validate()?;
        Ok(config)
    }

    /// Check required fields and the token endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingField` for an empty client id, secret,
    /// token site or token path, `ConfigError::InvalidValue` for a zero
    /// `default_retries`, and `ConfigError::InvalidUrl` if the token
    /// endpoint URL is malformed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_empty("client_id", &self.client_id)?;
        non_empty("client_secret", self.client_secret.expose_secret())?;
        non_empty("token_site", &self.token_site)?;
        non_empty("token_path", &self.token_path)?;
        if self.default_retries == 0 {
            return Err(ConfigError::InvalidValue(
                "default_retries must be at least 1".to_string(),
            ));
        }
        self.token_url().map(|_| ())
    }

    /// Full token endpoint URL (`token_site` + `token_path`).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUrl` if the joined URL does not parse.
    pub fn token_url(&self) -> Result<Url, ConfigError> {
        parse_url(&self.token_site, &self.token_path)
    }
}

/// Service-role configuration: the Service's own client credentials plus
/// what it verifies tokens for.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// Credentials and tuning for the Service's own access token.
    pub client: ClientConfig,

    /// Resource this Service protects.
    pub resource: String,

    /// Verification endpoint path, appended to `token_site`.
    pub token_verify_path: String,

    /// Scopes requested for the Service's own access token.
    pub service_scopes: Vec<String>,
}

impl ServiceConfig {
    /// Create a configuration with the default verification path and scopes.
    #[must_use]
    pub fn new(client: ClientConfig, resource: String) -> Self {
        Self {
            client,
            resource,
            token_verify_path: DEFAULT_TOKEN_VERIFY_PATH.to_string(),
            service_scopes: DEFAULT_SERVICE_SCOPES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }

    /// Set the verification endpoint path.
    #[must_use]
    pub fn with_token_verify_path(mut self, path: impl Into<String>) -> Self {
        self.token_verify_path = path.into();
        self
    }

    /// Set the scopes of the Service's own access token.
    #[must_use]
    pub fn with_service_scopes(mut self, scopes: Vec<String>) -> Self {
        self.service_scopes = scopes;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// See [`ServiceConfig::from_vars`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a map of variables (for testing).
    ///
    /// # Errors
    ///
    /// Returns any [`ClientConfig::from_vars`] error,
    /// `ConfigError::MissingEnvVar` if `SAND_RESOURCE` is absent, and any
    /// error from [`ServiceConfig::validate`].
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let client = ClientConfig::from_vars(vars)?;
        let resource = required(vars, "SAND_RESOURCE")?;

        let mut config = Self::new(client, resource);

        if let Some(path) = vars.get("SAND_TOKEN_VERIFY_PATH") {
            config.token_verify_path.clone_from(path);
        }
        if let Some(scopes) = vars.get("SAND_SERVICE_SCOPES") {
            config.service_scopes = split_list(scopes);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the client part, the resource and the verification URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingField` for an empty resource or
    /// verification path, `ConfigError::InvalidUrl` for a malformed
    /// verification URL, and any [`ClientConfig::validate`] error.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.client.validate()?;
        non_empty("resource", &self.resource)?;
        non_empty("token_verify_path", &self.token_verify_path)?;
        self.verify_url().map(|_| ())
    }

    /// Full verification endpoint URL (`token_site` + `token_verify_path`).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUrl` if the joined URL does not parse.
    pub fn verify_url(&self) -> Result<Url, ConfigError> {
        parse_url(&self.client.token_site, &self.token_verify_path)
    }
}

/// Split a comma- or whitespace-separated list, dropping empty items.
#[must_use]
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn non_empty(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingField(field.to_string()));
    }
    Ok(())
}

fn parse_positive<T>(
    vars: &HashMap<String, String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialEq + Default,
    T::Err: fmt::Display,
{
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: T = value_str.trim().parse().map_err(|e| {
        ConfigError::InvalidValue(format!(
            "{name} must be a valid positive integer, got '{value_str}': {e}"
        ))
    })?;

    if value == T::default() {
        return Err(ConfigError::InvalidValue(format!(
            "{name} must be greater than 0"
        )));
    }

    Ok(value)
}

fn parse_url(site: &str, path: &str) -> Result<Url, ConfigError> {
    let joined = format!("{site}{path}");
    Url::parse(&joined).map_err(|e| ConfigError::InvalidUrl(format!("'{joined}': {e}")))
}

//! Inbound token verification (Service role).
//!
//! [`Service::verify`] answers "may this bearer token perform `action` on
//! `resource` with these scopes?" by asking the authorization server, and
//! caches the answer.
//!
//! | Verification endpoint status | Result |
//! |------------------------------|--------|
//! | 200 | parsed result, cached (even when denied) |
//! | 500 | denied, not cached |
//! | anything else | `VerifyError::Rejected` with the body verbatim |
//!
//! The 500 row blurs "token denied" and "verifier unavailable". Callers that
//! need to tell them apart should not rely on `allowed = false` alone.

use crate::cache::{ExpiringCache, Lookup};
use crate::cache_key::{CacheKeyBuilder, SERVICE_CACHE_CATEGORY};
use crate::client::Client;
use crate::config::ServiceConfig;
use crate::endpoint::{HttpVerificationEndpoint, VerificationEndpoint};
use crate::error::{ConfigError, VerifyError};
use crate::observability;
use crate::secret::fingerprint;
use crate::verification::{VerificationOptions, VerificationRequest, VerificationResult};
use axum::http::{header, HeaderMap};
use serde_json::Map;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Status integrators answer with when verification itself fails.
///
/// Shared contract between Client and Service deployments.
pub const VERIFICATION_ERROR_STATUS: u16 = 502;

/// Caching identity of the Service's own access token.
pub const SERVICE_CACHING_KEY: &str = "service-access-token";

const SERVER_ERROR_STATUS: u16 = 500;
const OK_STATUS: u16 = 200;

/// Verification result cache keyed by [`CacheKeyBuilder`] keys.
pub type VerificationCache = ExpiringCache<String, VerificationResult>;

/// Service role: verifies inbound bearer tokens.
#[derive(Clone)]
pub struct Service {
    client: Client,
    endpoint: Arc<dyn VerificationEndpoint>,
    resource: String,
    scopes: Vec<String>,
    cache: VerificationCache,
}

impl Service {
    /// Create a service for `resource`.
    ///
    /// `client` fetches the Service's own token with `scopes`; its key
    /// builder also keys the verification cache.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingField` if `resource` is empty.
    pub fn new(
        client: Client,
        endpoint: Arc<dyn VerificationEndpoint>,
        resource: impl Into<String>,
        scopes: Vec<String>,
    ) -> Result<Self, ConfigError> {
        let resource = resource.into();
        if resource.is_empty() {
            return Err(ConfigError::MissingField("resource".to_string()));
        }

        Ok(Self {
            client,
            endpoint,
            resource,
            scopes,
            cache: VerificationCache::new(),
        })
    }

    /// Create a service talking to the configured authorization server.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration is invalid or an HTTP
    /// client cannot be built.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let client = Client::from_config_with_category(&config.client, SERVICE_CACHE_CATEGORY)?;
        let endpoint = HttpVerificationEndpoint::new(config)?;

        info!(
            target: "sand.service",
            resource = %config.resource,
            verify_url = %endpoint.verify_url(),
            "Service configured"
        );

        Ok(Self::new(
            client,
            Arc::new(endpoint),
            config.resource.clone(),
            config.service_scopes.clone(),
        )?
        .with_cache(VerificationCache::with_capacity_and_ttl(
            config.client.cache_capacity,
            config.client.cache_ttl,
        )))
    }

    /// Use `cache` for verification results.
    #[must_use]
    pub fn with_cache(mut self, cache: VerificationCache) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    #[must_use]
    pub fn cache(&self) -> &VerificationCache {
        &self.cache
    }

    /// Key of the cached verification for `token` under `options`.
    #[must_use]
    pub fn cache_key(&self, token: &str, options: &VerificationOptions) -> String {
        self.key_builder().build(
            token,
            &options.target_scopes,
            Some(&options.resource),
            Some(&options.action),
        )
    }

    fn key_builder(&self) -> &CacheKeyBuilder {
        self.client.key_builder()
    }

    /// Options for this Service's resource with an empty context.
    #[must_use]
    pub fn options(
        &self,
        target_scopes: Vec<String>,
        action: impl Into<String>,
    ) -> VerificationOptions {
        VerificationOptions {
            target_scopes,
            action: action.into(),
            resource: self.resource.clone(),
            context: Map::new(),
            num_retries: -1,
        }
    }

    /// Extract the bearer token from `headers` and verify it against this
    /// Service's resource.
    ///
    /// # Errors
    ///
    /// Returns `VerifyError::MissingToken` if the Authorization header is
    /// missing or not a bearer token, and any error from [`Service::verify`].
    pub async fn verify_request(
        &self,
        headers: &HeaderMap,
        target_scopes: Vec<String>,
        action: &str,
        num_retries: i32,
    ) -> Result<VerificationResult, VerifyError> {
        let token = extract_bearer_token(headers)?;
        let options = self
            .options(target_scopes, action)
            .with_num_retries(num_retries);
        self.verify(token, &options).await
    }

    /// Verify `token` against `options`, using the cache when possible.
    ///
    /// # Errors
    ///
    /// Returns `VerifyError::ServiceTokenUnavailable` if the Service cannot
    /// get its own token, `VerifyError::Transport` if the verification
    /// request fails to send, `VerifyError::Rejected` for a status other than
    /// 200 or 500, and `VerifyError::InvalidResponse` for an unparsable 200
    /// body.
    #[instrument(skip_all, fields(resource = %options.resource, action = %options.action))]
    pub async fn verify(
        &self,
        token: &str,
        options: &VerificationOptions,
    ) -> Result<VerificationResult, VerifyError> {
        let cache_key = self.cache_key(token, options);
        let key_fingerprint = fingerprint(&cache_key);

        let lookup = self.cache.get_unexpired(&cache_key);
        observability::record_cache_lookup("verification", lookup.label());
        if let Lookup::Hit(result) = lookup {
            debug!(
                target: "sand.service",
                cache_key_fingerprint = %key_fingerprint,
                allowed = result.allowed,
                "Verification cache hit"
            );
            observability::record_verification(outcome_label(&result));
            return Ok(result);
        }

        match self.send_verification(token, options).await {
            Ok(Some(result)) => {
                debug!(
                    target: "sand.service",
                    cache_key_fingerprint = %key_fingerprint,
                    allowed = result.allowed,
                    "Token verified"
                );
                self.cache.put(cache_key, result.clone());
                observability::record_verification(outcome_label(&result));
                Ok(result)
            }
            Ok(None) => {
                warn!(
                    target: "sand.service",
                    cache_key_fingerprint = %key_fingerprint,
                    "Verification endpoint returned 500, treating token as not allowed"
                );
                observability::record_verification("server_error");
                Ok(VerificationResult::denied())
            }
            Err(e) => {
                error!(
                    target: "sand.service",
                    cache_key_fingerprint = %key_fingerprint,
                    error = %e,
                    "Token verification failed"
                );
                observability::record_verification("error");
                Err(e)
            }
        }
    }

    /// `Ok(None)` stands for the 500 case.
    async fn send_verification(
        &self,
        token: &str,
        options: &VerificationOptions,
    ) -> Result<Option<VerificationResult>, VerifyError> {
        let access_token = self
            .client
            .token(SERVICE_CACHING_KEY, &self.scopes, options.num_retries)
            .await
            .ok_or(VerifyError::ServiceTokenUnavailable)?;

        let request = VerificationRequest::new(token, options);
        let response = self.endpoint.verify(access_token.value(), &request).await?;

        match response.status {
            OK_STATUS => {
                let body: serde_json::Value = serde_json::from_str(&response.body)
                    .map_err(|e| VerifyError::InvalidResponse(e.to_string()))?;
                VerificationResult::from_json(&body).map(Some)
            }
            SERVER_ERROR_STATUS => Ok(None),
            status => Err(VerifyError::Rejected {
                status,
                body: response.body,
            }),
        }
    }
}

fn outcome_label(result: &VerificationResult) -> &'static str {
    if result.allowed {
        "allowed"
    } else {
        "denied"
    }
}

/// Bearer token from the Authorization header.
///
/// The scheme is matched case-insensitively.
///
/// # Errors
///
/// Returns `VerifyError::MissingToken` if the header is absent, not valid
/// UTF-8, not a bearer scheme, or carries an empty token or one with
/// embedded whitespace.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, VerifyError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| VerifyError::MissingToken("missing Authorization header".to_string()))?
        .to_str()
        .map_err(|_| VerifyError::MissingToken("invalid Authorization header".to_string()))?;

    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or_else(|| VerifyError::MissingToken("malformed Authorization header".to_string()))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(VerifyError::MissingToken(
            "Authorization scheme is not Bearer".to_string(),
        ));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(VerifyError::MissingToken("empty bearer token".to_string()));
    }

    if token.contains(char::is_whitespace) {
        return Err(VerifyError::MissingToken(
            "bearer token contains whitespace".to_string(),
        ));
    }

    Ok(token)
}

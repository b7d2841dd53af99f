//! Authenticated requests to protected services (Client role).
//!
//! [`Client::execute`] runs a caller-supplied call with a cached access token
//! and retries it with a freshly fetched token whenever the protected service
//! answers [`ACCESS_DENIED_STATUS`]. Before every retry the cached token is
//! evicted, so a 401 is always followed by a token that did not come from the
//! cache.

use crate::acquirer::{TokenAcquirer, TokenCache};
use crate::backoff::BackoffPolicy;
use crate::cache_key::{CacheKeyBuilder, CLIENT_CACHE_CATEGORY};
use crate::config::ClientConfig;
use crate::endpoint::HttpTokenEndpoint;
use crate::error::ConfigError;
use crate::observability;
use crate::token::AccessToken;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Status the protected service answers with when it rejects a token.
///
/// Shared contract between Client and Service deployments.
pub const ACCESS_DENIED_STATUS: u16 = 401;

/// A response that exposes its HTTP status.
pub trait StatusResponse {
    fn status_code(&self) -> u16;
}

impl StatusResponse for reqwest::Response {
    fn status_code(&self) -> u16 {
        self.status().as_u16()
    }
}

/// Client role: calls protected services with cached access tokens.
#[derive(Clone)]
pub struct Client {
    acquirer: TokenAcquirer,
    key_builder: CacheKeyBuilder,
}

impl Client {
    /// Create a client that keys tokens under the default client layout.
    #[must_use]
    pub fn new(acquirer: TokenAcquirer) -> Self {
        Self {
            acquirer,
            key_builder: CacheKeyBuilder::client(),
        }
    }

    /// Create a client talking to the configured token endpoint over HTTP.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration is invalid or the HTTP
    /// client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        Self::from_config_with_category(config, CLIENT_CACHE_CATEGORY)
    }

    pub(crate) fn from_config_with_category(
        config: &ClientConfig,
        category: &str,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let endpoint = HttpTokenEndpoint::new(config)?;
        let acquirer = TokenAcquirer::new(Arc::new(endpoint))
            .with_cache(TokenCache::with_capacity_and_ttl(
                config.cache_capacity,
                config.cache_ttl,
            ))
            .with_policy(BackoffPolicy::default().with_default_retries(config.default_retries));

        Ok(Self::new(acquirer)
            .with_cache_key_builder(CacheKeyBuilder::new(config.cache_root.clone(), category)))
    }

    /// Use a custom key layout.
    #[must_use]
    pub fn with_cache_key_builder(mut self, key_builder: CacheKeyBuilder) -> Self {
        self.key_builder = key_builder;
        self
    }

    #[must_use]
    pub fn acquirer(&self) -> &TokenAcquirer {
        &self.acquirer
    }

    #[must_use]
    pub fn key_builder(&self) -> &CacheKeyBuilder {
        &self.key_builder
    }

    /// Cache key for tokens fetched under `caching_identity` and `scopes`.
    #[must_use]
    pub fn cache_key(&self, caching_identity: &str, scopes: &[String]) -> String {
        self.key_builder.build(caching_identity, scopes, None, None)
    }

    /// Return a token for `caching_identity` and `scopes`, cached or fresh.
    ///
    /// `retries` is a token-fetch retry count (negative means the default).
    pub async fn token(
        &self,
        caching_identity: &str,
        scopes: &[String],
        retries: i32,
    ) -> Option<AccessToken> {
        let cache_key = self.cache_key(caching_identity, scopes);
        self.acquirer.acquire(&cache_key, scopes, retries).await
    }

    /// [`Client::execute`] with the default retry count.
    pub async fn request<F, Fut, R>(
        &self,
        caching_identity: &str,
        scopes: &[String],
        call: F,
    ) -> Option<R>
    where
        F: FnMut(AccessToken) -> Fut,
        Fut: Future<Output = Option<R>>,
        R: StatusResponse,
    {
        self.execute(caching_identity, scopes, 0, call).await
    }

    /// Run `call` with an access token, retrying on [`ACCESS_DENIED_STATUS`].
    ///
    /// `retries` below 1 means the default. Returns the first response whose
    /// status is not 401, or `None` if `caching_identity` is empty, `call`
    /// produced no response, or the retries ran out.
    #[instrument(skip_all, fields(caching_identity = %caching_identity))]
    pub async fn execute<F, Fut, R>(
        &self,
        caching_identity: &str,
        scopes: &[String],
        retries: i32,
        mut call: F,
    ) -> Option<R>
    where
        F: FnMut(AccessToken) -> Fut,
        Fut: Future<Output = Option<R>>,
        R: StatusResponse,
    {
        if caching_identity.is_empty() {
            return None;
        }

        let policy = *self.acquirer.policy();
        let max_retries = policy.request_retries(retries);
        let inner_retries = i32::try_from(max_retries).unwrap_or(i32::MAX);
        let cache_key = self.cache_key(caching_identity, scopes);
        let mut last_denied = false;
        let mut attempt: u32 = 0;

        loop {
            if attempt > 0 {
                if attempt > max_retries {
                    let outcome = if last_denied { "denied" } else { "exhausted" };
                    warn!(
                        target: "sand.client",
                        cache_key = %cache_key,
                        attempts = attempt,
                        outcome = outcome,
                        "Request retries exhausted"
                    );
                    observability::record_client_request(outcome);
                    return None;
                }
                self.acquirer.evict(&cache_key);
                self.acquirer
                    .sleeper()
                    .sleep(policy.delay_for_attempt(attempt))
                    .await;
            }
            attempt += 1;

            let Some(token) = self.acquirer.acquire(&cache_key, scopes, inner_retries).await else {
                debug!(target: "sand.client", cache_key = %cache_key, "No token for this round");
                last_denied = false;
                continue;
            };

            let Some(response) = call(token).await else {
                debug!(target: "sand.client", cache_key = %cache_key, "Call produced no response");
                observability::record_client_request("no_response");
                return None;
            };

            let status = response.status_code();
            if status != ACCESS_DENIED_STATUS {
                debug!(
                    target: "sand.client",
                    cache_key = %cache_key,
                    status = status,
                    "Request completed"
                );
                observability::record_client_request("success");
                return Some(response);
            }

            debug!(
                target: "sand.client",
                cache_key = %cache_key,
                attempt = attempt,
                "Access denied, retrying with a fresh token"
            );
            last_denied = true;
        }
    }
}

//! Cached, retrying token acquisition.
//!
//! [`TokenAcquirer::acquire`] serves a cached token when one is fresh, and
//! otherwise runs the token-fetch retry loop:
//!
//! 1. Attempt 0 exchanges immediately.
//! 2. Each failure (transport error, non-200, unusable body) increments the
//!    attempt counter. Past the effective retry count the loop gives up and
//!    returns `None`; otherwise it sleeps `delay_for_attempt(attempt)` and
//!    exchanges again. The cache is not re-consulted mid-loop.
//! 3. A successful exchange is cached under the caller's key and returned.
//!
//! Endpoint failures never escape this module; callers only see a missing
//! token.

use crate::backoff::{BackoffPolicy, Sleeper, TokioSleeper};
use crate::cache::{ExpiringCache, Lookup};
use crate::endpoint::TokenEndpoint;
use crate::observability;
use crate::token::AccessToken;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Token cache keyed by [`crate::cache_key::CacheKeyBuilder`] keys.
pub type TokenCache = ExpiringCache<String, AccessToken>;

/// Fetches and caches access tokens for one set of credentials.
#[derive(Clone)]
pub struct TokenAcquirer {
    endpoint: Arc<dyn TokenEndpoint>,
    cache: TokenCache,
    policy: BackoffPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl TokenAcquirer {
    /// Create an acquirer with a default cache, policy and tokio sleeper.
    #[must_use]
    pub fn new(endpoint: Arc<dyn TokenEndpoint>) -> Self {
        Self {
            endpoint,
            cache: TokenCache::new(),
            policy: BackoffPolicy::default(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Use `cache` for tokens. Clones of a cache share storage.
    #[must_use]
    pub fn with_cache(mut self, cache: TokenCache) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    #[must_use]
    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    #[must_use]
    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    #[must_use]
    pub(crate) fn sleeper(&self) -> &Arc<dyn Sleeper> {
        &self.sleeper
    }

    /// Drop the cached token for `cache_key` so the next acquire exchanges.
    pub fn evict(&self, cache_key: &str) {
        self.cache.invalidate(&cache_key.to_string());
    }

    /// Return a fresh token for `cache_key`, exchanging if needed.
    ///
    /// `retries` is normalized as a token-fetch retry count: negative means
    /// the default, zero means a single attempt. Returns `None` once the
    /// retries are exhausted.
    #[instrument(skip_all, fields(cache_key = %cache_key))]
    pub async fn acquire(
        &self,
        cache_key: &str,
        scopes: &[String],
        retries: i32,
    ) -> Option<AccessToken> {
        let key = cache_key.to_string();

        let lookup = self.cache.get_unexpired(&key);
        observability::record_cache_lookup("token", lookup.label());
        match lookup {
            Lookup::Hit(token) => {
                debug!(target: "sand.acquirer", cache_key = %cache_key, "Token cache hit");
                return Some(token);
            }
            Lookup::Expired => {
                debug!(target: "sand.acquirer", cache_key = %cache_key, "Cached token expired");
            }
            Lookup::Miss => {
                debug!(target: "sand.acquirer", cache_key = %cache_key, "Token cache miss");
            }
        }
        self.cache.invalidate(&key);

        let max_retries = self.policy.token_fetch_retries(retries);
        let mut attempt: u32 = 0;

        loop {
            let failure = match self.endpoint.request_token(scopes).await {
                Ok(grant) => match AccessToken::from_grant(grant, scopes, Utc::now()) {
                    Ok(token) => {
                        info!(
                            target: "sand.acquirer",
                            cache_key = %cache_key,
                            expires_in_secs = token.expires_in(),
                            attempt = attempt,
                            "Token acquired"
                        );
                        self.cache.put(key, token.clone());
                        return Some(token);
                    }
                    Err(e) => e,
                },
                Err(e) => e,
            };

            attempt += 1;
            if attempt > max_retries {
                warn!(
                    target: "sand.acquirer",
                    cache_key = %cache_key,
                    error = %failure,
                    attempts = attempt,
                    "Token acquisition failed, retries exhausted"
                );
                return None;
            }

            let delay = self.policy.delay_for_attempt(attempt);
            warn!(
                target: "sand.acquirer",
                cache_key = %cache_key,
                error = %failure,
                attempt = attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Token acquisition failed, retrying"
            );
            self.sleeper.sleep(delay).await;
        }
    }
}

//! Access tokens obtained through the client-credentials grant.

use crate::cache::Expires;
use crate::error::TokenError;
use crate::secret::{ExposeSecret, SecretString};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;

/// Expiry assumed when the token endpoint omits `expires_in`.
pub const DEFAULT_TOKEN_EXPIRES_IN_SECS: u64 = 3599;

/// Tokens this close to expiry are no longer served from the cache.
pub const EXPIRY_MARGIN_SECS: i64 = 30;

const DEFAULT_TOKEN_TYPE: &str = "bearer";

/// An access token and its computed expiry.
///
/// Immutable once built: a token is replaced, never updated.
#[derive(Debug, Clone)]
pub struct AccessToken {
    value: SecretString,
    scopes: Vec<String>,
    token_type: String,
    expires_in: u64,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Build a token issued at `issued_at` that lives for `expires_in` seconds.
    #[must_use]
    pub fn new(
        value: SecretString,
        scopes: Vec<String>,
        token_type: impl Into<String>,
        expires_in: u64,
        issued_at: DateTime<Utc>,
    ) -> Self {
        let lifetime = i64::try_from(expires_in).unwrap_or(i64::MAX);
        let expires_at = issued_at
            .checked_add_signed(ChronoDuration::seconds(lifetime.min(i64::MAX / 1000)))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            value,
            scopes,
            token_type: token_type.into(),
            expires_in,
            expires_at,
        }
    }

    /// Build a token from a token-endpoint response received at `now`.
    ///
    /// When the response carries no `scope`, the requested scopes are kept.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::InvalidResponse` if `access_token` is empty or
    /// `expires_in` is not a non-negative integer.
    pub fn from_grant<S: AsRef<str>>(
        grant: TokenGrant,
        requested_scopes: &[S],
        now: DateTime<Utc>,
    ) -> Result<Self, TokenError> {
        if grant.access_token.expose_secret().is_empty() {
            return Err(TokenError::InvalidResponse(
                "empty access_token".to_string(),
            ));
        }

        let expires_in = match grant.expires_in {
            None => DEFAULT_TOKEN_EXPIRES_IN_SECS,
            Some(ExpiresIn::Seconds(secs)) => secs,
            Some(ExpiresIn::Text(text)) => text.trim().parse().map_err(|e| {
                TokenError::InvalidResponse(format!("expires_in '{text}' is not a number: {e}"))
            })?,
        };

        let scopes = match grant.scope {
            Some(scope) => scope.split_whitespace().map(str::to_string).collect(),
            None => requested_scopes
                .iter()
                .map(|s| s.as_ref().to_string())
                .collect(),
        };

        let token_type = grant
            .token_type
            .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string());

        Ok(Self::new(
            grant.access_token,
            scopes,
            token_type,
            expires_in,
            now,
        ))
    }

    /// The token value. Expose only to build an Authorization header.
    #[must_use]
    pub fn value(&self) -> &SecretString {
        &self.value
    }

    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    #[must_use]
    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    /// Lifetime granted by the token endpoint, in seconds.
    #[must_use]
    pub fn expires_in(&self) -> u64 {
        self.expires_in
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the token is past, or within the safety margin of, `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now + ChronoDuration::seconds(EXPIRY_MARGIN_SECS) >= self.expires_at
    }
}

impl Expires for AccessToken {
    fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Token endpoint success body.
#[derive(Debug, Deserialize)]
pub struct TokenGrant {
    pub access_token: SecretString,
    #[serde(default)]
    pub expires_in: Option<ExpiresIn>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// `expires_in` as sent by the token endpoint: a number or a numeric string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ExpiresIn {
    Seconds(u64),
    Text(String),
}

//! Verification requests and results.

use crate::cache::Expires;
use crate::error::{ConfigError, VerifyError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

/// The authorization server's allow/deny decision plus token claims.
///
/// A denied result never carries claims.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationResult {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<String>,
    /// RFC 3339 expiry; the only expiry signal for caching this result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,
}

impl VerificationResult {
    /// A "not allowed" result with no claims.
    #[must_use]
    pub fn denied() -> Self {
        Self {
            allowed: false,
            sub: None,
            scopes: None,
            iss: None,
            aud: None,
            iat: None,
            exp: None,
            ext: None,
        }
    }

    /// Parse a verification endpoint response body.
    ///
    /// `allowed` may be a boolean or the string `"true"` (any case). Any
    /// other value, or a missing field, is a denial. Claims are only read
    /// from allowed responses; claims of an unexpected type are dropped.
    ///
    /// # Errors
    ///
    /// Returns `VerifyError::InvalidResponse` if the body is not a JSON object.
    pub fn from_json(body: &Value) -> Result<Self, VerifyError> {
        let Some(fields) = body.as_object() else {
            return Err(VerifyError::InvalidResponse(
                "verification response is not a JSON object".to_string(),
            ));
        };

        let allowed = match fields.get("allowed") {
            Some(Value::Bool(allowed)) => *allowed,
            Some(Value::String(text)) => text.eq_ignore_ascii_case("true"),
            _ => false,
        };

        if !allowed {
            return Ok(Self::denied());
        }

        let text = |name: &str| fields.get(name).and_then(Value::as_str).map(str::to_string);

        let scopes = fields.get("scopes").and_then(Value::as_array).map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        });

        Ok(Self {
            allowed: true,
            sub: text("sub"),
            scopes,
            iss: text("iss"),
            aud: text("aud"),
            iat: text("iat"),
            exp: text("exp"),
            ext: fields.get("ext").filter(|v| !v.is_null()).cloned(),
        })
    }

    /// Parsed `exp` claim.
    ///
    /// `None` when absent; `Some(Err(_))` when present but not RFC 3339.
    #[must_use]
    pub fn expires_at(&self) -> Option<Result<DateTime<Utc>, chrono::ParseError>> {
        self.exp.as_deref().map(|exp| {
            DateTime::parse_from_rfc3339(exp).map(|parsed| parsed.with_timezone(&Utc))
        })
    }

    /// Whether the result's own expiry has passed at `now`.
    ///
    /// A result without `exp` never expires. An unparsable `exp` counts as
    /// expired so the result is re-verified rather than trusted forever.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at() {
            None => false,
            Some(Ok(expires_at)) => now > expires_at,
            Some(Err(e)) => {
                warn!(
                    target: "sand.service",
                    exp = ?self.exp,
                    error = %e,
                    "Unparsable exp claim in verification result, treating as expired"
                );
                true
            }
        }
    }
}

impl Expires for VerificationResult {
    fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// What to verify a token against.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationOptions {
    pub target_scopes: Vec<String>,
    pub action: String,
    pub resource: String,
    /// Sent verbatim as the request `context`; empty by default.
    pub context: Map<String, Value>,
    /// Retries for the Service's own token; negative means the default.
    pub num_retries: i32,
}

impl VerificationOptions {
    /// Options with an empty context and the default retry count.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingField` if `resource` is empty.
    pub fn new(
        target_scopes: Vec<String>,
        action: impl Into<String>,
        resource: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let resource = resource.into();
        if resource.is_empty() {
            return Err(ConfigError::MissingField("resource".to_string()));
        }

        Ok(Self {
            target_scopes,
            action: action.into(),
            resource,
            context: Map::new(),
            num_retries: -1,
        })
    }

    /// Replace the request context.
    #[must_use]
    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = context;
        self
    }

    /// Set the retry count for the Service's own token.
    #[must_use]
    pub fn with_num_retries(mut self, num_retries: i32) -> Self {
        self.num_retries = num_retries;
        self
    }
}

/// Verification endpoint request body.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationRequest<'a> {
    pub scopes: &'a [String],
    pub token: &'a str,
    pub resource: &'a str,
    pub action: &'a str,
    pub context: &'a Map<String, Value>,
}

impl<'a> VerificationRequest<'a> {
    #[must_use]
    pub fn new(token: &'a str, options: &'a VerificationOptions) -> Self {
        Self {
            scopes: &options.target_scopes,
            token,
            resource: &options.resource,
            action: &options.action,
            context: &options.context,
        }
    }
}

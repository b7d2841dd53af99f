//! Error types for SAND authentication.
//!
//! - [`ConfigError`]: construction-time failures, never retried.
//! - [`TokenError`]: transient token-endpoint failures. These stay inside the
//!   acquirer's retry loop; callers only ever see a missing token.
//! - [`VerifyError`]: hard verification failures surfaced to the Service's
//!   caller, who maps them to a response code via [`VerifyError::status_code`].

use thiserror::Error;

/// Configuration errors, raised while building clients and services.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Transient failures talking to the token endpoint.
#[derive(Debug, Error, Clone)]
pub enum TokenError {
    /// Transport-level failure (connect, timeout, read).
    #[error("HTTP client error: {0}")]
    Http(String),

    /// Token endpoint answered with a non-200 status.
    #[error("Unexpected status from token endpoint: {0}")]
    UnexpectedStatus(u16),

    /// 200 response whose body is not a usable token response.
    #[error("Invalid token response: {0}")]
    InvalidResponse(String),
}

/// Hard failures while verifying an inbound token.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// Authorization header missing, not a bearer scheme, or empty token.
    #[error("Failed to extract the token from the request: {0}")]
    MissingToken(String),

    /// The Service could not obtain its own access token.
    #[error("Could not get a service access token")]
    ServiceTokenUnavailable,

    /// The verification request could not be sent or read.
    #[error("Could not send a verification request: {0}")]
    Transport(String),

    /// Verification endpoint answered neither 200 nor 500.
    #[error("Verification rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// 200 response whose body could not be parsed.
    #[error("Invalid verification response: {0}")]
    InvalidResponse(String),
}

impl VerifyError {
    /// Response code the Service should answer its own caller with.
    ///
    /// Extraction failures are the caller's fault (401); everything else is a
    /// verification infrastructure failure (502).
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            VerifyError::MissingToken(_) => crate::client::ACCESS_DENIED_STATUS,
            VerifyError::ServiceTokenUnavailable
            | VerifyError::Transport(_)
            | VerifyError::Rejected { .. }
            | VerifyError::InvalidResponse(_) => crate::service::VERIFICATION_ERROR_STATUS,
        }
    }
}

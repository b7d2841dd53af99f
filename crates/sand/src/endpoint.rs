//! Authorization server collaborators.
//!
//! [`TokenEndpoint`] performs one client-credentials exchange and
//! [`VerificationEndpoint`] sends one verification request. Neither retries;
//! retry and caching live in [`crate::acquirer`] and [`crate::service`].

use crate::config::{ClientConfig, ServiceConfig};
use crate::error::{ConfigError, TokenError, VerifyError};
use crate::observability;
use crate::secret::{ExposeSecret, SecretString};
use crate::token::TokenGrant;
use crate::verification::VerificationRequest;
use async_trait::async_trait;
use reqwest::{header, StatusCode, Url};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Connect timeout for authorization server requests.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Build an HTTP client with request and connect timeouts.
///
/// # Errors
///
/// Returns `ConfigError::HttpClient` if the TLS backend fails to initialize.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, ConfigError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|e| ConfigError::HttpClient(e.to_string()))
}

/// One client-credentials token exchange.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Request a token for `scopes`.
    ///
    /// Any failure is transient from the caller's point of view.
    async fn request_token(&self, scopes: &[String]) -> Result<TokenGrant, TokenError>;
}

/// Token endpoint reached over HTTP with Basic client authentication.
pub struct HttpTokenEndpoint {
    http_client: reqwest::Client,
    token_url: Url,
    client_id: String,
    client_secret: SecretString,
}

impl HttpTokenEndpoint {
    /// Create an endpoint for the configured token URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUrl` for a malformed token URL and
    /// `ConfigError::HttpClient` if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            http_client: build_http_client(config.http_timeout)?,
            token_url: config.token_url()?,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        })
    }

    #[must_use]
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    async fn exchange(&self, scopes: &[String]) -> Result<TokenGrant, TokenError> {
        let mut form = vec![("grant_type", "client_credentials".to_string())];
        if !scopes.is_empty() {
            form.push(("scope", scopes.join(" ")));
        }

        let response = self
            .http_client
            .post(self.token_url.clone())
            .basic_auth(&self.client_id, Some(self.client_secret.expose_secret()))
            .header(header::ACCEPT, "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                debug!(target: "sand.endpoint", error = %e, "Token request failed");
                TokenError::Http(e.to_string())
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            // Body only at trace level; it may echo credentials
            let body = response.text().await.unwrap_or_else(|e| {
                trace!(target: "sand.endpoint", error = %e, "Failed to read error response body");
                "<failed to read body>".to_string()
            });
            warn!(
                target: "sand.endpoint",
                status = %status,
                "Unexpected response from token endpoint"
            );
            trace!(target: "sand.endpoint", body = %body, "Token endpoint response body");
            return Err(TokenError::UnexpectedStatus(status.as_u16()));
        }

        response.json::<TokenGrant>().await.map_err(|e| {
            warn!(target: "sand.endpoint", error = %e, "Failed to parse token response");
            TokenError::InvalidResponse(e.to_string())
        })
    }
}

#[async_trait]
impl TokenEndpoint for HttpTokenEndpoint {
    async fn request_token(&self, scopes: &[String]) -> Result<TokenGrant, TokenError> {
        debug!(
            target: "sand.endpoint",
            client_id = %self.client_id,
            url = %self.token_url,
            scopes = ?scopes,
            "Requesting token"
        );

        let start = Instant::now();
        let result = self.exchange(scopes).await;
        let status = if result.is_ok() { "success" } else { "error" };
        observability::record_token_request(status, start.elapsed());

        result
    }
}

/// Raw verification endpoint response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointResponse {
    pub status: u16,
    pub body: String,
}

/// One verification request, authenticated with the Service's own token.
#[async_trait]
pub trait VerificationEndpoint: Send + Sync {
    /// Send `request` and return the status and body, whatever the status.
    ///
    /// Only transport failures are errors.
    async fn verify(
        &self,
        access_token: &SecretString,
        request: &VerificationRequest<'_>,
    ) -> Result<EndpointResponse, VerifyError>;
}

/// Verification endpoint reached over HTTP with a bearer token.
pub struct HttpVerificationEndpoint {
    http_client: reqwest::Client,
    verify_url: Url,
}

impl HttpVerificationEndpoint {
    /// Create an endpoint for the configured verification URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUrl` for a malformed verification URL and
    /// `ConfigError::HttpClient` if the HTTP client cannot be built.
    pub fn new(config: &ServiceConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            http_client: build_http_client(config.client.http_timeout)?,
            verify_url: config.verify_url()?,
        })
    }

    #[must_use]
    pub fn verify_url(&self) -> &Url {
        &self.verify_url
    }
}

#[async_trait]
impl VerificationEndpoint for HttpVerificationEndpoint {
    async fn verify(
        &self,
        access_token: &SecretString,
        request: &VerificationRequest<'_>,
    ) -> Result<EndpointResponse, VerifyError> {
        debug!(
            target: "sand.endpoint",
            url = %self.verify_url,
            resource = %request.resource,
            action = %request.action,
            "Sending verification request"
        );

        let response = self
            .http_client
            .post(self.verify_url.clone())
            .bearer_auth(access_token.expose_secret())
            .header(header::ACCEPT, "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                warn!(target: "sand.endpoint", error = %e, "Could not send a verification request");
                VerifyError::Transport(e.to_string())
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            warn!(target: "sand.endpoint", error = %e, "Could not read verification response");
            VerifyError::Transport(e.to_string())
        })?;

        Ok(EndpointResponse { status, body })
    }
}

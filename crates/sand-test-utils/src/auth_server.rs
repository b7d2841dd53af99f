//! Wiremock authorization server harness.
//!
//! Provides `TestAuthServer`, a stand-in for the token and verification
//! endpoints that real `sand` clients and services can be pointed at.
//!
//! # Example
//! ```rust,ignore
//! #[tokio::test]
//! async fn test_verify_e2e() -> anyhow::Result<()> {
//!     let server = TestAuthServer::start().await;
//!     server.mount_token("service-token", 3600).await;
//!     server.mount_verify(200, allowed_response("client-1", &["read"])).await;
//!
//!     let service = Service::from_config(&server.service_config())?;
//!     // ...
//!     Ok(())
//! }
//! ```

use crate::fixtures::{token_response, TEST_CLIENT_ID, TEST_CLIENT_SECRET, TEST_RESOURCE};
use sand::config::{ClientConfig, ServiceConfig, DEFAULT_TOKEN_PATH, DEFAULT_TOKEN_VERIFY_PATH};
use sand::secret::SecretString;
use serde_json::Value;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Authorization server double backed by a wiremock `MockServer`.
pub struct TestAuthServer {
    server: MockServer,
}

impl TestAuthServer {
    /// Start a server on a random local port with nothing mounted.
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL, usable as `token_site`.
    #[must_use]
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    #[must_use]
    pub fn mock_server(&self) -> &MockServer {
        &self.server
    }

    /// Client configuration pointing at this server, with a short timeout.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(
            TEST_CLIENT_ID.to_string(),
            SecretString::from(TEST_CLIENT_SECRET),
            self.uri(),
        )
        .with_http_timeout(Duration::from_secs(2))
    }

    /// Service configuration for [`TEST_RESOURCE`] pointing at this server.
    #[must_use]
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig::new(self.client_config(), TEST_RESOURCE.to_string())
    }

    /// Answer every token request with `access_token`.
    pub async fn mount_token(&self, access_token: &str, expires_in: u64) {
        Mock::given(method("POST"))
            .and(path(DEFAULT_TOKEN_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(token_response(access_token, expires_in)),
            )
            .mount(&self.server)
            .await;
    }

    /// Answer the next `times` token requests with `status`.
    ///
    /// Mounted with priority so it wins over [`TestAuthServer::mount_token`]
    /// until used up.
    pub async fn mount_token_failures(&self, status: u16, times: u64) {
        Mock::given(method("POST"))
            .and(path(DEFAULT_TOKEN_PATH))
            .respond_with(ResponseTemplate::new(status).set_body_string("unavailable"))
            .up_to_n_times(times)
            .with_priority(1)
            .mount(&self.server)
            .await;
    }

    /// Answer every verification request with `status` and `body`.
    pub async fn mount_verify(&self, status: u16, body: Value) {
        Mock::given(method("POST"))
            .and(path(DEFAULT_TOKEN_VERIFY_PATH))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Requests received on the token endpoint.
    pub async fn token_requests(&self) -> Vec<Request> {
        self.requests_to(DEFAULT_TOKEN_PATH).await
    }

    /// Requests received on the verification endpoint.
    pub async fn verify_requests(&self) -> Vec<Request> {
        self.requests_to(DEFAULT_TOKEN_VERIFY_PATH).await
    }

    async fn requests_to(&self, endpoint_path: &str) -> Vec<Request> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path() == endpoint_path)
            .collect()
    }
}

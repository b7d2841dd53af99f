//! Scripted token and verification endpoints.
//!
//! Both mocks replay a queue of outcomes, then fall back to a default
//! outcome, and count their calls.
//!
//! # Example
//!
//! ```rust,ignore
//! use sand_test_utils::{MockTokenEndpoint, MockVerificationEndpoint};
//!
//! let tokens = MockTokenEndpoint::issuing();
//! let verifier = MockVerificationEndpoint::allowing("client-1");
//! ```

use async_trait::async_trait;
use sand::endpoint::{EndpointResponse, TokenEndpoint, VerificationEndpoint};
use sand::error::{TokenError, VerifyError};
use sand::secret::{ExposeSecret, SecretString};
use sand::token::{ExpiresIn, TokenGrant};
use sand::verification::VerificationRequest;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::fixtures::{allowed_response, denied_response};

/// Outcome of one token exchange.
#[derive(Debug, Clone)]
pub enum TokenOutcome {
    /// Issue the next numbered token (`tok-1`, `tok-2`, ...).
    Issue,
    /// Issue a token with this exact value and lifetime.
    IssueFixed { value: String, expires_in: u64 },
    /// Fail with this error.
    Fail(TokenError),
}

/// Token endpoint mock.
#[derive(Debug)]
pub struct MockTokenEndpoint {
    script: Mutex<VecDeque<TokenOutcome>>,
    fallback: TokenOutcome,
    calls: AtomicUsize,
    issued: AtomicUsize,
    requested_scopes: Mutex<Vec<Vec<String>>>,
}

impl MockTokenEndpoint {
    fn with(script: Vec<TokenOutcome>, fallback: TokenOutcome) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
            issued: AtomicUsize::new(0),
            requested_scopes: Mutex::new(Vec::new()),
        })
    }

    /// Issues `tok-1`, `tok-2`, ... on every call.
    #[must_use]
    pub fn issuing() -> Arc<Self> {
        Self::with(Vec::new(), TokenOutcome::Issue)
    }

    /// Fails every call with a 503.
    #[must_use]
    pub fn failing() -> Arc<Self> {
        Self::with(Vec::new(), TokenOutcome::Fail(TokenError::UnexpectedStatus(503)))
    }

    /// Fails `failures` times, then issues tokens.
    #[must_use]
    pub fn failing_then_issuing(failures: usize) -> Arc<Self> {
        let script = (0..failures)
            .map(|_| TokenOutcome::Fail(TokenError::UnexpectedStatus(503)))
            .collect();
        Self::with(script, TokenOutcome::Issue)
    }

    /// Replays `script`, then issues tokens.
    #[must_use]
    pub fn scripted(script: Vec<TokenOutcome>) -> Arc<Self> {
        Self::with(script, TokenOutcome::Issue)
    }

    /// Number of exchanges performed.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Scopes of every exchange, in order.
    #[must_use]
    pub fn requested_scopes(&self) -> Vec<Vec<String>> {
        self.requested_scopes.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenEndpoint for MockTokenEndpoint {
    async fn request_token(&self, scopes: &[String]) -> Result<TokenGrant, TokenError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested_scopes.lock().unwrap().push(scopes.to_vec());

        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        let (value, expires_in) = match outcome {
            TokenOutcome::Issue => {
                let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
                (format!("tok-{n}"), 3600)
            }
            TokenOutcome::IssueFixed { value, expires_in } => (value, expires_in),
            TokenOutcome::Fail(err) => return Err(err),
        };

        Ok(TokenGrant {
            access_token: SecretString::from(value),
            expires_in: Some(ExpiresIn::Seconds(expires_in)),
            scope: Some(scopes.join(" ")),
            token_type: Some("bearer".to_string()),
        })
    }
}

/// Outcome of one verification request.
#[derive(Debug, Clone)]
pub enum VerifyOutcome {
    /// Answer with this status and JSON body.
    Respond { status: u16, body: Value },
    /// Fail to send.
    Unreachable,
}

/// Verification endpoint mock.
#[derive(Debug)]
pub struct MockVerificationEndpoint {
    script: Mutex<VecDeque<VerifyOutcome>>,
    fallback: VerifyOutcome,
    calls: AtomicUsize,
    requests: Mutex<Vec<Value>>,
    access_tokens: Mutex<Vec<String>>,
}

impl MockVerificationEndpoint {
    fn with(script: Vec<VerifyOutcome>, fallback: VerifyOutcome) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            access_tokens: Mutex::new(Vec::new()),
        })
    }

    /// Always answers `status` with `body`.
    #[must_use]
    pub fn responding(status: u16, body: Value) -> Arc<Self> {
        Self::with(Vec::new(), VerifyOutcome::Respond { status, body })
    }

    /// Always allows, as `sub`.
    #[must_use]
    pub fn allowing(sub: &str) -> Arc<Self> {
        Self::responding(200, allowed_response(sub, &["read"]))
    }

    /// Always denies with a 200.
    #[must_use]
    pub fn denying() -> Arc<Self> {
        Self::responding(200, denied_response())
    }

    /// Never reachable.
    #[must_use]
    pub fn unreachable() -> Arc<Self> {
        Self::with(Vec::new(), VerifyOutcome::Unreachable)
    }

    /// Replays `script`, then answers like the last scripted outcome.
    #[must_use]
    pub fn scripted(script: Vec<VerifyOutcome>) -> Arc<Self> {
        let fallback = script.last().cloned().unwrap_or(VerifyOutcome::Unreachable);
        Self::with(script, fallback)
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Request payloads received, as JSON.
    #[must_use]
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }

    /// Service access tokens the requests were authenticated with.
    #[must_use]
    pub fn access_tokens(&self) -> Vec<String> {
        self.access_tokens.lock().unwrap().clone()
    }
}

#[async_trait]
impl VerificationEndpoint for MockVerificationEndpoint {
    async fn verify(
        &self,
        access_token: &SecretString,
        request: &VerificationRequest<'_>,
    ) -> Result<EndpointResponse, VerifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap()
            .push(serde_json::to_value(request).unwrap());
        self.access_tokens
            .lock()
            .unwrap()
            .push(access_token.expose_secret().to_string());

        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match outcome {
            VerifyOutcome::Respond { status, body } => Ok(EndpointResponse {
                status,
                body: body.to_string(),
            }),
            VerifyOutcome::Unreachable => {
                Err(VerifyError::Transport("connection refused".to_string()))
            }
        }
    }
}

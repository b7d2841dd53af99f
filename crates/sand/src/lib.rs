//! Cached, retrying OAuth 2.0 client-credentials authentication.
//!
//! Two roles share one token engine:
//!
//! - [`client::Client`] calls a protected service with a cached access token
//!   and refreshes the token when the service answers 401.
//! - [`service::Service`] verifies inbound bearer tokens against the
//!   authorization server, authenticating itself with its own cached token.

#![warn(clippy::pedantic)]

/// Module for token acquisition (cache, exchange, retry)
pub mod acquirer;

/// Module for exponential backoff and retry-count policies
pub mod backoff;

/// Module for the bounded TTL cache
pub mod cache;

/// Module for composite cache key construction
pub mod cache_key;

/// Module for the authenticated request executor (Client role)
pub mod client;

/// Module for configuration loaded from the environment
pub mod config;

/// Module for token and verification endpoint collaborators
pub mod endpoint;

/// Module for error types
pub mod error;

/// Module for axum verification middleware
pub mod middleware;

/// Module for metrics
pub mod observability;

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for the token verifier (Service role)
pub mod service;

/// Module for access tokens
pub mod token;

/// Module for verification requests and results
pub mod verification;

pub use client::{Client, ACCESS_DENIED_STATUS};
pub use service::{Service, VERIFICATION_ERROR_STATUS};

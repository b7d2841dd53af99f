//! Fixed credentials and response bodies.

use chrono::{Duration, Utc};
use serde_json::{json, Value};

pub const TEST_CLIENT_ID: &str = "test-client";
pub const TEST_CLIENT_SECRET: &str = "test-secret";
pub const TEST_RESOURCE: &str = "orders";
pub const TEST_SERVICE_TOKEN: &str = "service-token";

/// Owned scope list from string literals.
#[must_use]
pub fn scopes(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Token endpoint success body.
#[must_use]
pub fn token_response(access_token: &str, expires_in: u64) -> Value {
    json!({
        "access_token": access_token,
        "expires_in": expires_in,
        "token_type": "bearer"
    })
}

/// RFC 3339 timestamp `seconds` from now (negative for the past).
#[must_use]
pub fn exp_in(seconds: i64) -> String {
    (Utc::now() + Duration::seconds(seconds)).to_rfc3339()
}

/// Verification body allowing `sub` with `scopes`, expiring in an hour.
#[must_use]
pub fn allowed_response(sub: &str, scopes: &[&str]) -> Value {
    json!({
        "allowed": true,
        "sub": sub,
        "scopes": scopes,
        "iss": "hydra.localhost",
        "aud": TEST_RESOURCE,
        "iat": exp_in(0),
        "exp": exp_in(3600)
    })
}

/// Verification body denying the token.
#[must_use]
pub fn denied_response() -> Value {
    json!({ "allowed": false })
}

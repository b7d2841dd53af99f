//! Metrics recorded by the token engine.
//!
//! All metrics follow Prometheus naming conventions:
//! - `sand_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Every label has a fixed value set:
//! - `status`: success, error
//! - `cache`: token, verification
//! - `result`: hit, miss, expired
//! - `outcome` (verifications): allowed, denied, server_error, error
//! - `outcome` (client requests): success, denied, exhausted, no_response
//!
//! No recorder is installed by this crate. Embedding binaries install one
//! (see `sand-service`); without it the calls are no-ops.

use metrics::{counter, histogram};
use std::time::Duration;

// ============================================================================
// Token Endpoint Metrics
// ============================================================================

/// Record one token endpoint exchange.
///
/// Metrics: `sand_token_requests_total`, `sand_token_request_duration_seconds`
/// Labels: `status` (success, error)
pub fn record_token_request(status: &str, duration: Duration) {
    counter!("sand_token_requests_total", "status" => status.to_string()).increment(1);
    histogram!("sand_token_request_duration_seconds", "status" => status.to_string())
        .record(duration.as_secs_f64());
}

// ============================================================================
// Cache Metrics
// ============================================================================

/// Record a cache lookup.
///
/// Metric: `sand_cache_lookups_total`
/// Labels: `cache` (token, verification), `result` (hit, miss, expired)
pub fn record_cache_lookup(cache: &'static str, result: &'static str) {
    counter!("sand_cache_lookups_total", "cache" => cache, "result" => result).increment(1);
}

// ============================================================================
// Outcome Metrics
// ============================================================================

/// Record a verification outcome.
///
/// Metric: `sand_verifications_total`
/// Labels: `outcome` (allowed, denied, server_error, error)
///
/// Cache hits are counted too, so this tracks decisions, not round trips.
pub fn record_verification(outcome: &'static str) {
    counter!("sand_verifications_total", "outcome" => outcome).increment(1);
}

/// Record the outcome of an authenticated Client request.
///
/// Metric: `sand_client_requests_total`
/// Labels: `outcome` (success, denied, exhausted, no_response)
pub fn record_client_request(outcome: &'static str) {
    counter!("sand_client_requests_total", "outcome" => outcome).increment(1);
}

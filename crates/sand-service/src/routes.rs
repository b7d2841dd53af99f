//! HTTP routes for the SAND service.

use axum::{
    extract::State,
    middleware,
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sand::middleware::{require_verified, VerifyState};
use sand::verification::VerificationResult;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Request timeout for the public routes.
///
/// The protected routes run without it: their latency is bounded by the
/// verification retry budget, and cutting that short would turn a 502
/// verification failure into a 408.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - `/api/v1/echo` - Echoes the caller's verification result - requires a
///   token the SAND verifier allows
/// - TraceLayer for request logging
/// - 30 second request timeout on the public routes
pub fn build_routes(verify_state: Arc<VerifyState>, metrics_handle: PrometheusHandle) -> Router {
    let public_routes = Router::new().route("/health", get(health_check));

    let metrics_routes = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics_handle);

    let protected_routes = Router::new()
        .route("/api/v1/echo", get(echo))
        .route_layer(middleware::from_fn_with_state(verify_state, require_verified));

    public_routes
        .merge(metrics_routes)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}

/// Returns the verification result the middleware attached to the request.
async fn echo(Extension(result): Extension<VerificationResult>) -> Json<VerificationResult> {
    Json(result)
}

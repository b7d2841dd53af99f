//! `require_verified` guarding an axum router.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    middleware,
    routing::get,
    Extension, Router,
};
use http_body_util::BodyExt;
use sand::acquirer::TokenAcquirer;
use sand::cache_key::CacheKeyBuilder;
use sand::client::Client;
use sand::middleware::{require_verified, VerifyState};
use sand::service::Service;
use sand::verification::VerificationResult;
use sand_test_utils::{
    scopes, MockTokenEndpoint, MockVerificationEndpoint, RecordingSleeper, TEST_RESOURCE,
};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

async fn whoami(Extension(result): Extension<VerificationResult>) -> String {
    result.sub.unwrap_or_default()
}

fn router(tokens: Arc<MockTokenEndpoint>, verifier: Arc<MockVerificationEndpoint>) -> Router {
    let acquirer = TokenAcquirer::new(tokens).with_sleeper(RecordingSleeper::new());
    let client = Client::new(acquirer).with_cache_key_builder(CacheKeyBuilder::service());
    let service = Service::new(client, verifier, TEST_RESOURCE, scopes(&["hydra"])).unwrap();
    let state = Arc::new(VerifyState {
        num_retries: 1,
        ..VerifyState::new(service, scopes(&["read"]), "get")
    });

    Router::new()
        .route("/whoami", get(whoami))
        .layer(middleware::from_fn_with_state(state, require_verified))
}

fn request(authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri("/whoami");
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::empty()).unwrap()
}

async fn error_code(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    body["error"]["code"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_allowed_request_reaches_handler() {
    let app = router(
        MockTokenEndpoint::issuing(),
        MockVerificationEndpoint::allowing("client-1"),
    );

    let response = app.oneshot(request(Some("Bearer client-token"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"client-1");
}

#[tokio::test]
async fn test_denied_request_is_401() {
    let app = router(MockTokenEndpoint::issuing(), MockVerificationEndpoint::denying());

    let response = app.oneshot(request(Some("Bearer client-token"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    assert_eq!(error_code(response).await, "ACCESS_DENIED");
}

#[tokio::test]
async fn test_missing_header_is_401_without_verification() {
    let verifier = MockVerificationEndpoint::allowing("client-1");
    let app = router(MockTokenEndpoint::issuing(), verifier.clone());

    let response = app.oneshot(request(None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(response).await, "INVALID_TOKEN");
    assert_eq!(verifier.call_count(), 0);
}

#[tokio::test]
async fn test_non_bearer_scheme_is_401() {
    let app = router(
        MockTokenEndpoint::issuing(),
        MockVerificationEndpoint::allowing("client-1"),
    );

    let response = app.oneshot(request(Some("Basic dXNlcjpwYXNz"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_verifier_rejection_is_502() {
    let app = router(
        MockTokenEndpoint::issuing(),
        MockVerificationEndpoint::responding(403, json!({"error": "forbidden"})),
    );

    let response = app.oneshot(request(Some("Bearer client-token"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(error_code(response).await, "VERIFICATION_ERROR");
}

#[tokio::test]
async fn test_service_token_outage_is_502() {
    let tokens = MockTokenEndpoint::failing();
    let app = router(tokens.clone(), MockVerificationEndpoint::allowing("client-1"));

    let response = app.oneshot(request(Some("Bearer client-token"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    // num_retries = 1: one attempt plus one retry
    assert_eq!(tokens.call_count(), 2);
}

#[tokio::test]
async fn test_verifier_500_is_401() {
    let app = router(
        MockTokenEndpoint::issuing(),
        MockVerificationEndpoint::responding(500, json!({})),
    );

    let response = app.oneshot(request(Some("Bearer client-token"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

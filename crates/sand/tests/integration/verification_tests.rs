//! Service role: token verification against scripted and wiremock servers.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use sand::acquirer::TokenAcquirer;
use sand::cache_key::CacheKeyBuilder;
use sand::client::Client;
use sand::error::VerifyError;
use sand::service::Service;
use sand::verification::{VerificationOptions, VerificationResult};
use sand::VERIFICATION_ERROR_STATUS;
use sand_test_utils::{
    allowed_response, denied_response, exp_in, scopes, MockTokenEndpoint,
    MockVerificationEndpoint, RecordingSleeper, TestAuthServer, VerifyOutcome, TEST_RESOURCE,
};
use serde_json::json;
use std::sync::Arc;

fn service(
    tokens: Arc<MockTokenEndpoint>,
    verifier: Arc<MockVerificationEndpoint>,
) -> Service {
    let acquirer = TokenAcquirer::new(tokens).with_sleeper(RecordingSleeper::new());
    let client = Client::new(acquirer).with_cache_key_builder(CacheKeyBuilder::service());
    Service::new(client, verifier, TEST_RESOURCE, scopes(&["hydra"])).unwrap()
}

fn options() -> VerificationOptions {
    VerificationOptions::new(scopes(&["read"]), "get", TEST_RESOURCE).unwrap()
}

// ============================================================================
// Scripted endpoints
// ============================================================================

#[tokio::test]
async fn test_round_trip_is_cached() {
    let tokens = MockTokenEndpoint::issuing();
    let verifier = MockVerificationEndpoint::responding(
        200,
        json!({"allowed": true, "sub": "client-1", "scopes": ["read"], "exp": exp_in(600)}),
    );
    let service = service(tokens.clone(), verifier.clone());

    let first = service.verify("client-token", &options()).await.unwrap();
    let second = service.verify("client-token", &options()).await.unwrap();

    assert!(first.allowed);
    assert_eq!(first.sub.as_deref(), Some("client-1"));
    assert_eq!(first, second);
    assert_eq!(verifier.call_count(), 1);
    assert_eq!(tokens.call_count(), 1);
}

#[tokio::test]
async fn test_payload_and_service_authentication() {
    let tokens = MockTokenEndpoint::issuing();
    let verifier = MockVerificationEndpoint::allowing("client-1");
    let service = service(tokens.clone(), verifier.clone());

    let mut context = serde_json::Map::new();
    context.insert("ip".to_string(), json!("10.1.2.3"));
    service
        .verify("client-token", &options().with_context(context))
        .await
        .unwrap();

    assert_eq!(
        verifier.requests(),
        vec![json!({
            "scopes": ["read"],
            "token": "client-token",
            "resource": "orders",
            "action": "get",
            "context": {"ip": "10.1.2.3"}
        })]
    );
    assert_eq!(verifier.access_tokens(), vec!["tok-1"]);
    assert_eq!(tokens.requested_scopes(), vec![scopes(&["hydra"])]);
}

#[tokio::test]
async fn test_server_error_softens_to_denied() {
    let verifier = MockVerificationEndpoint::scripted(vec![
        VerifyOutcome::Respond {
            status: 500,
            body: json!({"error": "down"}),
        },
        VerifyOutcome::Respond {
            status: 200,
            body: allowed_response("client-1", &["read"]),
        },
    ]);
    let service = service(MockTokenEndpoint::issuing(), verifier.clone());

    let softened = service.verify("client-token", &options()).await.unwrap();
    assert_eq!(softened, VerificationResult::denied());

    // Not cached: the next call reaches the endpoint and sees the recovery
    let recovered = service.verify("client-token", &options()).await.unwrap();
    assert!(recovered.allowed);
    assert_eq!(verifier.call_count(), 2);
}

#[tokio::test]
async fn test_rejection_carries_status_and_body() {
    let verifier = MockVerificationEndpoint::responding(400, json!({"error": "bad scopes"}));
    let service = service(MockTokenEndpoint::issuing(), verifier);

    let err = service.verify("client-token", &options()).await.unwrap_err();

    assert!(
        matches!(
            err,
            VerifyError::Rejected { status: 400, ref body } if body.contains("bad scopes")
        ),
        "got {err:?}"
    );
    assert_eq!(err.status_code(), VERIFICATION_ERROR_STATUS);
}

#[tokio::test]
async fn test_unreachable_verifier_is_transport_error() {
    let service = service(
        MockTokenEndpoint::issuing(),
        MockVerificationEndpoint::unreachable(),
    );

    let err = service.verify("client-token", &options()).await.unwrap_err();
    assert!(matches!(err, VerifyError::Transport(_)));
}

#[tokio::test]
async fn test_missing_service_token_is_hard_failure() {
    let tokens = MockTokenEndpoint::failing();
    let verifier = MockVerificationEndpoint::allowing("client-1");
    let service = service(tokens.clone(), verifier.clone());

    let err = service
        .verify("client-token", &options().with_num_retries(2))
        .await
        .unwrap_err();

    assert!(matches!(err, VerifyError::ServiceTokenUnavailable));
    assert_eq!(tokens.call_count(), 3);
    assert_eq!(verifier.call_count(), 0);
}

#[tokio::test]
async fn test_expired_result_is_not_served() {
    let verifier = MockVerificationEndpoint::responding(
        200,
        json!({"allowed": true, "sub": "client-1", "exp": exp_in(-60)}),
    );
    let service = service(MockTokenEndpoint::issuing(), verifier.clone());

    service.verify("client-token", &options()).await.unwrap();
    service.verify("client-token", &options()).await.unwrap();

    assert_eq!(verifier.call_count(), 2);
}

#[tokio::test]
async fn test_denial_is_cached() {
    let verifier = MockVerificationEndpoint::denying();
    let service = service(MockTokenEndpoint::issuing(), verifier.clone());

    for _ in 0..3 {
        assert!(!service.verify("client-token", &options()).await.unwrap().allowed);
    }
    assert_eq!(verifier.call_count(), 1);
}

// ============================================================================
// Real HTTP
// ============================================================================

#[tokio::test]
async fn test_service_from_config_end_to_end() {
    let auth = TestAuthServer::start().await;
    auth.mount_token("service-token", 3600).await;
    auth.mount_verify(200, allowed_response("client-1", &["read"])).await;

    let service = Service::from_config(&auth.service_config()).unwrap();

    let mut headers = axum::http::HeaderMap::new();
    headers.insert("authorization", "Bearer client-token".parse().unwrap());
    let result = service
        .verify_request(&headers, scopes(&["read"]), "get", -1)
        .await
        .unwrap();
    assert!(result.allowed);
    assert_eq!(result.sub.as_deref(), Some("client-1"));

    // Cached by the second call
    service
        .verify_request(&headers, scopes(&["read"]), "get", -1)
        .await
        .unwrap();

    let verify_requests = auth.verify_requests().await;
    assert_eq!(verify_requests.len(), 1);
    let request = verify_requests.first().unwrap();
    assert_eq!(
        request.headers.get("authorization").unwrap().to_str().unwrap(),
        "Bearer service-token"
    );
    let payload: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(payload["token"], "client-token");
    assert_eq!(payload["resource"], TEST_RESOURCE);
    assert_eq!(payload["context"], json!({}));

    let token_requests = auth.token_requests().await;
    let body = String::from_utf8(token_requests.first().unwrap().body.clone()).unwrap();
    assert!(body.contains("scope=hydra"));
}

#[tokio::test]
async fn test_http_500_and_403_over_the_wire() {
    let auth = TestAuthServer::start().await;
    auth.mount_token("service-token", 3600).await;
    auth.mount_verify(500, json!({"error": "down"})).await;

    let service = Service::from_config(&auth.service_config()).unwrap();
    let result = service.verify("client-token", &options()).await.unwrap();
    assert!(!result.allowed);

    let auth = TestAuthServer::start().await;
    auth.mount_token("service-token", 3600).await;
    auth.mount_verify(403, denied_response()).await;

    let service = Service::from_config(&auth.service_config()).unwrap();
    let err = service.verify("client-token", &options()).await.unwrap_err();
    assert!(matches!(err, VerifyError::Rejected { status: 403, .. }));
}

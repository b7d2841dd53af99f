//! Client role end to end: token endpoint, protected service and 401 retry.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use sand::acquirer::TokenAcquirer;
use sand::client::Client;
use sand::endpoint::HttpTokenEndpoint;
use sand::secret::ExposeSecret;
use sand_test_utils::{scopes, MockTokenEndpoint, RecordingSleeper, TestAuthServer};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{bearer_token, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Client over real HTTP whose backoff is recorded instead of slept.
fn http_client(server: &TestAuthServer, sleeper: Arc<RecordingSleeper>) -> Client {
    let endpoint = HttpTokenEndpoint::new(&server.client_config()).unwrap();
    Client::new(TokenAcquirer::new(Arc::new(endpoint)).with_sleeper(sleeper))
}

async fn call_protected(
    http: &reqwest::Client,
    url: &str,
    token: &sand::token::AccessToken,
) -> Option<reqwest::Response> {
    http.get(url)
        .bearer_auth(token.value().expose_secret())
        .send()
        .await
        .ok()
}

// ============================================================================
// Real HTTP
// ============================================================================

#[tokio::test]
async fn test_request_with_cached_token() {
    let auth = TestAuthServer::start().await;
    auth.mount_token("tok-good", 3600).await;

    let protected = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders"))
        .and(bearer_token("tok-good"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(3)
        .mount(&protected)
        .await;

    let client = http_client(&auth, RecordingSleeper::new());
    let http = reqwest::Client::new();
    let url = format!("{}/orders", protected.uri());

    for _ in 0..3 {
        let response = client
            .request("orders-client", &scopes(&["read"]), |token| {
                let http = http.clone();
                let url = url.clone();
                async move { call_protected(&http, &url, &token).await }
            })
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    assert_eq!(auth.token_requests().await.len(), 1);
}

#[tokio::test]
async fn test_revoked_token_is_replaced_after_401() {
    let auth = TestAuthServer::start().await;
    // First exchange hands out a token the protected service rejects
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(sand_test_utils::token_response("tok-revoked", 3600)),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .mount(auth.mock_server())
        .await;
    auth.mount_token("tok-fresh", 3600).await;

    let protected = MockServer::start().await;
    Mock::given(method("GET"))
        .and(bearer_token("tok-revoked"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&protected)
        .await;
    Mock::given(method("GET"))
        .and(bearer_token("tok-fresh"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&protected)
        .await;

    let sleeper = RecordingSleeper::new();
    let client = http_client(&auth, sleeper.clone());
    let http = reqwest::Client::new();
    let url = format!("{}/orders", protected.uri());

    let response = client
        .execute("orders-client", &scopes(&["read"]), 3, |token| {
            let http = http.clone();
            let url = url.clone();
            async move { call_protected(&http, &url, &token).await }
        })
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(auth.token_requests().await.len(), 2);
    assert_eq!(sleeper.delays(), vec![Duration::from_secs(2)]);
}

#[tokio::test]
async fn test_token_request_uses_basic_auth_and_form() {
    let auth = TestAuthServer::start().await;
    auth.mount_token("tok", 3600).await;

    let client = http_client(&auth, RecordingSleeper::new());
    client.token("svc", &scopes(&["read", "write"]), 0).await.unwrap();

    let requests = auth.token_requests().await;
    let request = requests.first().unwrap();
    let body = String::from_utf8(request.body.clone()).unwrap();
    assert!(body.contains("grant_type=client_credentials"));
    assert!(body.contains("scope=read+write"));
    let authorization = request.headers.get("authorization").unwrap().to_str().unwrap();
    assert!(authorization.starts_with("Basic "));
}

#[tokio::test]
async fn test_token_endpoint_outage_is_retried() {
    let auth = TestAuthServer::start().await;
    auth.mount_token_failures(503, 2).await;
    auth.mount_token("tok", 3600).await;

    let sleeper = RecordingSleeper::new();
    let client = http_client(&auth, sleeper.clone());

    let token = client.token("svc", &scopes(&["read"]), 5).await.unwrap();

    assert_eq!(token.value().expose_secret(), "tok");
    assert_eq!(auth.token_requests().await.len(), 3);
    assert_eq!(
        sleeper.delays(),
        vec![Duration::from_secs(2), Duration::from_secs(4)]
    );
}

#[tokio::test]
async fn test_from_config_builds_working_client() {
    let auth = TestAuthServer::start().await;
    auth.mount_token("tok-config", 3600).await;

    let client = Client::from_config(&auth.client_config()).unwrap();
    let token = client.token("svc", &scopes(&["read"]), 0).await.unwrap();

    assert_eq!(token.value().expose_secret(), "tok-config");
}

// ============================================================================
// Scripted endpoint
// ============================================================================

#[derive(Debug)]
struct Status(u16);

impl sand::client::StatusResponse for Status {
    fn status_code(&self) -> u16 {
        self.0
    }
}

#[tokio::test]
async fn test_three_retries_two_denials_three_token_fetches() {
    let endpoint = MockTokenEndpoint::issuing();
    let sleeper = RecordingSleeper::new();
    let client = Client::new(TokenAcquirer::new(endpoint.clone()).with_sleeper(sleeper.clone()));
    let mut statuses = vec![401u16, 401, 200].into_iter();

    let response = client
        .execute("svc", &scopes(&["read"]), 3, |_token| {
            let status = statuses.next();
            async move { status.map(Status) }
        })
        .await
        .unwrap();

    assert_eq!(response.0, 200);
    assert_eq!(endpoint.call_count(), 3);
    assert_eq!(
        sleeper.delays(),
        vec![Duration::from_secs(2), Duration::from_secs(4)]
    );
}

#[tokio::test]
async fn test_token_outage_makes_request_absent() {
    let endpoint = MockTokenEndpoint::failing();
    let sleeper = RecordingSleeper::new();
    let client = Client::new(TokenAcquirer::new(endpoint.clone()).with_sleeper(sleeper.clone()));

    let response = client
        .execute("svc", &scopes(&["read"]), 1, |_token| async move { Some(Status(200)) })
        .await;

    assert!(response.is_none());
    // Two outer rounds of one attempt plus one inner retry each
    assert_eq!(endpoint.call_count(), 4);
}

//! Token acquisition tests against scripted endpoints.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use sand::acquirer::TokenAcquirer;
use sand::backoff::BackoffPolicy;
use sand::secret::ExposeSecret;
use sand_test_utils::{scopes, MockTokenEndpoint, RecordingSleeper, TokenOutcome};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Cache behavior
// ============================================================================

#[tokio::test]
async fn test_cache_hit_never_calls_endpoint() {
    let endpoint = MockTokenEndpoint::issuing();
    let acquirer = TokenAcquirer::new(endpoint.clone());
    let scopes = scopes(&["read"]);

    let first = acquirer.acquire("sand/resources/a/read", &scopes, 0).await.unwrap();
    for _ in 0..10 {
        let again = acquirer.acquire("sand/resources/a/read", &scopes, 0).await.unwrap();
        assert_eq!(again.value().expose_secret(), first.value().expose_secret());
    }

    assert_eq!(endpoint.call_count(), 1);
}

#[tokio::test]
async fn test_short_lived_token_is_never_served_from_cache() {
    // Lifetime inside the expiry margin: stale as soon as it is cached
    let endpoint = MockTokenEndpoint::scripted(vec![
        TokenOutcome::IssueFixed {
            value: "short".to_string(),
            expires_in: 1,
        },
        TokenOutcome::IssueFixed {
            value: "long".to_string(),
            expires_in: 3600,
        },
    ]);
    let acquirer = TokenAcquirer::new(endpoint.clone());
    let scopes = scopes(&["read"]);

    let first = acquirer.acquire("k", &scopes, 0).await.unwrap();
    let second = acquirer.acquire("k", &scopes, 0).await.unwrap();

    assert_eq!(first.value().expose_secret(), "short");
    assert_eq!(second.value().expose_secret(), "long");
    assert_eq!(endpoint.call_count(), 2);
}

#[tokio::test]
async fn test_concurrent_misses_all_get_tokens() {
    let endpoint = MockTokenEndpoint::issuing();
    let acquirer = TokenAcquirer::new(endpoint.clone());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let acquirer = acquirer.clone();
            tokio::spawn(async move { acquirer.acquire("shared", &scopes(&["read"]), 0).await })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap().is_some());
    }

    // No single-flight: duplicates are allowed, but never more than one per caller
    let calls = endpoint.call_count();
    assert!((1..=8).contains(&calls), "calls = {calls}");

    // Afterwards the cache serves everyone
    acquirer.acquire("shared", &scopes(&["read"]), 0).await.unwrap();
    assert_eq!(endpoint.call_count(), calls);
}

// ============================================================================
// Retry behavior
// ============================================================================

#[tokio::test]
async fn test_transient_failures_back_off_exponentially() {
    let endpoint = MockTokenEndpoint::failing_then_issuing(3);
    let sleeper = RecordingSleeper::new();
    let acquirer = TokenAcquirer::new(endpoint.clone()).with_sleeper(sleeper.clone());

    let token = acquirer.acquire("k", &scopes(&["read"]), 5).await.unwrap();

    assert_eq!(token.value().expose_secret(), "tok-1");
    assert_eq!(endpoint.call_count(), 4);
    assert_eq!(
        sleeper.delays(),
        vec![
            Duration::from_secs(2),
            Duration::from_secs(4),
            Duration::from_secs(8)
        ]
    );
}

#[tokio::test]
async fn test_exhausted_retries_return_none() {
    let endpoint = MockTokenEndpoint::failing();
    let sleeper = RecordingSleeper::new();
    let acquirer = TokenAcquirer::new(endpoint.clone())
        .with_sleeper(sleeper.clone())
        .with_policy(BackoffPolicy::default().with_unit(Duration::from_millis(100)));

    assert!(acquirer.acquire("k", &scopes(&["read"]), 3).await.is_none());

    assert_eq!(endpoint.call_count(), 4);
    assert_eq!(sleeper.total(), Duration::from_millis(200 + 400 + 800));
    assert!(acquirer.cache().get(&"k".to_string()).is_none());
}

#[tokio::test]
async fn test_requested_scopes_reach_endpoint() {
    let endpoint = MockTokenEndpoint::issuing();
    let acquirer =
        TokenAcquirer::new(endpoint.clone()).with_sleeper(Arc::new(RecordingSleeper::default()));

    let token = acquirer.acquire("k", &scopes(&["read", "write"]), 0).await.unwrap();

    assert_eq!(endpoint.requested_scopes(), vec![scopes(&["read", "write"])]);
    assert_eq!(token.scopes(), ["read", "write"]);
}

//! # SAND Test Utilities
//!
//! Shared test utilities for the `sand` crate and its binaries.
//!
//! This crate provides:
//! - Scripted endpoint mocks (`MockTokenEndpoint`, `MockVerificationEndpoint`)
//! - A sleeper that records backoff delays instead of waiting (`RecordingSleeper`)
//! - A wiremock authorization server harness (`TestAuthServer`)
//! - Fixed test credentials and response bodies
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sand_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let endpoint = MockTokenEndpoint::failing_then_issuing(2);
//!     let sleeper = RecordingSleeper::new();
//!     let acquirer = TokenAcquirer::new(endpoint.clone()).with_sleeper(sleeper.clone());
//!
//!     let token = acquirer.acquire("key", &scopes(&["read"]), 5).await;
//!     assert!(token.is_some());
//!     assert_eq!(endpoint.call_count(), 3);
//!     assert_eq!(sleeper.delays().len(), 2);
//! }
//! ```

pub mod auth_server;
pub mod fixtures;
pub mod mock_endpoints;
pub mod sleeper;

// Re-export commonly used items
pub use auth_server::*;
pub use fixtures::*;
pub use mock_endpoints::*;
pub use sleeper::*;

//! Axum middleware that guards routes with token verification.
//!
//! [`require_verified`] verifies the request's bearer token through a
//! [`Service`] and stores the
//! [`VerificationResult`](crate::verification::VerificationResult) in request extensions,
//! where handlers can read it with `Extension<VerificationResult>`.

use crate::client::ACCESS_DENIED_STATUS;
use crate::error::VerifyError;
use crate::service::Service;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

/// What a guarded route requires of the caller's token.
#[derive(Clone)]
pub struct VerifyState {
    pub service: Service,
    pub target_scopes: Vec<String>,
    pub action: String,
    /// Retries for the Service's own token; negative means the default.
    pub num_retries: i32,
}

impl VerifyState {
    #[must_use]
    pub fn new(service: Service, target_scopes: Vec<String>, action: impl Into<String>) -> Self {
        Self {
            service,
            target_scopes,
            action: action.into(),
            num_retries: -1,
        }
    }
}

/// Rejection produced by [`require_verified`].
#[derive(Debug)]
pub enum AuthError {
    /// The authorization server did not allow the token.
    Denied,
    /// The token could not be verified.
    Verification(VerifyError),
}

impl From<VerifyError> for AuthError {
    fn from(err: VerifyError) -> Self {
        AuthError::Verification(err)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status_code, code, message) = match &self {
            AuthError::Denied => (
                ACCESS_DENIED_STATUS,
                "ACCESS_DENIED",
                "Access denied".to_string(),
            ),
            AuthError::Verification(VerifyError::MissingToken(reason)) => {
                (ACCESS_DENIED_STATUS, "INVALID_TOKEN", reason.clone())
            }
            AuthError::Verification(err) => {
                // Details stay server-side
                tracing::error!(
                    target: "sand.middleware",
                    error = %err,
                    "Token verification failed"
                );
                (
                    err.status_code(),
                    "VERIFICATION_ERROR",
                    "Token verification is unavailable".to_string(),
                )
            }
        };

        let status = StatusCode::from_u16(status_code).unwrap_or(StatusCode::BAD_GATEWAY);
        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) = "Bearer realm=\"sand\", error=\"invalid_token\"".parse() {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, header_value);
            }
        }

        response
    }
}

/// Verify the bearer token before running the route.
///
/// # Response
///
/// - 401 with `WWW-Authenticate` if the token is missing, malformed or denied
/// - 502 if verification itself fails
/// - Otherwise the route runs with the result in request extensions
#[instrument(skip(state, req, next), name = "sand.middleware.verify")]
pub async fn require_verified(
    State(state): State<Arc<VerifyState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let result = state
        .service
        .verify_request(
            req.headers(),
            state.target_scopes.clone(),
            &state.action,
            state.num_retries,
        )
        .await?;

    if !result.allowed {
        tracing::debug!(target: "sand.middleware", action = %state.action, "Token not allowed");
        return Err(AuthError::Denied);
    }

    req.extensions_mut().insert(result);
    Ok(next.run(req).await)
}

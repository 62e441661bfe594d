// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.
//!
//! Two layers:
//!
//! - [`TokenError`] is what the token authority reports. It keeps the precise
//!   reason so it can be logged.
//! - [`AuthError`] is what leaves the server. Every token rejection collapses
//!   into a single `unauthorized` body, so a caller holding a bad token cannot
//!   tell a forged signature from an expired or revoked session.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::storage::StorageError;

/// Failure of a token authority operation.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// No private key loaded; this node cannot issue tokens
    #[error("signing key is unavailable")]
    KeyUnavailable,

    /// Session storage failed; never retried inside the authority
    #[error("session repository failure: {0}")]
    Repository(#[source] StorageError),

    /// Malformed token, foreign key id or signature mismatch
    #[error("token signature is invalid")]
    InvalidSignature,

    /// Encoded expiry lies in the past
    #[error("token has expired")]
    Expired,

    /// Session revoked, missing, or owned by another user
    #[error("session has been revoked")]
    SessionRevoked,

    /// Explicit revoke of an unknown session id
    #[error("session not found")]
    NotFound,
}

impl TokenError {
    /// Whether this error is a credential rejection rather than an
    /// infrastructure failure.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            TokenError::InvalidSignature | TokenError::Expired | TokenError::SessionRevoked
        )
    }
}

/// Authentication and authorization rejections as seen by clients.
#[derive(Debug)]
pub enum AuthError {
    /// Authorization header present but not `Bearer <token>`
    InvalidAuthHeader,
    /// Token rejected (signature, expiry, or session state)
    Unauthorized,
    /// Identity established (or absent) but not allowed to perform the action
    Forbidden,
    /// Infrastructure failure during authentication
    InternalError(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::Unauthorized => "unauthorized",
            AuthError::Forbidden => "forbidden",
            AuthError::InternalError(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidAuthHeader | AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::InvalidAuthHeader => {
                write!(f, "Invalid authorization header format (expected 'Bearer <token>')")
            }
            AuthError::Unauthorized => write!(f, "Invalid or expired session token"),
            AuthError::Forbidden => write!(f, "Insufficient permissions for this operation"),
            // The detail is for logs only.
            AuthError::InternalError(_) => write!(f, "Internal authentication error"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        if err.is_unauthorized() {
            AuthError::Unauthorized
        } else {
            AuthError::InternalError(err.to_string())
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(response: Response) -> serde_json::Value {
        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body_bytes).unwrap()
    }

    #[tokio::test]
    async fn token_rejections_share_one_response() {
        let mut bodies = Vec::new();
        for err in [
            TokenError::InvalidSignature,
            TokenError::Expired,
            TokenError::SessionRevoked,
        ] {
            let response = AuthError::from(err).into_response();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            bodies.push(body_of(response).await);
        }

        assert_eq!(bodies[0]["error_code"], "unauthorized");
        assert!(bodies.windows(2).all(|pair| pair[0] == pair[1]));
    }

    #[tokio::test]
    async fn forbidden_returns_403() {
        let response = AuthError::Forbidden.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_of(response).await["error_code"], "forbidden");
    }

    #[tokio::test]
    async fn repository_failure_is_internal_and_hides_detail() {
        let err = TokenError::Repository(StorageError::NotFound("disk on fire".to_string()));
        let response = AuthError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_of(response).await;
        assert!(!body["error"].as_str().unwrap().contains("disk on fire"));
    }

    #[test]
    fn only_credential_failures_are_unauthorized() {
        assert!(TokenError::Expired.is_unauthorized());
        assert!(!TokenError::KeyUnavailable.is_unauthorized());
        assert!(!TokenError::NotFound.is_unauthorized());
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authenticator request middleware.
//!
//! Looks for `Authorization: Bearer <token>`:
//!
//! - no header: the request continues anonymously and the access controller
//!   decides whether that is enough
//! - valid token: the identity is attached to the request context
//! - anything else: the request ends here with 401 (or 500 if the session
//!   store failed), before any later stage or handler runs
//!
//! Routes flagged `anonymous_entry` (login) are passed through untouched.

use axum::{
    http::{header::AUTHORIZATION, HeaderMap},
    response::IntoResponse,
};
use tracing::{debug, warn};

use super::authority::TokenAuthority;
use super::error::AuthError;
use crate::pipeline::{Flow, Middleware, RequestContext, RequestHead};

const BEARER_PREFIX: &str = "Bearer ";

/// Verifies bearer tokens through a [`TokenAuthority`].
#[derive(Debug, Clone)]
pub struct Authenticator {
    authority: TokenAuthority,
}

impl Authenticator {
    pub fn new(authority: TokenAuthority) -> Self {
        Self { authority }
    }
}

impl Middleware for Authenticator {
    fn name(&self) -> &'static str {
        "authenticator"
    }

    fn handle(&self, ctx: RequestContext, head: &RequestHead<'_>) -> Flow {
        if head.anonymous_entry {
            return Flow::Continue(ctx);
        }

        let token = match bearer_token(&head.parts.headers) {
            Ok(Some(token)) => token,
            Ok(None) => return Flow::Continue(ctx),
            Err(e) => return Flow::Halt(e.into_response()),
        };

        match self.authority.verify(token) {
            Ok(identity) => {
                debug!(
                    user_id = %identity.user_id,
                    session_id = %identity.session_id,
                    request_id = ctx.request_id(),
                    "Request authenticated"
                );
                Flow::Continue(ctx.with_identity(identity))
            }
            Err(e) => {
                if e.is_unauthorized() {
                    debug!(reason = %e, request_id = ctx.request_id(), "Bearer token rejected");
                } else {
                    warn!(error = %e, request_id = ctx.request_id(), "Token verification failed");
                }
                Flow::Halt(AuthError::from(e).into_response())
            }
        }
    }
}

/// Extract the bearer token. `Ok(None)` when there is no Authorization header.
fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AuthError> {
    let Some(header) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let token = header
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?
        .strip_prefix(BEARER_PREFIX)
        .ok_or(AuthError::InvalidAuthHeader)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::InvalidAuthHeader);
    }
    Ok(Some(token))
}

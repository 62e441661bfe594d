// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Middleware contracts.
//!
//! Two kinds:
//!
//! - [`ContextMiddleware`] runs once while the app is built and installs a
//!   shared capability into the [`SharedContextBuilder`].
//! - [`Middleware`] runs once per request and either hands an updated
//!   [`RequestContext`] to the next stage or ends the request with a
//!   response. Short-circuiting is a return value, not an error path.

use axum::{
    http::{header::CONTENT_TYPE, request::Parts, Method},
    response::{IntoResponse, Response},
};
use tracing::debug;

use super::context::{RequestContext, SharedContextBuilder};
use crate::auth::Target;
use crate::error::{ApiError, ServerError};

/// Outcome of one request middleware.
#[derive(Debug)]
pub enum Flow {
    /// Run the next stage with this context
    Continue(RequestContext),
    /// Stop here and send this response; later stages and the handler are skipped
    Halt(Response),
}

/// Read-only view of the request for middlewares.
#[derive(Debug)]
pub struct RequestHead<'a> {
    pub parts: &'a Parts,
    /// Resource and action the matched route performs
    pub target: &'a Target,
    /// Route creates a session and must not require one
    pub anonymous_entry: bool,
}

/// Installs a shared capability once, at app build time.
pub trait ContextMiddleware: Send + Sync {
    fn name(&self) -> &'static str;

    fn install(&self, ctx: &mut SharedContextBuilder) -> Result<(), ServerError>;
}

/// Runs per request and may short-circuit.
pub trait Middleware: Send + Sync {
    fn name(&self) -> &'static str;

    fn handle(&self, ctx: RequestContext, head: &RequestHead<'_>) -> Flow;
}

/// Rejects body-carrying requests that are not JSON with 415.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireJson;

impl Middleware for RequireJson {
    fn name(&self) -> &'static str {
        "require_json"
    }

    fn handle(&self, ctx: RequestContext, head: &RequestHead<'_>) -> Flow {
        if !matches!(head.parts.method, Method::POST | Method::PUT | Method::PATCH) {
            return Flow::Continue(ctx);
        }

        let is_json = head
            .parts
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"));

        if is_json {
            Flow::Continue(ctx)
        } else {
            debug!(resource = head.target.resource, "Rejected non-JSON body");
            Flow::Halt(
                ApiError::unsupported_media_type("Expected Content-Type: application/json")
                    .into_response(),
            )
        }
    }
}

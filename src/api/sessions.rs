// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session resource: login, logout, reissue and admin revocation.

use std::sync::Arc;

use axum::http::Method;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    auth::{Action, AuthenticatedIdentity, IssuedToken, TokenAuthority},
    error::ApiError,
    pipeline::{HandlerRequest, Reply, RequestContext, RequireJson, Resource, Route},
    storage::{StoredSession, UserRepository},
};

/// Resource name for session creation and administration.
pub const SESSIONS: &str = "sessions";

/// Resource name for the caller's own session.
pub const CURRENT_SESSION: &str = "current_session";

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// A newly issued bearer token.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    /// Send as `Authorization: Bearer <token>`
    pub token: String,
    pub session_id: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

impl From<IssuedToken> for TokenResponse {
    fn from(issued: IssuedToken) -> Self {
        Self {
            token: issued.token.into_string(),
            session_id: issued.session.id,
            user_id: issued.session.user_id,
            expires_at: issued.session.expires_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentSessionResponse {
    pub identity: AuthenticatedIdentity,
    pub session: StoredSession,
}

/// Sessions are created by credentials and ended by revocation; a token is
/// never extended in place.
#[derive(Debug, Clone)]
pub struct SessionsResource {
    authority: TokenAuthority,
}

impl SessionsResource {
    pub fn new(authority: TokenAuthority) -> Self {
        Self { authority }
    }
}

impl Resource for SessionsResource {
    fn name(&self) -> &'static str {
        SESSIONS
    }

    fn routes(self: Arc<Self>) -> Vec<Route> {
        let login_res = Arc::clone(&self);
        let current_res = Arc::clone(&self);
        let refresh_res = Arc::clone(&self);
        let logout_res = Arc::clone(&self);
        let revoke_res = self;

        vec![
            Route::new(Method::POST, "/sessions", SESSIONS, Action::Create, move |ctx, req| {
                login(&login_res.authority, ctx, req)
            })
            .anonymous_entry()
            .with_middleware(RequireJson),
            Route::new(
                Method::GET,
                "/sessions/current",
                CURRENT_SESSION,
                Action::Read,
                move |ctx, req| current_session(&current_res.authority, ctx, req),
            ),
            Route::new(
                Method::POST,
                "/sessions/current/refresh",
                CURRENT_SESSION,
                Action::Update,
                move |ctx, req| refresh_session(&refresh_res.authority, ctx, req),
            ),
            Route::new(
                Method::DELETE,
                "/sessions/current",
                CURRENT_SESSION,
                Action::Delete,
                move |ctx, req| logout(&logout_res.authority, ctx, req),
            ),
            Route::new(
                Method::DELETE,
                "/sessions/{session_id}",
                SESSIONS,
                Action::Delete,
                move |ctx, req| revoke_session(&revoke_res.authority, ctx, req),
            ),
        ]
    }
}

/// Log in with username and password.
#[utoipa::path(
    post,
    path = "/sessions",
    request_body = LoginRequest,
    tag = "Sessions",
    responses(
        (status = 201, description = "Session created", body = TokenResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 415, description = "Body is not JSON")
    )
)]
pub fn login(
    authority: &TokenAuthority,
    ctx: &RequestContext,
    req: HandlerRequest,
) -> Result<Reply, ApiError> {
    let request: LoginRequest = req.json()?;

    let users = UserRepository::new(ctx.db().clone());
    let Some(user) = users.authenticate(&request.username, &request.password)? else {
        return Err(ApiError::unauthorized("Invalid username or password"));
    };

    let issued = authority.issue(&user.id)?;
    Reply::created(&TokenResponse::from(issued))
}

/// The caller's identity and session.
#[utoipa::path(
    get,
    path = "/sessions/current",
    tag = "Sessions",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, body = CurrentSessionResponse),
        (status = 401, description = "Invalid or expired token"),
        (status = 403, description = "No token presented")
    )
)]
pub fn current_session(
    authority: &TokenAuthority,
    ctx: &RequestContext,
    _req: HandlerRequest,
) -> Result<Reply, ApiError> {
    let identity = ctx.require_identity()?;
    let session = authority.session(&identity.session_id)?;
    Reply::ok(&CurrentSessionResponse {
        identity: identity.clone(),
        session,
    })
}

/// Exchange the current token for a new one; the old session is revoked.
#[utoipa::path(
    post,
    path = "/sessions/current/refresh",
    tag = "Sessions",
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "New session created", body = TokenResponse),
        (status = 401, description = "Invalid or expired token"),
        (status = 403, description = "No token presented")
    )
)]
pub fn refresh_session(
    authority: &TokenAuthority,
    ctx: &RequestContext,
    _req: HandlerRequest,
) -> Result<Reply, ApiError> {
    let identity = ctx.require_identity()?;
    let issued = authority.reissue(identity)?;
    Reply::created(&TokenResponse::from(issued))
}

/// Log out: revoke the caller's session.
#[utoipa::path(
    delete,
    path = "/sessions/current",
    tag = "Sessions",
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Session revoked"),
        (status = 401, description = "Invalid or expired token"),
        (status = 403, description = "No token presented")
    )
)]
pub fn logout(
    authority: &TokenAuthority,
    ctx: &RequestContext,
    _req: HandlerRequest,
) -> Result<Reply, ApiError> {
    let identity = ctx.require_identity()?;
    authority.revoke(&identity.session_id)?;
    Ok(Reply::no_content())
}

/// Revoke any session (admin only). Revoking twice succeeds.
#[utoipa::path(
    delete,
    path = "/sessions/{session_id}",
    params(
        ("session_id" = String, Path, description = "Session to revoke")
    ),
    tag = "Sessions",
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Session revoked"),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "No such session")
    )
)]
pub fn revoke_session(
    authority: &TokenAuthority,
    _ctx: &RequestContext,
    req: HandlerRequest,
) -> Result<Reply, ApiError> {
    let session_id = req.param("session_id")?;
    authority.revoke(session_id)?;
    Ok(Reply::no_content())
}

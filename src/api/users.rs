// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User resource: registration and lookup.

use std::fmt;
use std::sync::Arc;

use axum::http::Method;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::{
    auth::Action,
    config::{AdminSeed, ADMIN_PASSWORD_ENV},
    error::ApiError,
    pipeline::{HandlerRequest, Reply, RequestContext, RequireJson, Resource, Route},
    storage::{normalize_username, StorageResult, StoredUser, UserRepository},
};

pub const USERS: &str = "users";

const MIN_PASSWORD_LEN: usize = 8;
const MAX_USERNAME_LEN: usize = 64;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

/// Public view of a user. Password material is never included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl From<StoredUser> for UserResponse {
    fn from(user: StoredUser) -> Self {
        Self {
            id: user.id,
            username: user.username,
            created_at: user.created_at,
        }
    }
}

/// Runs after a user row has been committed and before the 201 is rendered.
///
/// An `Err` becomes the response. The user is not rolled back.
pub type PostCreateUserHook =
    Arc<dyn Fn(&RequestContext, &StoredUser) -> Result<(), ApiError> + Send + Sync>;

#[derive(Clone, Default)]
pub struct UsersResource {
    post_create: Option<PostCreateUserHook>,
}

impl UsersResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_post_create_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RequestContext, &StoredUser) -> Result<(), ApiError> + Send + Sync + 'static,
    {
        self.post_create = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for UsersResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsersResource")
            .field("post_create", &self.post_create.is_some())
            .finish()
    }
}

/// Outcome of seeding the admin account at startup.
#[derive(Debug)]
pub struct SeededAdmin {
    pub user: StoredUser,
    /// False when the account already existed with another password. The
    /// stored password is never overwritten.
    pub password_matches: bool,
}

/// Create the seed admin account unless it exists.
pub fn seed_admin(users: &UserRepository, seed: &AdminSeed) -> StorageResult<SeededAdmin> {
    let user = users.ensure(&seed.username, &seed.password)?;
    let password_matches = user.verify_password(&seed.password);
    if password_matches {
        info!(user_id = %user.id, username = %user.username, "Admin account ready");
    } else {
        warn!(
            user_id = %user.id,
            username = %user.username,
            "Admin account exists with a different password; {ADMIN_PASSWORD_ENV} was not applied"
        );
    }
    Ok(SeededAdmin {
        user,
        password_matches,
    })
}

/// Logs each registration with the request id that caused it.
pub fn log_registration(ctx: &RequestContext, user: &StoredUser) -> Result<(), ApiError> {
    info!(
        user_id = %user.id,
        username = %user.username,
        request_id = ctx.request_id().unwrap_or("-"),
        "User registered"
    );
    Ok(())
}

impl Resource for UsersResource {
    fn name(&self) -> &'static str {
        USERS
    }

    fn routes(self: Arc<Self>) -> Vec<Route> {
        vec![
            Route::new(Method::POST, "/users", USERS, Action::Create, move |ctx, req| {
                register_user(&self, ctx, req)
            })
            .with_middleware(RequireJson),
            Route::new(Method::GET, "/users", USERS, Action::List, list_users),
            Route::new(Method::GET, "/users/{user_id}", USERS, Action::Read, get_user)
                .owned_by("user_id"),
        ]
    }
}

/// Register a new account.
#[utoipa::path(
    post,
    path = "/users",
    request_body = RegisterRequest,
    tag = "Users",
    responses(
        (status = 201, body = UserResponse),
        (status = 400, description = "Username or password rejected"),
        (status = 409, description = "Username taken")
    )
)]
pub fn register_user(
    resource: &UsersResource,
    ctx: &RequestContext,
    req: HandlerRequest,
) -> Result<Reply, ApiError> {
    let request: RegisterRequest = req.json()?;

    let username = normalize_username(&request.username);
    if username.is_empty() || username.chars().count() > MAX_USERNAME_LEN {
        return Err(ApiError::bad_request(format!(
            "Username must be 1 to {MAX_USERNAME_LEN} characters"
        )));
    }
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let user = StoredUser::new(&username, &request.password)?;
    UserRepository::new(ctx.db().clone()).create(&user)?;

    if let Some(hook) = &resource.post_create {
        hook(ctx, &user).inspect_err(|e| {
            warn!(user_id = %user.id, error = %e.message, "Post-create hook failed");
        })?;
    }
    Reply::created(&UserResponse::from(user))
}

/// List every user (admin only).
#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, body = [UserResponse]),
        (status = 403, description = "Caller is not an admin")
    )
)]
pub fn list_users(ctx: &RequestContext, _req: HandlerRequest) -> Result<Reply, ApiError> {
    let users: Vec<UserResponse> = UserRepository::new(ctx.db().clone())
        .list_all()?
        .into_iter()
        .map(UserResponse::from)
        .collect();
    Reply::ok(&users)
}

/// Get one user (the user themselves or an admin).
#[utoipa::path(
    get,
    path = "/users/{user_id}",
    params(
        ("user_id" = String, Path, description = "User identifier")
    ),
    tag = "Users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, body = UserResponse),
        (status = 403, description = "Not the owner and not an admin"),
        (status = 404, description = "No such user")
    )
)]
pub fn get_user(ctx: &RequestContext, req: HandlerRequest) -> Result<Reply, ApiError> {
    let user = UserRepository::new(ctx.db().clone()).get(req.param("user_id")?)?;
    Reply::ok(&UserResponse::from(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    fn seed(password: &str) -> AdminSeed {
        AdminSeed {
            username: "root".to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn seed_admin_keeps_existing_password_and_reports_drift() {
        let db = Database::in_memory().unwrap();
        let users = UserRepository::new(db.new_session());

        let first = seed_admin(&users, &seed("first password")).unwrap();
        assert!(first.password_matches);

        let again = seed_admin(&users, &seed("first password")).unwrap();
        assert!(again.password_matches);
        assert_eq!(again.user.id, first.user.id);

        let rotated = seed_admin(&users, &seed("second password")).unwrap();
        assert!(!rotated.password_matches);
        assert_eq!(rotated.user.id, first.user.id);
        assert!(rotated.user.verify_password("first password"));
    }
}

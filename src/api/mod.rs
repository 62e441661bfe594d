// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{
        Action, AuthenticatedIdentity, Authenticator, PolicyAccessController, Requirement,
        TokenAuthority,
    },
    pipeline::{DbSessionMiddleware, RendererMiddleware, ResourceRouter, Server, ServerOptions},
    storage::{Database, StoredBook, StoredSession},
};

pub mod books;
pub mod health;
pub mod sessions;
pub mod users;

use books::{BooksResource, CreateBookRequest, BOOKS};
use health::{CheckStatus, HealthReport, LiveResponse};
use sessions::{
    CurrentSessionResponse, LoginRequest, SessionsResource, TokenResponse, CURRENT_SESSION,
    SESSIONS,
};
use users::{RegisterRequest, UserResponse, UsersResource, USERS};

/// Who may do what. Anything not listed here is denied.
pub fn policies() -> PolicyAccessController {
    PolicyAccessController::new()
        .allow(SESSIONS, Action::Create, Requirement::Anyone)
        .allow(SESSIONS, Action::Delete, Requirement::Admin)
        .allow(CURRENT_SESSION, Action::Read, Requirement::Authenticated)
        .allow(CURRENT_SESSION, Action::Update, Requirement::Authenticated)
        .allow(CURRENT_SESSION, Action::Delete, Requirement::Authenticated)
        .allow(USERS, Action::Create, Requirement::Anyone)
        .allow(USERS, Action::List, Requirement::Admin)
        .allow(USERS, Action::Read, Requirement::OwnerOrAdmin)
        .allow(BOOKS, Action::List, Requirement::Anyone)
        .allow(BOOKS, Action::Read, Requirement::Anyone)
        .allow(BOOKS, Action::Create, Requirement::Authenticated)
        .allow(BOOKS, Action::Delete, Requirement::Admin)
}

/// All pipeline resources.
pub fn resources(authority: TokenAuthority) -> ResourceRouter {
    ResourceRouter::new()
        .resource(Arc::new(SessionsResource::new(authority)))
        .resource(Arc::new(
            UsersResource::new().with_post_create_hook(users::log_registration),
        ))
        .resource(Arc::new(BooksResource))
}

/// Assemble the full server: context capabilities, authenticator, policy
/// table, resources, health checks and API docs.
pub fn server<I>(
    database: Database,
    authority: TokenAuthority,
    admins: I,
    indent_json: bool,
    options: ServerOptions,
) -> Server
where
    I: IntoIterator<Item = String>,
{
    Server::new(options)
        .use_context_middleware(DbSessionMiddleware::new(database.clone()))
        .use_context_middleware(RendererMiddleware::json(indent_json))
        .use_middleware(Authenticator::new(authority.clone()))
        .use_access_controller(policies().with_admins(admins))
        .use_router(resources(authority))
        .merge(health::router(database))
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()).into())
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("EdDSA session token")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(title = "slumber-server", description = "Session-authenticated REST API"),
    paths(
        health::health,
        health::liveness,
        sessions::login,
        sessions::current_session,
        sessions::refresh_session,
        sessions::logout,
        sessions::revoke_session,
        users::register_user,
        users::list_users,
        users::get_user,
        books::list_books,
        books::create_book,
        books::get_book,
        books::delete_book
    ),
    components(
        schemas(
            HealthReport,
            CheckStatus,
            LiveResponse,
            LoginRequest,
            TokenResponse,
            CurrentSessionResponse,
            AuthenticatedIdentity,
            StoredSession,
            RegisterRequest,
            UserResponse,
            CreateBookRequest,
            StoredBook
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness checks"),
        (name = "Sessions", description = "Login, logout and token reissue"),
        (name = "Users", description = "Registration and user lookup"),
        (name = "Books", description = "Book catalogue")
    )
)]
pub struct ApiDoc;

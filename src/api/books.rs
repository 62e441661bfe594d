// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use axum::http::Method;
use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    auth::Action,
    error::ApiError,
    pipeline::{HandlerRequest, Reply, RequestContext, RequireJson, Resource, Route},
    storage::{BookRepository, StoredBook},
};

pub const BOOKS: &str = "books";

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateBookRequest {
    pub title: String,
    pub author: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BooksResource;

impl Resource for BooksResource {
    fn name(&self) -> &'static str {
        BOOKS
    }

    fn routes(self: Arc<Self>) -> Vec<Route> {
        vec![
            Route::new(Method::GET, "/books", BOOKS, Action::List, list_books),
            Route::new(Method::POST, "/books", BOOKS, Action::Create, create_book)
                .with_middleware(RequireJson),
            Route::new(Method::GET, "/books/{book_id}", BOOKS, Action::Read, get_book),
            Route::new(Method::DELETE, "/books/{book_id}", BOOKS, Action::Delete, delete_book),
        ]
    }
}

#[utoipa::path(
    get,
    path = "/books",
    tag = "Books",
    responses((status = 200, body = [StoredBook]))
)]
pub fn list_books(ctx: &RequestContext, _req: HandlerRequest) -> Result<Reply, ApiError> {
    Reply::ok(&BookRepository::new(ctx.db().clone()).list()?)
}

#[utoipa::path(
    post,
    path = "/books",
    request_body = CreateBookRequest,
    tag = "Books",
    security(("bearer_auth" = [])),
    responses(
        (status = 201, body = StoredBook),
        (status = 403, description = "No token presented")
    )
)]
pub fn create_book(ctx: &RequestContext, req: HandlerRequest) -> Result<Reply, ApiError> {
    let identity = ctx.require_identity()?;
    let request: CreateBookRequest = req.json()?;

    let title = request.title.trim();
    let author = request.author.trim();
    if title.is_empty() || author.is_empty() {
        return Err(ApiError::bad_request("Title and author are required"));
    }

    let book = StoredBook {
        id: uuid::Uuid::new_v4().to_string(),
        title: title.to_string(),
        author: author.to_string(),
        created_by_user_id: identity.user_id.clone(),
        created_at: Utc::now(),
    };
    BookRepository::new(ctx.db().clone()).create(&book)?;
    Reply::created(&book)
}

#[utoipa::path(
    get,
    path = "/books/{book_id}",
    params(
        ("book_id" = String, Path, description = "Book identifier")
    ),
    tag = "Books",
    responses(
        (status = 200, body = StoredBook),
        (status = 404, description = "No such book")
    )
)]
pub fn get_book(ctx: &RequestContext, req: HandlerRequest) -> Result<Reply, ApiError> {
    Reply::ok(&BookRepository::new(ctx.db().clone()).get(req.param("book_id")?)?)
}

#[utoipa::path(
    delete,
    path = "/books/{book_id}",
    params(
        ("book_id" = String, Path, description = "Book identifier")
    ),
    tag = "Books",
    security(("bearer_auth" = [])),
    responses(
        (status = 204),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "No such book")
    )
)]
pub fn delete_book(ctx: &RequestContext, req: HandlerRequest) -> Result<Reply, ApiError> {
    BookRepository::new(ctx.db().clone()).delete(req.param("book_id")?)?;
    Ok(Reply::no_content())
}

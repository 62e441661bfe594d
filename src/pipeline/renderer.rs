// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Response rendering capability and the context middlewares that install
//! the shared capabilities.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::info;

use super::context::SharedContextBuilder;
use super::middleware::ContextMiddleware;
use crate::error::{ApiError, ServerError};
use crate::storage::Database;

/// Turns a response body into wire bytes. Content type is its concern.
pub trait Renderer: Send + Sync {
    fn content_type(&self) -> &'static str;

    fn render(&self, body: &serde_json::Value) -> Result<Vec<u8>, serde_json::Error>;

    /// Full response for `status` and an optional body.
    fn respond(&self, status: StatusCode, body: Option<&serde_json::Value>) -> Response {
        let Some(body) = body else {
            return status.into_response();
        };
        match self.render(body) {
            Ok(bytes) => {
                let mut response = Response::new(Body::from(bytes));
                *response.status_mut() = status;
                response
                    .headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_static(self.content_type()));
                response
            }
            Err(e) => ApiError::internal(e).into_response(),
        }
    }
}

/// JSON renderer, optionally pretty-printed.
#[derive(Debug, Clone, Copy)]
pub struct JsonRenderer {
    indent: bool,
}

impl JsonRenderer {
    pub fn new(indent: bool) -> Self {
        Self { indent }
    }
}

impl Renderer for JsonRenderer {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn render(&self, body: &serde_json::Value) -> Result<Vec<u8>, serde_json::Error> {
        if self.indent {
            serde_json::to_vec_pretty(body)
        } else {
            serde_json::to_vec(body)
        }
    }
}

/// Installs a [`JsonRenderer`].
#[derive(Debug, Clone, Copy)]
pub struct RendererMiddleware {
    indent: bool,
}

impl RendererMiddleware {
    pub fn json(indent: bool) -> Self {
        Self { indent }
    }
}

impl ContextMiddleware for RendererMiddleware {
    fn name(&self) -> &'static str {
        "renderer"
    }

    fn install(&self, ctx: &mut SharedContextBuilder) -> Result<(), ServerError> {
        ctx.set_renderer(Arc::new(JsonRenderer::new(self.indent)));
        Ok(())
    }
}

/// Installs a database session handle.
#[derive(Debug, Clone)]
pub struct DbSessionMiddleware {
    database: Database,
}

impl DbSessionMiddleware {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

impl ContextMiddleware for DbSessionMiddleware {
    fn name(&self) -> &'static str {
        "db_session"
    }

    fn install(&self, ctx: &mut SharedContextBuilder) -> Result<(), ServerError> {
        let session = self.database.new_session();
        session.ping()?;
        info!("Database session attached to context");
        ctx.set_db_session(session);
        Ok(())
    }
}

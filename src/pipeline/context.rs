// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Contexts passed down the pipeline.
//!
//! - [`SharedContext`] holds the capabilities installed by context
//!   middlewares. It is assembled once when the app is built and then only
//!   read.
//! - [`RequestContext`] is created per request on top of the shared one and
//!   accumulates what request middlewares learn, such as the caller's
//!   identity.

use std::sync::Arc;

use super::renderer::Renderer;
use crate::auth::AuthenticatedIdentity;
use crate::error::{ApiError, ServerError};
use crate::storage::DbSession;

/// Request-independent capabilities.
#[derive(Clone)]
pub struct SharedContext {
    renderer: Arc<dyn Renderer>,
    db: DbSession,
}

impl SharedContext {
    pub fn renderer(&self) -> &dyn Renderer {
        self.renderer.as_ref()
    }

    pub fn db(&self) -> &DbSession {
        &self.db
    }
}

impl std::fmt::Debug for SharedContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedContext")
            .field("renderer", &self.renderer.content_type())
            .field("db", &self.db)
            .finish()
    }
}

/// Collects capabilities while context middlewares are installed.
#[derive(Default)]
pub struct SharedContextBuilder {
    renderer: Option<Arc<dyn Renderer>>,
    db: Option<DbSession>,
}

impl SharedContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_renderer(&mut self, renderer: Arc<dyn Renderer>) {
        self.renderer = Some(renderer);
    }

    pub fn set_db_session(&mut self, db: DbSession) {
        self.db = Some(db);
    }

    /// Freeze the context. Every capability must have been installed.
    pub fn build(self) -> Result<SharedContext, ServerError> {
        Ok(SharedContext {
            renderer: self
                .renderer
                .ok_or(ServerError::MissingCapability("renderer"))?,
            db: self.db.ok_or(ServerError::MissingCapability("database"))?,
        })
    }
}

/// Per-request context.
#[derive(Debug, Clone)]
pub struct RequestContext {
    shared: Arc<SharedContext>,
    request_id: Option<String>,
    identity: Option<AuthenticatedIdentity>,
}

impl RequestContext {
    pub fn new(shared: Arc<SharedContext>, request_id: Option<String>) -> Self {
        Self {
            shared,
            request_id,
            identity: None,
        }
    }

    pub fn renderer(&self) -> &dyn Renderer {
        self.shared.renderer()
    }

    pub fn db(&self) -> &DbSession {
        self.shared.db()
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn identity(&self) -> Option<&AuthenticatedIdentity> {
        self.identity.as_ref()
    }

    /// Identity for handlers that cannot work without one.
    ///
    /// Routes guarded by an access policy that requires authentication never
    /// reach their handler without an identity, so this only fails on a
    /// misconfigured policy.
    pub fn require_identity(&self) -> Result<&AuthenticatedIdentity, ApiError> {
        self.identity
            .as_ref()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }

    pub fn with_identity(mut self, identity: AuthenticatedIdentity) -> Self {
        self.identity = Some(identity);
        self
    }
}

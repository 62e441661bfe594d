// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Request Pipeline
//!
//! Composes context middlewares, request middlewares, the access controller
//! and resource handlers into one axum app. See [`router`] for the stage
//! order and [`server`] for assembly.

pub mod context;
pub mod middleware;
pub mod renderer;
pub mod router;
pub mod server;

pub use context::{RequestContext, SharedContext, SharedContextBuilder};
pub use middleware::{ContextMiddleware, Flow, Middleware, RequestHead, RequireJson};
pub use renderer::{DbSessionMiddleware, JsonRenderer, Renderer, RendererMiddleware};
pub use router::{HandlerRequest, Reply, Resource, ResourceRouter, Route};
pub use server::{Server, ServerOptions};

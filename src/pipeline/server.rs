// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Server assembly.
//!
//! ```rust,ignore
//! let app = Server::new(ServerOptions::default())
//!     .use_context_middleware(DbSessionMiddleware::new(database))
//!     .use_context_middleware(RendererMiddleware::json(true))
//!     .use_middleware(Authenticator::new(authority))
//!     .use_access_controller(policies)
//!     .use_router(ResourceRouter::new().resource(books))
//!     .into_app()?;
//! ```
//!
//! Context middlewares are installed exactly once, inside
//! [`Server::into_app`]. Every resource route becomes an axum route whose
//! handler reads the body and runs the pipeline on a blocking thread.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::PathRejection, Path, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{on, MethodFilter},
    Router,
};
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{debug, info, warn};

use super::context::SharedContextBuilder;
use super::middleware::{ContextMiddleware, Middleware};
use super::router::{Dispatcher, ResourceRouter, Route};
use crate::auth::{AccessController, PolicyAccessController};
use crate::error::{ApiError, ServerError};

/// Default server request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default maximum request body size (1 MiB).
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

type PathParams = Result<Path<HashMap<String, String>>, PathRejection>;

/// Transport-level options.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Requests still running after this are answered with 408
    pub request_timeout: Duration,
    /// Bodies larger than this are rejected with 413
    pub body_limit: usize,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

/// Builder for the composed application.
pub struct Server {
    options: ServerOptions,
    context_middlewares: Vec<Box<dyn ContextMiddleware>>,
    middlewares: Vec<Arc<dyn Middleware>>,
    access: Arc<dyn AccessController>,
    routes: Vec<Route>,
    unguarded: Router,
}

impl Server {
    /// New server. Until an access controller is set every route is denied.
    pub fn new(options: ServerOptions) -> Self {
        Self {
            options,
            context_middlewares: Vec::new(),
            middlewares: Vec::new(),
            access: Arc::new(PolicyAccessController::new()),
            routes: Vec::new(),
            unguarded: Router::new(),
        }
    }

    pub fn use_context_middleware(mut self, middleware: impl ContextMiddleware + 'static) -> Self {
        self.context_middlewares.push(Box::new(middleware));
        self
    }

    /// Global request middleware; runs before the access controller, in
    /// registration order.
    pub fn use_middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    pub fn use_access_controller(mut self, access: impl AccessController + 'static) -> Self {
        self.access = Arc::new(access);
        self
    }

    pub fn use_router(mut self, router: ResourceRouter) -> Self {
        self.routes.extend(router.into_routes());
        self
    }

    /// Routes served outside the pipeline (health checks, API docs).
    pub fn merge(mut self, router: Router) -> Self {
        self.unguarded = self.unguarded.merge(router);
        self
    }

    /// Install context middlewares and build the axum app.
    pub fn into_app(self) -> Result<Router, ServerError> {
        let mut builder = SharedContextBuilder::new();
        for middleware in &self.context_middlewares {
            middleware.install(&mut builder)?;
            info!(middleware = middleware.name(), "Context middleware installed");
        }

        let dispatcher = Arc::new(Dispatcher {
            shared: Arc::new(builder.build()?),
            middlewares: self.middlewares,
            access: self.access,
        });

        let body_limit = self.options.body_limit;
        let mut app = Router::new();
        for route in self.routes {
            let filter = MethodFilter::try_from(route.method().clone()).map_err(|_| {
                ServerError::InvalidRoute(format!("{} {}", route.method(), route.path()))
            })?;
            let path = route.path();
            info!(
                method = %route.method(),
                path,
                resource = route.resource(),
                action = %route.action(),
                "Route mounted"
            );

            let route = Arc::new(route);
            let dispatcher = Arc::clone(&dispatcher);
            app = app.route(
                path,
                on(filter, move |params: PathParams, request: Request| {
                    serve(
                        Arc::clone(&dispatcher),
                        Arc::clone(&route),
                        params,
                        request,
                        body_limit,
                    )
                }),
            );
        }

        Ok(app.merge(self.unguarded).layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CorsLayer::permissive())
                .layer(TimeoutLayer::new(self.options.request_timeout)),
        ))
    }

    /// Build the app and serve it on `addr` until `shutdown` fires.
    pub async fn run(self, addr: SocketAddr, shutdown: CancellationToken) -> Result<(), ServerError> {
        let app = self.into_app()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(%addr, "Server listening (docs at /docs)");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Server stopped");
        Ok(())
    }
}

/// axum entry point for one pipeline route.
async fn serve(
    dispatcher: Arc<Dispatcher>,
    route: Arc<Route>,
    params: PathParams,
    request: Request,
    body_limit: usize,
) -> Response {
    let params = match params {
        Ok(Path(params)) => params,
        Err(PathRejection::MissingPathParams(_)) => HashMap::new(),
        Err(rejection) => {
            debug!(%rejection, "Path parameters rejected");
            return ApiError::bad_request(rejection.body_text()).into_response();
        }
    };
    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, body_limit).await {
        Ok(body) => body,
        Err(_) => {
            return ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")
                .into_response()
        }
    };

    // Storage and password hashing block; keep them off the async workers.
    match tokio::task::spawn_blocking(move || dispatcher.dispatch(&route, parts, params, body)).await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "Pipeline task failed");
            ApiError::internal(e).into_response()
        }
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Resource routes and per-request dispatch.
//!
//! A [`Resource`] contributes [`Route`]s. Each route names the resource and
//! action it performs, so the access controller can judge it, and carries
//! its own handler plus any route-specific middlewares.
//!
//! ## Stage order
//!
//! 1. Global request middlewares, in registration order (the authenticator)
//! 2. The access controller
//! 3. Route middlewares, in registration order
//! 4. The handler, whose reply is rendered through the context's renderer
//!
//! Any stage may end the request; nothing after it runs.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    http::{request::Parts, Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::context::{RequestContext, SharedContext};
use super::middleware::{Flow, Middleware, RequestHead};
use crate::auth::{AccessController, Action, AuthError, Target};
use crate::error::ApiError;

/// Header carrying the request id set by the HTTP layer.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// What a handler sees of the request.
#[derive(Debug, Clone, Default)]
pub struct HandlerRequest {
    pub params: HashMap<String, String>,
    pub body: Bytes,
}

impl HandlerRequest {
    /// Path parameter by name.
    pub fn param(&self, name: &str) -> Result<&str, ApiError> {
        self.params
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| ApiError::bad_request(format!("Missing path parameter '{name}'")))
    }

    /// Body decoded as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| ApiError::unprocessable(format!("Invalid request body: {e}")))
    }
}

/// Handler output, rendered by the context's renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Option<serde_json::Value>,
}

impl Reply {
    pub fn ok<T: Serialize>(body: &T) -> Result<Self, ApiError> {
        Self::with_status(StatusCode::OK, body)
    }

    pub fn created<T: Serialize>(body: &T) -> Result<Self, ApiError> {
        Self::with_status(StatusCode::CREATED, body)
    }

    pub fn no_content() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            body: None,
        }
    }

    fn with_status<T: Serialize>(status: StatusCode, body: &T) -> Result<Self, ApiError> {
        let body = serde_json::to_value(body).map_err(ApiError::internal)?;
        Ok(Self {
            status,
            body: Some(body),
        })
    }
}

/// Resource handler. Runs on a blocking thread with the final context.
pub type Handler = Arc<dyn Fn(&RequestContext, HandlerRequest) -> Result<Reply, ApiError> + Send + Sync>;

/// One method + path bound to a resource action.
pub struct Route {
    method: Method,
    path: &'static str,
    resource: &'static str,
    action: Action,
    anonymous_entry: bool,
    owner_param: Option<&'static str>,
    middlewares: Vec<Arc<dyn Middleware>>,
    handler: Handler,
}

impl Route {
    pub fn new<F>(
        method: Method,
        path: &'static str,
        resource: &'static str,
        action: Action,
        handler: F,
    ) -> Self
    where
        F: Fn(&RequestContext, HandlerRequest) -> Result<Reply, ApiError> + Send + Sync + 'static,
    {
        Self {
            method,
            path,
            resource,
            action,
            anonymous_entry: false,
            owner_param: None,
            middlewares: Vec::new(),
            handler: Arc::new(handler),
        }
    }

    /// The route creates a session; the authenticator leaves it alone even
    /// when a stale token is attached.
    pub fn anonymous_entry(mut self) -> Self {
        self.anonymous_entry = true;
        self
    }

    /// Path parameter holding the user id that owns the addressed item.
    pub fn owned_by(mut self, param: &'static str) -> Self {
        self.owner_param = Some(param);
        self
    }

    /// Route middleware, run after the access controller.
    pub fn with_middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &'static str {
        self.path
    }

    pub fn resource(&self) -> &'static str {
        self.resource
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn is_anonymous_entry(&self) -> bool {
        self.anonymous_entry
    }

    /// Access target for a request with these path parameters.
    pub fn target(&self, params: &HashMap<String, String>) -> Target {
        let target = Target::new(self.resource, self.action);
        match self.owner_param.and_then(|p| params.get(p)) {
            Some(owner) => target.owned_by(owner.clone()),
            None => target,
        }
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("resource", &self.resource)
            .field("action", &self.action)
            .field("anonymous_entry", &self.anonymous_entry)
            .finish_non_exhaustive()
    }
}

/// A domain entity exposed over HTTP.
pub trait Resource: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn routes(self: Arc<Self>) -> Vec<Route>;
}

/// Collects the routes of several resources.
#[derive(Debug, Default)]
pub struct ResourceRouter {
    routes: Vec<Route>,
}

impl ResourceRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resource<R: Resource>(mut self, resource: Arc<R>) -> Self {
        let name = resource.name();
        let routes = resource.routes();
        debug!(resource = name, routes = routes.len(), "Resource registered");
        self.routes.extend(routes);
        self
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub(crate) fn into_routes(self) -> Vec<Route> {
        self.routes
    }
}

/// Runs the stages for one request.
pub(crate) struct Dispatcher {
    pub(crate) shared: Arc<SharedContext>,
    pub(crate) middlewares: Vec<Arc<dyn Middleware>>,
    pub(crate) access: Arc<dyn AccessController>,
}

impl Dispatcher {
    pub(crate) fn dispatch(
        &self,
        route: &Route,
        parts: Parts,
        params: HashMap<String, String>,
        body: Bytes,
    ) -> Response {
        let request_id = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let mut ctx = RequestContext::new(Arc::clone(&self.shared), request_id);

        let target = route.target(&params);
        let head = RequestHead {
            parts: &parts,
            target: &target,
            anonymous_entry: route.anonymous_entry,
        };

        for middleware in &self.middlewares {
            ctx = match middleware.handle(ctx, &head) {
                Flow::Continue(ctx) => ctx,
                Flow::Halt(response) => {
                    debug!(middleware = middleware.name(), status = %response.status(), "Request halted");
                    return response;
                }
            };
        }

        let decision = self.access.authorize(ctx.identity(), &target);
        if !decision.allow {
            debug!(
                resource = target.resource,
                action = %target.action,
                reason = ?decision.reason,
                user_id = ctx.identity().map(|i| i.user_id.as_str()),
                "Access denied"
            );
            return AuthError::Forbidden.into_response();
        }

        for middleware in &route.middlewares {
            ctx = match middleware.handle(ctx, &head) {
                Flow::Continue(ctx) => ctx,
                Flow::Halt(response) => {
                    debug!(middleware = middleware.name(), status = %response.status(), "Request halted");
                    return response;
                }
            };
        }

        let request = HandlerRequest { params, body };
        match (route.handler)(&ctx, request) {
            Ok(reply) => ctx.renderer().respond(reply.status, reply.body.as_ref()),
            Err(err) => {
                if err.status.is_server_error() {
                    warn!(resource = target.resource, action = %target.action, "Handler failed");
                }
                err.into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::auth::{AuthenticatedIdentity, PolicyAccessController, Requirement};
    use crate::pipeline::context::SharedContextBuilder;
    use crate::pipeline::renderer::JsonRenderer;
    use crate::storage::Database;
    use axum::http::Request;

    /// Records the order it ran in and optionally halts.
    struct OrderRecorder {
        label: &'static str,
        log: Arc<std::sync::Mutex<Vec<&'static str>>>,
        halt: bool,
    }

    impl Middleware for OrderRecorder {
        fn name(&self) -> &'static str {
            self.label
        }

        fn handle(&self, ctx: RequestContext, _: &RequestHead<'_>) -> Flow {
            self.log.lock().unwrap().push(self.label);
            if self.halt {
                Flow::Halt(StatusCode::IM_A_TEAPOT.into_response())
            } else {
                Flow::Continue(ctx)
            }
        }
    }

    /// Attaches a fixed identity.
    struct FixedIdentity(&'static str);

    impl Middleware for FixedIdentity {
        fn name(&self) -> &'static str {
            "fixed_identity"
        }

        fn handle(&self, ctx: RequestContext, _: &RequestHead<'_>) -> Flow {
            Flow::Continue(ctx.with_identity(AuthenticatedIdentity::new(self.0, "s")))
        }
    }

    fn dispatcher(middlewares: Vec<Arc<dyn Middleware>>) -> Dispatcher {
        let db = Database::in_memory().unwrap();
        let mut builder = SharedContextBuilder::new();
        builder.set_renderer(Arc::new(JsonRenderer::new(false)));
        builder.set_db_session(db.new_session());
        let access = PolicyAccessController::new()
            .allow("things", Action::Read, Requirement::Authenticated)
            .allow("things", Action::List, Requirement::Anyone)
            .allow("users", Action::Read, Requirement::OwnerOrAdmin);

        Dispatcher {
            shared: Arc::new(builder.build().unwrap()),
            middlewares,
            access: Arc::new(access),
        }
    }

    fn counting_route(action: Action, calls: Arc<AtomicUsize>) -> Route {
        Route::new(Method::GET, "/things", "things", action, move |_, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            Reply::ok(&serde_json::json!({"ok": true}))
        })
    }

    fn parts() -> Parts {
        Request::builder().uri("/things").body(()).unwrap().into_parts().0
    }

    #[test]
    fn stages_run_in_order() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let global: Arc<dyn Middleware> = Arc::new(OrderRecorder {
            label: "global",
            log: log.clone(),
            halt: false,
        });
        let calls = Arc::new(AtomicUsize::new(0));
        let route = counting_route(Action::List, calls.clone()).with_middleware(OrderRecorder {
            label: "route",
            log: log.clone(),
            halt: false,
        });

        let response = dispatcher(vec![global]).dispatch(&route, parts(), HashMap::new(), Bytes::new());

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(*log.lock().unwrap(), vec!["global", "route"]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn halting_middleware_skips_everything_after_it() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let first: Arc<dyn Middleware> = Arc::new(OrderRecorder {
            label: "first",
            log: log.clone(),
            halt: true,
        });
        let second: Arc<dyn Middleware> = Arc::new(OrderRecorder {
            label: "second",
            log: log.clone(),
            halt: false,
        });
        let calls = Arc::new(AtomicUsize::new(0));
        let route = counting_route(Action::List, calls.clone());

        let response =
            dispatcher(vec![first, second]).dispatch(&route, parts(), HashMap::new(), Bytes::new());

        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(*log.lock().unwrap(), vec!["first"]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn denied_access_is_403_and_skips_route_middlewares_and_handler() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let route = counting_route(Action::Read, calls.clone()).with_middleware(OrderRecorder {
            label: "route",
            log: log.clone(),
            halt: false,
        });

        let response = dispatcher(Vec::new()).dispatch(&route, parts(), HashMap::new(), Bytes::new());

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unmapped_action_is_denied() {
        let calls = Arc::new(AtomicUsize::new(0));
        let route = counting_route(Action::Delete, calls.clone());
        let identified: Arc<dyn Middleware> = Arc::new(FixedIdentity("u1"));

        let response =
            dispatcher(vec![identified]).dispatch(&route, parts(), HashMap::new(), Bytes::new());

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn owner_comes_from_path_parameter() {
        let route = Route::new(Method::GET, "/users/{id}", "users", Action::Read, |ctx, req| {
            let id = req.param("id")?;
            Reply::ok(&serde_json::json!({"id": id, "caller": ctx.require_identity()?.user_id}))
        })
        .owned_by("id");
        let identified: Arc<dyn Middleware> = Arc::new(FixedIdentity("u1"));
        let dispatcher = dispatcher(vec![identified]);

        let own = HashMap::from([("id".to_string(), "u1".to_string())]);
        let other = HashMap::from([("id".to_string(), "u2".to_string())]);

        let response = dispatcher.dispatch(&route, parts(), own, Bytes::new());
        assert_eq!(response.status(), StatusCode::OK);
        let response = dispatcher.dispatch(&route, parts(), other, Bytes::new());
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn handler_errors_become_responses() {
        let route = Route::new(Method::GET, "/things", "things", Action::List, |_, _| {
            Err(ApiError::not_found("Thing not found"))
        });
        let response = dispatcher(Vec::new()).dispatch(&route, parts(), HashMap::new(), Bytes::new());
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn handler_request_helpers() {
        let req = HandlerRequest {
            params: HashMap::from([("id".to_string(), "b1".to_string())]),
            body: Bytes::from_static(br#"{"title":"Dune"}"#),
        };
        assert_eq!(req.param("id").unwrap(), "b1");
        assert_eq!(req.param("nope").unwrap_err().status, StatusCode::BAD_REQUEST);

        let value: serde_json::Value = req.json().unwrap();
        assert_eq!(value["title"], "Dune");

        let bad = HandlerRequest {
            body: Bytes::from_static(b"not json"),
            ..Default::default()
        };
        assert_eq!(
            bad.json::<serde_json::Value>().unwrap_err().status,
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}

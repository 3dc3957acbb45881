//! Request dispatcher.
//!
//! # Data Flow
//! ```text
//! RequestContext
//!     → strip base path, match (static, then dynamic)
//!     → no match: 404 (custom fallback route if registered)
//!     → cast params into the context
//!     → global + route middleware (Halt returns the stage's response)
//!     → resolve handler
//!         registered:      invoke action (missing action → 404)
//!         not registered:  legacy shim for the path, else 404
//!         construction failed: log, 404
//!     → action error → 403/404/500 via fallback routes
//! ```
//!
//! # Design Decisions
//! - The engine and its per-route pipelines live together in an `ArcSwap`;
//!   each dispatch works on one snapshot
//! - Pipelines are resolved once per installed table, not per request
//! - Infrastructure failures are logged and answered with a status page;
//!   nothing internal reaches the response body
//! - A panicking action is caught and answered with 500

use arc_swap::ArcSwap;
use axum::http::{Method, StatusCode};
use futures_util::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, Span};

use super::handler::{Action, ActionError, HandlerRegistry};
use super::legacy::LegacyAdapter;
use super::params::cast_params;
use crate::http::request::RequestContext;
use crate::http::response::Response;
use crate::middleware::{Flow, MiddlewareRegistry, Pipeline};
use crate::observability::{metrics, tracing as spans};
use crate::routing::{HttpMethod, RouteEngine, RouterError, UrlError};

/// How a dispatch ended, for metrics and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Handled,
    Legacy,
    Halted,
    NotFound,
    Error,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Handled => "handled",
            Outcome::Legacy => "legacy",
            Outcome::Halted => "halted",
            Outcome::NotFound => "not_found",
            Outcome::Error => "error",
        }
    }
}

/// An installed engine with the middleware pipeline of each of its routes.
struct Installed {
    engine: Arc<RouteEngine>,
    pipelines: HashMap<String, Pipeline>,
}

pub struct Dispatcher {
    installed: ArcSwap<Installed>,
    handlers: HandlerRegistry,
    middleware: MiddlewareRegistry,
    global: Pipeline,
    legacy: Option<LegacyAdapter>,
}

impl Dispatcher {
    /// Validates every middleware name the engine and `global` reference.
    pub fn new(
        engine: RouteEngine,
        handlers: HandlerRegistry,
        middleware: MiddlewareRegistry,
        global: &[String],
    ) -> Result<Self, RouterError> {
        let global = middleware.global(global)?;
        let pipelines = middleware.compile(engine.table(), &global)?;
        Ok(Self {
            installed: ArcSwap::from_pointee(Installed {
                engine: Arc::new(engine),
                pipelines,
            }),
            handlers,
            middleware,
            global,
            legacy: None,
        })
    }

    pub fn with_legacy(mut self, legacy: LegacyAdapter) -> Self {
        self.legacy = Some(legacy);
        self
    }

    /// Snapshot of the current engine.
    pub fn engine(&self) -> Arc<RouteEngine> {
        self.installed.load().engine.clone()
    }

    /// Install a rebuilt engine. Requests in flight keep their snapshot.
    pub fn replace_engine(&self, engine: RouteEngine) -> Result<(), RouterError> {
        let pipelines = self.middleware.compile(engine.table(), &self.global)?;
        tracing::info!(
            routes = engine.table().len(),
            origin = engine.origin().as_str(),
            "Route engine replaced"
        );
        self.installed.store(Arc::new(Installed {
            engine: Arc::new(engine),
            pipelines,
        }));
        Ok(())
    }

    pub fn url_for<I, K, V>(&self, name: &str, params: I) -> Result<String, UrlError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.installed.load().engine.url_for(name, params)
    }

    /// Dispatch using the request's own path, base path stripped.
    pub async fn dispatch(&self, req: RequestContext) -> Response {
        self.dispatch_uri(None, req).await
    }

    /// Dispatch `uri` when given, otherwise the request's path.
    pub async fn dispatch_uri(&self, uri: Option<&str>, req: RequestContext) -> Response {
        let start = Instant::now();
        let method = req.method.to_string();
        let span = spans::dispatch_span(&req);

        let (response, outcome) = self.resolve(uri, req, &span).instrument(span.clone()).await;

        metrics::record_dispatch(&method, response.status.as_u16(), outcome.as_str(), start);
        tracing::debug!(
            parent: &span,
            status = response.status.as_u16(),
            outcome = outcome.as_str(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Dispatch complete"
        );
        response
    }

    async fn resolve(&self, uri: Option<&str>, mut req: RequestContext, span: &Span) -> (Response, Outcome) {
        let installed = self.installed.load_full();
        let engine = &installed.engine;
        let target = match uri {
            Some(uri) => uri.to_string(),
            None => engine.strip_base(&req.path).to_string(),
        };

        let matched = HttpMethod::from_http(&req.method).and_then(|method| engine.find(&target, method));
        let Some(matched) = matched else {
            if let Some(response) = self.preflight(engine, &target, &mut req).await {
                return (response, Outcome::Halted);
            }
            tracing::debug!(path = %target, "No route matched");
            return (self.render_status(engine, StatusCode::NOT_FOUND, &req).await, Outcome::NotFound);
        };

        let route = matched.route;
        spans::record_route(span, &route.pattern, &route.handler.to_string());
        req.params = cast_params(&matched.params, &route.constraints);
        req.raw_params = matched.params;

        let Some(pipeline) = installed.pipelines.get(&route.pattern) else {
            tracing::error!(pattern = %route.pattern, "Matched route has no compiled pipeline");
            return (
                self.render_status(engine, StatusCode::INTERNAL_SERVER_ERROR, &req).await,
                Outcome::Error,
            );
        };
        if let Flow::Halt(response) = pipeline.run(&mut req).await {
            metrics::record_middleware_halt();
            tracing::debug!(status = response.status.as_u16(), "Middleware halted dispatch");
            return (response, Outcome::Halted);
        }

        let target_ref = &route.handler;
        let controller = match self.handlers.resolve(&target_ref.handler) {
            Ok(Some(controller)) => controller,
            Ok(None) => return self.legacy_fallback(engine, &target, req).await,
            Err(e) => {
                tracing::error!(error = %e, "Handler construction failed");
                return (self.render_status(engine, StatusCode::NOT_FOUND, &req).await, Outcome::NotFound);
            }
        };

        match controller.get(&target_ref.action) {
            Some(action) => self.invoke(engine, action, req, Outcome::Handled).await,
            None => {
                tracing::warn!(handler = %target_ref, "Handler has no such action");
                (self.render_status(engine, StatusCode::NOT_FOUND, &req).await, Outcome::NotFound)
            }
        }
    }

    /// A CORS preflight for a path served under another method runs the
    /// global pipeline so a preflight stage can answer it.
    async fn preflight(&self, engine: &RouteEngine, path: &str, req: &mut RequestContext) -> Option<Response> {
        if req.method != Method::OPTIONS || self.global.is_empty() {
            return None;
        }
        let served = HttpMethod::ALL
            .into_iter()
            .any(|method| engine.find(path, method).is_some());
        if !served {
            return None;
        }
        match self.global.run(req).await {
            Flow::Halt(response) => Some(response),
            Flow::Continue => None,
        }
    }

    async fn legacy_fallback(&self, engine: &RouteEngine, path: &str, req: RequestContext) -> (Response, Outcome) {
        let Some(legacy) = &self.legacy else {
            tracing::warn!(path = %path, "Handler not registered and legacy fallback disabled");
            return (self.render_status(engine, StatusCode::NOT_FOUND, &req).await, Outcome::NotFound);
        };

        match legacy.resolve(path) {
            Ok(Some(shim)) => {
                tracing::debug!(path = %path, "Dispatching to legacy shim");
                self.invoke(engine, shim, req, Outcome::Legacy).await
            }
            Ok(None) => {
                tracing::warn!(path = %path, "Handler not registered and no legacy shim");
                (self.render_status(engine, StatusCode::NOT_FOUND, &req).await, Outcome::NotFound)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Legacy path rejected");
                (self.render_status(engine, StatusCode::NOT_FOUND, &req).await, Outcome::NotFound)
            }
        }
    }

    async fn invoke(
        &self,
        engine: &RouteEngine,
        action: Action,
        req: RequestContext,
        outcome: Outcome,
    ) -> (Response, Outcome) {
        let retained = (!engine.table().fallbacks().is_empty()).then(|| req.clone());

        let err = match call(&action, req).await {
            Ok(response) => return (response, outcome),
            Err(err) => err,
        };

        let status = err.status();
        if status.is_server_error() {
            tracing::error!(error = %err, "Action failed");
        } else {
            tracing::debug!(error = %err, "Action refused request");
        }
        let response = match &retained {
            Some(req) => self.render_status(engine, status, req).await,
            None => Response::from_status(status),
        };
        let outcome = if status == StatusCode::NOT_FOUND {
            Outcome::NotFound
        } else {
            Outcome::Error
        };
        (response, outcome)
    }

    /// Status page for `status`: the table's fallback route when one is
    /// registered and succeeds, otherwise the bare status.
    async fn render_status(&self, engine: &RouteEngine, status: StatusCode, req: &RequestContext) -> Response {
        let Some(target) = engine.table().fallback(status.as_u16()) else {
            return Response::from_status(status);
        };

        let action = match self.handlers.resolve(&target.handler) {
            Ok(Some(controller)) => controller.get(&target.action),
            Ok(None) => None,
            Err(e) => {
                tracing::error!(error = %e, status = status.as_u16(), "Fallback handler construction failed");
                None
            }
        };
        let Some(action) = action else {
            tracing::warn!(handler = %target, status = status.as_u16(), "Fallback handler not registered");
            return Response::from_status(status);
        };

        match call(&action, req.clone()).await {
            Ok(response) => response.with_status(status),
            Err(e) => {
                tracing::error!(error = %e, handler = %target, "Fallback handler failed");
                Response::from_status(status)
            }
        }
    }
}

async fn call(action: &Action, req: RequestContext) -> Result<Response, ActionError> {
    let panicked = || ActionError::Internal("action panicked".to_string());
    let future = std::panic::catch_unwind(AssertUnwindSafe(|| action(req))).map_err(|_| panicked())?;
    AssertUnwindSafe(future).catch_unwind().await.unwrap_or_else(|_| Err(panicked()))
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("engine", &self.installed.load().engine.origin())
            .field("handlers", &self.handlers)
            .field("middleware", &self.middleware)
            .field("legacy", &self.legacy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::MiddlewareConfig;
    use crate::dispatch::handler::{Controller, HandlerError};
    use crate::dispatch::params::ParamValue;
    use crate::routing::{Constraint, RouteDefinitions};

    fn dispatcher(defs: RouteDefinitions, handlers: HandlerRegistry) -> Dispatcher {
        let engine = RouteEngine::from_definitions(defs, "").unwrap();
        let middleware = MiddlewareRegistry::with_defaults(&MiddlewareConfig::default());
        Dispatcher::new(engine, handlers, middleware, &[]).unwrap()
    }

    fn echo_id() -> Controller {
        Controller::new().action("show", |req: RequestContext| async move {
            match req.param("id") {
                Some(ParamValue::Int(id)) => Ok(Response::text(format!("int {id}"))),
                Some(other) => Ok(Response::text(format!("str {other}"))),
                None => Err(ActionError::NotFound),
            }
        })
    }

    #[tokio::test]
    async fn test_params_are_cast_before_action() {
        let mut defs = RouteDefinitions::new();
        defs.get("/predictions/view/:id", "Prediction", "show")
            .constrain("id", Constraint::Int);
        let mut handlers = HandlerRegistry::new();
        handlers.register("Prediction", echo_id());

        let response = dispatcher(defs, handlers)
            .dispatch(RequestContext::get("/predictions/view/42"))
            .await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body_text(), "int 42");
    }

    #[tokio::test]
    async fn test_missing_action_is_404() {
        let mut defs = RouteDefinitions::new();
        defs.get("/", "Home", "index");
        let mut handlers = HandlerRegistry::new();
        handlers.register("Home", Controller::new());

        let response = dispatcher(defs, handlers).dispatch(RequestContext::get("/")).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_construction_failure_is_404() {
        let mut defs = RouteDefinitions::new();
        defs.get("/", "Home", "index");
        let mut handlers = HandlerRegistry::new();
        handlers.register_factory("Home", || Err(HandlerError::new("Home", "no database")));

        let response = dispatcher(defs, handlers).dispatch(RequestContext::get("/")).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert!(!response.body_text().contains("database"));
    }

    #[tokio::test]
    async fn test_panicking_action_is_500() {
        let mut defs = RouteDefinitions::new();
        defs.get("/", "Home", "index");
        let mut handlers = HandlerRegistry::new();
        handlers.register(
            "Home",
            Controller::new().action("index", |_req| async {
                let template: Option<&str> = None;
                Ok(Response::html(template.expect("template missing")))
            }),
        );

        let response = dispatcher(defs, handlers).dispatch(RequestContext::get("/")).await;
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_action_error_uses_fallback_route() {
        let mut defs = RouteDefinitions::new();
        defs.get("/admin", "Admin", "index");
        defs.fallback(403, "Errors", "forbidden");
        let mut handlers = HandlerRegistry::new();
        handlers.register(
            "Admin",
            Controller::new().action("index", |_req| async { Err(ActionError::Forbidden) }),
        );
        handlers.register(
            "Errors",
            Controller::new().action("forbidden", |_req| async { Ok(Response::html("<p>No entry</p>")) }),
        );

        let response = dispatcher(defs, handlers).dispatch(RequestContext::get("/admin")).await;
        assert_eq!(response.status, StatusCode::FORBIDDEN);
        assert_eq!(response.body_text(), "<p>No entry</p>");
    }

    #[tokio::test]
    async fn test_explicit_uri_overrides_request_path() {
        let mut defs = RouteDefinitions::new();
        defs.get("/predictions/view/:id", "Prediction", "show")
            .constrain("id", Constraint::Int);
        let mut handlers = HandlerRegistry::new();
        handlers.register("Prediction", echo_id());

        let response = dispatcher(defs, handlers)
            .dispatch_uri(Some("/predictions/view/9?ref=home"), RequestContext::get("/elsewhere"))
            .await;
        assert_eq!(response.body_text(), "int 9");
    }

    #[tokio::test]
    async fn test_base_path_is_stripped() {
        let mut defs = RouteDefinitions::new();
        defs.get("/predictions/view/:id", "Prediction", "show")
            .constrain("id", Constraint::Int);
        let mut handlers = HandlerRegistry::new();
        handlers.register("Prediction", echo_id());
        let engine = RouteEngine::from_definitions(defs, "/app").unwrap();
        let dispatcher = Dispatcher::new(engine, handlers, MiddlewareRegistry::new(), &[]).unwrap();

        let response = dispatcher.dispatch(RequestContext::get("/app/predictions/view/3")).await;
        assert_eq!(response.body_text(), "int 3");
        assert_eq!(
            dispatcher.url_for("missing", [("id", "1")]).unwrap_err(),
            UrlError::NamedRouteNotFound("missing".into())
        );
    }

    #[test]
    fn test_pipelines_compiled_once_per_route() {
        let mut defs = RouteDefinitions::new();
        defs.get("/", "Home", "index");
        defs.get("/edit/:id", "Prediction", "edit").middleware("auth");
        let engine = RouteEngine::from_definitions(defs, "").unwrap();
        let middleware = MiddlewareRegistry::with_defaults(&MiddlewareConfig::default());
        let dispatcher = Dispatcher::new(engine, HandlerRegistry::new(), middleware, &["cors".to_string()]).unwrap();

        let installed = dispatcher.installed.load();
        assert_eq!(installed.pipelines.len(), 2);
        assert_eq!(installed.pipelines["/"].len(), 1);
        assert_eq!(installed.pipelines["/edit/:id"].len(), 2);
    }

    #[tokio::test]
    async fn test_replaced_engine_brings_its_own_pipelines() {
        let mut defs = RouteDefinitions::new();
        defs.get("/", "Home", "index");
        let mut handlers = HandlerRegistry::new();
        handlers.register(
            "Home",
            Controller::new().action("index", |_req| async { Ok(Response::text("home")) }),
        );
        let dispatcher = dispatcher(defs, handlers);
        assert_eq!(dispatcher.dispatch(RequestContext::get("/")).await.status, StatusCode::OK);

        let mut next = RouteDefinitions::new();
        next.get("/", "Home", "index").middleware("auth");
        dispatcher
            .replace_engine(RouteEngine::from_definitions(next, "").unwrap())
            .unwrap();

        assert_eq!(dispatcher.installed.load().pipelines["/"].len(), 1);
        let response = dispatcher.dispatch(RequestContext::get("/")).await;
        assert_eq!(response.status, StatusCode::FOUND);
    }

    #[tokio::test]
    async fn test_replace_engine_rejects_unknown_middleware() {
        let mut defs = RouteDefinitions::new();
        defs.get("/", "Home", "index");
        let dispatcher = dispatcher(defs, HandlerRegistry::new());

        let mut next = RouteDefinitions::new();
        next.get("/", "Home", "index").middleware("nope");
        let engine = RouteEngine::from_definitions(next, "").unwrap();
        assert!(matches!(
            dispatcher.replace_engine(engine),
            Err(RouterError::UnknownMiddleware { .. })
        ));
    }
}

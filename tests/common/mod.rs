//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use prediction_router::config::MiddlewareConfig;
use prediction_router::dispatch::{ActionError, Controller, Dispatcher, HandlerRegistry};
use prediction_router::http::{HeaderIdentity, HttpServer, RequestContext, Response};
use prediction_router::lifecycle::Shutdown;
use prediction_router::middleware::MiddlewareRegistry;
use prediction_router::routing::{Constraint, RouteDefinitions, RouteEngine};

/// Echo the matched action and its cast parameters as JSON.
pub fn echo(action: &'static str, calls: Arc<AtomicUsize>) -> impl Fn(RequestContext) -> EchoFuture + Send + Sync + 'static {
    move |req: RequestContext| {
        calls.fetch_add(1, Ordering::SeqCst);
        let body = serde_json::json!({
            "action": action,
            "params": req.params,
            "caller": req.caller.as_ref().map(|c| c.id.clone()),
        });
        std::future::ready(Ok(Response::json(&body)))
    }
}

pub type EchoFuture = std::future::Ready<Result<Response, ActionError>>;

/// Handlers for the prediction routes; every action bumps `calls`.
pub fn handlers(calls: Arc<AtomicUsize>) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry
        .register("Home", Controller::new().action("index", echo("Home.index", calls.clone())))
        .register(
            "Prediction",
            Controller::new()
                .action("index", echo("Prediction.index", calls.clone()))
                .action("trending", echo("Prediction.trending", calls.clone()))
                .action("show", echo("Prediction.show", calls.clone()))
                .action("edit", echo("Prediction.edit", calls.clone())),
        )
        .register(
            "Errors",
            Controller::new().action("not_found", |req: RequestContext| async move {
                Ok(Response::html(format!("custom 404 for {}", req.path)))
            }),
        );
    registry
}

/// The prediction site's route table, declared in code.
pub fn definitions() -> RouteDefinitions {
    let mut defs = RouteDefinitions::new();
    defs.get("/", "Home", "index").name("home");
    defs.group("/predictions", |g| {
        g.get("/", "Prediction", "index").name("predictions.index");
        g.get("/view/:id", "Prediction", "show")
            .constrain("id", Constraint::Int)
            .name("predictions.view");
        g.get("/trending", "Prediction", "trending");
        g.get("/edit/:id", "Prediction", "edit")
            .constrain("id", Constraint::Int)
            .name("predictions.edit")
            .middleware("auth");
    });
    defs
}

pub fn dispatcher(defs: RouteDefinitions, handlers: HandlerRegistry) -> Dispatcher {
    let engine = RouteEngine::from_definitions(defs, "").unwrap();
    let middleware = MiddlewareRegistry::with_defaults(&MiddlewareConfig::default());
    Dispatcher::new(engine, handlers, middleware, &[]).unwrap()
}

pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// A running server on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub dispatcher: Arc<Dispatcher>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

pub async fn start_server(
    dispatcher: Dispatcher,
    route_updates: Option<mpsc::UnboundedReceiver<RouteEngine>>,
) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let dispatcher = Arc::new(dispatcher);
    let shutdown = Shutdown::new();

    let config = prediction_router::config::ListenerConfig {
        bind_address: addr.to_string(),
        ..Default::default()
    };
    let server = HttpServer::new(
        &config,
        dispatcher.clone(),
        Arc::new(HeaderIdentity::new("x-user-id").unwrap()),
    );
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        server.run(listener, route_updates, rx).await.unwrap();
    });

    TestServer {
        addr,
        shutdown,
        dispatcher,
    }
}

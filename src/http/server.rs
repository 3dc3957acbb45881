//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with a single dispatching fallback
//! - Wire up middleware (tracing, timeout, request ID)
//! - Build a `RequestContext` per request (identity, peer, body)
//! - Swap in rebuilt route engines published by the watcher
//! - Serve until the shutdown signal fires

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::IntoResponse,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ListenerConfig;
use crate::dispatch::Dispatcher;
use crate::http::request::{IdentityOracle, RequestContext, X_REQUEST_ID};
use crate::http::response::Response;
use crate::routing::RouteEngine;

/// Application state injected into the dispatch handler.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub identity: Arc<dyn IdentityOracle>,
    pub body_limit: usize,
}

/// HTTP front end for the dispatcher.
pub struct HttpServer {
    router: Router,
    dispatcher: Arc<Dispatcher>,
}

impl HttpServer {
    pub fn new(config: &ListenerConfig, dispatcher: Arc<Dispatcher>, identity: Arc<dyn IdentityOracle>) -> Self {
        let state = AppState {
            dispatcher: dispatcher.clone(),
            identity,
            body_limit: config.body_limit_bytes,
        };
        Self {
            router: Self::build_router(config, state),
            dispatcher,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ListenerConfig, state: AppState) -> Router {
        Router::new().fallback(dispatch_handler).with_state(state).layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs))),
        )
    }

    /// The configured router, for embedding or tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Run the server on `listener` until `shutdown` fires.
    ///
    /// Engines received on `route_updates` replace the live one; an engine
    /// that fails middleware validation is dropped and the current one kept.
    pub async fn run(
        self,
        listener: TcpListener,
        route_updates: Option<mpsc::UnboundedReceiver<RouteEngine>>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let reloader = route_updates.map(|mut updates| {
            let dispatcher = self.dispatcher.clone();
            tokio::spawn(async move {
                while let Some(engine) = updates.recv().await {
                    if let Err(e) = dispatcher.replace_engine(engine) {
                        crate::observability::metrics::record_reload("rejected");
                        tracing::error!(error = %e, "Rebuilt route table rejected. Keeping current table.");
                    }
                }
            })
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        if let Some(reloader) = reloader {
            reloader.abort();
        }
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Translate the inbound request and hand it to the dispatcher.
async fn dispatch_handler(State(state): State<AppState>, request: Request<Body>) -> axum::response::Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let (parts, body) = request.into_parts();

    let body = match axum::body::to_bytes(body, state.body_limit).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, limit = state.body_limit, "Request body rejected");
            return Response::from_status(StatusCode::PAYLOAD_TOO_LARGE).into_response();
        }
    };

    let target = parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let mut ctx = RequestContext::new(parts.method.clone(), target);
    if let Some(id) = parts.headers.get(X_REQUEST_ID).and_then(|v| v.to_str().ok()) {
        ctx.request_id = id.to_string();
    }
    ctx.caller = state.identity.identify(&parts.headers);
    ctx.headers = parts.headers;
    ctx.body = body;
    ctx.peer = peer;

    state.dispatcher.dispatch(ctx).await.into_response()
}

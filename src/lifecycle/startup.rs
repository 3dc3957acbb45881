//! Startup orchestration.
//!
//! # Responsibilities
//! - Load the route engine (cache or source) from validated configuration
//! - Validate middleware references and build the dispatcher
//! - Start the definitions watcher when enabled
//! - Bind the server last (traffic only when ready)
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently

use notify::RecommendedWatcher;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::config::RouterConfig;
use crate::dispatch::{Dispatcher, HandlerRegistry, LegacyAdapter};
use crate::http::request::{HeaderIdentity, IdentityOracle};
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;
use crate::middleware::MiddlewareRegistry;
use crate::routing::{RouteEngine, RouteWatcher, RouterError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Routes(#[from] RouterError),

    #[error("invalid identity header: {0}")]
    Identity(String),

    #[error("failed to watch route definitions: {0}")]
    Watch(#[from] notify::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Everything the server needs, assembled and validated.
pub struct Application {
    pub config: RouterConfig,
    pub dispatcher: Arc<Dispatcher>,
    pub identity: Arc<dyn IdentityOracle>,
    route_updates: Option<mpsc::UnboundedReceiver<RouteEngine>>,
    _watcher: Option<RecommendedWatcher>,
}

impl Application {
    pub fn prepare(
        config: RouterConfig,
        handlers: HandlerRegistry,
        middleware: MiddlewareRegistry,
        legacy: LegacyAdapter,
    ) -> Result<Self, StartupError> {
        let options = config.engine_options();
        let engine = RouteEngine::load(&options)?;
        tracing::info!(
            routes = engine.table().len(),
            origin = engine.origin().as_str(),
            "Route engine ready"
        );

        let mut dispatcher = Dispatcher::new(engine, handlers, middleware, &config.middleware.global)?;
        if config.legacy.enabled {
            tracing::info!(scripts = legacy.len(), "Legacy fallback enabled");
            dispatcher = dispatcher.with_legacy(legacy);
        }

        let identity = HeaderIdentity::new(&config.identity.header)
            .map_err(|e| StartupError::Identity(e.to_string()))?;

        let (watcher, route_updates) = if config.routing.watch {
            let (watcher, updates) = RouteWatcher::new(options);
            (Some(watcher.run()?), Some(updates))
        } else {
            (None, None)
        };

        Ok(Self {
            config,
            dispatcher: Arc::new(dispatcher),
            identity: Arc::new(identity),
            route_updates,
            _watcher: watcher,
        })
    }

    /// Serve on `listener` until `shutdown` triggers.
    pub async fn serve(mut self, listener: TcpListener, shutdown: &Shutdown) -> Result<(), StartupError> {
        let server = HttpServer::new(&self.config.listener, self.dispatcher.clone(), self.identity.clone());
        server
            .run(listener, self.route_updates.take(), shutdown.subscribe())
            .await?;
        Ok(())
    }
}

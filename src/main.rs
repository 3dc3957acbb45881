//! Prediction Router
//!
//! Route resolution and middleware dispatch for the prediction site.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌────────────────────────────────────────────────────────┐
//!                     │                   PREDICTION ROUTER                     │
//!                     │                                                         │
//!   Client Request    │  ┌─────────┐    ┌────────────┐    ┌──────────────┐      │
//!   ──────────────────┼─▶│  http   │───▶│ dispatcher │───▶│   routing    │      │
//!                     │  │ server  │    │            │◀───│   engine     │      │
//!                     │  └─────────┘    └─────┬──────┘    └──────┬───────┘      │
//!                     │                       │                  │              │
//!                     │                       ▼                  ▼              │
//!                     │               ┌──────────────┐   ┌──────────────┐       │
//!                     │               │  middleware  │   │ route cache  │       │
//!                     │               │   pipeline   │   │  (mtime tag) │       │
//!                     │               └──────┬───────┘   └──────────────┘       │
//!                     │                      ▼                                  │
//!   Client Response   │               ┌──────────────┐                          │
//!   ◀─────────────────┼───────────────│  handlers /  │                          │
//!                     │               │ legacy shims │                          │
//!                     │               └──────────────┘                          │
//!                     └────────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use prediction_router::config::load_config;
use prediction_router::dispatch::{ActionError, Controller, HandlerRegistry, LegacyAdapter};
use prediction_router::http::{RequestContext, Response};
use prediction_router::lifecycle::{Application, Shutdown};
use prediction_router::middleware::MiddlewareRegistry;
use prediction_router::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "prediction-router")]
#[command(about = "Route resolution and middleware dispatch server", long_about = None)]
struct Cli {
    /// Router configuration file.
    #[arg(short, long, default_value = "config/router.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "prediction-router starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        definitions = ?config.routing.definitions,
        cache_enabled = config.routing.cache.enabled,
        watch = config.routing.watch,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let middleware = MiddlewareRegistry::with_defaults(&config.middleware);
    let app = Application::prepare(config, handlers(), middleware, legacy_shims()?)?;

    let listener = TcpListener::bind(&app.config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();
    app.serve(listener, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn handlers() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry
        .register(
            "Home",
            Controller::new().action("index", |_req| async { Ok(Response::html("<h1>Predictions</h1>")) }),
        )
        .register(
            "Prediction",
            Controller::new()
                .action("index", |_req| async { Ok(Response::html("<h1>All predictions</h1>")) })
                .action("trending", |_req| async { Ok(Response::html("<h1>Trending</h1>")) })
                .action("show", prediction_show)
                .action("edit", prediction_edit),
        )
        .register(
            "Errors",
            Controller::new()
                .action("not_found", |req: RequestContext| async move {
                    Ok(Response::html(format!("<h1>Nothing at {}</h1>", escape(&req.path))))
                })
                .action("forbidden", |_req| async { Ok(Response::html("<h1>Forbidden</h1>")) }),
        );
    registry
}

async fn prediction_show(req: RequestContext) -> Result<Response, ActionError> {
    let id = req.param_i64("id").ok_or(ActionError::NotFound)?;
    Ok(Response::json(&serde_json::json!({ "id": id })))
}

async fn prediction_edit(req: RequestContext) -> Result<Response, ActionError> {
    let id = req.param_i64("id").ok_or(ActionError::NotFound)?;
    let caller = req.caller.as_ref().ok_or(ActionError::Forbidden)?;
    Ok(Response::html(format!("<h1>Editing prediction {id} as {}</h1>", escape(&caller.id))))
}

fn legacy_shims() -> Result<LegacyAdapter, Box<dyn std::error::Error>> {
    let mut legacy = LegacyAdapter::new();
    legacy
        .register("about.php", |_req| async { Ok(Response::html("<h1>About</h1>")) })?
        .register("leaderboard.php", |_req| async { Ok(Response::html("<h1>Leaderboard</h1>")) })?;
    Ok(legacy)
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

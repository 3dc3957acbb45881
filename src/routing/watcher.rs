//! Route definitions watcher for hot reload.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;

use super::engine::{EngineOptions, RouteEngine};
use crate::observability::metrics;

/// Watches the route definitions file and publishes rebuilt engines.
pub struct RouteWatcher {
    options: EngineOptions,
    update_tx: mpsc::UnboundedSender<RouteEngine>,
}

impl RouteWatcher {
    /// Create a new RouteWatcher.
    ///
    /// Returns the watcher and a receiver for rebuilt engines.
    pub fn new(options: EngineOptions) -> (Self, mpsc::UnboundedReceiver<RouteEngine>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (Self { options, update_tx }, update_rx)
    }

    /// Start watching. The returned watcher must be kept alive.
    ///
    /// The parent directory is watched rather than the file itself so
    /// editors that save by rename keep triggering reloads.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let options = self.options;
        let file_name = options.definitions.file_name().map(|n| n.to_os_string());
        let watch_dir = options
            .definitions
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .to_path_buf();
        let watched = options.definitions.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let relevant = event.paths.iter().any(|p| p.file_name() == file_name.as_deref());
                    if !relevant || !(event.kind.is_modify() || event.kind.is_create()) {
                        return;
                    }
                    tracing::info!(path = ?options.definitions, "Route definitions changed, rebuilding");
                    match RouteEngine::rebuild(&options) {
                        Ok(engine) => {
                            metrics::record_reload("built");
                            let _ = tx.send(engine);
                        }
                        Err(e) => {
                            metrics::record_reload("failed");
                            tracing::error!(error = %e, "Failed to rebuild routes. Keeping current table.");
                        }
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Route watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?watched, "Route watcher started");
        Ok(watcher)
    }
}

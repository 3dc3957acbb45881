//! Handler registry.
//!
//! # Responsibilities
//! - Map handler identifiers to factories producing [`Controller`]s
//! - Map action names to async actions within a controller
//!
//! # Design Decisions
//! - Lookup has an explicit "not registered" outcome instead of failing
//! - Construction errors are values; the dispatcher turns them into a 404
//! - Actions take the request context by value so their futures are `'static`

use axum::http::StatusCode;
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

use crate::http::request::RequestContext;
use crate::http::response::Response;

pub type ActionFuture = BoxFuture<'static, Result<Response, ActionError>>;

/// An invocable handler action.
pub type Action = Arc<dyn Fn(RequestContext) -> ActionFuture + Send + Sync>;

/// Produces a fresh controller per resolution.
pub type HandlerFactory = Arc<dyn Fn() -> Result<Controller, HandlerError> + Send + Sync>;

/// Failure reported by an action.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("not found")]
    NotFound,

    #[error("forbidden")]
    Forbidden,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ActionError {
    pub fn status(&self) -> StatusCode {
        match self {
            ActionError::NotFound => StatusCode::NOT_FOUND,
            ActionError::Forbidden => StatusCode::FORBIDDEN,
            ActionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A handler could not be constructed.
#[derive(Debug, Error)]
#[error("handler {handler} could not be constructed: {message}")]
pub struct HandlerError {
    pub handler: String,
    pub message: String,
}

impl HandlerError {
    pub fn new(handler: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            handler: handler.into(),
            message: message.into(),
        }
    }
}

/// A set of named actions.
#[derive(Clone, Default)]
pub struct Controller {
    actions: HashMap<String, Action>,
}

impl Controller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn action<F, Fut>(mut self, name: &str, action: F) -> Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, ActionError>> + Send + 'static,
    {
        let action: Action = Arc::new(move |req: RequestContext| -> ActionFuture { Box::pin(action(req)) });
        self.actions.insert(name.to_string(), action);
        self
    }

    pub fn get(&self, name: &str) -> Option<Action> {
        self.actions.get(name).cloned()
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.actions.keys().collect();
        names.sort();
        f.debug_struct("Controller").field("actions", &names).finish()
    }
}

#[derive(Clone, Default)]
pub struct HandlerRegistry {
    factories: HashMap<String, HandlerFactory>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a ready-made controller under `id`.
    pub fn register(&mut self, id: &str, controller: Controller) -> &mut Self {
        self.register_factory(id, move || Ok(controller.clone()))
    }

    /// Register a factory run on every resolution of `id`.
    pub fn register_factory<F>(&mut self, id: &str, factory: F) -> &mut Self
    where
        F: Fn() -> Result<Controller, HandlerError> + Send + Sync + 'static,
    {
        self.factories.insert(id.to_string(), Arc::new(factory));
        self
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Build the controller registered under `id`. `Ok(None)` when nothing is.
    pub fn resolve(&self, id: &str) -> Result<Option<Controller>, HandlerError> {
        self.factories.get(id).map(|factory| factory()).transpose()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&String> = self.factories.keys().collect();
        ids.sort();
        f.debug_struct("HandlerRegistry").field("handlers", &ids).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_and_invoke() {
        let mut registry = HandlerRegistry::new();
        registry.register(
            "Home",
            Controller::new().action("index", |_req| async { Ok(Response::text("home")) }),
        );

        let controller = registry.resolve("Home").unwrap().unwrap();
        assert!(controller.has_action("index"));
        assert!(controller.get("missing").is_none());

        let action = controller.get("index").unwrap();
        let response = action(RequestContext::get("/")).await.unwrap();
        assert_eq!(response.body_text(), "home");
    }

    #[test]
    fn test_unregistered_is_none() {
        assert!(HandlerRegistry::new().resolve("Nope").unwrap().is_none());
    }

    #[test]
    fn test_factory_error_is_reported() {
        let mut registry = HandlerRegistry::new();
        registry.register_factory("Broken", || Err(HandlerError::new("Broken", "database unavailable")));

        let err = registry.resolve("Broken").unwrap_err();
        assert_eq!(err.to_string(), "handler Broken could not be constructed: database unavailable");
    }

    #[test]
    fn test_action_error_status() {
        assert_eq!(ActionError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ActionError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ActionError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}

//! Name → middleware registry.
//!
//! Routes and the global list refer to middleware by name. Names are
//! checked once against the registry when a table is installed, so a typo
//! fails at startup or reload instead of on the first matching request.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::auth::{GuestOnly, RequireAuth};
use super::cors::Cors;
use super::maintenance::Maintenance;
use super::pipeline::{Middleware, Pipeline};
use super::rate_limit::RateLimiter;
use crate::config::schema::MiddlewareConfig;
use crate::routing::{MiddlewareRef, RouteTable, RouterError};

pub const AUTH: &str = "auth";
pub const GUEST: &str = "guest";
pub const CORS: &str = "cors";
pub const MAINTENANCE: &str = "maintenance";
pub const RATE_LIMIT: &str = "rate_limit";

#[derive(Clone, Default)]
pub struct MiddlewareRegistry {
    entries: HashMap<String, Arc<dyn Middleware>>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in middleware configured from `config`.
    pub fn with_defaults(config: &MiddlewareConfig) -> Self {
        let mut registry = Self::new();
        registry
            .register(AUTH, RequireAuth::new(&config.auth))
            .register(GUEST, GuestOnly::new(&config.auth))
            .register(CORS, Cors::new(&config.cors))
            .register(MAINTENANCE, Maintenance::new(&config.maintenance))
            .register(RATE_LIMIT, RateLimiter::new(&config.rate_limit));
        registry
    }

    /// Register under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, middleware: impl Middleware + 'static) -> &mut Self {
        let name = name.into();
        if self.entries.insert(name.clone(), Arc::new(middleware)).is_some() {
            tracing::debug!(middleware = %name, "Replaced registered middleware");
        }
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Middleware>> {
        self.entries.get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn lookup(&self, name: &str, referenced_by: &str) -> Result<Arc<dyn Middleware>, RouterError> {
        self.get(name).ok_or_else(|| RouterError::UnknownMiddleware {
            name: name.to_string(),
            referenced_by: referenced_by.to_string(),
        })
    }

    /// Pipeline for the global middleware list.
    pub fn global(&self, names: &[String]) -> Result<Pipeline, RouterError> {
        names
            .iter()
            .try_fold(Pipeline::default(), |pipeline, name| {
                Ok(pipeline.with(self.lookup(name, "global middleware")?))
            })
    }

    /// Pipeline for a route's own middleware, in declaration order.
    pub fn resolve(&self, refs: &[MiddlewareRef], pattern: &str) -> Result<Pipeline, RouterError> {
        refs.iter().try_fold(Pipeline::default(), |pipeline, middleware| {
            let stage = match middleware {
                MiddlewareRef::Named(name) => self.lookup(name, &format!("route {pattern}"))?,
                MiddlewareRef::Inline(inline) => inline.clone(),
            };
            Ok(pipeline.with(stage))
        })
    }

    /// Full pipeline for every route in `table`, keyed by pattern: `global`
    /// followed by the route's own stages. Fails on the first unknown name.
    pub fn compile(&self, table: &RouteTable, global: &Pipeline) -> Result<HashMap<String, Pipeline>, RouterError> {
        table
            .routes()
            .iter()
            .map(|route| {
                let own = self.resolve(&route.middleware, &route.pattern)?;
                Ok((route.pattern.clone(), global.then(own)))
            })
            .collect()
    }
}

impl fmt::Debug for MiddlewareRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareRegistry").field("names", &self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::RequestContext;
    use crate::middleware::pipeline::{Flow, FnMiddleware};
    use crate::routing::{build, RouteDefinitions};

    #[test]
    fn test_defaults_registered() {
        let registry = MiddlewareRegistry::with_defaults(&MiddlewareConfig::default());
        assert_eq!(registry.names(), vec!["auth", "cors", "guest", "maintenance", "rate_limit"]);
    }

    #[test]
    fn test_compile_reports_unknown_name() {
        let mut defs = RouteDefinitions::new();
        defs.group("/admin", |g| {
            g.get("/users", "Admin", "users");
        })
        .middleware("auth")
        .middleware("admin");
        let table = build(&defs.into_source()).unwrap();

        let registry = MiddlewareRegistry::with_defaults(&MiddlewareConfig::default());
        match registry.compile(&table, &Pipeline::default()) {
            Err(RouterError::UnknownMiddleware { name, referenced_by }) => {
                assert_eq!(name, "admin");
                assert_eq!(referenced_by, "route /admin/users");
            }
            other => panic!("expected unknown middleware, got {other:?}"),
        }
    }

    #[test]
    fn test_compile_prefixes_global_stages() {
        let mut defs = RouteDefinitions::new();
        defs.get("/", "Home", "index");
        defs.get("/edit/:id", "Prediction", "edit").middleware("auth").middleware("rate_limit");
        let table = build(&defs.into_source()).unwrap();

        let registry = MiddlewareRegistry::with_defaults(&MiddlewareConfig::default());
        let global = registry.global(&["cors".to_string()]).unwrap();
        let pipelines = registry.compile(&table, &global).unwrap();

        assert_eq!(pipelines.len(), 2);
        assert_eq!(pipelines["/"].len(), 1);
        assert_eq!(pipelines["/edit/:id"].len(), 3);
    }

    #[test]
    fn test_global_unknown_name() {
        let registry = MiddlewareRegistry::new();
        let err = registry.global(&["cors".to_string()]).unwrap_err();
        assert!(err.to_string().contains("global middleware"));
    }

    #[tokio::test]
    async fn test_resolve_mixes_named_and_inline() {
        let mut registry = MiddlewareRegistry::new();
        registry.register("tag", FnMiddleware::new(|req: &mut RequestContext| {
            req.raw_params.insert("tagged".into(), "yes".into());
            Flow::Continue
        }));

        let refs = vec![
            MiddlewareRef::from("tag"),
            MiddlewareRef::inline(FnMiddleware::new(|req: &mut RequestContext| {
                if req.raw_params.contains_key("tagged") {
                    Flow::Continue
                } else {
                    Flow::Halt(crate::http::response::Response::text("untagged"))
                }
            })),
        ];
        let pipeline = registry.resolve(&refs, "/x").unwrap();
        assert_eq!(pipeline.len(), 2);

        let mut req = RequestContext::get("/x");
        assert!(pipeline.run(&mut req).await.is_continue());
    }
}

//! Route engine: the immutable bundle of table, matcher and URL generator.
//!
//! # Responsibilities
//! - Decide between cached and freshly built tables at startup
//! - Compile the cache lazily when it is absent or stale
//! - Expose matching and URL generation over one consistent snapshot
//!
//! # Design Decisions
//! - A cache problem is never fatal: log, rebuild from source, carry on
//! - The engine is never mutated; reloads build a new one

use std::path::PathBuf;
use std::sync::Arc;

use super::builder::build;
use super::cache::RouteCache;
use super::definition::{HttpMethod, RouteDefinitions};
use super::error::{RouterError, UrlError};
use super::loader::load_stamped;
use super::matcher::{MatchResult, RouteMatcher};
use super::table::RouteTable;
use super::url::UrlGenerator;
use crate::observability::metrics;

/// Where the route table comes from and how it is cached.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub definitions: PathBuf,
    pub base_path: String,
    pub cache: Option<CacheOptions>,
}

#[derive(Debug, Clone)]
pub struct CacheOptions {
    pub path: PathBuf,
    /// Write the cache after a rebuild when it was absent or stale.
    pub auto_compile: bool,
}

/// How the current table was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableOrigin {
    Cache,
    Source,
    Code,
}

impl TableOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableOrigin::Cache => "cache",
            TableOrigin::Source => "source",
            TableOrigin::Code => "code",
        }
    }
}

#[derive(Debug)]
pub struct RouteEngine {
    table: Arc<RouteTable>,
    matcher: RouteMatcher,
    urls: UrlGenerator,
    origin: TableOrigin,
}

impl RouteEngine {
    pub fn from_table(table: RouteTable, base_path: &str, origin: TableOrigin) -> Result<Self, RouterError> {
        let matcher = RouteMatcher::new(&table)?;
        let table = Arc::new(table);
        Ok(Self {
            urls: UrlGenerator::new(table.clone(), base_path),
            table,
            matcher,
            origin,
        })
    }

    /// Engine over routes declared in code. Never cached.
    pub fn from_definitions(definitions: RouteDefinitions, base_path: &str) -> Result<Self, RouterError> {
        let table = build(&definitions.into_source())?;
        Self::from_table(table, base_path, TableOrigin::Code)
    }

    /// Load from a valid cache, or rebuild from the definitions file.
    pub fn load(options: &EngineOptions) -> Result<Self, RouterError> {
        if let Some(cache_options) = &options.cache {
            let cache = RouteCache::new(&cache_options.path);
            match cache.load_valid(&options.definitions) {
                Some(table) => match Self::from_table(table, &options.base_path, TableOrigin::Cache) {
                    Ok(engine) => {
                        metrics::record_cache_event("hit");
                        tracing::info!(
                            path = ?cache.path(),
                            routes = engine.table.len(),
                            "Route table loaded from cache"
                        );
                        return Ok(engine);
                    }
                    Err(e) => {
                        metrics::record_cache_event("rejected");
                        tracing::warn!(error = %e, "Cached route table rejected; rebuilding from source");
                    }
                },
                None => metrics::record_cache_event("miss"),
            }
        }
        Self::rebuild(options)
    }

    /// Build from the definitions file, ignoring any cache on the read side.
    pub fn rebuild(options: &EngineOptions) -> Result<Self, RouterError> {
        let stamped = load_stamped(&options.definitions)?;
        let engine = Self::from_table(build(&stamped.source)?, &options.base_path, TableOrigin::Source)?;

        tracing::info!(
            source = ?options.definitions,
            routes = engine.table.len(),
            static_routes = engine.matcher.static_count(),
            dynamic_routes = engine.matcher.dynamic_count(),
            "Route table built from source"
        );

        if let Some(cache_options) = options.cache.as_ref().filter(|c| c.auto_compile) {
            match RouteCache::new(&cache_options.path).write(&engine.table, &options.definitions, stamped.modified) {
                Ok(()) => metrics::record_cache_event("compiled"),
                Err(e) => tracing::warn!(error = %e, "Route cache not written"),
            }
        }
        Ok(engine)
    }

    pub fn table(&self) -> &Arc<RouteTable> {
        &self.table
    }

    pub fn matcher(&self) -> &RouteMatcher {
        &self.matcher
    }

    pub fn urls(&self) -> &UrlGenerator {
        &self.urls
    }

    pub fn origin(&self) -> TableOrigin {
        self.origin
    }

    pub fn find(&self, uri: &str, method: HttpMethod) -> Option<MatchResult> {
        self.matcher.find(uri, method)
    }

    pub fn url_for<I, K, V>(&self, name: &str, params: I) -> Result<String, UrlError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.urls.url_for(name, params)
    }

    /// Remove the configured base path from an inbound request path.
    pub fn strip_base<'a>(&self, path: &'a str) -> &'a str {
        let base = self.urls.base_path();
        if base.is_empty() {
            return path;
        }
        match path.strip_prefix(base) {
            Some("") => "/",
            Some(rest) if rest.starts_with('/') || rest.starts_with('?') => rest,
            _ => path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const ROUTES: &str = r#"
        [[routes]]
        uri = "/"
        handler = "Home"
        action = "index"
    "#;

    fn options(dir: &std::path::Path, auto_compile: bool) -> EngineOptions {
        EngineOptions {
            definitions: dir.join("routes.toml"),
            base_path: String::new(),
            cache: Some(CacheOptions {
                path: dir.join("cache/routes.json"),
                auto_compile,
            }),
        }
    }

    #[test]
    fn test_first_load_compiles_cache_then_uses_it() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("routes.toml"), ROUTES).unwrap();
        let opts = options(dir.path(), true);

        let first = RouteEngine::load(&opts).unwrap();
        assert_eq!(first.origin(), TableOrigin::Source);
        assert!(dir.path().join("cache/routes.json").exists());

        let second = RouteEngine::load(&opts).unwrap();
        assert_eq!(second.origin(), TableOrigin::Cache);
        assert!(second.find("/", HttpMethod::Get).is_some());
    }

    #[test]
    fn test_without_auto_compile_no_cache_is_written() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("routes.toml"), ROUTES).unwrap();

        let engine = RouteEngine::load(&options(dir.path(), false)).unwrap();
        assert_eq!(engine.origin(), TableOrigin::Source);
        assert!(!dir.path().join("cache/routes.json").exists());
    }

    #[test]
    fn test_corrupt_cache_falls_back_to_source() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("routes.toml"), ROUTES).unwrap();
        fs::create_dir_all(dir.path().join("cache")).unwrap();
        fs::write(dir.path().join("cache/routes.json"), "{ truncated").unwrap();

        let engine = RouteEngine::load(&options(dir.path(), false)).unwrap();
        assert_eq!(engine.origin(), TableOrigin::Source);
        assert!(engine.find("/", HttpMethod::Get).is_some());
    }

    #[test]
    fn test_strip_base() {
        let mut defs = RouteDefinitions::new();
        defs.get("/", "Home", "index");
        let engine = RouteEngine::from_definitions(defs, "/app").unwrap();

        assert_eq!(engine.strip_base("/app"), "/");
        assert_eq!(engine.strip_base("/app/predictions"), "/predictions");
        assert_eq!(engine.strip_base("/application"), "/application");
        assert_eq!(engine.strip_base("/other"), "/other");
    }
}

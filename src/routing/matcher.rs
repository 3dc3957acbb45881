//! Route matching.
//!
//! # Responsibilities
//! - Partition the table into static and dynamic routes
//! - Resolve (uri, method) to a route plus raw parameters
//!
//! # Design Decisions
//! - Static routes: exact per-method hash lookup, tried first
//! - Dynamic routes: anchored regexes compiled once at construction,
//!   scanned in declaration order; first match wins
//! - Query string and trailing slash never affect matching

use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

use super::definition::{HttpMethod, Route, DEFAULT_CAPTURE};
use super::error::RouterError;
use super::pattern::{self, Segment};
use super::table::RouteTable;

/// Outcome of a successful match. Lives for one dispatch.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub route: Arc<Route>,
    /// Raw captured values, before type casting.
    pub params: HashMap<String, String>,
}

#[derive(Debug)]
struct DynamicRoute {
    route: Arc<Route>,
    regex: Regex,
    params: Vec<String>,
}

/// Precompiled, read-only matcher over a route table.
#[derive(Debug, Default)]
pub struct RouteMatcher {
    statics: HashMap<HttpMethod, HashMap<String, Arc<Route>>>,
    dynamics: Vec<DynamicRoute>,
}

impl RouteMatcher {
    pub fn new(table: &RouteTable) -> Result<Self, RouterError> {
        let mut matcher = RouteMatcher::default();

        for route in table.routes() {
            if route.is_static() {
                for method in &route.methods {
                    matcher
                        .statics
                        .entry(*method)
                        .or_default()
                        .insert(route.pattern.clone(), route.clone());
                }
            } else {
                matcher.dynamics.push(DynamicRoute {
                    regex: compile(route)?,
                    params: pattern::param_names(&route.pattern)
                        .into_iter()
                        .map(str::to_string)
                        .collect(),
                    route: route.clone(),
                });
            }
        }

        tracing::debug!(
            static_routes = matcher.static_count(),
            dynamic_routes = matcher.dynamics.len(),
            "Route matcher compiled"
        );
        Ok(matcher)
    }

    /// Resolve a request URI and method to a route.
    pub fn find(&self, uri: &str, method: HttpMethod) -> Option<MatchResult> {
        let path = pattern::normalize_path(uri);

        if let Some(route) = self.statics.get(&method).and_then(|m| m.get(&path)) {
            return Some(MatchResult {
                route: route.clone(),
                params: HashMap::new(),
            });
        }

        self.dynamics
            .iter()
            .filter(|d| d.route.accepts(method))
            .find_map(|d| {
                let captures = d.regex.captures(&path)?;
                let params = d
                    .params
                    .iter()
                    .filter_map(|name| {
                        captures
                            .name(name)
                            .map(|m| (name.clone(), m.as_str().to_string()))
                    })
                    .collect();
                Some(MatchResult {
                    route: d.route.clone(),
                    params,
                })
            })
    }

    pub fn static_count(&self) -> usize {
        self.statics.values().map(HashMap::len).sum()
    }

    pub fn dynamic_count(&self) -> usize {
        self.dynamics.len()
    }
}

/// Build the anchored regex for a dynamic route.
///
/// Literal text is escaped; each `:name` token becomes a named capture
/// using its constraint's class. A name repeated in one pattern captures
/// only at its first position; later repeats use a plain group.
pub fn compile(route: &Route) -> Result<Regex, RouterError> {
    let mut source = String::from("^");
    let mut seen: Vec<&str> = Vec::new();

    for segment in pattern::parse(&route.pattern) {
        match segment {
            Segment::Literal(text) => source.push_str(&regex::escape(text)),
            Segment::Param(name) => {
                let class = route
                    .constraints
                    .get(name)
                    .map(|c| c.capture_class())
                    .unwrap_or(DEFAULT_CAPTURE.into());
                if seen.contains(&name) {
                    source.push_str(&format!("(?:{class})"));
                } else {
                    source.push_str(&format!("(?P<{name}>{class})"));
                    seen.push(name);
                }
            }
        }
    }
    source.push('$');

    Regex::new(&source).map_err(|e| RouterError::InvalidPattern {
        pattern: route.pattern.clone(),
        message: e.to_string(),
    })
}

//! Route table construction.
//!
//! # Responsibilities
//! - Flatten nested groups into one pattern-keyed table
//! - Accumulate prefix, middleware and namespace root-to-leaf
//! - Register route names and status fallbacks
//!
//! # Design Decisions
//! - Depth-first fold over an immutable scope; siblings never see each
//!   other's group attributes
//! - Pattern collisions are not errors: the later route replaces the earlier
//! - Free-form constraints are compiled here so a bad regex fails the build,
//!   not the first request that reaches it

use regex::Regex;

use super::definition::{GroupDef, HandlerRef, MiddlewareRef, Route, RouteDef, RouteEntry, RouteSource};
use super::error::RouterError;
use super::pattern;
use super::table::RouteTable;
use crate::routing::definition::Constraint;

/// Separator between namespace parts and handler identifiers.
pub const NAMESPACE_SEPARATOR: &str = "::";

/// Attributes inherited from enclosing groups.
#[derive(Debug, Clone, Default)]
struct Scope {
    prefix: String,
    middleware: Vec<MiddlewareRef>,
    namespace: Option<String>,
}

impl Scope {
    fn enter(&self, group: &GroupDef) -> Scope {
        let mut middleware = self.middleware.clone();
        middleware.extend(group.middleware.iter().cloned());

        let namespace = match (&self.namespace, group.namespace.as_deref()) {
            (Some(outer), Some(inner)) if !inner.is_empty() => {
                Some(format!("{outer}{NAMESPACE_SEPARATOR}{inner}"))
            }
            (None, Some(inner)) if !inner.is_empty() => Some(inner.to_string()),
            (outer, _) => outer.clone(),
        };

        Scope {
            prefix: pattern::join(&[&self.prefix, &group.prefix]),
            middleware,
            namespace,
        }
    }

    fn qualify(&self, handler: &str) -> String {
        match &self.namespace {
            Some(ns) if !handler.contains(NAMESPACE_SEPARATOR) => {
                format!("{ns}{NAMESPACE_SEPARATOR}{handler}")
            }
            _ => handler.to_string(),
        }
    }

    fn apply(&self, def: &RouteDef) -> Result<Route, RouterError> {
        let pattern = pattern::join(&[&self.prefix, &def.uri]);
        if def.methods.is_empty() {
            return Err(RouterError::NoMethods(pattern));
        }

        for (param, constraint) in &def.constraints {
            if let Constraint::Pattern(regex) = constraint {
                Regex::new(&format!("^(?:{regex})$")).map_err(|e| RouterError::InvalidConstraint {
                    pattern: pattern.clone(),
                    param: param.clone(),
                    message: e.to_string(),
                })?;
            }
        }

        let declared = pattern::param_names(&pattern);
        for param in def.constraints.keys() {
            if !declared.contains(&param.as_str()) {
                tracing::warn!(pattern = %pattern, param = %param, "Constraint names a parameter the pattern does not declare");
            }
        }

        let mut middleware = self.middleware.clone();
        middleware.extend(def.middleware.iter().cloned());

        Ok(Route {
            pattern,
            methods: def.methods.clone(),
            handler: HandlerRef::new(self.qualify(&def.handler), def.action.clone()),
            middleware,
            constraints: def.constraints.clone(),
            name: def.name.clone(),
        })
    }
}

/// Flatten a route source into a route table.
///
/// Output is deterministic for identical input ordering.
pub fn build(source: &RouteSource) -> Result<RouteTable, RouterError> {
    let mut table = RouteTable::new();
    flatten(&source.routes, &Scope::default(), &mut table)?;

    for (key, target) in &source.fallbacks {
        let status: u16 = key
            .parse()
            .ok()
            .filter(|s| (100..=599).contains(s))
            .ok_or_else(|| RouterError::InvalidFallback(key.clone()))?;
        table.set_fallback(status, target.clone());
    }

    tracing::debug!(
        routes = table.len(),
        named = table.names().len(),
        fallbacks = table.fallbacks().len(),
        "Route table built"
    );
    Ok(table)
}

fn flatten(entries: &[RouteEntry], scope: &Scope, table: &mut RouteTable) -> Result<(), RouterError> {
    for entry in entries {
        match entry {
            RouteEntry::Group(group) => flatten(&group.routes, &scope.enter(group), table)?,
            RouteEntry::Route(def) => {
                let route = scope.apply(def)?;
                if let Some(previous) = table.insert(route) {
                    tracing::debug!(
                        pattern = %previous.pattern,
                        replaced = %previous.handler,
                        "Route pattern redefined; later definition wins"
                    );
                }
            }
        }
    }
    Ok(())
}

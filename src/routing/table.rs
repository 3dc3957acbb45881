//! Flat route table produced by the builder or loaded from cache.
//!
//! # Design Decisions
//! - Routes keep declaration order; a pattern collision replaces the route
//!   in place (last definition wins, first position kept)
//! - The name index only ever points at patterns present in the table
//! - Immutable once built; shared via `Arc`

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::definition::{HandlerRef, Route};

/// Route name → pattern, used for reverse URL generation.
pub type NamedRouteIndex = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "TableRepr")]
pub struct RouteTable {
    routes: Vec<Arc<Route>>,
    names: NamedRouteIndex,
    fallbacks: BTreeMap<u16, HandlerRef>,
    #[serde(skip)]
    positions: HashMap<String, usize>,
}

#[derive(Deserialize)]
struct TableRepr {
    routes: Vec<Arc<Route>>,
    #[serde(default)]
    names: NamedRouteIndex,
    #[serde(default)]
    fallbacks: BTreeMap<u16, HandlerRef>,
}

impl From<TableRepr> for RouteTable {
    fn from(repr: TableRepr) -> Self {
        let mut table = RouteTable {
            fallbacks: repr.fallbacks,
            ..Default::default()
        };
        for route in repr.routes {
            table.insert(route);
        }
        // Drop names whose pattern did not survive deserialization.
        table.names = repr
            .names
            .into_iter()
            .filter(|(_, pattern)| table.positions.contains_key(pattern))
            .collect();
        table
    }
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a route keyed by its pattern. Returns the route it replaced.
    pub fn insert(&mut self, route: impl Into<Arc<Route>>) -> Option<Arc<Route>> {
        let route = route.into();
        if let Some(name) = &route.name {
            self.names.insert(name.clone(), route.pattern.clone());
        }
        match self.positions.get(&route.pattern) {
            Some(&index) => Some(std::mem::replace(&mut self.routes[index], route)),
            None => {
                self.positions.insert(route.pattern.clone(), self.routes.len());
                self.routes.push(route);
                None
            }
        }
    }

    pub fn set_fallback(&mut self, status: u16, target: HandlerRef) {
        self.fallbacks.insert(status, target);
    }

    /// Routes in declaration order.
    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    pub fn get(&self, pattern: &str) -> Option<&Arc<Route>> {
        self.positions.get(pattern).map(|&i| &self.routes[i])
    }

    pub fn names(&self) -> &NamedRouteIndex {
        &self.names
    }

    pub fn named(&self, name: &str) -> Option<&Arc<Route>> {
        self.names.get(name).and_then(|pattern| self.get(pattern))
    }

    pub fn fallback(&self, status: u16) -> Option<&HandlerRef> {
        self.fallbacks.get(&status)
    }

    pub fn fallbacks(&self) -> &BTreeMap<u16, HandlerRef> {
        &self.fallbacks
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// First route carrying inline middleware, if any.
    pub fn inline_middleware_route(&self) -> Option<&str> {
        self.routes
            .iter()
            .find(|r| r.middleware.iter().any(|m| m.is_inline()))
            .map(|r| r.pattern.as_str())
    }
}

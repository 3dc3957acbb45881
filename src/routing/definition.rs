//! Route definition model.
//!
//! # Responsibilities
//! - Describe a single routable endpoint ([`Route`])
//! - Describe the nested source format: leaf routes and groups
//! - Provide a code-level builder producing the same source shape
//!
//! # Design Decisions
//! - Groups live only in the source model; flattening removes them
//! - Routes are immutable once they land in a [`RouteTable`](super::RouteTable)
//! - Inline middleware exists in code only; it has no serialized form

use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::middleware::Middleware;

/// HTTP verbs a route can accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 7] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
        HttpMethod::Head,
        HttpMethod::Options,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }

    /// Map an inbound `http::Method`. Extension methods have no route.
    pub fn from_http(method: &axum::http::Method) -> Option<Self> {
        method.as_str().parse().ok()
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HttpMethod::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unsupported HTTP method '{s}'"))
    }
}

impl TryFrom<String> for HttpMethod {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Constraint attached to a route parameter.
///
/// The kind decides both the capture class used during matching and the
/// type the value is cast to before the handler runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Constraint {
    Int,
    Float,
    Bool,
    Str,
    Alpha,
    Alphanumeric,
    Slug,
    /// Free-form regular expression used verbatim as the capture body.
    Pattern(String),
}

impl Constraint {
    /// Regex body substituted for the parameter token.
    pub fn capture_class(&self) -> Cow<'_, str> {
        match self {
            Constraint::Int => Cow::Borrowed("[0-9]+"),
            Constraint::Alpha => Cow::Borrowed("[a-zA-Z]+"),
            Constraint::Alphanumeric => Cow::Borrowed("[a-zA-Z0-9]+"),
            Constraint::Slug => Cow::Borrowed("[a-zA-Z0-9_-]+"),
            Constraint::Pattern(regex) => Cow::Borrowed(regex.as_str()),
            Constraint::Float | Constraint::Bool | Constraint::Str => Cow::Borrowed(DEFAULT_CAPTURE),
        }
    }
}

/// Capture class for parameters without a constraint.
pub const DEFAULT_CAPTURE: &str = "[^/]+";

impl From<String> for Constraint {
    fn from(value: String) -> Self {
        match value.as_str() {
            "int" => Constraint::Int,
            "float" => Constraint::Float,
            "bool" => Constraint::Bool,
            "string" => Constraint::Str,
            "alpha" => Constraint::Alpha,
            "alphanumeric" => Constraint::Alphanumeric,
            "slug" => Constraint::Slug,
            _ => Constraint::Pattern(value),
        }
    }
}

impl From<&str> for Constraint {
    fn from(value: &str) -> Self {
        Constraint::from(value.to_string())
    }
}

impl From<Constraint> for String {
    fn from(value: Constraint) -> Self {
        match value {
            Constraint::Int => "int".into(),
            Constraint::Float => "float".into(),
            Constraint::Bool => "bool".into(),
            Constraint::Str => "string".into(),
            Constraint::Alpha => "alpha".into(),
            Constraint::Alphanumeric => "alphanumeric".into(),
            Constraint::Slug => "slug".into(),
            Constraint::Pattern(regex) => regex,
        }
    }
}

/// Opaque (handler, action) pair resolved by the handler registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandlerRef {
    pub handler: String,
    pub action: String,
}

impl HandlerRef {
    pub fn new(handler: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            handler: handler.into(),
            action: action.into(),
        }
    }
}

impl fmt::Display for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.handler, self.action)
    }
}

/// Reference to a middleware stage: a registry name or an inline value.
#[derive(Clone)]
pub enum MiddlewareRef {
    Named(String),
    Inline(Arc<dyn Middleware>),
}

impl MiddlewareRef {
    pub fn inline(middleware: impl Middleware + 'static) -> Self {
        MiddlewareRef::Inline(Arc::new(middleware))
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            MiddlewareRef::Named(name) => Some(name),
            MiddlewareRef::Inline(_) => None,
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, MiddlewareRef::Inline(_))
    }
}

impl fmt::Debug for MiddlewareRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MiddlewareRef::Named(name) => f.debug_tuple("Named").field(name).finish(),
            MiddlewareRef::Inline(_) => f.write_str("Inline(..)"),
        }
    }
}

impl From<&str> for MiddlewareRef {
    fn from(value: &str) -> Self {
        MiddlewareRef::Named(value.to_string())
    }
}

impl From<String> for MiddlewareRef {
    fn from(value: String) -> Self {
        MiddlewareRef::Named(value)
    }
}

impl Serialize for MiddlewareRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MiddlewareRef::Named(name) => serializer.serialize_str(name),
            MiddlewareRef::Inline(_) => Err(S::Error::custom("inline middleware has no serialized form")),
        }
    }
}

impl<'de> Deserialize<'de> for MiddlewareRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        if name.trim().is_empty() {
            return Err(D::Error::custom("middleware name must not be empty"));
        }
        Ok(MiddlewareRef::Named(name))
    }
}

/// A single routable endpoint in the flat table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub pattern: String,
    pub methods: BTreeSet<HttpMethod>,
    pub handler: HandlerRef,
    #[serde(default)]
    pub middleware: Vec<MiddlewareRef>,
    #[serde(default)]
    pub constraints: BTreeMap<String, Constraint>,
    #[serde(default)]
    pub name: Option<String>,
}

impl Route {
    /// Static routes carry no parameter tokens and are matched by exact lookup.
    pub fn is_static(&self) -> bool {
        !super::pattern::is_dynamic(&self.pattern)
    }

    pub fn accepts(&self, method: HttpMethod) -> bool {
        self.methods.contains(&method)
    }
}

/// Top-level route source: nested entries plus status fallbacks.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouteSource {
    #[serde(default)]
    pub routes: Vec<RouteEntry>,

    /// Non-pattern keys (`"404"`, `"403"`, `"500"`) mapping to fallback targets.
    #[serde(default)]
    pub fallbacks: BTreeMap<String, HandlerRef>,
}

/// An entry of the nested source: a group or a leaf route.
///
/// Entries with `type = "group"` are groups; entries without a `type` (or
/// with `type = "route"`) are leaves. Errors name the offending field.
#[derive(Debug, Clone)]
pub enum RouteEntry {
    Group(GroupDef),
    Route(RouteDef),
}

impl<'de> Deserialize<'de> for RouteEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let kind = match value.get("type") {
            None => None,
            Some(serde_json::Value::String(kind)) => Some(kind.clone()),
            Some(other) => return Err(D::Error::custom(format!("entry `type` must be a string, got {other}"))),
        };

        match kind.as_deref() {
            Some("group") => GroupDef::deserialize(value)
                .map(RouteEntry::Group)
                .map_err(|e| D::Error::custom(format!("invalid group: {e}"))),
            None | Some("route") => RouteDef::deserialize(value)
                .map(RouteEntry::Route)
                .map_err(|e| D::Error::custom(format!("invalid route: {e}"))),
            Some(other) => Err(D::Error::custom(format!(
                "unknown entry type `{other}`, expected `group` or `route`"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Group,
}

/// Construction-time grouping of routes sharing prefix, middleware and namespace.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupDef {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub middleware: Vec<MiddlewareRef>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub routes: Vec<RouteEntry>,
}

/// Leaf route as written in the source.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteDef {
    pub uri: String,
    pub handler: String,
    pub action: String,
    #[serde(default = "default_methods")]
    pub methods: BTreeSet<HttpMethod>,
    #[serde(default)]
    pub middleware: Vec<MiddlewareRef>,
    #[serde(default, rename = "where")]
    pub constraints: BTreeMap<String, Constraint>,
    #[serde(default)]
    pub name: Option<String>,
}

fn default_methods() -> BTreeSet<HttpMethod> {
    BTreeSet::from([HttpMethod::Get])
}

/// Builder for route sources declared in code.
///
/// ```rust,ignore
/// let mut defs = RouteDefinitions::new();
/// defs.get("/", "Home", "index").name("home");
/// defs.group("/predictions", |g| {
///     g.get("/edit/:id", "Prediction", "edit")
///         .constrain("id", Constraint::Int)
///         .name("predictions.edit");
/// })
/// .middleware("auth");
/// ```
#[derive(Debug, Clone, Default)]
pub struct RouteDefinitions {
    source: RouteSource,
}

impl RouteDefinitions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, uri: &str, handler: &str, action: &str) -> RouteBuilder<'_> {
        self.route(&[HttpMethod::Get], uri, handler, action)
    }

    pub fn post(&mut self, uri: &str, handler: &str, action: &str) -> RouteBuilder<'_> {
        self.route(&[HttpMethod::Post], uri, handler, action)
    }

    pub fn put(&mut self, uri: &str, handler: &str, action: &str) -> RouteBuilder<'_> {
        self.route(&[HttpMethod::Put], uri, handler, action)
    }

    pub fn patch(&mut self, uri: &str, handler: &str, action: &str) -> RouteBuilder<'_> {
        self.route(&[HttpMethod::Patch], uri, handler, action)
    }

    pub fn delete(&mut self, uri: &str, handler: &str, action: &str) -> RouteBuilder<'_> {
        self.route(&[HttpMethod::Delete], uri, handler, action)
    }

    pub fn any(&mut self, uri: &str, handler: &str, action: &str) -> RouteBuilder<'_> {
        self.route(&HttpMethod::ALL, uri, handler, action)
    }

    pub fn route(
        &mut self,
        methods: &[HttpMethod],
        uri: &str,
        handler: &str,
        action: &str,
    ) -> RouteBuilder<'_> {
        self.source.routes.push(RouteEntry::Route(RouteDef {
            uri: uri.to_string(),
            handler: handler.to_string(),
            action: action.to_string(),
            methods: methods.iter().copied().collect(),
            middleware: Vec::new(),
            constraints: BTreeMap::new(),
            name: None,
        }));
        match self.source.routes.last_mut() {
            Some(RouteEntry::Route(def)) => RouteBuilder(def),
            _ => unreachable!("a route entry was just pushed"),
        }
    }

    /// Declare a nested group; `build` receives the group's own definitions.
    pub fn group<F>(&mut self, prefix: &str, build: F) -> GroupBuilder<'_>
    where
        F: FnOnce(&mut RouteDefinitions),
    {
        let mut inner = RouteDefinitions::new();
        build(&mut inner);
        self.source.routes.push(RouteEntry::Group(GroupDef {
            kind: EntryKind::Group,
            prefix: prefix.to_string(),
            middleware: Vec::new(),
            namespace: None,
            routes: inner.source.routes,
        }));
        match self.source.routes.last_mut() {
            Some(RouteEntry::Group(def)) => GroupBuilder(def),
            _ => unreachable!("a group entry was just pushed"),
        }
    }

    /// Register a fallback target for an HTTP status (404, 403, 500...).
    pub fn fallback(&mut self, status: u16, handler: &str, action: &str) -> &mut Self {
        self.source
            .fallbacks
            .insert(status.to_string(), HandlerRef::new(handler, action));
        self
    }

    pub fn into_source(self) -> RouteSource {
        self.source
    }
}

/// Chained configuration of a leaf route.
pub struct RouteBuilder<'a>(&'a mut RouteDef);

impl RouteBuilder<'_> {
    pub fn name(self, name: &str) -> Self {
        self.0.name = Some(name.to_string());
        self
    }

    pub fn middleware(self, middleware: impl Into<MiddlewareRef>) -> Self {
        self.0.middleware.push(middleware.into());
        self
    }

    pub fn constrain(self, param: &str, constraint: impl Into<Constraint>) -> Self {
        self.0.constraints.insert(param.to_string(), constraint.into());
        self
    }
}

/// Chained configuration of a group.
pub struct GroupBuilder<'a>(&'a mut GroupDef);

impl GroupBuilder<'_> {
    pub fn middleware(self, middleware: impl Into<MiddlewareRef>) -> Self {
        self.0.middleware.push(middleware.into());
        self
    }

    pub fn namespace(self, namespace: &str) -> Self {
        self.0.namespace = Some(namespace.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parsing_is_case_insensitive() {
        assert_eq!("get".parse::<HttpMethod>(), Ok(HttpMethod::Get));
        assert_eq!("DELETE".parse::<HttpMethod>(), Ok(HttpMethod::Delete));
        assert!("BREW".parse::<HttpMethod>().is_err());
        assert_eq!(
            HttpMethod::from_http(&axum::http::Method::PATCH),
            Some(HttpMethod::Patch)
        );
    }

    #[test]
    fn test_constraint_round_trips_through_strings() {
        assert_eq!(Constraint::from("int"), Constraint::Int);
        assert_eq!(Constraint::from("[A-Z]{1,5}"), Constraint::Pattern("[A-Z]{1,5}".into()));
        assert_eq!(String::from(Constraint::Slug), "slug");
        assert_eq!(Constraint::Slug.capture_class(), "[a-zA-Z0-9_-]+");
        assert_eq!(Constraint::Float.capture_class(), DEFAULT_CAPTURE);
    }

    #[test]
    fn test_source_parses_groups_and_leaves() {
        let source: RouteSource = toml::from_str(
            r#"
            [[routes]]
            uri = "/"
            handler = "Home"
            action = "index"
            name = "home"

            [[routes]]
            type = "group"
            prefix = "/predictions"
            middleware = ["auth"]

            [[routes.routes]]
            uri = "/edit/:id"
            handler = "Prediction"
            action = "edit"
            methods = ["get", "POST"]
            where = { id = "int" }

            [fallbacks]
            404 = { handler = "Errors", action = "not_found" }
            "#,
        )
        .unwrap();

        assert_eq!(source.routes.len(), 2);
        assert!(matches!(source.routes[0], RouteEntry::Route(_)));
        let RouteEntry::Group(group) = &source.routes[1] else {
            panic!("expected a group");
        };
        assert_eq!(group.prefix, "/predictions");
        let RouteEntry::Route(leaf) = &group.routes[0] else {
            panic!("expected a leaf");
        };
        assert_eq!(leaf.methods.len(), 2);
        assert_eq!(leaf.constraints.get("id"), Some(&Constraint::Int));
        assert!(source.fallbacks.contains_key("404"));
    }

    #[test]
    fn test_source_errors_name_the_bad_field() {
        let err = toml::from_str::<RouteSource>(
            r#"
            [[routes]]
            type = "group"
            prefix = "/predictions"

            [[routes.routes]]
            uri = "/edit/:id"
            action = "edit"
            "#,
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("invalid group"), "{message}");
        assert!(message.contains("missing field `handler`"), "{message}");

        let err = serde_json::from_str::<RouteEntry>(r#"{"type": "grop", "prefix": "/x"}"#).unwrap_err();
        assert!(err.to_string().contains("unknown entry type `grop`"));

        let err = serde_json::from_str::<RouteEntry>(r#"{"type": 1}"#).unwrap_err();
        assert!(err.to_string().contains("must be a string"));
    }

    #[test]
    fn test_explicit_route_type_is_a_leaf() {
        let entry: RouteEntry =
            serde_json::from_str(r#"{"type": "route", "uri": "/", "handler": "Home", "action": "index"}"#)
                .unwrap();
        assert!(matches!(entry, RouteEntry::Route(_)));
    }

    #[test]
    fn test_leaf_defaults_to_get() {
        let def: RouteDef =
            serde_json::from_str(r#"{"uri": "/search", "handler": "Search", "action": "index"}"#)
                .unwrap();
        assert_eq!(def.methods, BTreeSet::from([HttpMethod::Get]));
    }

    #[test]
    fn test_inline_middleware_refuses_serialization() {
        use crate::middleware::{Flow, FnMiddleware};

        let named = MiddlewareRef::from("auth");
        assert_eq!(serde_json::to_string(&named).unwrap(), "\"auth\"");

        let inline = MiddlewareRef::inline(FnMiddleware::new(|_req| Flow::Continue));
        assert!(inline.is_inline());
        assert!(serde_json::to_string(&inline).is_err());
    }

    #[test]
    fn test_builder_nests_groups() {
        let mut defs = RouteDefinitions::new();
        defs.get("/", "Home", "index").name("home");
        defs.group("/admin", |g| {
            g.delete("/predictions/:id", "Prediction", "destroy");
        })
        .middleware("auth")
        .namespace("Admin");

        let source = defs.into_source();
        let RouteEntry::Group(group) = &source.routes[1] else {
            panic!("expected a group");
        };
        assert_eq!(group.namespace.as_deref(), Some("Admin"));
        assert_eq!(group.middleware.len(), 1);
        assert_eq!(group.routes.len(), 1);
    }
}

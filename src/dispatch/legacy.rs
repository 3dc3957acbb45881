//! Legacy script fallback.
//!
//! Routes whose handler is not registered may still be served by a shim
//! standing in for an old file-based script. Shims are registered
//! explicitly per script; nothing is ever loaded from disk, and paths that
//! try to leave the legacy root are rejected before lookup.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

use super::handler::{Action, ActionError, ActionFuture};
use crate::http::request::RequestContext;
use crate::http::response::Response;

const INDEX_SCRIPT: &str = "index.php";
const SCRIPT_EXTENSION: &str = ".php";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LegacyError {
    #[error("legacy path escapes the legacy root: {0}")]
    Traversal(String),
}

/// Map a request path to its legacy script name.
///
/// `/` maps to the index script; a final segment without an extension gets
/// the script extension appended.
pub fn script_for(path: &str) -> Result<String, LegacyError> {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    if path.contains(['\\', '\0']) {
        return Err(LegacyError::Traversal(path.to_string()));
    }

    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => return Err(LegacyError::Traversal(path.to_string())),
            s if s.contains(':') => return Err(LegacyError::Traversal(path.to_string())),
            s => segments.push(s),
        }
    }

    let Some(last) = segments.pop() else {
        return Ok(INDEX_SCRIPT.to_string());
    };
    let file = if last.contains('.') {
        last.to_string()
    } else {
        format!("{last}{SCRIPT_EXTENSION}")
    };
    let mut script = segments.join("/");
    if !script.is_empty() {
        script.push('/');
    }
    script.push_str(&file);
    Ok(script)
}

#[derive(Clone, Default)]
pub struct LegacyAdapter {
    shims: HashMap<String, Action>,
}

impl LegacyAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a shim for `script` (e.g. `about.php` or `/about`).
    pub fn register<F, Fut>(&mut self, script: &str, shim: F) -> Result<&mut Self, LegacyError>
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, ActionError>> + Send + 'static,
    {
        let key = script_for(script)?;
        let action: Action = Arc::new(move |req: RequestContext| -> ActionFuture { Box::pin(shim(req)) });
        self.shims.insert(key, action);
        Ok(self)
    }

    /// The shim serving `path`, if one is registered.
    pub fn resolve(&self, path: &str) -> Result<Option<Action>, LegacyError> {
        let script = script_for(path)?;
        Ok(self.shims.get(&script).cloned())
    }

    pub fn scripts(&self) -> Vec<&str> {
        let mut scripts: Vec<&str> = self.shims.keys().map(String::as_str).collect();
        scripts.sort_unstable();
        scripts
    }

    pub fn len(&self) -> usize {
        self.shims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shims.is_empty()
    }
}

impl fmt::Debug for LegacyAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LegacyAdapter").field("scripts", &self.scripts()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_mapping() {
        assert_eq!(script_for("/").unwrap(), "index.php");
        assert_eq!(script_for("").unwrap(), "index.php");
        assert_eq!(script_for("/about").unwrap(), "about.php");
        assert_eq!(script_for("/about/").unwrap(), "about.php");
        assert_eq!(script_for("/legal/terms.php").unwrap(), "legal/terms.php");
        assert_eq!(script_for("/./faq?x=1").unwrap(), "faq.php");
    }

    #[test]
    fn test_traversal_rejected() {
        for path in ["/../etc/passwd", "/a/../../b", "/a\\b", "/a\0b", "/c:/windows"] {
            assert!(
                matches!(script_for(path), Err(LegacyError::Traversal(_))),
                "{path:?} was accepted"
            );
        }
    }

    #[tokio::test]
    async fn test_register_and_resolve() {
        let mut legacy = LegacyAdapter::new();
        legacy
            .register("about.php", |_req| async { Ok(Response::html("<h1>About</h1>")) })
            .unwrap();

        assert_eq!(legacy.scripts(), vec!["about.php"]);
        let shim = legacy.resolve("/about").unwrap().unwrap();
        let response = shim(RequestContext::get("/about")).await.unwrap();
        assert_eq!(response.body_text(), "<h1>About</h1>");

        assert!(legacy.resolve("/contact").unwrap().is_none());
        assert!(legacy.resolve("/../about").is_err());
    }
}

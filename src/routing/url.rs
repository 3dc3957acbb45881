//! Reverse URL generation from named routes.

use std::collections::HashMap;
use std::sync::Arc;

use super::error::UrlError;
use super::pattern::{self, Segment};
use super::table::RouteTable;

/// Builds concrete paths from route names and parameter values.
#[derive(Debug, Clone)]
pub struct UrlGenerator {
    table: Arc<RouteTable>,
    base_path: String,
}

impl UrlGenerator {
    pub fn new(table: Arc<RouteTable>, base_path: &str) -> Self {
        Self {
            table,
            base_path: normalize_base(base_path),
        }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Substitute `params` into the named route's pattern.
    ///
    /// Values are used verbatim. Every token must be supplied; extra
    /// parameters are ignored.
    pub fn url_for<I, K, V>(&self, name: &str, params: I) -> Result<String, UrlError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let pattern = self
            .table
            .names()
            .get(name)
            .ok_or_else(|| UrlError::NamedRouteNotFound(name.to_string()))?;

        let values: HashMap<String, String> = params
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
            .collect();

        let mut path = String::with_capacity(self.base_path.len() + pattern.len());
        path.push_str(&self.base_path);
        let mut missing = Vec::new();

        for segment in pattern::parse(pattern) {
            match segment {
                Segment::Literal(text) => path.push_str(text),
                Segment::Param(key) => match values.get(key) {
                    Some(value) => path.push_str(value),
                    None => {
                        if !missing.iter().any(|m| m == key) {
                            missing.push(key.to_string());
                        }
                    }
                },
            }
        }

        if !missing.is_empty() {
            return Err(UrlError::MissingParameters {
                name: name.to_string(),
                missing,
            });
        }
        Ok(path)
    }
}

/// `""`, `"/"` and `"/app/"` become `""`, `""` and `"/app"`.
pub fn normalize_base(base: &str) -> String {
    let trimmed = base.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

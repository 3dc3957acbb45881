//! Route parameter casting.
//!
//! Captured values are cast according to the route's constraint. A value
//! that does not cast stays a string; casting never fails a request.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::routing::Constraint;

/// A route parameter after casting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl ParamValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Bool(v) => write!(f, "{v}"),
            ParamValue::Str(v) => f.write_str(v),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Cast one raw value.
pub fn cast(raw: &str, constraint: Option<&Constraint>) -> ParamValue {
    let cast = match constraint {
        Some(Constraint::Int) => raw.parse().ok().map(ParamValue::Int),
        Some(Constraint::Float) => raw
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(ParamValue::Float),
        Some(Constraint::Bool) => parse_bool(raw).map(ParamValue::Bool),
        _ => None,
    };
    cast.unwrap_or_else(|| ParamValue::Str(raw.to_string()))
}

/// Cast every captured parameter according to `constraints`.
pub fn cast_params(
    raw: &HashMap<String, String>,
    constraints: &BTreeMap<String, Constraint>,
) -> HashMap<String, ParamValue> {
    raw.iter()
        .map(|(name, value)| (name.clone(), cast(value, constraints.get(name))))
        .collect()
}

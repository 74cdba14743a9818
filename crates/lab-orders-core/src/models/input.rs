//! Loosely-typed request payload pieces and their parse boundary.
//!
//! Form payloads arrive with numbers as numbers, numeric strings, or
//! JSON-encoded arrays. Everything here is deserialized once and then
//! converted to typed values; nothing downstream sees the raw shapes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Field-level errors for patient and lab-test input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("Missing required fields: {0}")]
    MissingFields(&'static str),

    #[error("{0}")]
    Invalid(String),
}

/// An identifier as submitted by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Int(i64),
    Float(f64),
    Text(String),
    Other(serde_json::Value),
}

impl RawId {
    /// Coerce to an integer id. Non-numeric values yield `None`.
    pub fn to_id(&self) -> Option<i64> {
        match self {
            RawId::Int(n) => Some(*n),
            RawId::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(*f as i64),
            RawId::Float(_) => None,
            RawId::Text(s) => s.trim().parse().ok(),
            RawId::Other(_) => None,
        }
    }
}

/// A test-id selection: either a JSON array or a JSON-encoded array string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTestIds {
    List(Vec<Option<RawId>>),
    Encoded(String),
}

impl RawTestIds {
    /// Coerce every entry; null and non-numeric entries become `None`.
    pub fn to_ids(&self) -> Vec<Option<i64>> {
        match self {
            RawTestIds::List(items) => coerce_all(items),
            RawTestIds::Encoded(text) => {
                serde_json::from_str::<Vec<Option<RawId>>>(text)
                    .map(|items| coerce_all(&items))
                    .unwrap_or_default()
            }
        }
    }
}

fn coerce_all(items: &[Option<RawId>]) -> Vec<Option<i64>> {
    items
        .iter()
        .map(|item| item.as_ref().and_then(RawId::to_id))
        .collect()
}

/// Read an optional non-blank string field.
pub(crate) fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Read a number submitted as a JSON number or numeric string.
pub(crate) fn loose_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

//! Workflow payloads - flat parameter maps for engine invocations.
//!
//! A [`Payload`] is the flat, string-keyed parameter map handed to the
//! external workflow engine with each dispatch. The driver rebuilds the
//! payload from scratch before every call by projecting the current loop
//! state, resource indices, and fixed location identifiers; payloads are
//! never shared or mutated across iterations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Value types accepted by workflow payload fields.
///
/// `WellGroups` carries the lists-of-lists well layout used for multichannel
/// transfers (one inner list per plate column).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PayloadValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    WellGroups(Vec<Vec<String>>),
}

impl fmt::Display for PayloadValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadValue::Bool(v) => write!(f, "{v}"),
            PayloadValue::Integer(v) => write!(f, "{v}"),
            PayloadValue::Float(v) => write!(f, "{v}"),
            PayloadValue::Text(v) => write!(f, "{v}"),
            PayloadValue::WellGroups(groups) => {
                // Render like the engine expects list parameters
                let rendered = serde_json::to_string(groups).map_err(|_| fmt::Error)?;
                write!(f, "{rendered}")
            }
        }
    }
}

impl From<bool> for PayloadValue {
    fn from(v: bool) -> Self {
        PayloadValue::Bool(v)
    }
}

impl From<i64> for PayloadValue {
    fn from(v: i64) -> Self {
        PayloadValue::Integer(v)
    }
}

impl From<u32> for PayloadValue {
    fn from(v: u32) -> Self {
        PayloadValue::Integer(i64::from(v))
    }
}

impl From<u64> for PayloadValue {
    fn from(v: u64) -> Self {
        // Loop counters and second counts stay far below i64::MAX
        PayloadValue::Integer(v as i64)
    }
}

impl From<f64> for PayloadValue {
    fn from(v: f64) -> Self {
        PayloadValue::Float(v)
    }
}

impl From<String> for PayloadValue {
    fn from(v: String) -> Self {
        PayloadValue::Text(v)
    }
}

impl From<&str> for PayloadValue {
    fn from(v: &str) -> Self {
        PayloadValue::Text(v.to_string())
    }
}

impl From<Vec<Vec<String>>> for PayloadValue {
    fn from(v: Vec<Vec<String>>) -> Self {
        PayloadValue::WellGroups(v)
    }
}

/// Flat key-value parameter map for one workflow invocation.
///
/// Keys are ordered (BTreeMap) so logs and serialized payloads are stable
/// across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload {
    values: BTreeMap<String, PayloadValue>,
}

impl Payload {
    /// Create an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field, builder style.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<PayloadValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a field, replacing any previous value for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PayloadValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Look up a field.
    pub fn get(&self, key: &str) -> Option<&PayloadValue> {
        self.values.get(key)
    }

    /// Look up a text field.
    pub fn get_text(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(PayloadValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    /// Look up an integer field.
    pub fn get_integer(&self, key: &str) -> Option<i64> {
        match self.values.get(key) {
            Some(PayloadValue::Integer(v)) => Some(*v),
            _ => None,
        }
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the payload has no fields.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over fields in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &PayloadValue)> {
        self.values.iter()
    }
}

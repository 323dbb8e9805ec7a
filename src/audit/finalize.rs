//! Redaction and truncation
//!
//! Turns a diff into the two payloads stored on a log entry. Denylisted keys
//! are dropped, every remaining key gets its full old and new value (or an
//! empty placeholder for the missing side), and long strings are clipped.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use super::diff::DiffResult;
use super::snapshot::Snapshot;

/// Inserted between the kept head and tail of a clipped string
pub const TRUNCATION_MARKER: &str = " ... ";

/// Default cap on stored string length, in characters
pub const DEFAULT_TRUNCATION_LIMIT: usize = 4000;

/// The payloads of one log entry, before and after serialization
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizedMessage {
    pub old: Map<String, Value>,
    pub new: Map<String, Value>,
}

impl FinalizedMessage {
    /// JSON text stored as `old_message`
    pub fn old_json(&self) -> String {
        Value::Object(self.old.clone()).to_string()
    }

    /// JSON text stored as `new_message`
    pub fn new_json(&self) -> String {
        Value::Object(self.new.clone()).to_string()
    }
}

/// Applies the denylist and the length cap to a diff
#[derive(Debug, Clone)]
pub struct Finalizer {
    denylist: BTreeSet<String>,
    limit: usize,
}

impl Finalizer {
    pub fn new(denylist: BTreeSet<String>, limit: usize) -> Self {
        Self { denylist, limit }
    }

    /// Build the stored payloads, or `None` when nothing is left to log
    pub fn finalize(
        &self,
        diff: &DiffResult,
        old: &Snapshot,
        new: &Snapshot,
    ) -> Option<FinalizedMessage> {
        let mut old_payload = Map::new();
        let mut new_payload = Map::new();

        for key in diff.keys().filter(|k| !self.denylist.contains(*k)) {
            old_payload.insert(key.to_string(), self.side_value(old.get(key)));
            new_payload.insert(key.to_string(), self.side_value(new.get(key)));
        }

        if old_payload.is_empty() && new_payload.is_empty() {
            return None;
        }

        Some(FinalizedMessage {
            old: old_payload,
            new: new_payload,
        })
    }

    fn side_value(&self, value: Option<&Value>) -> Value {
        match value {
            Some(value) => limit_value(value, self.limit),
            None => Value::String(String::new()),
        }
    }
}

impl Default for Finalizer {
    fn default() -> Self {
        let denylist = ["password", "password_confirmation"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        Self::new(denylist, DEFAULT_TRUNCATION_LIMIT)
    }
}

/// Clip every string inside `value` to `limit` characters
pub fn limit_value(value: &Value, limit: usize) -> Value {
    match value {
        Value::String(s) => Value::String(limit_string(s, limit)),
        Value::Array(items) => Value::Array(items.iter().map(|v| limit_value(v, limit)).collect()),
        Value::Object(entries) => Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), limit_value(v, limit)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Clip a string to at most `limit` characters
///
/// Over-long strings keep their first and last characters around
/// `TRUNCATION_MARKER`; the composite never exceeds `limit`.
pub fn limit_string(s: &str, limit: usize) -> String {
    let length = s.chars().count();
    if length <= limit {
        return s.to_string();
    }

    let marker_len = TRUNCATION_MARKER.chars().count();
    if limit <= marker_len {
        return s.chars().take(limit).collect();
    }

    let budget = limit - marker_len;
    let head_len = budget - budget / 2;
    let tail_len = budget / 2;

    let head: String = s.chars().take(head_len).collect();
    let tail: String = s.chars().skip(length - tail_len).collect();
    format!("{}{}{}", head, TRUNCATION_MARKER, tail)
}

//! Snapshot diffing
//!
//! Compares two snapshots key by key. Keys whose values differ are kept with
//! their old value; keys found on one side only are kept with that side's
//! value. Nested mappings are compared one level deep and record only the
//! sub-keys that changed.

use serde_json::{Map, Number, Value};

use super::snapshot::Snapshot;
use crate::config::EqualityPolicy;

/// How a key differs between the two snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Present before, absent after
    Removed,
    /// Present on both sides with different values
    Modified,
    /// Absent before, present after
    Added,
}

/// One differing key
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDiff {
    pub key: String,
    pub kind: ChangeKind,
    /// Old value for removed and scalar-modified keys, the changed sub-keys
    /// for modified mappings, the new value for added keys
    pub value: Value,
}

/// The keys that differ between two snapshots, old-side keys first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffResult {
    fields: Vec<FieldDiff>,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn get(&self, key: &str) -> Option<&FieldDiff> {
        self.fields.iter().find(|f| f.key == key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldDiff> {
        self.fields.iter()
    }

    /// Flatten into a single key -> value mapping
    pub fn to_map(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|f| (f.key.clone(), f.value.clone()))
            .collect()
    }
}

/// Computes `DiffResult`s under a fixed equality policy
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffEngine {
    equality: EqualityPolicy,
}

impl DiffEngine {
    pub fn new(equality: EqualityPolicy) -> Self {
        Self { equality }
    }

    /// Diff two snapshots
    pub fn diff(&self, old: &Snapshot, new: &Snapshot) -> DiffResult {
        let mut remaining = new.clone();
        let mut fields = Vec::new();

        for (key, old_value) in old {
            let Some(new_value) = remaining.shift_remove(key) else {
                fields.push(FieldDiff {
                    key: key.clone(),
                    kind: ChangeKind::Removed,
                    value: old_value.clone(),
                });
                continue;
            };

            match (as_mapping(old_value), as_mapping(&new_value)) {
                (Some(old_map), Some(new_map)) => {
                    let sub = sub_diff(&old_map, &new_map);
                    if !sub.is_empty() {
                        fields.push(FieldDiff {
                            key: key.clone(),
                            kind: ChangeKind::Modified,
                            value: Value::Object(sub),
                        });
                    }
                }
                _ => {
                    if !self.values_equal(old_value, &new_value) {
                        fields.push(FieldDiff {
                            key: key.clone(),
                            kind: ChangeKind::Modified,
                            value: old_value.clone(),
                        });
                    }
                }
            }
        }

        fields.extend(remaining.into_iter().map(|(key, value)| FieldDiff {
            key,
            kind: ChangeKind::Added,
            value,
        }));

        DiffResult { fields }
    }

    fn values_equal(&self, a: &Value, b: &Value) -> bool {
        match self.equality {
            EqualityPolicy::Loose => loosely_equal(a, b),
            EqualityPolicy::Strict => a == b,
        }
    }
}

/// View arrays and objects as mappings; arrays are keyed by index
fn as_mapping(value: &Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v.clone()))
                .collect(),
        ),
        _ => None,
    }
}

/// Sub-keys that differ in either direction
///
/// Values are compared by their textual form. When a sub-key differs on both
/// sides the old side's value is kept.
fn sub_diff(old: &Map<String, Value>, new: &Map<String, Value>) -> Map<String, Value> {
    let mut result = Map::new();

    for (key, value) in old {
        if new.get(key).map(text_form).as_deref() != Some(text_form(value).as_str()) {
            result.insert(key.clone(), value.clone());
        }
    }

    for (key, value) in new {
        if result.contains_key(key) {
            continue;
        }
        if old.get(key).map(text_form).as_deref() != Some(text_form(value).as_str()) {
            result.insert(key.clone(), value.clone());
        }
    }

    result
}

/// String form used for nested comparison: null and false are empty,
/// true is "1", collections compare by their JSON text
fn text_form(value: &Value) -> String {
    match value {
        Value::Null | Value::Bool(false) => String::new(),
        Value::Bool(true) => "1".to_string(),
        Value::Number(n) => number_text(n),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Integral floats print without a fractional part, so `1.0` reads as `1`
fn number_text(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        _ => n.to_string(),
    }
}

/// A number as compared by loose equality
///
/// Integers stay exact; anything involving a float compares as `f64`.
#[derive(Debug, Clone, Copy)]
enum Numeric {
    Int(i128),
    Float(f64),
}

impl Numeric {
    fn from_number(n: &Number) -> Option<Self> {
        if let Some(i) = n.as_i64() {
            Some(Numeric::Int(i128::from(i)))
        } else if let Some(u) = n.as_u64() {
            Some(Numeric::Int(i128::from(u)))
        } else {
            n.as_f64().map(Numeric::Float)
        }
    }

    /// Parse a fully numeric string (surrounding whitespace allowed)
    fn parse(s: &str) -> Option<Self> {
        match s.trim().parse::<i128>() {
            Ok(i) => Some(Numeric::Int(i)),
            Err(_) => parse_numeric(s).map(Numeric::Float),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Numeric::Int(i) => i as f64,
            Numeric::Float(f) => f,
        }
    }
}

impl PartialEq for Numeric {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Numeric::Int(x), Numeric::Int(y)) => x == y,
            _ => self.as_f64() == other.as_f64(),
        }
    }
}

/// Type-coercing equality
///
/// - `null`, `false`, `0` and `""` are all equal to each other
/// - a boolean compares against the other side's truthiness
/// - two numeric strings, or a number and a numeric string, compare as numbers
/// - a number against a non-numeric string uses the string's leading numeric
///   prefix (or 0)
/// - arrays and objects compare element-wise under the same rules
pub fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), other) | (other, Value::Bool(x)) => *x == truthy(other),
        (Value::Null, other) | (other, Value::Null) => match other {
            Value::String(s) => s.is_empty(),
            Value::Number(n) => n.as_f64() == Some(0.0),
            Value::Array(items) => items.is_empty(),
            Value::Object(entries) => entries.is_empty(),
            _ => false,
        },
        (Value::Number(x), Value::Number(y)) => Numeric::from_number(x) == Numeric::from_number(y),
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            let number = Numeric::from_number(n);
            match Numeric::parse(s) {
                Some(parsed) => number == Some(parsed),
                None => number == Some(Numeric::Float(leading_number(s))),
            }
        }
        (Value::String(x), Value::String(y)) => match (Numeric::parse(x), Numeric::parse(y)) {
            (Some(nx), Some(ny)) => nx == ny,
            _ => x == y,
        },
        (Value::Array(_) | Value::Object(_), Value::Array(_) | Value::Object(_)) => {
            match (as_mapping(a), as_mapping(b)) {
                (Some(x), Some(y)) => {
                    x.len() == y.len()
                        && x.iter()
                            .all(|(k, v)| y.get(k).is_some_and(|w| loosely_equal(v, w)))
                }
                _ => false,
            }
        }
        _ => false,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !(s.is_empty() || s == "0"),
        Value::Array(items) => !items.is_empty(),
        Value::Object(entries) => !entries.is_empty(),
    }
}

/// Parse a fully numeric string (surrounding whitespace allowed)
fn parse_numeric(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty()
        || !trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
    {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|f| f.is_finite())
}

/// Longest numeric prefix of a string, or 0
fn leading_number(s: &str) -> f64 {
    let trimmed = s.trim_start();
    let mut end = 0;
    let mut best = 0.0;
    for (i, c) in trimmed.char_indices() {
        if !(c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-')) {
            break;
        }
        end = i + c.len_utf8();
        if let Ok(parsed) = trimmed[..end].parse::<f64>() {
            best = parsed;
        }
    }
    if end == 0 {
        0.0
    } else {
        best
    }
}

/// Format a JSON value for human-readable display
pub(crate) fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => {
            if s.chars().count() > 50 {
                let head: String = s.chars().take(47).collect();
                format!("\"{}...\"", head)
            } else {
                format!("\"{}\"", s)
            }
        }
        Value::Array(arr) => format!("[{} items]", arr.len()),
        Value::Object(obj) => format!("{{{} fields}}", obj.len()),
    }
}

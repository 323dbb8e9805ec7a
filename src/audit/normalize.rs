//! Value normalization
//!
//! Turns raw attribute values into plain JSON that can be compared and
//! stored. Record references collapse to their primary keys, collections are
//! normalized element by element, and an empty collection becomes the empty
//! string so "no data" looks the same whatever its original type.

use serde_json::{Map, Value};

use crate::models::AttributeValue;

/// Normalize a raw attribute value
pub fn normalize(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::Scalar(json) => normalize_json(json),
        AttributeValue::Entity(key) => key.to_value(),
        AttributeValue::Sequence(items) if items.is_empty() => empty_sentinel(),
        AttributeValue::Sequence(items) => Value::Array(items.iter().map(normalize).collect()),
        AttributeValue::Mapping(entries) if entries.is_empty() => empty_sentinel(),
        AttributeValue::Mapping(entries) => Value::Object(
            entries
                .iter()
                .map(|(name, value)| (name.to_string(), normalize(value)))
                .collect(),
        ),
    }
}

/// Normalize plain JSON: same rules, applied to nested arrays and objects
pub fn normalize_json(value: &Value) -> Value {
    match value {
        Value::Array(items) if items.is_empty() => empty_sentinel(),
        Value::Array(items) => Value::Array(items.iter().map(normalize_json).collect()),
        Value::Object(entries) if entries.is_empty() => empty_sentinel(),
        Value::Object(entries) => Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), normalize_json(v)))
                .collect::<Map<String, Value>>(),
        ),
        scalar => scalar.clone(),
    }
}

fn empty_sentinel() -> Value {
    Value::String(String::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Attributes, PrimaryKey};
    use serde_json::json;

    #[test]
    fn test_scalars_pass_through() {
        assert_eq!(normalize(&AttributeValue::from("text")), json!("text"));
        assert_eq!(normalize(&AttributeValue::from(12)), json!(12));
        assert_eq!(normalize(&AttributeValue::from(true)), json!(true));
        assert_eq!(normalize(&AttributeValue::Scalar(Value::Null)), Value::Null);
    }

    #[test]
    fn test_entity_becomes_primary_key() {
        assert_eq!(normalize(&AttributeValue::entity(7)), json!(7));

        let composite = PrimaryKey::composite([("a", json!(1)), ("b", json!("x"))]);
        assert_eq!(
            normalize(&AttributeValue::Entity(composite)),
            json!({"a": 1, "b": "x"})
        );
    }

    #[test]
    fn test_empty_collections_become_empty_string() {
        assert_eq!(normalize(&AttributeValue::Sequence(vec![])), json!(""));
        assert_eq!(normalize(&AttributeValue::Mapping(Attributes::new())), json!(""));
        assert_eq!(normalize(&AttributeValue::Scalar(json!([]))), json!(""));
        assert_eq!(normalize(&AttributeValue::Scalar(json!({}))), json!(""));
    }

    #[test]
    fn test_nested_collections_are_normalized() {
        let mut inner = Attributes::new();
        inner.insert("owner", AttributeValue::entity(3));
        inner.insert("labels", AttributeValue::Sequence(vec![]));

        let value = AttributeValue::Sequence(vec![
            AttributeValue::Mapping(inner),
            AttributeValue::entities([1i64, 2]),
        ]);

        assert_eq!(
            normalize(&value),
            json!([{"owner": 3, "labels": ""}, [1, 2]])
        );
    }

    #[test]
    fn test_nested_json_is_normalized() {
        let value = json!({"meta": {"tags": [], "size": 2}});
        assert_eq!(normalize_json(&value), json!({"meta": {"tags": "", "size": 2}}));
    }
}

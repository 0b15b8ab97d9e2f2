//! Schema inference for semi-structured and tabular data
//!
//! Produces a flattened map of dotted field paths to [`InferredField`]s:
//! - JSON trees are walked recursively, sampling only the first element of arrays
//! - Tabular samples yield one entry per column with a null count

mod tabular;

pub use tabular::*;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Default number of characters kept for a sample value
pub const DEFAULT_MAX_SAMPLE_CHARS: usize = 100;

/// Flattened schema: field path -> inferred field
pub type Schema = BTreeMap<String, InferredField>;

/// Kind of an inferred value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    String,
    Number,
    Boolean,
    Null,
    Object,
    Array,
}

impl ValueKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Boolean,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::Number => "number",
            ValueKind::Boolean => "boolean",
            ValueKind::Null => "null",
            ValueKind::Object => "object",
            ValueKind::Array => "array",
        }
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One inferred field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferredField {
    pub kind: ValueKind,
    pub sample: Option<String>,
    /// Missing values in the sampled rows (tabular input only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub null_count: Option<usize>,
}

/// Schema inferrer with a configurable sample length
#[derive(Debug, Clone, Copy)]
pub struct SchemaInferrer {
    max_sample_chars: usize,
}

impl Default for SchemaInferrer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SAMPLE_CHARS)
    }
}

impl SchemaInferrer {
    pub fn new(max_sample_chars: usize) -> Self {
        Self { max_sample_chars }
    }

    /// Infer a flattened schema from a JSON tree
    pub fn infer_json(&self, data: &Value) -> Schema {
        let mut schema = Schema::new();
        self.walk(data, "", &mut schema);
        schema
    }

    fn walk(&self, data: &Value, parent: &str, schema: &mut Schema) {
        match data {
            Value::Object(map) => {
                for (key, value) in map {
                    let path = join_path(parent, key);
                    schema.insert(
                        path.clone(),
                        InferredField {
                            kind: ValueKind::of(value),
                            sample: self.sample_of(value),
                            null_count: None,
                        },
                    );
                    if matches!(value, Value::Object(_) | Value::Array(_)) {
                        self.walk(value, &path, schema);
                    }
                }
            }
            Value::Array(items) => {
                // Only the first element's shape is sampled
                let Some(first) = items.first() else {
                    return;
                };
                schema.insert(
                    parent.to_string(),
                    InferredField {
                        kind: ValueKind::Array,
                        sample: self.sample_of(first),
                        null_count: None,
                    },
                );
                if first.is_object() {
                    self.walk(first, parent, schema);
                }
            }
            _ => {}
        }
    }

    fn sample_of(&self, value: &Value) -> Option<String> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(truncate_chars(s, self.max_sample_chars)),
            other => Some(truncate_chars(&other.to_string(), self.max_sample_chars)),
        }
    }

    pub(crate) fn truncate(&self, s: &str) -> String {
        truncate_chars(s, self.max_sample_chars)
    }
}

/// Infer a schema from a JSON tree with default settings
pub fn infer_json(data: &Value) -> Schema {
    SchemaInferrer::default().infer_json(data)
}

fn join_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

/// Truncate to at most `max` characters on a char boundary
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_object() {
        let schema = infer_json(&json!({"id": 7, "name": "Ada", "active": true, "note": null}));
        assert_eq!(schema.len(), 4);
        assert_eq!(schema["id"].kind, ValueKind::Number);
        assert_eq!(schema["id"].sample.as_deref(), Some("7"));
        assert_eq!(schema["name"].kind, ValueKind::String);
        assert_eq!(schema["name"].sample.as_deref(), Some("Ada"));
        assert_eq!(schema["active"].kind, ValueKind::Boolean);
        assert_eq!(schema["note"].kind, ValueKind::Null);
        assert_eq!(schema["note"].sample, None);
    }

    #[test]
    fn test_nested_paths_appear_once() {
        let schema = infer_json(&json!({
            "user": {
                "id": 1,
                "address": {"city": "Leeds", "zip": "LS1"}
            },
            "tags": ["a", "b"]
        }));

        let keys: Vec<&str> = schema.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "tags",
                "user",
                "user.address",
                "user.address.city",
                "user.address.zip",
                "user.id"
            ]
        );
        assert_eq!(schema["user"].kind, ValueKind::Object);
        assert_eq!(schema["user.address"].kind, ValueKind::Object);
        assert_eq!(schema["tags"].kind, ValueKind::Array);
        // The array entry is resampled from its first element
        assert_eq!(schema["tags"].sample.as_deref(), Some("a"));
    }

    #[test]
    fn test_array_of_objects_samples_first_element_only() {
        let schema = infer_json(&json!({
            "items": [{"sku": "X1", "qty": 2}, {"sku": "X2", "price": 9.5}]
        }));

        assert_eq!(schema["items"].kind, ValueKind::Array);
        assert!(schema.contains_key("items.sku"));
        assert!(schema.contains_key("items.qty"));
        assert!(!schema.contains_key("items.price"));
    }

    #[test]
    fn test_top_level_array_uses_root_path() {
        let schema = infer_json(&json!([{"id": 1, "title": "first"}]));
        assert_eq!(schema[""].kind, ValueKind::Array);
        assert_eq!(schema["id"].kind, ValueKind::Number);
        assert_eq!(schema["title"].kind, ValueKind::String);
        assert_eq!(schema.len(), 3);
    }

    #[test]
    fn test_empty_inputs_yield_empty_schema() {
        assert!(infer_json(&json!({})).is_empty());
        assert!(infer_json(&json!([])).is_empty());
        assert!(infer_json(&json!(42)).is_empty());
    }

    #[test]
    fn test_empty_containers_keep_their_own_key() {
        let schema = infer_json(&json!({"meta": {}, "list": []}));
        assert_eq!(schema.len(), 2);
        assert_eq!(schema["meta"].kind, ValueKind::Object);
        assert_eq!(schema["list"].kind, ValueKind::Array);
    }

    #[test]
    fn test_sample_truncated_on_char_boundary() {
        let long = "é".repeat(150);
        let schema = infer_json(&json!({ "text": long }));
        let sample = schema["text"].sample.as_ref().unwrap();
        assert_eq!(sample.chars().count(), DEFAULT_MAX_SAMPLE_CHARS);

        let short = SchemaInferrer::new(3).infer_json(&json!({"k": "abcdef"}));
        assert_eq!(short["k"].sample.as_deref(), Some("abc"));
    }

    #[test]
    fn test_inference_is_deterministic() {
        let data = json!({"b": {"y": 1, "x": [1, 2]}, "a": "z"});
        assert_eq!(infer_json(&data), infer_json(&data));
    }
}

//! Scalar configuration values and flat, dotted-key layers.
//!
//! Every source (built-in defaults, a YAML/JSON file, the process
//! environment) is reduced to a [`Layer`] before merging, so nested
//! documents are flattened here and nowhere else.

use std::collections::{BTreeMap, btree_map};
use std::fmt;

/// Separator between path segments of a dotted key.
pub const KEY_DELIMITER: char = '.';

/// A single configuration value as produced by a source.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
}

impl Value {
    /// Short name of the variant, used in coercion errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Integer(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value}"),
            Value::String(value) => f.write_str(value),
            Value::List(items) => {
                f.write_str("[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

/// A flat key space addressed by case-sensitive dotted keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layer {
    entries: BTreeMap<String, Value>,
}

impl Layer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.entries.iter()
    }

    /// Overlays `other` on top of `self`; keys present in both take `other`'s value.
    pub fn overlay(&mut self, other: Layer) {
        self.entries.extend(other.entries);
    }

    /// Flattens a JSON document. Returns `None` unless the top level is an object.
    pub fn from_json(document: serde_json::Value) -> Option<Self> {
        let serde_json::Value::Object(map) = document else {
            return None;
        };

        let mut layer = Layer::new();
        for (key, value) in map {
            flatten_json(key, value, &mut layer.entries);
        }
        Some(layer)
    }

    /// Flattens a YAML document. An empty document yields an empty layer;
    /// any other non-mapping top level yields `None`.
    pub fn from_yaml(document: serde_yaml::Value) -> Option<Self> {
        match document {
            serde_yaml::Value::Null => Some(Layer::new()),
            serde_yaml::Value::Mapping(mapping) => {
                let mut layer = Layer::new();
                for (key, value) in mapping {
                    if let Some(key) = yaml_key(&key) {
                        flatten_yaml(key, value, &mut layer.entries);
                    }
                }
                Some(layer)
            }
            serde_yaml::Value::Tagged(tagged) => Self::from_yaml(tagged.value),
            _ => None,
        }
    }
}

impl<K, V> FromIterator<(K, V)> for Layer
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut layer = Layer::new();
        for (key, value) in iter {
            layer.insert(key, value);
        }
        layer
    }
}

fn join_key(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}{KEY_DELIMITER}{segment}")
    }
}

fn flatten_json(key: String, value: serde_json::Value, out: &mut BTreeMap<String, Value>) {
    match value {
        serde_json::Value::Object(map) => {
            for (segment, nested) in map {
                flatten_json(join_key(&key, &segment), nested, out);
            }
        }
        other => {
            out.insert(key, json_scalar(other));
        }
    }
}

fn json_scalar(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(number) => match number.as_i64() {
            Some(integer) => Value::Integer(integer),
            None => Value::Float(number.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => Value::List(items.into_iter().map(json_scalar).collect()),
        // Objects nested inside arrays have no dotted-key address.
        object @ serde_json::Value::Object(_) => Value::String(object.to_string()),
    }
}

fn yaml_key(key: &serde_yaml::Value) -> Option<String> {
    match key {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Tagged(tagged) => yaml_key(&tagged.value),
        _ => None,
    }
}

fn flatten_yaml(key: String, value: serde_yaml::Value, out: &mut BTreeMap<String, Value>) {
    match value {
        serde_yaml::Value::Mapping(mapping) => {
            for (segment, nested) in mapping {
                if let Some(segment) = yaml_key(&segment) {
                    flatten_yaml(join_key(&key, &segment), nested, out);
                }
            }
        }
        serde_yaml::Value::Tagged(tagged) => flatten_yaml(key, tagged.value, out),
        other => {
            out.insert(key, yaml_scalar(other));
        }
    }
}

fn yaml_scalar(value: serde_yaml::Value) -> Value {
    match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(number) => match number.as_i64() {
            Some(integer) => Value::Integer(integer),
            None => Value::Float(number.as_f64().unwrap_or(f64::NAN)),
        },
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(items) => {
            Value::List(items.into_iter().map(yaml_scalar).collect())
        }
        serde_yaml::Value::Tagged(tagged) => yaml_scalar(tagged.value),
        mapping @ serde_yaml::Value::Mapping(_) => {
            Value::String(serde_yaml::to_string(&mapping).unwrap_or_default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_json_flattens_to_dotted_keys() {
        let doc = serde_json::json!({
            "jwt": { "secret": "s3cret", "issuer": "me" },
            "www": { "port": 443 },
            "dev": true
        });
        let layer = Layer::from_json(doc).expect("object");

        assert_eq!(layer.get("jwt.secret"), Some(&Value::from("s3cret")));
        assert_eq!(layer.get("jwt.issuer"), Some(&Value::from("me")));
        assert_eq!(layer.get("www.port"), Some(&Value::Integer(443)));
        assert_eq!(layer.get("dev"), Some(&Value::Bool(true)));
        assert_eq!(layer.len(), 4);
    }

    #[test]
    fn literal_dotted_and_nested_yaml_keys_address_the_same_entry() {
        let doc: serde_yaml::Value =
            serde_yaml::from_str("redis:\n  db: 3\nredis.addr: cache:6379\n").unwrap();
        let layer = Layer::from_yaml(doc).expect("mapping");

        assert_eq!(layer.get("redis.db"), Some(&Value::Integer(3)));
        assert_eq!(layer.get("redis.addr"), Some(&Value::from("cache:6379")));
    }

    #[test]
    fn non_mapping_documents_are_rejected() {
        assert!(Layer::from_json(serde_json::json!([1, 2])).is_none());
        let scalar: serde_yaml::Value = serde_yaml::from_str("just a string").unwrap();
        assert!(Layer::from_yaml(scalar).is_none());
        assert_eq!(Layer::from_yaml(serde_yaml::Value::Null), Some(Layer::new()));
    }

    #[test]
    fn overlay_replaces_existing_keys_only() {
        let mut base: Layer = [("a", "1"), ("b", "2")].into_iter().collect();
        let top: Layer = [("b", "3"), ("c", "4")].into_iter().collect();
        base.overlay(top);

        assert_eq!(base.get("a"), Some(&Value::from("1")));
        assert_eq!(base.get("b"), Some(&Value::from("3")));
        assert_eq!(base.get("c"), Some(&Value::from("4")));
    }

    #[test]
    fn list_values_render_for_diagnostics() {
        let value = Value::List(vec![Value::Integer(1), Value::from("x")]);
        assert_eq!(value.to_string(), "[1, x]");
        assert_eq!(value.kind(), "list");
    }
}

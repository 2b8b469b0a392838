//! Shared flat JSON document behind both message roles.

use crate::error::{ProtocolError, Result};
use serde_json::{Map, Value};

/// A flat string-keyed JSON object. Insertion order is irrelevant to the
/// protocol; values are strings apart from role-reserved booleans.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Document {
    fields: Map<String, Value>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON object. Anything that is not a top-level object is
    /// rejected as `InvalidJson`.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(ProtocolError::InvalidJson(format!(
                "expected a JSON object, got {other}"
            ))),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// String value for `key`, if present and a string.
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.fields
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_owned)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.fields.get(key).and_then(Value::as_bool)
    }

    /// Absorb every key from `other` that this document lacks. Existing
    /// keys keep their values regardless of what `other` holds.
    pub fn absorb(&mut self, other: &Document) {
        for (key, value) in &other.fields {
            if !self.fields.contains_key(key) {
                self.fields.insert(key.clone(), value.clone());
            }
        }
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    pub fn json(&self) -> String {
        Value::Object(self.fields.clone()).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_non_object_json() {
        assert!(Document::from_json("[1, 2, 3]").is_err());
        assert!(Document::from_json("\"just a string\"").is_err());
        assert!(Document::from_json("{not json").is_err());
    }

    #[test]
    fn absorb_never_overwrites() {
        let mut a = Document::new();
        a.insert("shared", json!("kept"));
        a.insert("only_a", json!("1"));

        let mut b = Document::new();
        b.insert("shared", json!("discarded"));
        b.insert("only_b", json!("2"));

        a.absorb(&b);
        assert_eq!(a.get_str("shared").as_deref(), Some("kept"));
        assert_eq!(a.get_str("only_a").as_deref(), Some("1"));
        assert_eq!(a.get_str("only_b").as_deref(), Some("2"));
    }

    #[test]
    fn json_roundtrip() {
        let mut doc = Document::new();
        doc.insert("value", json!("21"));
        let parsed = Document::from_json(&doc.json()).unwrap();
        assert_eq!(parsed, doc);
    }
}

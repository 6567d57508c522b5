//! Request body values before encoding.
//!
//! The body is kept structured until the request is sent so that
//! configuration layers can merge it field by field and the encoder can pick
//! a wire format from the final `Content-Type`.

use crate::http::multipart::{Form, Part};
use bytes::Bytes;
use serde_json::{Map, Value};

/// Request body.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Sent as-is; `text/plain` when no content type is set.
    Text(String),
    /// Sent as-is; `application/octet-stream` when no content type is set.
    Bytes(Bytes),
    /// Structured object. Encoded as JSON, URL-encoded or multipart.
    Object(Fields),
    /// Search-params style ordered pairs.
    Form(Vec<(String, String)>),
    /// A ready-made multipart form.
    Multipart(Form),
}

impl RequestBody {
    /// Check if the body carries nothing to send.
    pub fn is_empty(&self) -> bool {
        match self {
            RequestBody::Empty => true,
            RequestBody::Text(s) => s.is_empty(),
            RequestBody::Bytes(b) => b.is_empty(),
            RequestBody::Object(_) | RequestBody::Form(_) | RequestBody::Multipart(_) => false,
        }
    }

    /// Deep overlay: two objects merge field by field, anything else is
    /// replaced by `other`.
    pub fn overlay(&self, other: &RequestBody) -> RequestBody {
        match (self, other) {
            (RequestBody::Object(base), RequestBody::Object(over)) => {
                RequestBody::Object(base.overlay(over))
            }
            (_, over) => over.clone(),
        }
    }
}

impl From<&str> for RequestBody {
    fn from(s: &str) -> Self {
        RequestBody::Text(s.to_owned())
    }
}

impl From<String> for RequestBody {
    fn from(s: String) -> Self {
        RequestBody::Text(s)
    }
}

impl From<Bytes> for RequestBody {
    fn from(b: Bytes) -> Self {
        RequestBody::Bytes(b)
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(v: Vec<u8>) -> Self {
        RequestBody::Bytes(Bytes::from(v))
    }
}

impl From<Fields> for RequestBody {
    fn from(fields: Fields) -> Self {
        RequestBody::Object(fields)
    }
}

impl From<Form> for RequestBody {
    fn from(form: Form) -> Self {
        RequestBody::Multipart(form)
    }
}

/// JSON objects become [`RequestBody::Object`]; strings are sent as text;
/// every other value as its JSON text.
impl From<Value> for RequestBody {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => RequestBody::Object(Fields::from(map)),
            Value::String(s) => RequestBody::Text(s),
            Value::Null => RequestBody::Empty,
            other => RequestBody::Text(other.to_string()),
        }
    }
}

/// One field of a structured body.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Value(Value),
    /// Passed through to the multipart encoder untouched.
    Part(Part),
}

impl From<Value> for Field {
    fn from(value: Value) -> Self {
        Field::Value(value)
    }
}

impl From<Part> for Field {
    fn from(part: Part) -> Self {
        Field::Part(part)
    }
}

impl From<&str> for Field {
    fn from(s: &str) -> Self {
        Field::Value(Value::String(s.to_owned()))
    }
}

impl From<String> for Field {
    fn from(s: String) -> Self {
        Field::Value(Value::String(s))
    }
}

/// Ordered field map of a structured body. Field names are unique.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    entries: Vec<(String, Field)>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Fields::insert`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Field>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace, keeping the original position on replace.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Field>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.entries.iter().map(|(n, f)| (n.as_str(), f))
    }

    /// Recursive overlay: nested JSON objects merge key by key, any other
    /// value from `other` replaces ours.
    pub fn overlay(&self, other: &Fields) -> Fields {
        let mut merged = self.clone();
        for (name, field) in other.iter() {
            let combined = match (merged.get(name), field) {
                (Some(Field::Value(Value::Object(base))), Field::Value(Value::Object(over))) => {
                    Field::Value(Value::Object(merge_objects(base, over)))
                }
                _ => field.clone(),
            };
            merged.insert(name, combined);
        }
        merged
    }

    /// Gap-filling merge: fields of `defaults` are added only where this map
    /// has no field of the same name.
    pub fn merge_missing(&self, defaults: &Fields) -> Fields {
        let mut merged = self.clone();
        for (name, field) in defaults.iter() {
            if !merged.contains(name) {
                merged.insert(name, field.clone());
            }
        }
        merged
    }

    /// JSON view of the fields. `None` if any field is a binary part.
    pub fn to_json(&self) -> Option<Value> {
        let mut map = Map::with_capacity(self.entries.len());
        for (name, field) in &self.entries {
            match field {
                Field::Value(v) => {
                    map.insert(name.clone(), v.clone());
                }
                Field::Part(_) => return None,
            }
        }
        Some(Value::Object(map))
    }
}

impl From<Map<String, Value>> for Fields {
    fn from(map: Map<String, Value>) -> Self {
        Self {
            entries: map.into_iter().map(|(k, v)| (k, Field::Value(v))).collect(),
        }
    }
}

impl<N: Into<String>, V: Into<Field>> FromIterator<(N, V)> for Fields {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut fields = Fields::new();
        for (name, value) in iter {
            fields.insert(name, value);
        }
        fields
    }
}

fn merge_objects(base: &Map<String, Value>, over: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = base.clone();
    for (key, value) in over {
        let combined = match (merged.get(key), value) {
            (Some(Value::Object(b)), Value::Object(o)) => Value::Object(merge_objects(b, o)),
            _ => value.clone(),
        };
        merged.insert(key.clone(), combined);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_body() {
        assert!(RequestBody::Empty.is_empty());
        assert!(RequestBody::from("").is_empty());
        assert!(!RequestBody::from("x").is_empty());
        assert!(RequestBody::default().is_empty());
    }

    #[test]
    fn test_from_json_object() {
        let body = RequestBody::from(json!({"a": 1}));
        match body {
            RequestBody::Object(fields) => {
                assert_eq!(fields.get("a"), Some(&Field::Value(json!(1))));
            }
            other => panic!("expected object, got {:?}", other),
        }
    }

    #[test]
    fn test_fields_insert_replaces_in_place() {
        let mut fields = Fields::new().with("a", "1").with("b", "2");
        fields.insert("a", "3");
        let names: Vec<_> = fields.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(fields.get("a"), Some(&Field::from("3")));
    }

    #[test]
    fn test_overlay_is_recursive() {
        let base = Fields::from(
            json!({"o": {"x": 1, "y": {"deep": true}}, "keep": 1})
                .as_object()
                .cloned()
                .unwrap(),
        );
        let over = Fields::from(
            json!({"o": {"y": {"more": 2}}, "new": "n"})
                .as_object()
                .cloned()
                .unwrap(),
        );

        let merged = base.overlay(&over).to_json().unwrap();
        assert_eq!(
            merged,
            json!({"o": {"x": 1, "y": {"deep": true, "more": 2}}, "keep": 1, "new": "n"})
        );
    }

    #[test]
    fn test_body_overlay_replaces_non_objects() {
        let base = RequestBody::from(json!({"a": 1}));
        let merged = base.overlay(&RequestBody::from("text"));
        assert!(matches!(merged, RequestBody::Text(ref s) if s == "text"));
    }

    #[test]
    fn test_merge_missing_keeps_existing() {
        let caller = Fields::new().with("fb_dtsg", "mine");
        let session = Fields::new().with("fb_dtsg", "session").with("av", "100");

        let merged = caller.merge_missing(&session);
        assert_eq!(merged.get("fb_dtsg"), Some(&Field::from("mine")));
        assert_eq!(merged.get("av"), Some(&Field::from("100")));
    }

    #[test]
    fn test_to_json_refuses_parts() {
        let fields = Fields::new().with("file", Part::bytes(vec![1u8, 2]));
        assert!(fields.to_json().is_none());
    }
}

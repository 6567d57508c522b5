//! Request body encoding.
//!
//! The wire format follows an explicit `Content-Type` when one is set and is
//! inferred from the body's shape otherwise. The header list is updated to
//! describe what is actually sent.

use crate::base::neterror::NetError;
use crate::http::multipart::{Form, Part};
use crate::http::orderedheaders::OrderedHeaderMap;
use crate::http::requestbody::{Field, Fields, RequestBody};
use bytes::Bytes;
use serde_json::Value;

const CONTENT_TYPE: &str = "Content-Type";

/// Media type without parameters, lowercased.
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Encode `body`, adjusting `headers`. Returns `None` when there is nothing
/// to send.
pub fn encode_body(
    body: &RequestBody,
    headers: &mut OrderedHeaderMap,
) -> Result<Option<Bytes>, NetError> {
    if body.is_empty() {
        return Ok(None);
    }

    let explicit = headers.get(CONTENT_TYPE).map(essence);

    let encoded = match (explicit.as_deref(), body) {
        (Some("application/json"), RequestBody::Object(fields)) => json_bytes(fields)?,
        (Some("application/x-www-form-urlencoded"), RequestBody::Object(fields)) => {
            Bytes::from(urlencode_fields(fields)?)
        }
        (Some("application/x-www-form-urlencoded"), RequestBody::Form(pairs)) => {
            Bytes::from(urlencode_pairs(pairs))
        }
        (Some("multipart/form-data"), RequestBody::Object(fields)) => {
            let form = multipart_from_fields(fields);
            set_content_type(headers, &form.content_type());
            form.to_body()
        }
        (Some("multipart/form-data"), RequestBody::Bytes(bytes)) => {
            set_content_type(headers, "application/octet-stream");
            bytes.clone()
        }
        (_, RequestBody::Multipart(form)) => {
            set_content_type(headers, &form.content_type());
            form.to_body()
        }
        // An explicit type with a body of another shape is sent unchanged.
        (Some(_), other) => raw_bytes(other)?,
        (None, RequestBody::Form(pairs)) => {
            set_content_type(headers, "application/x-www-form-urlencoded");
            Bytes::from(urlencode_pairs(pairs))
        }
        (None, RequestBody::Object(fields)) => {
            set_content_type(headers, "application/json");
            json_bytes(fields)?
        }
        (None, RequestBody::Bytes(bytes)) => {
            set_content_type(headers, "application/octet-stream");
            bytes.clone()
        }
        (None, RequestBody::Text(text)) => {
            set_content_type(headers, "text/plain");
            Bytes::from(text.clone())
        }
        (None, RequestBody::Empty) => return Ok(None),
    };

    Ok(Some(encoded))
}

fn set_content_type(headers: &mut OrderedHeaderMap, value: &str) {
    headers.remove(CONTENT_TYPE);
    headers.insert(CONTENT_TYPE, value);
}

fn raw_bytes(body: &RequestBody) -> Result<Bytes, NetError> {
    Ok(match body {
        RequestBody::Empty => Bytes::new(),
        RequestBody::Text(text) => Bytes::from(text.clone()),
        RequestBody::Bytes(bytes) => bytes.clone(),
        RequestBody::Object(fields) => json_bytes(fields)?,
        RequestBody::Form(pairs) => Bytes::from(urlencode_pairs(pairs)),
        RequestBody::Multipart(form) => form.to_body(),
    })
}

fn json_bytes(fields: &Fields) -> Result<Bytes, NetError> {
    let value = fields
        .to_json()
        .ok_or_else(|| NetError::invalid_body("binary part in a JSON body"))?;
    serde_json::to_vec(&value)
        .map(Bytes::from)
        .map_err(|e| NetError::invalid_body(e.to_string()))
}

/// Text form of a scalar field value. Strings are used verbatim, nested
/// values as their JSON text.
pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn urlencode_pairs(pairs: &[(String, String)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

/// Arrays repeat their key once per element.
fn urlencode_fields(fields: &Fields) -> Result<String, NetError> {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (name, field) in fields.iter() {
        match field {
            Field::Value(Value::Array(items)) => {
                for item in items {
                    serializer.append_pair(name, &value_text(item));
                }
            }
            Field::Value(value) => {
                serializer.append_pair(name, &value_text(value));
            }
            Field::Part(_) => {
                return Err(NetError::invalid_body(format!(
                    "binary part `{}` in a URL-encoded body",
                    name
                )))
            }
        }
    }
    Ok(serializer.finish())
}

/// Arrays append one part per element; parts pass through untouched.
fn multipart_from_fields(fields: &Fields) -> Form {
    let mut form = Form::new();
    for (name, field) in fields.iter() {
        match field {
            Field::Part(part) => form.append(name, part.clone()),
            Field::Value(Value::Array(items)) => {
                for item in items {
                    form.append(name, Part::text(value_text(item)));
                }
            }
            Field::Value(value) => form.append(name, Part::text(value_text(value))),
        }
    }
    form
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::multipart::parse_form_data;
    use serde_json::json;

    fn headers_with_type(ct: &str) -> OrderedHeaderMap {
        let mut headers = OrderedHeaderMap::new();
        headers.insert("Content-Type", ct);
        headers
    }

    #[test]
    fn test_json_object() {
        let mut headers = headers_with_type("application/json");
        let body = RequestBody::from(json!({"a": 1}));
        let encoded = encode_body(&body, &mut headers).unwrap().unwrap();
        assert_eq!(encoded, Bytes::from_static(br#"{"a":1}"#));
        assert_eq!(headers.get("content-type"), Some("application/json"));
    }

    #[test]
    fn test_json_with_charset_parameter() {
        let mut headers = headers_with_type("application/json; charset=utf-8");
        let body = RequestBody::from(json!({"k": "v"}));
        let encoded = encode_body(&body, &mut headers).unwrap().unwrap();
        assert_eq!(encoded, Bytes::from_static(br#"{"k":"v"}"#));
    }

    #[test]
    fn test_urlencoded_object_repeats_array_keys() {
        let mut headers = headers_with_type("application/x-www-form-urlencoded");
        let body = RequestBody::from(json!({"a": 1, "b": [2, 3]}));
        let encoded = encode_body(&body, &mut headers).unwrap().unwrap();
        assert_eq!(encoded, Bytes::from_static(b"a=1&b=2&b=3"));
    }

    #[test]
    fn test_urlencoded_nested_object_as_json() {
        let mut headers = headers_with_type("application/x-www-form-urlencoded");
        let body = RequestBody::from(json!({"q": {"x": 1}}));
        let encoded = encode_body(&body, &mut headers).unwrap().unwrap();
        assert_eq!(encoded, Bytes::from_static(b"q=%7B%22x%22%3A1%7D"));
    }

    #[test]
    fn test_urlencoded_rejects_parts() {
        let mut headers = headers_with_type("application/x-www-form-urlencoded");
        let body = RequestBody::Object(Fields::new().with("f", Part::bytes(vec![0u8])));
        let err = encode_body(&body, &mut headers).unwrap_err();
        assert_eq!(err.as_i32(), -911);
    }

    #[test]
    fn test_multipart_object_replaces_content_type() {
        let mut headers = headers_with_type("multipart/form-data");
        let body = RequestBody::Object(
            Fields::from(json!({"a": "1", "ids": [7, 8]}).as_object().cloned().unwrap())
                .with("file", Part::bytes(b"img".as_slice()).file_name("a.png")),
        );

        let encoded = encode_body(&body, &mut headers).unwrap().unwrap();
        let ct = headers.get("Content-Type").unwrap().to_string();
        assert!(ct.starts_with("multipart/form-data; boundary=----syncnet-boundary-"));
        assert_eq!(headers.len(), 1);

        let boundary = crate::http::multipart::boundary_from_content_type(&ct).unwrap();
        let fields = parse_form_data(boundary, &encoded).unwrap();
        let expect = |n: &str, v: &str| (n.to_string(), v.to_string());
        assert_eq!(
            fields,
            vec![
                expect("a", "1"),
                expect("ids", "7"),
                expect("ids", "8"),
                expect("file", "img"),
            ]
        );
    }

    #[test]
    fn test_inferred_types() {
        let cases: Vec<(RequestBody, &str)> = vec![
            (RequestBody::from(json!({"a": 1})), "application/json"),
            (
                RequestBody::Form(vec![("a".into(), "1".into())]),
                "application/x-www-form-urlencoded",
            ),
            (RequestBody::from(vec![1u8, 2]), "application/octet-stream"),
            (RequestBody::from("hi"), "text/plain"),
        ];
        for (body, expected) in cases {
            let mut headers = OrderedHeaderMap::new();
            encode_body(&body, &mut headers).unwrap();
            assert_eq!(headers.get("content-type"), Some(expected));
        }
    }

    #[test]
    fn test_inferred_multipart_form() {
        let mut headers = OrderedHeaderMap::new();
        let form = Form::new().text("a", "1");
        let expected = form.content_type();
        encode_body(&RequestBody::Multipart(form), &mut headers).unwrap();
        assert_eq!(headers.get("Content-Type"), Some(expected.as_str()));
    }

    #[test]
    fn test_empty_body_sends_nothing() {
        let mut headers = OrderedHeaderMap::new();
        assert!(encode_body(&RequestBody::Empty, &mut headers).unwrap().is_none());
        assert!(headers.is_empty());
    }

    #[test]
    fn test_explicit_type_with_text_body_is_unchanged() {
        let mut headers = headers_with_type("application/json");
        let encoded = encode_body(&RequestBody::from("[1,2]"), &mut headers)
            .unwrap()
            .unwrap();
        assert_eq!(encoded, Bytes::from_static(b"[1,2]"));
    }
}

//! Decoded response bodies.

use crate::http::config::ResponseType;
use crate::http::multipart::{boundary_from_content_type, parse_form_data};
use bytes::Bytes;
use http::HeaderMap;
use serde_json::Value;

/// A response body decoded per [`ResponseType`].
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
    Binary(Bytes),
    FormData(Vec<(String, String)>),
}

impl ResponseBody {
    /// Decode `raw`. Never fails: a body that does not match the requested
    /// type is returned as its raw text.
    pub fn decode(kind: ResponseType, headers: &HeaderMap, raw: Bytes) -> ResponseBody {
        match kind {
            ResponseType::Binary => ResponseBody::Binary(raw),
            ResponseType::Text => ResponseBody::Text(String::from_utf8_lossy(&raw).into_owned()),
            ResponseType::Json => match serde_json::from_slice::<Value>(&raw) {
                Ok(value) => ResponseBody::Json(value),
                Err(e) => {
                    tracing::debug!(error = %e, "response is not JSON, keeping raw text");
                    ResponseBody::Text(String::from_utf8_lossy(&raw).into_owned())
                }
            },
            ResponseType::FormData => match Self::form_fields(headers, &raw) {
                Some(fields) => ResponseBody::FormData(fields),
                None => ResponseBody::Text(String::from_utf8_lossy(&raw).into_owned()),
            },
        }
    }

    fn form_fields(headers: &HeaderMap, raw: &[u8]) -> Option<Vec<(String, String)>> {
        let content_type = headers.get(http::header::CONTENT_TYPE)?.to_str().ok()?;
        let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();
        match essence.as_str() {
            "application/x-www-form-urlencoded" => Some(
                url::form_urlencoded::parse(raw)
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect(),
            ),
            "multipart/form-data" => {
                let boundary = boundary_from_content_type(content_type)?;
                parse_form_data(boundary, raw).ok()
            }
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            ResponseBody::Binary(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_form(&self) -> Option<&[(String, String)]> {
        match self {
            ResponseBody::FormData(f) => Some(f),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{HeaderValue, CONTENT_TYPE};
    use serde_json::json;

    #[test]
    fn test_json() {
        let body = ResponseBody::decode(
            ResponseType::Json,
            &HeaderMap::new(),
            Bytes::from_static(br#"{"ok":true}"#),
        );
        assert_eq!(body.as_json(), Some(&json!({"ok": true})));
    }

    #[test]
    fn test_json_failure_degrades_to_text() {
        let body = ResponseBody::decode(
            ResponseType::Json,
            &HeaderMap::new(),
            Bytes::from_static(b"for (;;);{\"a\":1}"),
        );
        assert_eq!(body.as_text(), Some("for (;;);{\"a\":1}"));
    }

    #[test]
    fn test_binary() {
        let raw = Bytes::from_static(&[0xff, 0x00]);
        let body = ResponseBody::decode(ResponseType::Binary, &HeaderMap::new(), raw.clone());
        assert_eq!(body.as_bytes(), Some(&raw));
    }

    #[test]
    fn test_urlencoded_form_data() {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        let body = ResponseBody::decode(
            ResponseType::FormData,
            &headers,
            Bytes::from_static(b"a=1&b=x+y"),
        );
        assert_eq!(
            body.as_form(),
            Some(&[("a".to_string(), "1".to_string()), ("b".to_string(), "x y".to_string())][..])
        );
    }

    #[test]
    fn test_form_data_without_type_degrades_to_text() {
        let body = ResponseBody::decode(
            ResponseType::FormData,
            &HeaderMap::new(),
            Bytes::from_static(b"a=1"),
        );
        assert_eq!(body.as_text(), Some("a=1"));
    }
}

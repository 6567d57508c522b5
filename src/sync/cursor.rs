//! Sequence cursor resolution and maintenance.
//!
//! The bootstrap call is a GraphQL batch. Its body is a stream of JSON
//! values, optionally behind the `for (;;);` anti-hijacking prefix. The
//! last value summarises the batch (`successful_results`,
//! `error_results`); the first carries the query result.

use crate::http::{Fields, ResponseBody};
use crate::sync::error::SyncError;
use serde_json::{json, Value};

const ANTI_HIJACK_PREFIX: &str = "for (;;);";
const SEQUENCE_ID_POINTER: &str = "/o0/data/viewer/message_threads/sync_sequence_id";

/// Resumption state for the sync queue. `sync_token` is learned from the
/// broker; without one the next connection creates a fresh queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncCursor {
    pub last_seq_id: Option<String>,
    pub sync_token: Option<String>,
}

impl SyncCursor {
    /// Fold a pushed payload into the cursor. Returns whether anything
    /// changed.
    pub fn observe(&mut self, payload: &Value) -> bool {
        let mut changed = false;

        if let Some(token) = payload.get("syncToken").and_then(id_text) {
            changed |= self.sync_token.as_deref() != Some(token.as_str());
            self.sync_token = Some(token);
        }

        let seq = payload
            .get("lastIssuedSeqId")
            .and_then(id_text)
            .or_else(|| payload.get("firstDeltaSeqId").and_then(id_text));
        if let Some(seq) = seq {
            changed |= self.last_seq_id.as_deref() != Some(seq.as_str());
            self.last_seq_id = Some(seq);
        }

        changed
    }
}

/// Sequence ids arrive as strings or numbers.
fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Body of the bootstrap call.
pub fn bootstrap_body(doc_id: &str) -> Fields {
    let queries = json!({
        "o0": {
            "doc_id": doc_id,
            "query_params": {
                "limit": 1,
                "before": null,
                "tags": ["INBOX"],
                "includeDeliveryReceipts": false,
                "includeSeqID": true,
            }
        }
    });
    Fields::new().with("queries", queries.to_string())
}

/// Split a bootstrap body into its JSON values. `None` when the body is not
/// a response stream.
pub fn response_stream(body: &ResponseBody) -> Option<Vec<Value>> {
    match body {
        ResponseBody::Json(Value::Array(items)) if !items.is_empty() => Some(items.clone()),
        ResponseBody::Json(value @ Value::Object(_)) => Some(vec![value.clone()]),
        ResponseBody::Text(text) => parse_stream(text),
        _ => None,
    }
}

fn parse_stream(text: &str) -> Option<Vec<Value>> {
    let text = text.trim_start();
    let text = text.strip_prefix(ANTI_HIJACK_PREFIX).unwrap_or(text);

    let values = serde_json::Deserializer::from_str(text)
        .into_iter::<Value>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| tracing::debug!(error = %e, "bootstrap body is not a JSON stream"))
        .ok()?;
    (!values.is_empty()).then_some(values)
}

/// Classify a bootstrap response and pull out the sequence id.
pub fn resolve_sequence_id(body: &ResponseBody) -> Result<String, SyncError> {
    let stream = response_stream(body).ok_or(SyncError::SessionInvalid)?;
    let (first, summary) = match (stream.first(), stream.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(SyncError::SessionInvalid),
    };

    let successful = summary.get("successful_results").and_then(Value::as_u64);
    let errors = summary.get("error_results").and_then(Value::as_u64);
    if successful.is_none() && errors.is_none() {
        return Err(SyncError::SessionInvalid);
    }

    if errors.unwrap_or(0) > 0 {
        let detail = first.pointer("/o0/errors").cloned();
        let message = first
            .pointer("/o0/errors/0/message")
            .and_then(Value::as_str)
            .unwrap_or("query reported errors")
            .to_string();
        return Err(SyncError::CursorResolution { message, detail });
    }

    if successful == Some(0) {
        return Err(SyncError::CursorResolution {
            message: "there was no successful_results".to_string(),
            detail: None,
        });
    }

    first
        .pointer(SEQUENCE_ID_POINTER)
        .and_then(id_text)
        .ok_or(SyncError::CursorNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(body: &str) -> ResponseBody {
        ResponseBody::Text(body.to_string())
    }

    #[test]
    fn test_resolves_sequence_id() {
        let body = text(concat!(
            r#"{"o0":{"data":{"viewer":{"message_threads":{"sync_sequence_id":"4242"}}}}}"#,
            "\r\n",
            r#"{"successful_results":1,"error_results":0,"skipped_results":0}"#,
        ));
        assert_eq!(resolve_sequence_id(&body).unwrap(), "4242");
    }

    #[test]
    fn test_logged_out_page_is_session_invalid() {
        let body = text(r#"for (;;);{"__ar":1,"error":1357001,"errorSummary":"Not logged in"}"#);
        assert_eq!(resolve_sequence_id(&body), Err(SyncError::SessionInvalid));
        assert_eq!(
            resolve_sequence_id(&text("<html>login</html>")),
            Err(SyncError::SessionInvalid)
        );
        assert_eq!(resolve_sequence_id(&text("")), Err(SyncError::SessionInvalid));
    }

    #[test]
    fn test_zero_successful_results() {
        let body = text(r#"{"o0":{}}{"successful_results":0,"error_results":0}"#);
        match resolve_sequence_id(&body) {
            Err(SyncError::CursorResolution { message, .. }) => {
                assert_eq!(message, "there was no successful_results")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_error_results_carry_first_message() {
        let body = text(
            r#"{"o0":{"errors":[{"message":"rate limited"}]}}{"successful_results":0,"error_results":1}"#,
        );
        match resolve_sequence_id(&body) {
            Err(SyncError::CursorResolution { message, detail }) => {
                assert_eq!(message, "rate limited");
                assert_eq!(detail, Some(json!([{"message": "rate limited"}])));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_missing_sequence_id() {
        let body = text(
            r#"{"o0":{"data":{"viewer":{"message_threads":{}}}}}{"successful_results":1,"error_results":0}"#,
        );
        assert_eq!(resolve_sequence_id(&body), Err(SyncError::CursorNotFound));
    }

    #[test]
    fn test_json_array_body() {
        let body = ResponseBody::Json(json!([
            {"o0": {"data": {"viewer": {"message_threads": {"sync_sequence_id": 77}}}}},
            {"successful_results": 1, "error_results": 0}
        ]));
        assert_eq!(resolve_sequence_id(&body).unwrap(), "77");
    }

    #[test]
    fn test_bootstrap_body_queries_is_json_text() {
        let fields = bootstrap_body("3336396659757871");
        let queries = fields.get("queries").unwrap();
        let text = match queries {
            crate::http::Field::Value(Value::String(s)) => s.clone(),
            other => panic!("unexpected {:?}", other),
        };
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["o0"]["doc_id"], "3336396659757871");
        assert_eq!(parsed["o0"]["query_params"]["tags"], json!(["INBOX"]));
    }

    #[test]
    fn test_observe_updates_cursor() {
        let mut cursor = SyncCursor {
            last_seq_id: Some("10".into()),
            sync_token: None,
        };
        assert!(cursor.observe(&json!({"syncToken": "1", "firstDeltaSeqId": 11})));
        assert_eq!(cursor.sync_token.as_deref(), Some("1"));
        assert_eq!(cursor.last_seq_id.as_deref(), Some("11"));

        assert!(cursor.observe(&json!({"deltas": [], "firstDeltaSeqId": 11, "lastIssuedSeqId": 14})));
        assert_eq!(cursor.last_seq_id.as_deref(), Some("14"));

        assert!(!cursor.observe(&json!({"type": "typ"})));
    }
}

//! Control messages published after connecting.

use crate::sync::config::ListenerConfig;
use crate::sync::cursor::SyncCursor;
use crate::sync::topics::{CREATE_QUEUE, FOREGROUND_STATE, GET_DIFFS, SET_CLIENT_SETTINGS};
use serde_json::{json, Map, Value};

/// The "establish queue" message. Without a sync token a fresh queue is
/// created at the bootstrap cursor; with one, diffs are requested from the
/// last sequence id.
pub fn establish_queue(
    cursor: &SyncCursor,
    config: &ListenerConfig,
    user_id: &str,
) -> (&'static str, Value) {
    let mut queue = Map::new();
    queue.insert("sync_api_version".into(), json!(config.sync_api_version));
    queue.insert(
        "max_deltas_able_to_process".into(),
        json!(config.max_deltas_able_to_process),
    );
    queue.insert("delta_batch_size".into(), json!(config.delta_batch_size));
    queue.insert("encoding".into(), json!(config.encoding));
    queue.insert("entity_fbid".into(), json!(user_id));

    let topic = match &cursor.sync_token {
        Some(token) => {
            queue.insert("last_seq_id".into(), json!(cursor.last_seq_id));
            queue.insert("sync_token".into(), json!(token));
            GET_DIFFS
        }
        None => {
            queue.insert(
                "initial_titan_sequence_id".into(),
                json!(cursor.last_seq_id),
            );
            queue.insert("device_params".into(), Value::Null);
            CREATE_QUEUE
        }
    };

    (topic, Value::Object(queue))
}

/// Presence and availability messages sent after the queue message.
pub fn presence_messages() -> [(&'static str, Value); 2] {
    [
        (FOREGROUND_STATE, json!({"foreground": true})),
        (
            SET_CLIENT_SETTINGS,
            json!({"make_user_available_when_in_foreground": true}),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_queue_without_token() {
        let cursor = SyncCursor {
            last_seq_id: Some("4242".into()),
            sync_token: None,
        };
        let (topic, payload) = establish_queue(&cursor, &ListenerConfig::default(), "100");
        assert_eq!(topic, "/messenger_sync_create_queue");
        assert_eq!(
            payload,
            json!({
                "sync_api_version": 10,
                "max_deltas_able_to_process": 1000,
                "delta_batch_size": 500,
                "encoding": "JSON",
                "entity_fbid": "100",
                "initial_titan_sequence_id": "4242",
                "device_params": null,
            })
        );
    }

    #[test]
    fn test_get_diffs_with_token() {
        let cursor = SyncCursor {
            last_seq_id: Some("4300".into()),
            sync_token: Some("tok".into()),
        };
        let (topic, payload) = establish_queue(&cursor, &ListenerConfig::default(), "100");
        assert_eq!(topic, "/messenger_sync_get_diffs");
        assert_eq!(payload["last_seq_id"], "4300");
        assert_eq!(payload["sync_token"], "tok");
        assert!(payload.get("initial_titan_sequence_id").is_none());
        assert!(payload.get("device_params").is_none());
    }
}

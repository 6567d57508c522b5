//! Connection parameters for the chat endpoint.

use crate::base::neterror::NetError;
use crate::cookies::CookieStore;
use crate::sync::config::ListenerConfig;
use crate::sync::error::SyncError;
use serde_json::{json, Value};
use std::collections::HashSet;
use url::Url;
use uuid::Uuid;

/// 2^53 - 1, the largest id the broker round-trips exactly.
const MAX_SESSION_ID: u64 = (1 << 53) - 1;

/// Uniform in `1..=2^53-1`: mask to 53 bits and redraw on zero.
pub fn session_id() -> Result<u64, SyncError> {
    loop {
        let mut buf = [0u8; 8];
        boring::rand::rand_bytes(&mut buf)
            .map_err(|e| SyncError::connection(format!("random source failed: {}", e)))?;
        let id = u64::from_le_bytes(buf) & MAX_SESSION_ID;
        if id != 0 {
            return Ok(id);
        }
    }
}

/// Random (version 4) UUID, lowercase hyphenated.
pub fn device_id() -> String {
    Uuid::new_v4().to_string()
}

/// `endpoint?region=<lower>&sid=<id>`; `region` only when known.
pub fn endpoint_url(endpoint: &str, region: Option<&str>, sid: u64) -> Result<Url, NetError> {
    let mut url = Url::parse(endpoint).map_err(|_| NetError::InvalidUrl)?;
    {
        let mut query = url.query_pairs_mut();
        if let Some(region) = region {
            query.append_pair("region", &region.to_lowercase());
        }
        query.append_pair("sid", &sid.to_string());
    }
    Ok(url)
}

/// CONNECT username: a JSON blob describing the client.
pub fn username(config: &ListenerConfig, user_id: &str, sid: u64, device_id: &str) -> String {
    let blob: Value = json!({
        "u": user_id,
        "s": sid,
        "chat_on": true,
        "fg": false,
        "d": device_id,
        "ct": "websocket",
        "aid": config.app_id,
        "mqtt_sid": "",
        "cp": 3,
        "ecp": 10,
        "st": [],
        "pm": [],
        "dc": "",
        "no_auto_fg": true,
        "gas": null,
        "pack": [],
        "a": config.user_agent,
        "aids": null,
    });
    blob.to_string()
}

/// `Cookie` header across `origins`. The first origin wins a name clash.
pub fn cookie_header(jar: &CookieStore, origins: &[String]) -> Option<String> {
    let mut seen = HashSet::new();
    let pairs: Vec<String> = origins
        .iter()
        .filter_map(|origin| Url::parse(origin).ok())
        .flat_map(|url| jar.get(&url))
        .filter(|cookie| seen.insert(cookie.name.clone()))
        .map(|cookie| cookie.pair())
        .collect();
    (!pairs.is_empty()).then(|| pairs.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_range() {
        for _ in 0..64 {
            let id = session_id().unwrap();
            assert!((1..=MAX_SESSION_ID).contains(&id));
        }
    }

    #[test]
    fn test_device_id_format() {
        let id = device_id();
        let parsed = Uuid::parse_str(&id).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
        assert_eq!(id, id.to_lowercase());
        assert_ne!(id, device_id());
    }

    #[test]
    fn test_endpoint_url() {
        let url = endpoint_url("wss://edge-chat.messenger.com/chat", Some("PRN"), 42).unwrap();
        assert_eq!(url.as_str(), "wss://edge-chat.messenger.com/chat?region=prn&sid=42");

        let url = endpoint_url("wss://edge-chat.messenger.com/chat", None, 7).unwrap();
        assert_eq!(url.as_str(), "wss://edge-chat.messenger.com/chat?sid=7");
    }

    #[test]
    fn test_username_field_order() {
        let blob = username(&ListenerConfig::default(), "100", 5, "d-1");
        assert!(blob.starts_with(r#"{"u":"100","s":5,"chat_on":true,"fg":false,"d":"d-1","ct":"websocket""#));
        assert!(blob.ends_with(r#""aids":null}"#));
    }

    #[test]
    fn test_cookie_header_dedupes_by_name() {
        let jar = CookieStore::new();
        jar.set(["c_user=100", "xs=m"], &Url::parse("https://www.messenger.com/").unwrap());
        jar.set(["xs=f", "datr=d"], &Url::parse("https://www.facebook.com/").unwrap());

        let origins = ListenerConfig::default().cookie_origins;
        assert_eq!(
            cookie_header(&jar, &origins).as_deref(),
            Some("c_user=100; xs=m; datr=d")
        );
        assert_eq!(cookie_header(&CookieStore::new(), &origins), None);
    }
}

//! App-state persistence - save and load session cookies to/from disk.
//!
//! The file format is the JSON array produced by
//! [`SessionContext::app_state`](crate::session::SessionContext::app_state):
//! `[{"name", "value", "domain", "path", "expires": <epoch ms>|null}, ...]`.

use crate::cookies::canonicalcookie::CanonicalCookie;
use std::fs;
use std::io;
use std::path::Path;
use time::OffsetDateTime;

/// Write cookies as pretty-printed JSON.
///
/// # Example
/// ```ignore
/// persistence::save_app_state(Path::new("appstate.json"), &session.app_state())?;
/// ```
pub fn save_app_state(path: &Path, cookies: &[CanonicalCookie]) -> io::Result<()> {
    let json = serde_json::to_string_pretty(cookies)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    fs::write(path, json)
}

/// Read cookies back, skipping ones that already expired.
///
/// # Example
/// ```ignore
/// let jar = CookieStore::new();
/// jar.load_app_state(&persistence::load_app_state(Path::new("appstate.json"))?);
/// ```
pub fn load_app_state(path: &Path) -> io::Result<Vec<CanonicalCookie>> {
    let json = fs::read_to_string(path)?;
    let cookies: Vec<CanonicalCookie> =
        serde_json::from_str(&json).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let now = OffsetDateTime::now_utc();
    let total = cookies.len();
    let live: Vec<CanonicalCookie> = cookies.into_iter().filter(|c| !c.is_expired(now)).collect();

    tracing::debug!(
        path = %path.display(),
        loaded = live.len(),
        skipped = total - live.len(),
        "loaded app state"
    );
    Ok(live)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::store::CookieStore;
    use tempfile::tempdir;

    #[test]
    fn test_save_load_roundtrip() {
        let jar = CookieStore::new();
        let url = url::Url::parse("https://www.facebook.com/").unwrap();
        jar.set(["c_user=100; Path=/", "xs=secret"], &url);

        let dir = tempdir().unwrap();
        let path = dir.path().join("appstate.json");
        save_app_state(&path, &jar.get(&url)).unwrap();

        let restored = CookieStore::new();
        let count = restored.load_app_state(&load_app_state(&path).unwrap());
        assert_eq!(count, 2);

        let cookies = restored.get(&url);
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[0].name, "c_user");
        assert_eq!(cookies[0].value, "100");
        assert_eq!(cookies[0].domain, "facebook.com");
    }

    #[test]
    fn test_load_skips_expired() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("appstate.json");
        fs::write(
            &path,
            r#"[{"name":"old","value":"1","domain":"example.com","path":"/","expires":1000},
                {"name":"new","value":"2","domain":"example.com","path":"/","expires":null}]"#,
        )
        .unwrap();

        let cookies = load_app_state(&path).unwrap();
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].name, "new");
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("appstate.json");
        fs::write(&path, "not json").unwrap();

        let err = load_app_state(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}

//! Session Context Tests
//!
//! Covers:
//! - Session fields filling body and query gaps
//! - Multipart encoding of session posts
//! - Session cookies shared with the jar
//! - App-state persistence round trip

mod common;

use common::{body, header, response, spawn_server, target};
use std::sync::Arc;
use syncnet::cookies::persistence;
use syncnet::http::multipart::{boundary_from_content_type, parse_form_data};
use syncnet::http::{Fields, Part};
use syncnet::{Client, CookieStore, RequestConfig, SessionContext};
use url::Url;

fn pair(name: &str, value: &str) -> (String, String) {
    (name.to_string(), value.to_string())
}

#[tokio::test]
async fn test_post_merges_session_fields_caller_wins() {
    let (base, requests) = spawn_server(|_| response("200 OK", &[], r#"{"ok":1}"#)).await;

    let session = SessionContext::builder()
        .user_id("100")
        .param("fb_dtsg", "session-token")
        .param("av", "100")
        .build()
        .unwrap();

    let resp = session
        .post(
            &format!("{}/api/graphql/", base),
            RequestConfig::new()
                .header("Content-Type", "application/json")
                .body(Fields::new().with("av", "200").with("doc_id", "42")),
        )
        .await
        .unwrap();
    assert_eq!(resp.body().as_json().unwrap()["ok"], 1);

    let requests = requests.lock().unwrap();
    let req = &requests[0];
    assert!(req.starts_with("POST /api/graphql/?"));

    let path = target(req);
    let query: Vec<_> = Url::parse(&format!("http://x{}", path))
        .unwrap()
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    assert!(query.contains(&pair("fb_dtsg", "session-token")));
    assert!(query.contains(&pair("av", "100")));

    let content_type = header(req, "content-type").unwrap();
    assert!(content_type.starts_with("multipart/form-data; boundary="));
    let boundary = boundary_from_content_type(content_type).unwrap();
    let fields = parse_form_data(boundary, body(req).as_bytes()).unwrap();
    assert_eq!(
        fields,
        vec![
            pair("av", "200"),
            pair("doc_id", "42"),
            pair("fb_dtsg", "session-token"),
        ]
    );
}

#[tokio::test]
async fn test_post_carries_file_parts() {
    let (base, requests) = spawn_server(|_| response("200 OK", &[], "{}")).await;
    let session = SessionContext::builder()
        .user_id("100")
        .param("fb_dtsg", "t")
        .build()
        .unwrap();

    session
        .post(
            &base,
            RequestConfig::new().body(
                Fields::new().with("upload", Part::bytes(b"PNGDATA".as_slice()).file_name("a.png")),
            ),
        )
        .await
        .unwrap();

    let requests = requests.lock().unwrap();
    let raw = body(&requests[0]);
    assert!(raw.contains("filename=\"a.png\""));
    assert!(raw.contains("Content-Type: application/octet-stream"));
    assert!(raw.contains("PNGDATA"));
}

#[tokio::test]
async fn test_get_merges_query_only() {
    let (base, requests) = spawn_server(|_| response("200 OK", &[], "{}")).await;
    let session = SessionContext::builder()
        .user_id("100")
        .param("__a", "1")
        .build()
        .unwrap();

    session
        .get(&format!("{}/page", base), RequestConfig::new().query("__a", "2"))
        .await
        .unwrap();

    let requests = requests.lock().unwrap();
    assert!(requests[0].starts_with("GET /page?__a=2 HTTP/1.1"));
    assert_eq!(header(&requests[0], "content-type"), None);
}

#[tokio::test]
async fn test_session_requests_share_the_jar() {
    let (base, requests) = spawn_server(|req| match target(req) {
        "/set" => response("200 OK", &[("Set-Cookie", "xs=2; Max-Age=3600")], "{}"),
        _ => response("200 OK", &[], "{}"),
    })
    .await;

    let jar = Arc::new(CookieStore::new());
    let base_client = Client::new();
    let session = SessionContext::builder()
        .user_id("100")
        .jar(jar.clone())
        .client(base_client.clone())
        .build()
        .unwrap();

    session.get(&format!("{}/set", base), RequestConfig::new()).await.unwrap();
    session.get(&format!("{}/use", base), RequestConfig::new()).await.unwrap();
    // The base transport never saw the jar.
    base_client.get(&format!("{}/bare", base), RequestConfig::new()).await.unwrap();

    let requests = requests.lock().unwrap();
    assert_eq!(header(&requests[1], "cookie"), Some("xs=2"));
    assert_eq!(header(&requests[2], "cookie"), None);
    assert_eq!(jar.cookie_header(&Url::parse(&base).unwrap()).as_deref(), Some("xs=2"));
}

#[test]
fn test_app_state_survives_persistence() {
    let session = SessionContext::builder().user_id("100").build().unwrap();
    session
        .jar()
        .set(["c_user=100", "xs=abc; Max-Age=86400"], &Url::parse("https://www.facebook.com/").unwrap());
    session
        .jar()
        .set(["wd=1280x720"], &Url::parse("https://www.messenger.com/").unwrap());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("appstate.json");
    persistence::save_app_state(&path, &session.app_state()).unwrap();

    let restored = SessionContext::builder()
        .user_id("100")
        .app_state(persistence::load_app_state(&path).unwrap())
        .build()
        .unwrap();

    let header = restored
        .jar()
        .cookie_header(&Url::parse("https://www.facebook.com/").unwrap());
    assert_eq!(header.as_deref(), Some("c_user=100; xs=abc"));
    assert_eq!(restored.app_state().len(), 3);
}

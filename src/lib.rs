//! # syncnet
//!
//! Session transport and real-time sync client for a chat platform backend.
//!
//! `syncnet` carries an authenticated session: a cookie-jar-aware HTTP
//! client with layered request configuration, and a sync listener that
//! resolves a sequence cursor and then keeps an MQTT-over-WebSocket
//! connection open, forwarding pushed events.
//!
//! ## Features
//!
//! - **Cookie Management**: domain-indexed jar with expiry, app-state persistence
//! - **Layered Configuration**: client defaults overlaid per call, never mutated
//! - **Body Encoding**: JSON, URL-encoded and multipart chosen by `Content-Type`
//! - **Proxy Support**: HTTP CONNECT tunnels with basic auth, TLS via BoringSSL
//! - **Sync Protocol**: MQTT 3.1 over WebSocket with keep-alive and resumption
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use syncnet::session::SessionContext;
//! use syncnet::sync::{ListenerConfig, SyncEvent};
//!
//! #[tokio::main]
//! async fn main() {
//!     let session = SessionContext::builder()
//!         .user_id("100001234567890")
//!         .param("fb_dtsg", "token-from-login")
//!         .build()
//!         .unwrap();
//!
//!     let mut listener = session.listener(ListenerConfig::default());
//!     let mut events = listener.take_events().unwrap();
//!     listener.connect(None).await;
//!     while let Some(event) = events.recv().await {
//!         println!("{:?}", event);
//!     }
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error definitions
//! - [`cookies`] - Cookie storage and session persistence
//! - [`http`] - Request configuration, body encoding, HTTP/1.1 transactions
//! - [`client`] - The layered HTTP transport
//! - [`socket`] - Connect jobs, proxy tunnels and TLS sockets
//! - [`ws`] - WebSocket connections over the connect job
//! - [`mqtt`] - Broker packet codec and session driver
//! - [`session`] - Authenticated session context
//! - [`sync`] - The sync listener

pub mod base;
pub mod client;
pub mod cookies;
pub mod http;
pub mod mqtt;
pub mod session;
pub mod socket;
pub mod sync;
pub mod ws;

pub use base::neterror::NetError;
pub use client::Client;
pub use cookies::{CanonicalCookie, CookieStore};
pub use http::{RequestBody, RequestConfig, Response, ResponseBody};
pub use session::{SessionBuilder, SessionContext, SessionError};
pub use sync::{ListenerConfig, SyncError, SyncEvent, SyncListener};

//! WebSocket client support.
//!
//! tokio-tungstenite over the crate's own connect job, so WebSocket
//! connections get the same proxy tunnel and BoringSSL handshake as HTTP.
//!
//! # Example
//! ```ignore
//! use syncnet::ws::WebSocketBuilder;
//!
//! let ws = WebSocketBuilder::new()
//!     .url("wss://example.com/chat")?
//!     .header("Origin", "https://example.com")
//!     .connect()
//!     .await?;
//! ws.send_binary(vec![0xc0, 0x00]).await?;
//! ```

mod connection;

pub use connection::{WebSocket, WebSocketBuilder};

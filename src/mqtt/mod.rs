//! MQTT over WebSocket.
//!
//! - [`codec`]: packet encoding and decoding
//! - [`client`]: CONNECT handshake and the session driver task

pub mod client;
pub mod codec;

pub use client::{ConnectOptions, MqttClient, MqttError, MqttEvent, MqttHandle};
pub use codec::{CodecError, Packet, QoS};

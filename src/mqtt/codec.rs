//! MQTT 3.1 / 3.1.1 packet codec.
//!
//! Fixed header: `[type:4 | flags:4][remaining length: 1-4 byte varint]`,
//! then the variable header and payload. Only the packets a QoS 0/1 client
//! needs are modelled.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Largest value the remaining-length varint can carry.
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

/// MQTT 3.1 protocol name and level.
pub const PROTOCOL_MQISDP: (&str, u8) = ("MQIsdp", 3);
/// MQTT 3.1.1 protocol name and level.
pub const PROTOCOL_MQTT: (&str, u8) = ("MQTT", 4);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Invalid header flag bits, must be {expected:#x} for {packet} packet")]
    InvalidHeaderFlags {
        packet: &'static str,
        expected: u8,
        found: u8,
    },
    #[error("Invalid remaining length")]
    MalformedRemainingLength,
    #[error("Unknown packet type {0}")]
    UnknownPacketType(u8),
    #[error("Invalid QoS level {0}")]
    InvalidQos(u8),
    #[error("Unsupported protocol {name} level {level}")]
    UnsupportedProtocol { name: String, level: u8 },
    #[error("Truncated {0} packet")]
    Truncated(&'static str),
    #[error("Invalid UTF-8 string in {0} packet")]
    InvalidUtf8(&'static str),
    #[error("Field too long to encode: {0} bytes")]
    FieldTooLong(usize),
    #[error("Packet too large: {0} bytes")]
    PacketTooLarge(usize),
}

impl CodecError {
    /// Brokers in the wild set flag bits on PUBACK. The packet is consumed
    /// and the stream stays usable, so this one is safe to ignore.
    pub fn is_benign(&self) -> bool {
        matches!(self, CodecError::InvalidHeaderFlags { packet: "puback", .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum QoS {
    #[default]
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

impl TryFrom<u8> for QoS {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            other => Err(CodecError::InvalidQos(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connect {
    pub protocol_name: String,
    pub protocol_level: u8,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<Bytes>,
    pub keep_alive: u16,
    pub clean_session: bool,
}

impl Connect {
    /// An MQTT 3.1 (`MQIsdp`) CONNECT.
    pub fn new(client_id: impl Into<String>, keep_alive: u16) -> Self {
        Self {
            protocol_name: PROTOCOL_MQISDP.0.to_string(),
            protocol_level: PROTOCOL_MQISDP.1,
            client_id: client_id.into(),
            username: None,
            password: None,
            keep_alive,
            clean_session: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnAck {
    pub session_present: bool,
    /// 0 means accepted.
    pub return_code: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publish {
    pub dup: bool,
    pub qos: QoS,
    pub retain: bool,
    pub topic: String,
    /// Present iff `qos > AtMostOnce`.
    pub packet_id: Option<u16>,
    pub payload: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscribe {
    pub packet_id: u16,
    pub filters: Vec<(String, QoS)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubAck {
    pub packet_id: u16,
    pub return_codes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Connect(Connect),
    ConnAck(ConnAck),
    Publish(Publish),
    PubAck { packet_id: u16 },
    Subscribe(Subscribe),
    SubAck(SubAck),
    PingReq,
    PingResp,
    Disconnect,
}

const CONNECT: u8 = 1;
const CONNACK: u8 = 2;
const PUBLISH: u8 = 3;
const PUBACK: u8 = 4;
const SUBSCRIBE: u8 = 8;
const SUBACK: u8 = 9;
const PINGREQ: u8 = 12;
const PINGRESP: u8 = 13;
const DISCONNECT: u8 = 14;

impl Packet {
    pub fn name(&self) -> &'static str {
        match self {
            Packet::Connect(_) => "connect",
            Packet::ConnAck(_) => "connack",
            Packet::Publish(_) => "publish",
            Packet::PubAck { .. } => "puback",
            Packet::Subscribe(_) => "subscribe",
            Packet::SubAck(_) => "suback",
            Packet::PingReq => "pingreq",
            Packet::PingResp => "pingresp",
            Packet::Disconnect => "disconnect",
        }
    }

    /// Append the wire form of this packet to `out`.
    pub fn encode(&self, out: &mut BytesMut) -> Result<(), CodecError> {
        let mut body = BytesMut::new();
        let first = match self {
            Packet::Connect(c) => {
                put_string(&mut body, &c.protocol_name)?;
                body.put_u8(c.protocol_level);
                let mut flags = 0u8;
                if c.username.is_some() {
                    flags |= 0x80;
                }
                if c.password.is_some() {
                    flags |= 0x40;
                }
                if c.clean_session {
                    flags |= 0x02;
                }
                body.put_u8(flags);
                body.put_u16(c.keep_alive);
                put_string(&mut body, &c.client_id)?;
                if let Some(username) = &c.username {
                    put_string(&mut body, username)?;
                }
                if let Some(password) = &c.password {
                    put_binary(&mut body, password)?;
                }
                CONNECT << 4
            }
            Packet::ConnAck(ack) => {
                body.put_u8(u8::from(ack.session_present));
                body.put_u8(ack.return_code);
                CONNACK << 4
            }
            Packet::Publish(p) => {
                put_string(&mut body, &p.topic)?;
                match (p.qos, p.packet_id) {
                    (QoS::AtMostOnce, _) => {}
                    (_, Some(id)) => body.put_u16(id),
                    (_, None) => return Err(CodecError::Truncated("publish")),
                }
                body.extend_from_slice(&p.payload);
                (PUBLISH << 4)
                    | (u8::from(p.dup) << 3)
                    | ((p.qos as u8) << 1)
                    | u8::from(p.retain)
            }
            Packet::PubAck { packet_id } => {
                body.put_u16(*packet_id);
                PUBACK << 4
            }
            Packet::Subscribe(s) => {
                body.put_u16(s.packet_id);
                for (filter, qos) in &s.filters {
                    put_string(&mut body, filter)?;
                    body.put_u8(*qos as u8);
                }
                (SUBSCRIBE << 4) | 0x02
            }
            Packet::SubAck(s) => {
                body.put_u16(s.packet_id);
                body.extend_from_slice(&s.return_codes);
                SUBACK << 4
            }
            Packet::PingReq => PINGREQ << 4,
            Packet::PingResp => PINGRESP << 4,
            Packet::Disconnect => DISCONNECT << 4,
        };

        out.put_u8(first);
        put_remaining_length(out, body.len())?;
        out.extend_from_slice(&body);
        Ok(())
    }

    /// Decode one packet from the front of `buf`.
    ///
    /// Returns `Ok(None)` until a whole packet is buffered. A complete packet
    /// is always consumed, even when it then fails validation, so a caller
    /// may skip a bad packet and keep decoding.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Packet>, CodecError> {
        let Some(&first) = buf.first() else {
            return Ok(None);
        };

        let mut remaining = 0usize;
        let mut header_len = 1;
        let mut multiplier = 1usize;
        loop {
            let Some(&byte) = buf.get(header_len) else {
                return Ok(None);
            };
            header_len += 1;
            remaining += usize::from(byte & 0x7f) * multiplier;
            if byte & 0x80 == 0 {
                break;
            }
            if header_len > 4 {
                return Err(CodecError::MalformedRemainingLength);
            }
            multiplier *= 128;
        }

        if buf.len() < header_len + remaining {
            return Ok(None);
        }

        buf.advance(header_len);
        let body = buf.split_to(remaining).freeze();
        Self::decode_body(first >> 4, first & 0x0f, body).map(Some)
    }

    fn decode_body(kind: u8, flags: u8, mut body: Bytes) -> Result<Packet, CodecError> {
        let expect_flags = |packet: &'static str, expected: u8| {
            if flags == expected {
                Ok(())
            } else {
                Err(CodecError::InvalidHeaderFlags {
                    packet,
                    expected,
                    found: flags,
                })
            }
        };

        match kind {
            CONNECT => {
                expect_flags("connect", 0)?;
                let protocol_name = get_string(&mut body, "connect")?;
                let protocol_level = get_u8(&mut body, "connect")?;
                if (protocol_name.as_str(), protocol_level) != PROTOCOL_MQISDP
                    && (protocol_name.as_str(), protocol_level) != PROTOCOL_MQTT
                {
                    return Err(CodecError::UnsupportedProtocol {
                        name: protocol_name,
                        level: protocol_level,
                    });
                }
                let connect_flags = get_u8(&mut body, "connect")?;
                let keep_alive = get_u16(&mut body, "connect")?;
                let client_id = get_string(&mut body, "connect")?;
                if connect_flags & 0x04 != 0 {
                    // Will topic and message are read and dropped.
                    get_string(&mut body, "connect")?;
                    get_binary(&mut body, "connect")?;
                }
                let username = if connect_flags & 0x80 != 0 {
                    Some(get_string(&mut body, "connect")?)
                } else {
                    None
                };
                let password = if connect_flags & 0x40 != 0 {
                    Some(get_binary(&mut body, "connect")?)
                } else {
                    None
                };
                Ok(Packet::Connect(Connect {
                    protocol_name,
                    protocol_level,
                    client_id,
                    username,
                    password,
                    keep_alive,
                    clean_session: connect_flags & 0x02 != 0,
                }))
            }
            CONNACK => {
                expect_flags("connack", 0)?;
                let ack_flags = get_u8(&mut body, "connack")?;
                let return_code = get_u8(&mut body, "connack")?;
                Ok(Packet::ConnAck(ConnAck {
                    session_present: ack_flags & 0x01 != 0,
                    return_code,
                }))
            }
            PUBLISH => {
                let qos = QoS::try_from((flags >> 1) & 0x03)?;
                let topic = get_string(&mut body, "publish")?;
                let packet_id = match qos {
                    QoS::AtMostOnce => None,
                    _ => Some(get_u16(&mut body, "publish")?),
                };
                Ok(Packet::Publish(Publish {
                    dup: flags & 0x08 != 0,
                    qos,
                    retain: flags & 0x01 != 0,
                    topic,
                    packet_id,
                    payload: body,
                }))
            }
            PUBACK => {
                expect_flags("puback", 0)?;
                Ok(Packet::PubAck {
                    packet_id: get_u16(&mut body, "puback")?,
                })
            }
            SUBSCRIBE => {
                expect_flags("subscribe", 0x02)?;
                let packet_id = get_u16(&mut body, "subscribe")?;
                let mut filters = Vec::new();
                while body.has_remaining() {
                    let filter = get_string(&mut body, "subscribe")?;
                    let qos = QoS::try_from(get_u8(&mut body, "subscribe")?)?;
                    filters.push((filter, qos));
                }
                Ok(Packet::Subscribe(Subscribe { packet_id, filters }))
            }
            SUBACK => {
                expect_flags("suback", 0)?;
                let packet_id = get_u16(&mut body, "suback")?;
                Ok(Packet::SubAck(SubAck {
                    packet_id,
                    return_codes: body.to_vec(),
                }))
            }
            PINGREQ => expect_flags("pingreq", 0).map(|_| Packet::PingReq),
            PINGRESP => expect_flags("pingresp", 0).map(|_| Packet::PingResp),
            DISCONNECT => expect_flags("disconnect", 0).map(|_| Packet::Disconnect),
            other => Err(CodecError::UnknownPacketType(other)),
        }
    }
}

fn put_remaining_length(out: &mut BytesMut, mut len: usize) -> Result<(), CodecError> {
    if len > MAX_REMAINING_LENGTH {
        return Err(CodecError::PacketTooLarge(len));
    }
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        out.put_u8(byte);
        if len == 0 {
            return Ok(());
        }
    }
}

fn put_binary(out: &mut BytesMut, data: &[u8]) -> Result<(), CodecError> {
    let len = u16::try_from(data.len()).map_err(|_| CodecError::FieldTooLong(data.len()))?;
    out.put_u16(len);
    out.extend_from_slice(data);
    Ok(())
}

fn put_string(out: &mut BytesMut, s: &str) -> Result<(), CodecError> {
    put_binary(out, s.as_bytes())
}

fn get_u8(buf: &mut Bytes, packet: &'static str) -> Result<u8, CodecError> {
    if buf.remaining() < 1 {
        return Err(CodecError::Truncated(packet));
    }
    Ok(buf.get_u8())
}

fn get_u16(buf: &mut Bytes, packet: &'static str) -> Result<u16, CodecError> {
    if buf.remaining() < 2 {
        return Err(CodecError::Truncated(packet));
    }
    Ok(buf.get_u16())
}

fn get_binary(buf: &mut Bytes, packet: &'static str) -> Result<Bytes, CodecError> {
    let len = usize::from(get_u16(buf, packet)?);
    if buf.remaining() < len {
        return Err(CodecError::Truncated(packet));
    }
    Ok(buf.split_to(len))
}

fn get_string(buf: &mut Bytes, packet: &'static str) -> Result<String, CodecError> {
    let raw = get_binary(buf, packet)?;
    String::from_utf8(raw.to_vec()).map_err(|_| CodecError::InvalidUtf8(packet))
}

//! MQTT client session over a WebSocket.
//!
//! [`MqttClient::connect`] performs the CONNECT/CONNACK exchange and then
//! hands the socket to a spawned driver task. The task owns all protocol
//! state: packet ids, acks and the keep-alive timer. Callers talk to it
//! through an [`MqttHandle`] and receive [`MqttEvent`]s on a channel.

use crate::base::neterror::NetError;
use crate::mqtt::codec::{CodecError, ConnAck, Connect, Packet, Publish, QoS, Subscribe};
use crate::ws::WebSocket;
use bytes::{Bytes, BytesMut};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

const CONNACK_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MqttError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Transport(#[from] NetError),
    #[error("Connection refused by broker, return code {0}")]
    Refused(u8),
    #[error("No CONNACK received")]
    ConnAckTimeout,
    #[error("Keepalive timeout")]
    PingTimeout,
    #[error("Connection closed by broker")]
    Closed,
}

impl MqttError {
    pub fn is_benign(&self) -> bool {
        matches!(self, MqttError::Codec(e) if e.is_benign())
    }
}

/// Options for the CONNECT packet.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub client_id: String,
    pub username: Option<String>,
    pub keep_alive: Duration,
    pub clean_session: bool,
}

impl ConnectOptions {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            username: None,
            keep_alive: Duration::from_secs(60),
            clean_session: true,
        }
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    fn to_packet(&self) -> Packet {
        let secs = u16::try_from(self.keep_alive.as_secs()).unwrap_or(u16::MAX);
        let mut connect = Connect::new(self.client_id.clone(), secs);
        connect.username = self.username.clone();
        connect.clean_session = self.clean_session;
        Packet::Connect(connect)
    }
}

/// What the driver reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MqttEvent {
    Message { topic: String, payload: Bytes },
    /// A benign error leaves the session running; any other error is the
    /// last event of the session.
    Error(MqttError),
}

#[derive(Debug)]
enum Command {
    Subscribe { topic: String, qos: QoS },
    Publish { topic: String, payload: Bytes, qos: QoS },
    Disconnect,
}

/// Handle to a running session. Dropping it ends the session.
#[derive(Debug)]
pub struct MqttHandle {
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl MqttHandle {
    pub fn subscribe(&self, topic: impl Into<String>, qos: QoS) -> Result<(), MqttError> {
        self.send(Command::Subscribe {
            topic: topic.into(),
            qos,
        })
    }

    pub fn publish(
        &self,
        topic: impl Into<String>,
        payload: impl Into<Bytes>,
        qos: QoS,
    ) -> Result<(), MqttError> {
        self.send(Command::Publish {
            topic: topic.into(),
            payload: payload.into(),
            qos,
        })
    }

    /// Send DISCONNECT and close the socket, then wait for the driver to
    /// finish.
    pub async fn disconnect(self) {
        let _ = self.commands.send(Command::Disconnect);
        if let Err(e) = self.task.await {
            tracing::debug!(error = %e, "MQTT driver task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    fn send(&self, command: Command) -> Result<(), MqttError> {
        self.commands.send(command).map_err(|_| MqttError::Closed)
    }
}

pub struct MqttClient;

impl MqttClient {
    /// Run the CONNECT handshake on `ws` and start the session driver.
    pub async fn connect(
        ws: WebSocket,
        options: ConnectOptions,
    ) -> Result<(MqttHandle, mpsc::UnboundedReceiver<MqttEvent>), MqttError> {
        write_packet(&ws, &options.to_packet()).await?;

        let mut buf = BytesMut::new();
        let ack = tokio::time::timeout(CONNACK_TIMEOUT, read_connack(&ws, &mut buf))
            .await
            .map_err(|_| MqttError::ConnAckTimeout)??;

        if ack.return_code != 0 {
            tracing::warn!(code = ack.return_code, "broker refused connection");
            return Err(MqttError::Refused(ack.return_code));
        }
        tracing::debug!(url = %ws.url(), "MQTT session established");

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let driver = Driver {
            ws,
            buf,
            events: event_tx,
            next_packet_id: 0,
            ping: keep_alive_timer(options.keep_alive),
            awaiting_pingresp: false,
        };
        let task = tokio::spawn(driver.run(command_rx));

        Ok((
            MqttHandle {
                commands: command_tx,
                task,
            },
            event_rx,
        ))
    }
}

fn keep_alive_timer(period: Duration) -> Option<Interval> {
    if period.is_zero() {
        return None;
    }
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(interval)
}

/// Bytes following the CONNACK stay in `buf` for the driver.
async fn read_connack(ws: &WebSocket, buf: &mut BytesMut) -> Result<ConnAck, MqttError> {
    loop {
        while let Some(packet) = Packet::decode(buf)? {
            if let Packet::ConnAck(ack) = packet {
                return Ok(ack);
            }
            tracing::debug!(packet = packet.name(), "ignoring packet before CONNACK");
        }
        match ws.recv().await? {
            Some(frame) => buf.extend_from_slice(&frame),
            None => return Err(MqttError::Closed),
        }
    }
}

async fn write_packet(ws: &WebSocket, packet: &Packet) -> Result<(), MqttError> {
    let mut buf = BytesMut::new();
    packet.encode(&mut buf)?;
    ws.send_binary(buf.freeze()).await?;
    Ok(())
}

struct Driver {
    ws: WebSocket,
    buf: BytesMut,
    events: mpsc::UnboundedSender<MqttEvent>,
    next_packet_id: u16,
    ping: Option<Interval>,
    awaiting_pingresp: bool,
}

impl Driver {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        if let Err(e) = self.drive(&mut commands).await {
            tracing::debug!(error = %e, "MQTT session ended with error");
            let _ = self.events.send(MqttEvent::Error(e));
        }
        self.ws.close().await;
    }

    async fn drive(
        &mut self,
        commands: &mut mpsc::UnboundedReceiver<Command>,
    ) -> Result<(), MqttError> {
        // Frames may have arrived together with the CONNACK.
        self.process_inbound().await?;

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Subscribe { topic, qos }) => {
                        let packet_id = self.packet_id();
                        self.write(&Packet::Subscribe(Subscribe {
                            packet_id,
                            filters: vec![(topic, qos)],
                        }))
                        .await?;
                    }
                    Some(Command::Publish { topic, payload, qos }) => {
                        let packet_id = (qos > QoS::AtMostOnce).then(|| self.packet_id());
                        self.write(&Packet::Publish(Publish {
                            dup: false,
                            qos,
                            retain: false,
                            topic,
                            packet_id,
                            payload,
                        }))
                        .await?;
                    }
                    Some(Command::Disconnect) | None => {
                        if let Err(e) = self.write(&Packet::Disconnect).await {
                            tracing::debug!(error = %e, "DISCONNECT not sent");
                        }
                        return Ok(());
                    }
                },
                frame = self.ws.recv() => match frame? {
                    Some(bytes) => {
                        self.buf.extend_from_slice(&bytes);
                        self.process_inbound().await?;
                    }
                    None => return Err(MqttError::Closed),
                },
                _ = tick(&mut self.ping) => {
                    if self.awaiting_pingresp {
                        tracing::warn!("no PINGRESP before next keepalive tick");
                        return Err(MqttError::PingTimeout);
                    }
                    tracing::trace!("sending PINGREQ");
                    self.write(&Packet::PingReq).await?;
                    self.awaiting_pingresp = true;
                }
            }
        }
    }

    async fn process_inbound(&mut self) -> Result<(), MqttError> {
        loop {
            match Packet::decode(&mut self.buf) {
                Ok(Some(packet)) => self.handle(packet).await?,
                Ok(None) => return Ok(()),
                Err(e) if e.is_benign() => {
                    let _ = self.events.send(MqttEvent::Error(MqttError::Codec(e)));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn handle(&mut self, packet: Packet) -> Result<(), MqttError> {
        match packet {
            Packet::Publish(publish) => {
                if let (QoS::AtLeastOnce, Some(packet_id)) = (publish.qos, publish.packet_id) {
                    self.write(&Packet::PubAck { packet_id }).await?;
                }
                let _ = self.events.send(MqttEvent::Message {
                    topic: publish.topic,
                    payload: publish.payload,
                });
            }
            Packet::PingResp => self.awaiting_pingresp = false,
            Packet::PubAck { packet_id } => tracing::trace!(packet_id, "PUBACK"),
            Packet::SubAck(ack) => tracing::trace!(packet_id = ack.packet_id, "SUBACK"),
            other => tracing::debug!(packet = other.name(), "unexpected packet from broker"),
        }
        Ok(())
    }

    /// Every outbound packet pushes the next PINGREQ back a full period.
    async fn write(&mut self, packet: &Packet) -> Result<(), MqttError> {
        write_packet(&self.ws, packet).await?;
        if let Some(ping) = self.ping.as_mut() {
            ping.reset();
        }
        Ok(())
    }

    /// Non-zero, wrapping.
    fn packet_id(&mut self) -> u16 {
        self.next_packet_id = self.next_packet_id.wrapping_add(1);
        if self.next_packet_id == 0 {
            self.next_packet_id = 1;
        }
        self.next_packet_id
    }
}

async fn tick(ping: &mut Option<Interval>) {
    match ping {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_options_packet() {
        let packet = ConnectOptions::new("mqttwsclient")
            .username("{\"u\":\"1\"}")
            .keep_alive(Duration::from_secs(10))
            .to_packet();
        match packet {
            Packet::Connect(c) => {
                assert_eq!(c.protocol_name, "MQIsdp");
                assert_eq!(c.protocol_level, 3);
                assert_eq!(c.keep_alive, 10);
                assert!(c.clean_session);
                assert_eq!(c.username.as_deref(), Some("{\"u\":\"1\"}"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_benign_classification() {
        let benign = MqttError::Codec(CodecError::InvalidHeaderFlags {
            packet: "puback",
            expected: 0,
            found: 2,
        });
        assert!(benign.is_benign());
        assert!(!MqttError::PingTimeout.is_benign());
        assert!(!MqttError::Transport(NetError::ConnectionClosed).is_benign());
    }
}

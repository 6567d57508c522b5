//! The sync listener state machine.
//!
//! `connect` resolves the sequence cursor with one bootstrap call through
//! the session, opens the MQTT-over-WebSocket connection, subscribes to
//! every topic and publishes the queue message. From then on a spawned
//! pump task forwards broker messages to the consumer until the connection
//! fails or the listener disconnects.
//!
//! Errors never escape the listener. They are reported to the consumer as
//! [`SyncEvent::Error`].

use crate::http::{RequestConfig, ResponseType};
use crate::mqtt::{ConnectOptions, MqttClient, MqttError, MqttEvent, MqttHandle, QoS};
use crate::session::SessionContext;
use crate::sync::config::ListenerConfig;
use crate::sync::cursor::{bootstrap_body, resolve_sequence_id, SyncCursor};
use crate::sync::error::SyncError;
use crate::sync::event::{ListenerState, SyncEvent, SyncMessage};
use crate::sync::handshake;
use crate::sync::queue::{establish_queue, presence_messages};
use crate::sync::topics::TOPICS;
use crate::ws::WebSocketBuilder;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

pub type EventSender = mpsc::UnboundedSender<SyncEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<SyncEvent>;

struct Connection {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Real-time sync client bound to a [`SessionContext`].
///
/// # Example
///
/// ```rust,ignore
/// let mut listener = session.listener(ListenerConfig::default());
/// let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
/// listener.connect(Some(tx)).await;
/// while let Some(event) = rx.recv().await {
///     match event {
///         SyncEvent::Message(msg) => println!("{} {}", msg.topic, msg.payload),
///         SyncEvent::Error(e) => {
///             eprintln!("{}", e);
///             listener.reconnect().await;
///         }
///         SyncEvent::Disconnected => break,
///     }
/// }
/// ```
pub struct SyncListener<'a> {
    session: &'a SessionContext,
    config: ListenerConfig,
    state: Arc<watch::Sender<ListenerState>>,
    cursor: Arc<watch::Sender<SyncCursor>>,
    consumer: EventSender,
    default_events: Option<EventReceiver>,
    connection: Option<Connection>,
}

impl<'a> SyncListener<'a> {
    pub fn new(session: &'a SessionContext, config: ListenerConfig) -> Self {
        let (consumer, default_events) = mpsc::unbounded_channel();
        Self {
            session,
            config,
            state: Arc::new(watch::channel(ListenerState::Idle).0),
            cursor: Arc::new(watch::channel(SyncCursor::default()).0),
            consumer,
            default_events: Some(default_events),
            connection: None,
        }
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    pub fn state(&self) -> ListenerState {
        *self.state.borrow()
    }

    /// Watch state transitions, including the ones the connection task
    /// makes on its own.
    pub fn watch_state(&self) -> watch::Receiver<ListenerState> {
        self.state.subscribe()
    }

    pub fn cursor(&self) -> SyncCursor {
        self.cursor.borrow().clone()
    }

    /// Whether a live connection is held. A connection whose pump ended on
    /// its own (broker loss, keep-alive timeout) is released here.
    pub fn is_open(&mut self) -> bool {
        self.release_finished();
        self.connection.is_some()
    }

    /// Receiver of the built-in channel, used until a consumer is passed to
    /// [`connect`](Self::connect). Only the first call returns it.
    pub fn take_events(&mut self) -> Option<EventReceiver> {
        self.default_events.take()
    }

    /// Resolve the cursor and open the connection. Does nothing while
    /// connected or connecting.
    ///
    /// `consumer` replaces the registered consumer; `None` keeps it.
    pub async fn connect(&mut self, consumer: Option<EventSender>) {
        self.release_finished();
        if self.state().is_active() {
            tracing::debug!(state = ?self.state(), "connect ignored: listener already active");
            return;
        }
        if let Some(consumer) = consumer {
            self.consumer = consumer;
        }
        self.establish().await;
    }

    /// Close the connection if one is open. The consumer always receives
    /// [`SyncEvent::Disconnected`].
    pub async fn disconnect(&mut self) {
        self.teardown().await;
        if self.state() != ListenerState::Idle {
            self.set_state(ListenerState::Disconnected);
        }
        self.emit(SyncEvent::Disconnected);
    }

    /// Close any open connection and connect again with the registered
    /// consumer. The sequence id is resolved afresh; a learned sync token
    /// is kept so the broker is asked for diffs.
    pub async fn reconnect(&mut self) {
        self.teardown().await;
        tracing::info!("sync listener reconnecting");
        self.establish().await;
    }

    async fn establish(&mut self) {
        self.set_state(ListenerState::ResolvingCursor);
        if let Err(e) = self.try_establish().await {
            tracing::warn!(error = %e, "sync listener failed to connect");
            self.set_state(ListenerState::Disconnected);
            self.emit(SyncEvent::Error(e));
        }
    }

    async fn try_establish(&mut self) -> Result<(), SyncError> {
        let seq_id = self.resolve_cursor().await?;
        tracing::debug!(seq_id = %seq_id, "sync cursor resolved");
        self.cursor
            .send_modify(|cursor| cursor.last_seq_id = Some(seq_id));

        let connection = self.open().await?;
        self.connection = Some(connection);
        Ok(())
    }

    async fn resolve_cursor(&self) -> Result<String, SyncError> {
        let config = RequestConfig::new()
            .body(bootstrap_body(&self.config.bootstrap_doc_id))
            .response_type(ResponseType::Text);
        let response = self
            .session
            .post(&self.config.bootstrap_url, config)
            .await?;
        resolve_sequence_id(response.body())
    }

    async fn open(&self) -> Result<Connection, SyncError> {
        let sid = handshake::session_id()?;
        let device_id = handshake::device_id();
        let url = handshake::endpoint_url(&self.config.endpoint, self.session.region(), sid)?;
        let host = url.host_str().unwrap_or_default().to_string();

        let mut builder = WebSocketBuilder::new()
            .url(url.as_str())?
            .header("Origin", &self.config.origin)
            .header("User-Agent", &self.config.user_agent)
            .header("Referer", &self.config.referer)
            .header("Host", &host)
            .proxy(self.session.proxy().cloned());
        if let Some(cookie) =
            handshake::cookie_header(self.session.jar(), &self.config.cookie_origins)
        {
            builder = builder.header("Cookie", &cookie);
        }
        let ws = builder.connect().await?;

        let options = ConnectOptions::new(self.config.client_id.clone())
            .username(handshake::username(
                &self.config,
                self.session.user_id(),
                sid,
                &device_id,
            ))
            .keep_alive(self.config.keep_alive);
        let (mqtt, events) = MqttClient::connect(ws, options).await?;

        for topic in TOPICS {
            mqtt.subscribe(topic, QoS::AtLeastOnce)?;
        }
        let (topic, queue) = establish_queue(&self.cursor(), &self.config, self.session.user_id());
        tracing::debug!(topic, "publishing queue request");
        mqtt.publish(topic, queue.to_string(), QoS::AtLeastOnce)?;
        for (topic, payload) in presence_messages() {
            mqtt.publish(topic, payload.to_string(), QoS::AtLeastOnce)?;
        }

        self.set_state(ListenerState::Connected);
        tracing::info!(url = %url, "sync listener connected");

        let (shutdown, shutdown_rx) = oneshot::channel();
        let pump = Pump {
            consumer: self.consumer.clone(),
            state: self.state.clone(),
            cursor: self.cursor.clone(),
        };
        let task = tokio::spawn(pump.run(mqtt, events, shutdown_rx));
        Ok(Connection { shutdown, task })
    }

    fn release_finished(&mut self) {
        if self
            .connection
            .as_ref()
            .is_some_and(|connection| connection.task.is_finished())
        {
            self.connection = None;
            tracing::debug!("released finished sync connection");
        }
    }

    /// Stop the pump task, which ends the MQTT session. Safe to call with
    /// nothing open.
    async fn teardown(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };
        let _ = connection.shutdown.send(());
        if let Err(e) = connection.task.await {
            tracing::debug!(error = %e, "sync pump ended abnormally");
        }
        tracing::debug!("sync connection torn down");
    }

    fn set_state(&self, next: ListenerState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            tracing::debug!(from = ?prev, to = ?next, "listener state");
        }
    }

    fn emit(&self, event: SyncEvent) {
        if self.consumer.send(event).is_err() {
            tracing::debug!("sync event dropped: consumer gone");
        }
    }
}

impl Drop for SyncListener<'_> {
    fn drop(&mut self) {
        // Aborting the pump drops the MQTT handle, which closes the session.
        if let Some(connection) = self.connection.take() {
            connection.task.abort();
        }
    }
}

impl std::fmt::Debug for SyncListener<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncListener")
            .field("user_id", &self.session.user_id())
            .field("state", &self.state())
            .field("cursor", &self.cursor())
            .finish()
    }
}

/// Forwards broker events to the consumer for one connection.
struct Pump {
    consumer: EventSender,
    state: Arc<watch::Sender<ListenerState>>,
    cursor: Arc<watch::Sender<SyncCursor>>,
}

impl Pump {
    async fn run(
        self,
        mqtt: MqttHandle,
        mut events: mpsc::UnboundedReceiver<MqttEvent>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        let failure = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    mqtt.disconnect().await;
                    return;
                }
                event = events.recv() => match event {
                    Some(MqttEvent::Message { topic, payload }) => self.dispatch(topic, &payload),
                    Some(MqttEvent::Error(e)) if e.is_benign() => {
                        tracing::debug!(error = %e, "suppressed benign framing error");
                    }
                    Some(MqttEvent::Error(e)) => break e,
                    None => break MqttError::Closed,
                },
            }
        };

        tracing::warn!(error = %failure, "sync connection lost");
        mqtt.disconnect().await;
        self.state.send_replace(ListenerState::Disconnected);
        let _ = self
            .consumer
            .send(SyncEvent::Error(SyncError::connection(failure.to_string())));
    }

    fn dispatch(&self, topic: String, payload: &[u8]) {
        match serde_json::from_slice::<Value>(payload) {
            Ok(payload) => {
                if self.cursor.send_if_modified(|cursor| cursor.observe(&payload)) {
                    tracing::trace!(topic = %topic, "sync cursor advanced");
                }
                let _ = self
                    .consumer
                    .send(SyncEvent::Message(SyncMessage { topic, payload }));
            }
            Err(e) => {
                tracing::warn!(topic = %topic, error = %e, "undecodable sync frame");
                let _ = self.consumer.send(SyncEvent::Error(SyncError::MalformedFrame {
                    topic,
                    message: e.to_string(),
                }));
            }
        }
    }
}

use crate::sync::error::SyncError;
use serde_json::Value;

/// A decoded message pushed by the broker.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncMessage {
    pub topic: String,
    pub payload: Value,
}

/// What a listener reports to its consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Message(SyncMessage),
    /// Acknowledges [`SyncListener::disconnect`](super::SyncListener::disconnect).
    Disconnected,
    Error(SyncError),
}

/// Listener lifecycle.
///
/// `Idle` is initial. `Connected` and `ResolvingCursor` fall back to
/// `Disconnected` on a fatal error or an explicit disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListenerState {
    #[default]
    Idle,
    ResolvingCursor,
    Connected,
    Disconnected,
}

impl ListenerState {
    /// Connected, or on its way there.
    pub fn is_active(self) -> bool {
        matches!(self, ListenerState::ResolvingCursor | ListenerState::Connected)
    }
}

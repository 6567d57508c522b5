use crate::base::neterror::NetError;
use crate::mqtt::MqttError;
use serde_json::Value;
use thiserror::Error;

/// Errors reported to a listener's consumer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SyncError {
    /// The bootstrap response was not a response stream at all, which is
    /// what an expired login gets back.
    #[error("Session expired or invalid authentication. Please log in again.")]
    SessionInvalid,

    /// The bootstrap query ran but reported errors or no results.
    #[error("Failed to resolve sync cursor: {message}")]
    CursorResolution {
        message: String,
        detail: Option<Value>,
    },

    #[error("Can not find sequence id in bootstrap response")]
    CursorNotFound,

    /// The persistent connection failed.
    #[error("Sync connection error: {message}")]
    Connection { message: String },

    /// A pushed frame did not decode as JSON. The connection stays up.
    #[error("Malformed frame on {topic}: {message}")]
    MalformedFrame { topic: String, message: String },

    #[error(transparent)]
    Transport(#[from] NetError),
}

/// Coarse classification of a [`SyncError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncErrorKind {
    SessionInvalid,
    CursorResolution,
    CursorNotFound,
    Connection,
    MalformedFrame,
    Timeout,
    Transport,
}

impl SyncError {
    pub fn kind(&self) -> SyncErrorKind {
        match self {
            SyncError::SessionInvalid => SyncErrorKind::SessionInvalid,
            SyncError::CursorResolution { .. } => SyncErrorKind::CursorResolution,
            SyncError::CursorNotFound => SyncErrorKind::CursorNotFound,
            SyncError::Connection { .. } => SyncErrorKind::Connection,
            SyncError::MalformedFrame { .. } => SyncErrorKind::MalformedFrame,
            SyncError::Transport(e) if e.is_timeout() => SyncErrorKind::Timeout,
            SyncError::Transport(_) => SyncErrorKind::Transport,
        }
    }

    pub(crate) fn connection(message: impl Into<String>) -> Self {
        SyncError::Connection {
            message: message.into(),
        }
    }
}

impl From<MqttError> for SyncError {
    fn from(e: MqttError) -> Self {
        match e {
            MqttError::Transport(net) => SyncError::Transport(net),
            other => SyncError::connection(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind() {
        assert_eq!(SyncError::SessionInvalid.kind(), SyncErrorKind::SessionInvalid);
        assert_eq!(
            SyncError::Transport(NetError::TimedOut { timeout_ms: 5 }).kind(),
            SyncErrorKind::Timeout
        );
        assert_eq!(
            SyncError::Transport(NetError::ConnectionRefused).kind(),
            SyncErrorKind::Transport
        );
        assert_eq!(
            SyncError::connection("gone").to_string(),
            "Sync connection error: gone"
        );
    }
}

//! Real-time sync client.
//!
//! - [`listener`]: the [`SyncListener`] state machine and its pump task
//! - [`cursor`]: bootstrap classification and [`SyncCursor`] upkeep
//! - [`queue`], [`topics`], [`handshake`]: what goes over the wire
//! - [`error`], [`event`]: what the consumer receives

pub mod config;
pub mod cursor;
pub mod error;
pub mod event;
pub mod handshake;
pub mod listener;
pub mod queue;
pub mod topics;

pub use config::ListenerConfig;
pub use cursor::SyncCursor;
pub use error::{SyncError, SyncErrorKind};
pub use event::{ListenerState, SyncEvent, SyncMessage};
pub use listener::{EventReceiver, EventSender, SyncListener};

//! Authenticated session state.
//!
//! A [`SessionContext`] is produced once per login and owns the cookie jar
//! that every request made through it reads and updates.

mod context;

pub use context::{SessionBuilder, SessionContext, SessionError, APP_STATE_ORIGINS};

//! Base types and error handling.
//!
//! - [`NetError`](neterror::NetError): transport error codes, Chromium numbering
//! - [`IoResultExt`](context::IoResultExt): IO error context helpers

pub mod context;
pub mod neterror;

//! Typed convenience API for the school dashboard event kinds.
//!
//! The client core treats payloads as opaque JSON. This layer gives each
//! event kind a typed payload and a sender on
//! [`crate::RealtimeClient`], plus [`crate::RealtimeClient::on_typed`] for
//! typed subscriptions.

pub mod payloads;
pub mod senders;

pub use payloads::*;
pub use senders::{build, decode};

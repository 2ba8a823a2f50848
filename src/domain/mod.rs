//! Domain layer: message envelope, connection state and state bus.
//!
//! These types are shared by the transport, the connection manager and the
//! typed convenience API. None of them perform I/O.

pub mod connection_state;
pub mod message;
pub mod state_bus;

pub use connection_state::{ConnectionState, ConnectionStats, StateChange};
pub use message::{EventKind, Message};
pub use state_bus::StateBus;

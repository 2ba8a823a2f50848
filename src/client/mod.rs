//! Client core: connection manager, message router and correlator.
//!
//! Inbound frames flow transport → [`RealtimeClient`] driver task →
//! [`MessageRouter`] → event listeners, catch-all listeners and the
//! [`Correlator`]'s one-shot listeners. Outbound messages go straight from
//! [`RealtimeClient::send`] to the open transport.

pub mod correlator;
pub mod manager;
pub mod router;

pub use correlator::Correlator;
pub use manager::RealtimeClient;
pub use router::{CATCH_ALL, ListenerId, ListenerResult, MessageRouter, Subscription};

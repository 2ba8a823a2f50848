//! Transport abstraction: a message-oriented duplex channel.
//!
//! A [`Connector`] opens a [`Transport`] for an endpoint URL and reports its
//! lifecycle through an unbounded channel of [`TransportEvent`]s. The
//! connection manager only talks to these two traits, so the live socket
//! ([`live::WsConnector`]) and the in-process mock ([`mock::MockConnector`])
//! are interchangeable.
//!
//! Every transport emits at most one `Open` and exactly one `Close`, after
//! which it emits nothing else.

pub mod live;
pub mod mock;

use std::fmt;

use tokio::sync::mpsc;

use crate::error::TransportError;

pub use live::WsConnector;
pub use mock::MockConnector;

/// Lifecycle and data events reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The channel is open; sends are now delivered to the peer.
    Open,
    /// A text frame arrived from the peer.
    Message(String),
    /// A transport-level failure. Always followed by `Close`.
    Error(String),
    /// The channel closed. Terminal.
    Close {
        /// WebSocket close code, if the peer sent one.
        code: Option<u16>,
        /// Human-readable close reason.
        reason: String,
    },
}

/// Sending half handed to a [`Connector`] for reporting events.
pub type EventSender = mpsc::UnboundedSender<TransportEvent>;

/// An open (or opening) duplex channel.
pub trait Transport: Send + Sync + fmt::Debug {
    /// Queues a text frame for delivery.
    ///
    /// Frames sent before `Open` are held and delivered in order once the
    /// channel opens. Frames are delivered in send order.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] once the transport has closed.
    fn send(&self, frame: String) -> Result<(), TransportError>;

    /// Closes the channel. Idempotent. A final `Close` event follows.
    fn close(&self);
}

/// Factory for transports. Must be called from within a tokio runtime.
pub trait Connector: Send + Sync + fmt::Debug + 'static {
    /// Starts opening a transport to `url`; progress is reported on `events`.
    fn open(&self, url: &str, events: EventSender) -> Box<dyn Transport>;
}

//! Connection lifecycle state and statistics.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lifecycle state of a [`crate::RealtimeClient`].
///
/// ```text
/// Disconnected ─connect()─► Connecting ─open─► Connected
///                             ▲  │  │                │ unexpected close
///             backoff elapsed │  │  │ close          ▼
///                             └──┼──┴────────► Reconnecting
///                                │                   │ attempts exhausted
///                                │ close, attempts   ▼
///                                └─ exhausted ───► Failed
/// ```
///
/// The counter is checked when a close arrives. A close of the last
/// automatic attempt therefore goes `Connecting → Failed` directly; with
/// `reconnect_attempts = 0` an unexpected close goes
/// `Connected → Failed`.
///
/// `disconnect()` returns every state to `Disconnected`.
///
/// `Failed` is terminal until a manual `connect()` or `reconnect()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No transport is open.
    Disconnected,
    /// A transport is opening.
    Connecting,
    /// The transport is open.
    Connected,
    /// Waiting for the backoff interval before the next automatic attempt.
    Reconnecting,
    /// Automatic reconnection gave up.
    Failed,
}

impl ConnectionState {
    /// Returns `true` when messages can be sent.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns the lowercase name of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single state transition, as published on the [`super::StateBus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateChange {
    /// State before the transition.
    pub from: ConnectionState,
    /// State after the transition.
    pub to: ConnectionState,
}

/// Snapshot of connection statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStats {
    /// Whether the transport is currently open.
    pub connected: bool,
    /// Inbound messages routed over the lifetime of the client.
    pub message_count: u64,
    /// Receive time of the most recent inbound message.
    pub last_message_at: Option<DateTime<Utc>>,
    /// Automatic reconnect attempts since the last successful open.
    pub reconnect_count: u32,
}

//! Wire envelope exchanged over the realtime channel.
//!
//! Every frame is a JSON object with a `type` tag, an opaque `payload`, a
//! sender-side `timestamp` and optional correlation and routing hints:
//!
//! ```json
//! {
//!   "type": "chat_message",
//!   "payload": { "content": "hello" },
//!   "timestamp": "2024-03-01T08:30:00Z",
//!   "id": "1709281800000-4f0c…",
//!   "senderId": "u1",
//!   "receiverId": "u2",
//!   "roomId": "room1"
//! }
//! ```

use std::borrow::Cow;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RealtimeError;

/// Open set of message kinds.
///
/// The router keys its listener table by this tag and never matches on it,
/// so collaborators may introduce new kinds with [`EventKind::new`] without
/// touching the routing code. The associated constants are the kinds the
/// school dashboards exchange today.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventKind(Cow<'static, str>);

impl EventKind {
    /// A student's attendance was marked or corrected.
    pub const ATTENDANCE_UPDATE: Self = Self::from_static("attendance_update");
    /// A grade was published or changed.
    pub const GRADE_UPDATE: Self = Self::from_static("grade_update");
    /// An assignment was created, updated or submitted.
    pub const ASSIGNMENT_UPDATE: Self = Self::from_static("assignment_update");
    /// A fee record changed (payment, new invoice, due-date change).
    pub const FEE_UPDATE: Self = Self::from_static("fee_update");
    /// A calendar event changed.
    pub const EVENT_UPDATE: Self = Self::from_static("event_update");
    /// A notice-board entry changed.
    pub const NOTICE_UPDATE: Self = Self::from_static("notice_update");
    /// A chat message between users.
    pub const CHAT_MESSAGE: Self = Self::from_static("chat_message");
    /// A user started or stopped typing.
    pub const TYPING_INDICATOR: Self = Self::from_static("typing_indicator");
    /// A user-facing notification.
    pub const NOTIFICATION: Self = Self::from_static("notification");
    /// A user's presence changed.
    pub const USER_STATUS_CHANGE: Self = Self::from_static("user_status_change");
    /// Connection established announcement.
    pub const CONNECTION: Self = Self::from_static("connection");
    /// Connection closed announcement.
    pub const DISCONNECTION: Self = Self::from_static("disconnection");
    /// Error report from the peer.
    pub const ERROR: Self = Self::from_static("error");
    /// Keep-alive frame sent by the heartbeat.
    pub const PING: Self = Self::from_static("ping");

    /// Creates a kind from an arbitrary tag.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(Cow::Owned(tag.into()))
    }

    /// Creates a kind from a static tag without allocating.
    #[must_use]
    pub const fn from_static(tag: &'static str) -> Self {
        Self(Cow::Borrowed(tag))
    }

    /// Returns the wire tag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventKind {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

impl From<String> for EventKind {
    fn from(tag: String) -> Self {
        Self::new(tag)
    }
}

impl AsRef<str> for EventKind {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// A single message on the realtime channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message kind; selects the listeners that receive `payload`.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Kind-specific payload. Never inspected by the client core.
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Creation time set by the sender. Diagnostics only.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// Correlation id; present when the sender expects a matched response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Originating user, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    /// Addressed user, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<String>,
    /// Chat room scope, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
}

impl Message {
    /// Creates a fire-and-forget message stamped with the current time.
    #[must_use]
    pub fn new(kind: impl Into<EventKind>, payload: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
            timestamp: Utc::now(),
            id: None,
            sender_id: None,
            receiver_id: None,
            room_id: None,
        }
    }

    /// Creates the keep-alive frame sent by the heartbeat.
    #[must_use]
    pub fn heartbeat() -> Self {
        Self::new(EventKind::PING, serde_json::json!({}))
    }

    /// Sets the correlation id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the sender routing hint.
    #[must_use]
    pub fn with_sender(mut self, sender_id: impl Into<String>) -> Self {
        self.sender_id = Some(sender_id.into());
        self
    }

    /// Sets the receiver routing hint.
    #[must_use]
    pub fn with_receiver(mut self, receiver_id: impl Into<String>) -> Self {
        self.receiver_id = Some(receiver_id.into());
        self
    }

    /// Sets the room routing hint.
    #[must_use]
    pub fn with_room(mut self, room_id: impl Into<String>) -> Self {
        self.room_id = Some(room_id.into());
        self
    }

    /// Serializes the message into a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::Serialization`] if the payload cannot be
    /// represented as JSON.
    pub fn to_frame(&self) -> Result<String, RealtimeError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::Decode`] if the frame is not a JSON object
    /// with at least a string `type` field.
    pub fn from_frame(frame: &str) -> Result<Self, RealtimeError> {
        serde_json::from_str(frame).map_err(|e| RealtimeError::Decode(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_camel_case_and_skips_absent_hints() {
        let msg = Message::new(EventKind::CHAT_MESSAGE, json!({"content": "hi"}))
            .with_sender("u1")
            .with_room("room1");
        let Ok(value) = serde_json::to_value(&msg) else {
            panic!("message should serialize");
        };
        assert_eq!(value["type"], "chat_message");
        assert_eq!(value["senderId"], "u1");
        assert_eq!(value["roomId"], "room1");
        assert!(value.get("receiverId").is_none());
        assert!(value.get("id").is_none());
    }

    #[test]
    fn decodes_minimal_frame() {
        let Ok(msg) = Message::from_frame(r#"{"type":"notification"}"#) else {
            panic!("minimal frame should decode");
        };
        assert_eq!(msg.kind, EventKind::NOTIFICATION);
        assert!(msg.payload.is_null());
        assert!(msg.id.is_none());
    }

    #[test]
    fn unknown_kinds_and_fields_are_accepted() {
        let frame = r#"{"type":"library_update","payload":{"book":1},"extra":true}"#;
        let Ok(msg) = Message::from_frame(frame) else {
            panic!("frame should decode");
        };
        assert_eq!(msg.kind.as_str(), "library_update");
        assert_eq!(msg.kind, EventKind::new("library_update"));
    }

    #[test]
    fn rejects_frames_without_type() {
        let result = Message::from_frame(r#"{"payload":{}}"#);
        assert!(matches!(result, Err(RealtimeError::Decode(_))));
        assert!(Message::from_frame("not json").is_err());
    }

    #[test]
    fn frame_preserves_correlation_id() {
        let msg = Message::new("grade_update", json!({"grade": "A"})).with_id("42-abc");
        let Ok(frame) = msg.to_frame() else {
            panic!("frame should serialize");
        };
        let Ok(back) = Message::from_frame(&frame) else {
            panic!("frame should decode");
        };
        assert_eq!(back.id.as_deref(), Some("42-abc"));
        assert_eq!(back.timestamp, msg.timestamp);
    }
}

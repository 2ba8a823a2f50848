//! Typed senders and subscriptions on [`RealtimeClient`].
//!
//! Each sender builds the matching [`Message`] and hands it to
//! [`RealtimeClient::send`], so it shares the queue-and-return-false
//! discipline.

use chrono::NaiveDate;
use serde::de::DeserializeOwned;

use super::payloads::{
    AssignmentAction, AssignmentUpdate, AttendanceStatus, AttendanceUpdate, ChangeAction,
    ChatMessage, EventUpdate, FeeStatus, FeeUpdate, GradeUpdate, NoticeUpdate, Notification,
    PresenceStatus, Severity, TypedPayload, TypingIndicator, UserStatusChange,
};
use crate::client::{ListenerResult, RealtimeClient, Subscription};
use crate::domain::Message;
use crate::error::RealtimeError;

/// Builds a message of `P::KIND` carrying `payload`.
///
/// # Errors
///
/// Returns [`RealtimeError::Serialization`] if the payload cannot be
/// encoded as JSON.
pub fn build<P: TypedPayload>(payload: &P) -> Result<Message, RealtimeError> {
    Ok(Message::new(P::KIND, serde_json::to_value(payload)?))
}

/// Decodes a message payload into `P`.
///
/// # Errors
///
/// Returns [`RealtimeError::Decode`] if the payload does not have the
/// shape of `P`.
pub fn decode<P: DeserializeOwned>(payload: &serde_json::Value) -> Result<P, RealtimeError> {
    P::deserialize(payload).map_err(|e| RealtimeError::Decode(e.to_string()))
}

impl RealtimeClient {
    /// Builds and sends a typed payload. Returns `false` if the message was
    /// queued or could not be built.
    pub fn send_typed<P: TypedPayload>(&self, payload: &P) -> bool {
        self.send_typed_message(build(payload))
    }

    /// Subscribes to `P::KIND` with a listener receiving decoded payloads.
    ///
    /// Payloads that do not decode are reported as listener failures.
    pub fn on_typed<P, F>(&self, listener: F) -> Subscription
    where
        P: TypedPayload + DeserializeOwned,
        F: Fn(P) -> ListenerResult + Send + Sync + 'static,
    {
        self.on(P::KIND.as_str(), move |payload| listener(decode(payload)?))
    }

    /// Publishes an attendance mark.
    pub fn send_attendance_update(
        &self,
        student_id: impl Into<String>,
        status: AttendanceStatus,
        date: NaiveDate,
        marked_by: impl Into<String>,
    ) -> bool {
        self.send_typed(&AttendanceUpdate {
            student_id: student_id.into(),
            status,
            date,
            marked_by: marked_by.into(),
        })
    }

    /// Publishes a grade change.
    pub fn send_grade_update(
        &self,
        student_id: impl Into<String>,
        subject: impl Into<String>,
        grade: impl Into<String>,
        term: Option<String>,
        updated_by: impl Into<String>,
    ) -> bool {
        self.send_typed(&GradeUpdate {
            student_id: student_id.into(),
            subject: subject.into(),
            grade: grade.into(),
            term,
            updated_by: updated_by.into(),
        })
    }

    /// Publishes an assignment change.
    pub fn send_assignment_update(
        &self,
        assignment_id: impl Into<String>,
        action: AssignmentAction,
        class_id: Option<String>,
        title: Option<String>,
    ) -> bool {
        self.send_typed(&AssignmentUpdate {
            assignment_id: assignment_id.into(),
            action,
            class_id,
            title,
        })
    }

    /// Publishes a fee record change.
    pub fn send_fee_update(
        &self,
        fee_id: impl Into<String>,
        student_id: impl Into<String>,
        amount: f64,
        status: FeeStatus,
    ) -> bool {
        self.send_typed(&FeeUpdate {
            fee_id: fee_id.into(),
            student_id: student_id.into(),
            amount,
            status,
        })
    }

    /// Publishes a calendar event change.
    pub fn send_event_update(
        &self,
        event_id: impl Into<String>,
        action: ChangeAction,
        title: Option<String>,
    ) -> bool {
        self.send_typed(&EventUpdate {
            event_id: event_id.into(),
            action,
            title,
        })
    }

    /// Publishes a notice-board change.
    pub fn send_notice_update(
        &self,
        notice_id: impl Into<String>,
        action: ChangeAction,
        title: Option<String>,
    ) -> bool {
        self.send_typed(&NoticeUpdate {
            notice_id: notice_id.into(),
            action,
            title,
        })
    }

    /// Sends a chat message. The envelope also carries the sender, receiver
    /// and room routing hints.
    pub fn send_chat_message(
        &self,
        sender_id: impl Into<String>,
        receiver_id: impl Into<String>,
        content: impl Into<String>,
        room_id: Option<String>,
    ) -> bool {
        let payload = ChatMessage {
            sender_id: sender_id.into(),
            receiver_id: receiver_id.into(),
            content: content.into(),
            room_id,
        };
        let message = build(&payload).map(|m| {
            let m = m
                .with_sender(payload.sender_id.as_str())
                .with_receiver(payload.receiver_id.as_str());
            match &payload.room_id {
                Some(room) => m.with_room(room.as_str()),
                None => m,
            }
        });
        self.send_typed_message(message)
    }

    /// Announces that `user_id` started or stopped typing.
    pub fn send_typing_indicator(
        &self,
        user_id: impl Into<String>,
        room_id: Option<String>,
        is_typing: bool,
    ) -> bool {
        let payload = TypingIndicator {
            user_id: user_id.into(),
            room_id,
            is_typing,
        };
        let message = build(&payload).map(|m| {
            let m = m.with_sender(payload.user_id.as_str());
            match &payload.room_id {
                Some(room) => m.with_room(room.as_str()),
                None => m,
            }
        });
        self.send_typed_message(message)
    }

    /// Sends a user-facing notification; `user_id = None` targets everyone.
    pub fn send_notification(
        &self,
        title: impl Into<String>,
        message: impl Into<String>,
        severity: Severity,
        user_id: Option<String>,
    ) -> bool {
        self.send_typed(&Notification {
            title: title.into(),
            message: message.into(),
            severity,
            user_id,
        })
    }

    /// Publishes a presence change.
    pub fn send_user_status_change(
        &self,
        user_id: impl Into<String>,
        status: PresenceStatus,
    ) -> bool {
        self.send_typed(&UserStatusChange {
            user_id: user_id.into(),
            status,
        })
    }

    fn send_typed_message(&self, message: Result<Message, RealtimeError>) -> bool {
        match message {
            Ok(message) => self.send(message),
            Err(e) => {
                tracing::warn!(error = %e, "could not build typed message");
                false
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::EventKind;
    use serde_json::json;

    #[test]
    fn build_uses_payload_kind() {
        let payload = UserStatusChange {
            user_id: "u1".to_string(),
            status: PresenceStatus::Online,
        };
        let Ok(message) = build(&payload) else {
            panic!("payload should encode");
        };
        assert_eq!(message.kind, EventKind::USER_STATUS_CHANGE);
        assert_eq!(message.payload, json!({"userId": "u1", "status": "online"}));
        assert!(message.id.is_none());
    }

    #[test]
    fn decode_reports_shape_mismatch() {
        let result: Result<ChatMessage, _> = decode(&json!({"content": 3}));
        assert!(matches!(result, Err(RealtimeError::Decode(_))));
    }
}

//! Payload shapes for the school dashboard events.
//!
//! Field names are camelCase on the wire. Decoding is lenient about extra
//! fields, so echoed payloads (which carry `received: true`) still decode.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::EventKind;

/// A payload struct bound to its message kind.
pub trait TypedPayload: Serialize {
    /// Kind used for messages carrying this payload.
    const KIND: EventKind;
}

/// Attendance mark for one student on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    /// Attended.
    Present,
    /// Did not attend.
    Absent,
    /// Arrived late.
    Late,
    /// Absence excused.
    Excused,
}

/// Payment state of a fee record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeStatus {
    /// Fully paid.
    Paid,
    /// Not yet due or not yet paid.
    Pending,
    /// Past its due date.
    Overdue,
    /// Partially paid.
    Partial,
}

/// What happened to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    /// Newly created.
    Created,
    /// Modified.
    Updated,
    /// Removed.
    Deleted,
}

/// What happened to an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentAction {
    /// Assignment published.
    Created,
    /// Assignment details changed.
    Updated,
    /// A student submitted work.
    Submitted,
    /// Submitted work was graded.
    Graded,
    /// Assignment withdrawn.
    Deleted,
}

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational.
    Info,
    /// Operation succeeded.
    Success,
    /// Needs attention.
    Warning,
    /// Operation failed.
    Error,
}

/// User presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    /// Active.
    Online,
    /// Not connected.
    Offline,
    /// Connected but idle.
    Away,
    /// Do not disturb.
    Busy,
}

/// `attendance_update` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceUpdate {
    /// Student whose attendance changed.
    pub student_id: String,
    /// New mark.
    pub status: AttendanceStatus,
    /// School day the mark applies to.
    pub date: NaiveDate,
    /// Teacher or admin who marked it.
    pub marked_by: String,
}

impl TypedPayload for AttendanceUpdate {
    const KIND: EventKind = EventKind::ATTENDANCE_UPDATE;
}

/// `grade_update` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeUpdate {
    /// Student whose grade changed.
    pub student_id: String,
    /// Subject name or code.
    pub subject: String,
    /// Grade as displayed (letter or score).
    pub grade: String,
    /// Exam or term label, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
    /// Teacher who entered the grade.
    pub updated_by: String,
}

impl TypedPayload for GradeUpdate {
    const KIND: EventKind = EventKind::GRADE_UPDATE;
}

/// `assignment_update` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentUpdate {
    /// Assignment identifier.
    pub assignment_id: String,
    /// What happened.
    pub action: AssignmentAction,
    /// Class the assignment belongs to, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_id: Option<String>,
    /// Assignment title, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl TypedPayload for AssignmentUpdate {
    const KIND: EventKind = EventKind::ASSIGNMENT_UPDATE;
}

/// `fee_update` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeUpdate {
    /// Fee record identifier.
    pub fee_id: String,
    /// Student the fee belongs to.
    pub student_id: String,
    /// Amount in the school's currency.
    pub amount: f64,
    /// Payment state.
    pub status: FeeStatus,
}

impl TypedPayload for FeeUpdate {
    const KIND: EventKind = EventKind::FEE_UPDATE;
}

/// `event_update` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventUpdate {
    /// Calendar event identifier.
    pub event_id: String,
    /// What happened.
    pub action: ChangeAction,
    /// Event title, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl TypedPayload for EventUpdate {
    const KIND: EventKind = EventKind::EVENT_UPDATE;
}

/// `notice_update` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoticeUpdate {
    /// Notice identifier.
    pub notice_id: String,
    /// What happened.
    pub action: ChangeAction,
    /// Notice title, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl TypedPayload for NoticeUpdate {
    const KIND: EventKind = EventKind::NOTICE_UPDATE;
}

/// `chat_message` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Author.
    pub sender_id: String,
    /// Recipient.
    pub receiver_id: String,
    /// Message text.
    pub content: String,
    /// Room scope, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
}

impl TypedPayload for ChatMessage {
    const KIND: EventKind = EventKind::CHAT_MESSAGE;
}

/// `typing_indicator` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingIndicator {
    /// User who is typing.
    pub user_id: String,
    /// Room scope, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    /// `true` when typing started, `false` when it stopped.
    pub is_typing: bool,
}

impl TypedPayload for TypingIndicator {
    const KIND: EventKind = EventKind::TYPING_INDICATOR;
}

/// `notification` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Short headline.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Display severity.
    pub severity: Severity,
    /// Target user; `None` broadcasts to everyone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl TypedPayload for Notification {
    const KIND: EventKind = EventKind::NOTIFICATION;
}

/// `user_status_change` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatusChange {
    /// User whose presence changed.
    pub user_id: String,
    /// New presence.
    pub status: PresenceStatus,
}

impl TypedPayload for UserStatusChange {
    const KIND: EventKind = EventKind::USER_STATUS_CHANGE;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn attendance_serializes_iso_date_and_camel_case() {
        let payload = AttendanceUpdate {
            student_id: "s1".to_string(),
            status: AttendanceStatus::Late,
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap_or_default(),
            marked_by: "t1".to_string(),
        };
        let value = serde_json::to_value(&payload).unwrap_or_default();
        assert_eq!(
            value,
            json!({"studentId": "s1", "status": "late", "date": "2024-03-01", "markedBy": "t1"})
        );
    }

    #[test]
    fn echoed_payload_with_extra_fields_decodes() {
        let echoed = json!({
            "received": true,
            "userId": "u1",
            "status": "away"
        });
        let decoded: Result<UserStatusChange, _> = serde_json::from_value(echoed);
        assert_eq!(
            decoded.ok(),
            Some(UserStatusChange {
                user_id: "u1".to_string(),
                status: PresenceStatus::Away,
            })
        );
    }

    #[test]
    fn optional_fields_are_omitted() {
        let payload = Notification {
            title: "t".to_string(),
            message: "m".to_string(),
            severity: Severity::Warning,
            user_id: None,
        };
        let value = serde_json::to_value(&payload).unwrap_or_default();
        assert!(value.get("userId").is_none());
        assert_eq!(value["severity"], "warning");
    }
}

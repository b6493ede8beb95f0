//! Wire events exchanged over the gateway socket.
//!
//! Every frame is a JSON text message `{"event": "<name>", "data": <payload>}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::answer::SubmittedAnswer;
use super::notification::{Notification, SystemAnnouncement};
use super::user::{PublicUser, UserRole};

/// Client → gateway
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinQuiz(String),
    LeaveQuiz(String),
    /// Free-form activity; a frame without `data` still counts
    UserActivity(Option<Value>),
    QuizProgress(QuizProgressPayload),
    SaveAnswer(SaveAnswerPayload),
    TypingNotification(TypingPayload),
    /// Any payload is accepted and ignored
    Heartbeat(Option<Value>),
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinQuiz(_) => "join_quiz",
            ClientEvent::LeaveQuiz(_) => "leave_quiz",
            ClientEvent::UserActivity(_) => "user_activity",
            ClientEvent::QuizProgress(_) => "quiz_progress",
            ClientEvent::SaveAnswer(_) => "save_answer",
            ClientEvent::TypingNotification(_) => "typing_notification",
            ClientEvent::Heartbeat(_) => "heartbeat",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizProgressPayload {
    pub quiz_id: String,
    #[serde(default)]
    pub progress: Value,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveAnswerPayload {
    pub attempt_id: String,
    pub question_id: String,
    #[serde(default)]
    pub answer: SubmittedAnswer,
    /// Seconds spent since the previous autosave of this question
    #[serde(default)]
    pub time_spent: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub is_typing: bool,
}

/// Gateway → client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    OnlineUsers(Vec<PublicUser>),
    UserOnline(PublicUser),
    UserOffline(UserOffline),
    AnswerSaved(AnswerSaved),
    StudentProgress(StudentProgress),
    UserActivityUpdate(UserActivityUpdate),
    UserTyping(UserTyping),
    HeartbeatAck(HeartbeatAck),
    NewNotification(Notification),
    SystemAnnouncement(SystemAnnouncement),
    DashboardUpdate(Value),
    QuizStarted(QuizLifecycle),
    QuizEnded(QuizLifecycle),
    QuizUpdated(QuizLifecycle),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::OnlineUsers(_) => "online_users",
            ServerEvent::UserOnline(_) => "user_online",
            ServerEvent::UserOffline(_) => "user_offline",
            ServerEvent::AnswerSaved(_) => "answer_saved",
            ServerEvent::StudentProgress(_) => "student_progress",
            ServerEvent::UserActivityUpdate(_) => "user_activity_update",
            ServerEvent::UserTyping(_) => "user_typing",
            ServerEvent::HeartbeatAck(_) => "heartbeat_ack",
            ServerEvent::NewNotification(_) => "new_notification",
            ServerEvent::SystemAnnouncement(_) => "system_announcement",
            ServerEvent::DashboardUpdate(_) => "dashboard_update",
            ServerEvent::QuizStarted(_) => "quiz_started",
            ServerEvent::QuizEnded(_) => "quiz_ended",
            ServerEvent::QuizUpdated(_) => "quiz_updated",
        }
    }

    pub fn to_frame(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserOffline {
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSaved {
    pub attempt_id: String,
    pub question_id: String,
    pub is_correct: bool,
    pub points: f64,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudentProgress {
    pub student_id: String,
    pub quiz_id: String,
    #[serde(flatten)]
    pub detail: ProgressDetail,
}

/// Either a graded autosave or the client's self-reported progress blob.
/// Never carries the submitted answer itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ProgressDetail {
    #[serde(rename_all = "camelCase")]
    Answered { question_id: String, is_correct: bool },
    Reported { progress: Value },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserActivityUpdate {
    pub user_id: String,
    pub name: String,
    pub role: UserRole,
    pub activity: Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserTyping {
    pub user_id: String,
    pub name: String,
    pub is_typing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeartbeatAck {
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuizLifecycle {
    pub quiz_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

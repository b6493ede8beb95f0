//! Server-originated pushes. Other backend services (notifications, quiz
//! management, dashboards) call these to reach connected clients.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use validator::Validate;

use super::ApiError;
use crate::extractors::AppJson;
use crate::middlewares::auth::JwtClaims;
use crate::models::events::QuizLifecycle;
use crate::models::notification::{Notification, SystemAnnouncement};
use crate::models::{ServerEvent, UserRole};
use crate::services::rooms::Delivery;
use crate::services::AppState;

#[derive(Debug, Serialize)]
pub struct BroadcastResponse {
    pub event: &'static str,
    pub delivered: usize,
    pub dropped: usize,
}

impl BroadcastResponse {
    fn new(event: &ServerEvent, delivery: Delivery) -> Self {
        Self {
            event: event.name(),
            delivered: delivery.delivered,
            dropped: delivery.dropped,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QuizEventKind {
    Started,
    Ended,
    Updated,
}

#[derive(Debug, Deserialize)]
pub struct QuizBroadcastRequest {
    pub kind: QuizEventKind,
    #[serde(flatten)]
    pub quiz: QuizLifecycle,
}

/// POST /api/v1/broadcasts/notification
pub async fn push_notification(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(notification): AppJson<Notification>,
) -> Result<impl IntoResponse, ApiError> {
    notification
        .validate()
        .map_err(|e| ApiError::bad_request(format!("Validation error: {}", e)))?;

    let recipient = notification.recipient_id.clone();
    let event = ServerEvent::NewNotification(notification);
    let delivery = state.dispatcher.to_user(&recipient, &event);

    tracing::info!(
        sender = %claims.sub,
        recipient = %recipient,
        delivered = delivery.delivered,
        "Notification pushed"
    );
    Ok((StatusCode::ACCEPTED, Json(BroadcastResponse::new(&event, delivery))))
}

/// POST /api/v1/broadcasts/announcement (admin)
pub async fn push_announcement(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(announcement): AppJson<SystemAnnouncement>,
) -> Result<impl IntoResponse, ApiError> {
    announcement
        .validate()
        .map_err(|e| ApiError::bad_request(format!("Validation error: {}", e)))?;

    let event = ServerEvent::SystemAnnouncement(announcement);
    let delivery = state.dispatcher.to_all(&event);

    tracing::info!(sender = %claims.sub, delivered = delivery.delivered, "System announcement sent");
    Ok((StatusCode::ACCEPTED, Json(BroadcastResponse::new(&event, delivery))))
}

/// POST /api/v1/broadcasts/dashboard (admin)
pub async fn push_dashboard_update(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<Value>,
) -> Result<impl IntoResponse, ApiError> {
    if !payload.is_object() {
        return Err(ApiError::bad_request("Dashboard update must be a JSON object"));
    }
    let event = ServerEvent::DashboardUpdate(payload);
    let delivery = state.dispatcher.to_role(UserRole::Admin, &event);
    Ok((StatusCode::ACCEPTED, Json(BroadcastResponse::new(&event, delivery))))
}

/// POST /api/v1/broadcasts/quiz
pub async fn push_quiz_event(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<QuizBroadcastRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.quiz.quiz_id.trim().is_empty() {
        return Err(ApiError::bad_request("quizId must not be empty"));
    }
    let quiz_id = req.quiz.quiz_id.clone();
    let event = match req.kind {
        QuizEventKind::Started => ServerEvent::QuizStarted(req.quiz),
        QuizEventKind::Ended => ServerEvent::QuizEnded(req.quiz),
        QuizEventKind::Updated => ServerEvent::QuizUpdated(req.quiz),
    };
    let delivery = state.dispatcher.to_quiz_audience(&quiz_id, &event);

    tracing::info!(
        sender = %claims.sub,
        quiz_id = %quiz_id,
        event = event.name(),
        delivered = delivery.delivered,
        "Quiz lifecycle event sent"
    );
    Ok((StatusCode::ACCEPTED, Json(BroadcastResponse::new(&event, delivery))))
}

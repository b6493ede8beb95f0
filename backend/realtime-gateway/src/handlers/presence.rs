use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::models::PublicUser;
use crate::services::AppState;

#[derive(Debug, Serialize)]
pub struct OnlineUsersResponse {
    pub count: usize,
    pub users: Vec<PublicUser>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPresenceResponse {
    pub user_id: String,
    pub online: bool,
}

/// GET /api/v1/presence (teachers and admins)
pub async fn list_online(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.presence.snapshot();
    Json(OnlineUsersResponse {
        count: snapshot.len(),
        users: snapshot.iter().collect(),
    })
}

/// GET /api/v1/presence/{user_id}
pub async fn user_presence(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    let online = state.presence.is_online(&user_id);
    Json(UserPresenceResponse { user_id, online })
}

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_HANDSHAKES_TOTAL};
use crate::middlewares::auth::bearer_token;
use crate::models::UserIdentity;
use crate::services::gateway::Session;
use crate::services::AppState;

#[derive(Debug, Deserialize)]
pub struct HandshakeQuery {
    pub token: Option<String>,
}

/// GET /ws
///
/// The token is checked before the upgrade so a rejected client gets a plain
/// HTTP 401 and no connection state is ever created for it.
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HandshakeQuery>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let token = bearer_token(&headers).or(query.token.as_deref());

    let identity = match state.gateway.authenticate(token).await {
        Ok(identity) => identity,
        Err(e) => {
            WS_HANDSHAKES_TOTAL.with_label_values(&["rejected"]).inc();
            tracing::warn!("Gateway handshake rejected: {}", e);
            return (e.status_code(), Json(json!({ "error": e.to_string() }))).into_response();
        }
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            WS_HANDSHAKES_TOTAL.with_label_values(&["not_upgradable"]).inc();
            return rejection.into_response();
        }
    };

    WS_HANDSHAKES_TOTAL.with_label_values(&["accepted"]).inc();
    ws.on_upgrade(move |socket| handle_socket(socket, state, identity))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, identity: UserIdentity) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let gateway = &state.gateway;

    let connection_id = Uuid::new_v4().to_string();
    let mut session = Session::new(connection_id.clone(), identity);

    let (tx, mut rx) = gateway.outbound_channel();

    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_sender
                .send(Message::Text(frame.as_str().into()))
                .await
                .is_err()
            {
                break;
            }
        }
    });

    WS_CONNECTIONS_ACTIVE.inc();
    gateway.connect(&mut session, tx);

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                gateway.handle_text(&session, text.as_str()).await;
            }
            Ok(Message::Binary(_)) => {
                tracing::debug!(connection_id = %connection_id, "Ignoring binary frame");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                tracing::trace!(connection_id = %connection_id, "ping/pong");
            }
            Ok(Message::Close(_)) => {
                tracing::info!(
                    connection_id = %connection_id,
                    user_id = %session.identity.user_id,
                    "Client closed connection"
                );
                break;
            }
            Err(e) => {
                tracing::warn!(connection_id = %connection_id, "WebSocket error: {}", e);
                break;
            }
        }
    }

    gateway.disconnect(&mut session);
    send_task.abort();
    WS_CONNECTIONS_ACTIVE.dec();
}

//! Per-connection session lifecycle and inbound message routing.
//!
//! The transport (axum WebSocket handler) owns the socket and calls into
//! [`SessionGateway`] for every lifecycle step and every parsed frame. A
//! connection is processed sequentially: its read loop awaits each `handle`.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;

use crate::metrics::GATEWAY_MESSAGES_TOTAL;
use crate::middlewares::auth::AuthError;
use crate::models::events::{
    HeartbeatAck, ProgressDetail, QuizProgressPayload, StudentProgress, UserActivityUpdate,
    UserTyping,
};
use crate::models::{ClientEvent, ServerEvent, UserIdentity};

use super::authenticator::TokenAuthenticator;
use super::autosave::AutosaveProcessor;
use super::dispatcher::BroadcastDispatcher;
use super::presence::{PresenceRegistry, SessionInfo};
use super::rooms::{OutboundSender, Room};

/// Lifecycle of an upgraded connection. The unauthenticated phase happens
/// during the HTTP handshake, before any `Session` exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Authenticated,
    Active,
    Disconnected,
}

#[derive(Debug)]
pub struct Session {
    pub connection_id: String,
    pub identity: UserIdentity,
    state: SessionState,
}

impl Session {
    pub fn new(connection_id: impl Into<String>, identity: UserIdentity) -> Self {
        Self {
            connection_id: connection_id.into(),
            identity,
            state: SessionState::Authenticated,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn user_id(&self) -> &str {
        &self.identity.user_id
    }
}

#[derive(Clone)]
pub struct SessionGateway {
    authenticator: TokenAuthenticator,
    presence: Arc<PresenceRegistry>,
    dispatcher: BroadcastDispatcher,
    autosave: Arc<AutosaveProcessor>,
    outbound_buffer: usize,
}

impl SessionGateway {
    pub fn new(
        authenticator: TokenAuthenticator,
        presence: Arc<PresenceRegistry>,
        dispatcher: BroadcastDispatcher,
        autosave: Arc<AutosaveProcessor>,
        outbound_buffer: usize,
    ) -> Self {
        Self {
            authenticator,
            presence,
            dispatcher,
            autosave,
            outbound_buffer: outbound_buffer.max(1),
        }
    }

    pub async fn authenticate(&self, token: Option<&str>) -> Result<UserIdentity, AuthError> {
        self.authenticator.authenticate(token).await
    }

    /// Bounded outbound queue for a new socket
    pub fn outbound_channel(&self) -> (OutboundSender, mpsc::Receiver<Arc<String>>) {
        mpsc::channel(self.outbound_buffer)
    }

    /// Activates an authenticated connection: presence, default rooms and
    /// the initial `online_users` snapshot for this connection only.
    pub fn connect(&self, session: &mut Session, sender: OutboundSender) {
        if session.state != SessionState::Authenticated {
            return;
        }
        let rooms = self.dispatcher.rooms();
        rooms.attach(&session.connection_id, sender);

        self.presence
            .register(SessionInfo::new(&session.connection_id, &session.identity));

        rooms.join(&session.connection_id, Room::Role(session.identity.role));
        rooms.join(
            &session.connection_id,
            Room::User(session.identity.user_id.clone()),
        );

        let online = self.presence.snapshot().iter().collect();
        self.dispatcher
            .to_connection(&session.connection_id, &ServerEvent::OnlineUsers(online));

        session.state = SessionState::Active;
        tracing::info!(
            connection_id = %session.connection_id,
            user_id = %session.identity.user_id,
            role = %session.identity.role,
            "Session active"
        );
    }

    pub async fn handle(&self, session: &Session, event: ClientEvent) {
        if session.state != SessionState::Active {
            tracing::debug!(
                connection_id = %session.connection_id,
                event = event.name(),
                "Ignoring message on inactive session"
            );
            return;
        }
        GATEWAY_MESSAGES_TOTAL
            .with_label_values(&[event.name()])
            .inc();

        let rooms = self.dispatcher.rooms();
        match event {
            ClientEvent::JoinQuiz(quiz_id) => {
                if quiz_id.is_empty() {
                    return;
                }
                rooms.join(&session.connection_id, Room::Quiz(quiz_id));
            }
            ClientEvent::LeaveQuiz(quiz_id) => {
                rooms.leave(&session.connection_id, &Room::Quiz(quiz_id));
            }
            ClientEvent::UserActivity(activity) => {
                self.authenticator.record_last_seen(session.user_id()).await;
                self.dispatcher
                    .to_supervisors(&ServerEvent::UserActivityUpdate(UserActivityUpdate {
                        user_id: session.identity.user_id.clone(),
                        name: session.identity.name.clone(),
                        role: session.identity.role,
                        activity: activity.unwrap_or_default(),
                        timestamp: Utc::now(),
                    }));
            }
            ClientEvent::QuizProgress(QuizProgressPayload { quiz_id, progress }) => {
                self.dispatcher.to_supervisors_except(
                    &session.connection_id,
                    &ServerEvent::StudentProgress(StudentProgress {
                        student_id: session.identity.user_id.clone(),
                        quiz_id,
                        detail: ProgressDetail::Reported { progress },
                    }),
                );
            }
            ClientEvent::SaveAnswer(payload) => {
                self.autosave
                    .autosave(&session.connection_id, session.user_id(), payload)
                    .await;
            }
            ClientEvent::TypingNotification(typing) => {
                self.dispatcher
                    .to_supervisors(&ServerEvent::UserTyping(UserTyping {
                        user_id: session.identity.user_id.clone(),
                        name: session.identity.name.clone(),
                        is_typing: typing.is_typing,
                    }));
            }
            ClientEvent::Heartbeat(_) => {
                self.authenticator.record_last_seen(session.user_id()).await;
                self.dispatcher.to_connection(
                    &session.connection_id,
                    &ServerEvent::HeartbeatAck(HeartbeatAck {
                        timestamp: Utc::now(),
                    }),
                );
            }
        }
    }

    /// Parses one text frame and handles it. Malformed frames are logged
    /// and ignored; they never close the connection.
    pub async fn handle_text(&self, session: &Session, text: &str) {
        match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => self.handle(session, event).await,
            Err(e) => {
                GATEWAY_MESSAGES_TOTAL
                    .with_label_values(&["malformed"])
                    .inc();
                tracing::warn!(
                    connection_id = %session.connection_id,
                    "Ignoring malformed frame: {}",
                    e
                );
            }
        }
    }

    /// Idempotent. Presence is keyed by user, so closing an older socket
    /// also clears the entry owned by a newer one.
    pub fn disconnect(&self, session: &mut Session) {
        match session.state {
            SessionState::Disconnected => return,
            SessionState::Active => {
                self.presence.unregister(session.user_id());
            }
            SessionState::Authenticated => {}
        }
        self.dispatcher.rooms().detach(&session.connection_id);
        session.state = SessionState::Disconnected;
        tracing::info!(
            connection_id = %session.connection_id,
            user_id = %session.identity.user_id,
            "Session closed"
        );
    }
}

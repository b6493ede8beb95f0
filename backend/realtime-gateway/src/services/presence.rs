//! Who is online right now.
//!
//! One entry per user: the most recent connection wins, older sockets of the
//! same user stay open but no longer own the presence entry. Every mutation
//! broadcasts its presence event while the registry lock is still held, so a
//! client told that a user is online always finds that user in a snapshot.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

use crate::metrics::USERS_ONLINE;
use crate::models::events::UserOffline;
use crate::models::{PublicUser, ServerEvent, UserIdentity, UserRole};

use super::dispatcher::BroadcastDispatcher;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    pub connection_id: String,
    pub user_id: String,
    pub display_name: String,
    pub role: UserRole,
    pub connected_at: DateTime<Utc>,
}

impl SessionInfo {
    pub fn new(connection_id: &str, identity: &UserIdentity) -> Self {
        Self {
            connection_id: connection_id.to_string(),
            user_id: identity.user_id.clone(),
            display_name: identity.name.clone(),
            role: identity.role,
            connected_at: Utc::now(),
        }
    }

    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.user_id.clone(),
            name: self.display_name.clone(),
            role: self.role,
        }
    }
}

pub struct PresenceRegistry {
    sessions: Mutex<HashMap<String, SessionInfo>>,
    dispatcher: BroadcastDispatcher,
}

impl PresenceRegistry {
    pub fn new(dispatcher: BroadcastDispatcher) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            dispatcher,
        }
    }

    /// Last write wins. Returns the superseded entry, if any.
    pub fn register(&self, session: SessionInfo) -> Option<SessionInfo> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let event = ServerEvent::UserOnline(session.public());
        let user_id = session.user_id.clone();
        let previous = sessions.insert(user_id.clone(), session);
        USERS_ONLINE.set(sessions.len() as i64);
        self.dispatcher.to_all(&event);

        if let Some(ref old) = previous {
            tracing::info!(
                user_id = %user_id,
                superseded_connection = %old.connection_id,
                "Presence entry superseded by newer connection"
            );
        } else {
            tracing::info!(user_id = %user_id, online = sessions.len(), "User online");
        }
        previous
    }

    /// No-op without broadcast when the user is already absent
    pub fn unregister(&self, user_id: &str) -> Option<SessionInfo> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let removed = sessions.remove(user_id)?;
        USERS_ONLINE.set(sessions.len() as i64);
        self.dispatcher.to_all(&ServerEvent::UserOffline(UserOffline {
            user_id: user_id.to_string(),
        }));
        tracing::info!(user_id = %user_id, online = sessions.len(), "User offline");
        Some(removed)
    }

    pub fn snapshot(&self) -> PresenceSnapshot {
        let sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        PresenceSnapshot {
            sessions: sessions.values().cloned().collect(),
        }
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(user_id)
    }

    pub fn count(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn session(&self, user_id: &str) -> Option<SessionInfo> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned()
    }
}

/// Point-in-time copy of the registry. Iterating projects each entry to its
/// public form on demand and can be repeated.
#[derive(Debug, Clone)]
pub struct PresenceSnapshot {
    sessions: Vec<SessionInfo>,
}

impl PresenceSnapshot {
    pub fn iter(&self) -> impl Iterator<Item = PublicUser> + '_ {
        self.sessions.iter().map(SessionInfo::public)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl<'a> IntoIterator for &'a PresenceSnapshot {
    type Item = PublicUser;
    type IntoIter = std::iter::Map<std::slice::Iter<'a, SessionInfo>, fn(&SessionInfo) -> PublicUser>;

    fn into_iter(self) -> Self::IntoIter {
        self.sessions
            .iter()
            .map(SessionInfo::public as fn(&SessionInfo) -> PublicUser)
    }
}

use std::sync::Arc;

use crate::middlewares::auth::{AuthError, JwtService};
use crate::models::UserIdentity;

use super::stores::UserDirectory;

/// Resolves a handshake token to the identity of an active user.
///
/// The claimed role in the token is ignored; the role stored on the user
/// record is authoritative.
#[derive(Clone)]
pub struct TokenAuthenticator {
    jwt: JwtService,
    users: Arc<dyn UserDirectory>,
}

impl TokenAuthenticator {
    pub fn new(jwt: JwtService, users: Arc<dyn UserDirectory>) -> Self {
        Self { jwt, users }
    }

    pub async fn authenticate(&self, token: Option<&str>) -> Result<UserIdentity, AuthError> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let claims = self.jwt.validate_token(token)?;

        let identity = self
            .users
            .find_identity(&claims.sub)
            .await
            .map_err(|e| {
                tracing::error!(user_id = %claims.sub, "User lookup failed during handshake: {:#}", e);
                AuthError::LookupFailed
            })?
            .ok_or(AuthError::UserNotFound)?;

        tracing::debug!(user_id = %identity.user_id, role = %identity.role, "Token authenticated");
        Ok(identity)
    }

    /// Refreshes `lastSeen` on heartbeats and activity; failures are only logged
    pub async fn record_last_seen(&self, user_id: &str) {
        if let Err(e) = self.users.touch_last_seen(user_id).await {
            tracing::warn!(user_id, "Failed to update lastSeen: {:#}", e);
        }
    }
}

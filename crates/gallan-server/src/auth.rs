//! Login sessions and password hashing.
//!
//! Sessions are opaque bearer tokens held in memory. They do not survive a
//! restart; clients simply log in again.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::http::{header, HeaderMap};
use chrono::{DateTime, Utc};
use rand::RngCore;
use tokio::sync::RwLock;
use tracing::debug;

use gallan_shared::UserId;

use crate::error::ServerError;

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Session {
    user_id: UserId,
    expires_at: DateTime<Utc>,
}

impl Session {
    fn is_live(&self) -> bool {
        Utc::now() < self.expires_at
    }
}

/// Token → user map shared by all request handlers.
#[derive(Clone)]
pub struct SessionStore {
    ttl: Duration,
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Start a session for `user_id` and return its token.
    pub async fn create(&self, user_id: UserId) -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);

        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::days(1));
        let session = Session {
            user_id,
            expires_at: Utc::now() + ttl,
        };

        self.sessions.write().await.insert(token.clone(), session);
        debug!(user_id = %user_id, "session created");
        token
    }

    /// The user behind `token`, if the session exists and has not expired.
    pub async fn resolve(&self, token: &str) -> Option<UserId> {
        let sessions = self.sessions.read().await;
        sessions
            .get(token)
            .filter(|s| s.is_live())
            .map(|s| s.user_id)
    }

    /// End a session. Returns the user it belonged to.
    pub async fn revoke(&self, token: &str) -> Option<UserId> {
        self.sessions.write().await.remove(token).map(|s| s.user_id)
    }

    /// Drop every expired session.
    pub async fn purge_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.is_live());
        let removed = before - sessions.len();
        if removed > 0 {
            debug!(removed, "Purged expired sessions");
        }
        removed
    }
}

/// Pull the bearer token out of the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ServerError> {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ServerError::Unauthorized)?;

    auth.strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ServerError::Unauthorized)
}

// ---------------------------------------------------------------------------
// Passwords
// ---------------------------------------------------------------------------

/// Hash a password using Argon2.
pub fn hash_password(password: &str) -> Result<String, ServerError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ServerError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, ServerError> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| ServerError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

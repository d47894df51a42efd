// src/session.rs

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::{generate_session_token, hash_session_token, token_fingerprint};
use crate::models::{Credential, SessionInfo};

#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: Uuid,
    pub credential: Credential,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.session_id,
            expires_at: self.expires_at,
        }
    }
}

/// Live sessions, keyed by hash(session token).
///
/// `open` is the only way a remote credential enters the server and `close`
/// the only way it leaves; guarded handlers get it through the session guard.
pub struct SessionStore {
    ttl: Duration,
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new(ttl_hours: i64) -> Self {
        Self {
            ttl: Duration::hours(ttl_hours.max(1)),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Start a session for a freshly issued credential. Returns the token the
    /// browser must present as `Authorization: Bearer <token>`.
    pub async fn open(&self, credential: Credential) -> (String, Session) {
        let token = generate_session_token();
        let now = Utc::now();
        let session = Session {
            session_id: Uuid::new_v4(),
            credential,
            expires_at: now + self.ttl,
        };

        let mut sessions = self.sessions.write().await;
        // Abandoned tokens are never looked up again; sweep them here.
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now);
        let swept = before - sessions.len();
        if swept > 0 {
            tracing::debug!(swept, "expired sessions dropped");
        }
        sessions.insert(hash_session_token(&token), session.clone());
        drop(sessions);

        tracing::info!(session_id = %session.session_id, token = %token_fingerprint(&token), "session opened");
        (token, session)
    }

    /// Live session for a token. Expired sessions are dropped on sight.
    pub async fn lookup(&self, token: &str) -> Option<Session> {
        let key = hash_session_token(token);
        let now = Utc::now();

        {
            let sessions = self.sessions.read().await;
            match sessions.get(&key) {
                None => return None,
                Some(s) if s.expires_at > now => return Some(s.clone()),
                Some(_) => {}
            }
        }

        let mut sessions = self.sessions.write().await;
        if sessions.get(&key).is_some_and(|s| s.expires_at <= now) {
            sessions.remove(&key);
            tracing::debug!(token = %token_fingerprint(token), "session expired");
        }
        None
    }

    /// Tear a session down. Returns whether one was live.
    pub async fn close(&self, token: &str) -> bool {
        let removed = self
            .sessions
            .write()
            .await
            .remove(&hash_session_token(token));
        if let Some(s) = &removed {
            tracing::info!(session_id = %s.session_id, "session closed");
        }
        removed.is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

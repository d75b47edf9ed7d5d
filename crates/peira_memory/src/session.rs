//! Session registry: pending-feedback handles.
//!
//! A session binds a delivered response to the feedback it may receive.
//! Ids are v4 UUIDs, so concurrent opens never collide. Consuming a
//! session removes it; a second consume of the same id fails with
//! `SessionNotFound`. Sessions that never receive feedback are swept
//! once they outlive the TTL.

use peira_core::{PendingSession, PeiraError};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, PendingSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a delivered (input, response) pair and hand back the id
    /// the eventual feedback must quote.
    pub async fn open(&self, user_id: &str, user_input: &str, response: &str) -> Uuid {
        let session_id = Uuid::new_v4();
        let session = PendingSession {
            session_id,
            user_id: user_id.to_string(),
            user_input: user_input.to_string(),
            response: response.to_string(),
            opened_at: chrono::Utc::now().timestamp(),
        };
        self.sessions.write().await.insert(session_id, session);
        session_id
    }

    /// Resolve and remove a pending session. Unknown, expired, and
    /// already-consumed ids all surface as `SessionNotFound`.
    pub async fn consume(&self, session_id: Uuid) -> Result<PendingSession, PeiraError> {
        self.sessions
            .write()
            .await
            .remove(&session_id)
            .ok_or(PeiraError::SessionNotFound { session_id })
    }

    /// Put a consumed session back, keyed by its original id. Used when
    /// the write that should have followed consumption failed, so the
    /// caller can retry with the same id.
    pub async fn restore(&self, session: PendingSession) {
        self.sessions
            .write()
            .await
            .insert(session.session_id, session);
    }

    /// Drop sessions opened more than `ttl_secs` ago. Returns how many
    /// were removed.
    pub async fn sweep_expired(&self, ttl_secs: i64) -> usize {
        let cutoff = chrono::Utc::now().timestamp() - ttl_secs;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.opened_at >= cutoff);
        let removed = before - sessions.len();
        if removed > 0 {
            tracing::debug!("Swept {} expired sessions", removed);
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

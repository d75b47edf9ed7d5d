//! Bounded per-user chat memory.
//!
//! Pure storage: no policy logic lives here. Each user gets an ordered log
//! of recent exchanges capped at a fixed capacity; the oldest turns are
//! evicted first. Logs are keyed by user id and guarded per key, so
//! independent users never contend on the same lock.

use peira_core::ChatTurn;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

type UserLog = Arc<Mutex<VecDeque<ChatTurn>>>;

pub struct ChatMemoryStore {
    capacity: usize,
    logs: RwLock<HashMap<String, UserLog>>,
}

impl ChatMemoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            logs: RwLock::new(HashMap::new()),
        }
    }

    /// Append a completed turn to the user's log, evicting the oldest
    /// entries once the log passes capacity.
    pub async fn append(&self, user_id: &str, message: &str, response: &str) {
        let log = self.user_log(user_id).await;
        let mut log = log.lock().await;
        log.push_back(ChatTurn {
            user_id: user_id.to_string(),
            message: message.to_string(),
            response: response.to_string(),
            timestamp: chrono::Utc::now().timestamp(),
        });
        while log.len() > self.capacity {
            log.pop_front();
        }
    }

    /// Last `limit` turns in chronological order (oldest of the slice
    /// first). Unknown users get an empty history, never an error.
    pub async fn recent(&self, user_id: &str, limit: usize) -> Vec<ChatTurn> {
        let log = {
            let map = self.logs.read().await;
            match map.get(user_id) {
                Some(log) => log.clone(),
                None => return Vec::new(),
            }
        };
        let log = log.lock().await;
        let skip = log.len().saturating_sub(limit);
        log.iter().skip(skip).cloned().collect()
    }

    /// Drop all history for a user. Idempotent.
    pub async fn clear(&self, user_id: &str) {
        self.logs.write().await.remove(user_id);
    }

    /// Number of turns currently held for a user.
    pub async fn len(&self, user_id: &str) -> usize {
        let log = {
            let map = self.logs.read().await;
            match map.get(user_id) {
                Some(log) => log.clone(),
                None => return 0,
            }
        };
        let len = log.lock().await.len();
        len
    }

    // Get or create the per-user log. The map write lock is held only for
    // the insert; turn mutation happens under the per-user mutex.
    async fn user_log(&self, user_id: &str) -> UserLog {
        {
            let map = self.logs.read().await;
            if let Some(log) = map.get(user_id) {
                return log.clone();
            }
        }
        let mut map = self.logs.write().await;
        map.entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(VecDeque::new())))
            .clone()
    }
}

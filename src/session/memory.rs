use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{SessionError, SessionStore};

struct Entry {
    attributes: HashMap<String, Value>,
    last_access: Instant,
}

/// In-process session store with idle expiry.
///
/// Expired sessions are dropped lazily when they are next touched.
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, Entry>>>,
    idle_timeout: Duration,
}

impl MemorySessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            idle_timeout,
        }
    }

    /// Number of sessions currently held, expired or not
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every expired session; returns how many were removed
    pub async fn purge_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_access.elapsed() < self.idle_timeout);
        before - sessions.len()
    }

    fn is_expired(&self, entry: &Entry) -> bool {
        entry.last_access.elapsed() >= self.idle_timeout
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn exists(&self, session_id: &str) -> Result<bool, SessionError> {
        let mut sessions = self.sessions.write().await;
        let expired = match sessions.get_mut(session_id) {
            None => return Ok(false),
            Some(entry) if self.is_expired(entry) => true,
            Some(entry) => {
                entry.last_access = Instant::now();
                false
            }
        };

        if expired {
            sessions.remove(session_id);
            tracing::debug!("Session {} expired", session_id);
        }
        Ok(!expired)
    }

    async fn get(&self, session_id: &str, key: &str) -> Result<Option<Value>, SessionError> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(session_id)
            .filter(|entry| !self.is_expired(entry))
            .and_then(|entry| entry.attributes.get(key).cloned()))
    }

    async fn set(&self, session_id: &str, key: &str, value: Value) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.entry(session_id.to_string()).or_insert_with(|| Entry {
            attributes: HashMap::new(),
            last_access: Instant::now(),
        });
        entry.attributes.insert(key.to_string(), value);
        entry.last_access = Instant::now();
        Ok(())
    }

    async fn remove(&self, session_id: &str, key: &str) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        if let Some(entry) = sessions.get_mut(session_id) {
            entry.attributes.remove(key);
            entry.last_access = Instant::now();
        }
        Ok(())
    }
}

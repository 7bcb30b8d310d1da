//! Client-scoped session storage.
//!
//! A session lives across many requests from one browser and is identified by
//! a cookie. The store behind it is pluggable; [`MemorySessionStore`] keeps
//! everything in process.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderValue};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
pub mod user;

pub use memory::MemorySessionStore;
pub use user::{UserSession, USER_SESSION_KEY};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session attribute '{key}' could not be (de)serialized: {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Session backend error: {0}")]
    Backend(String),
}

/// Storage backend for session attributes
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Whether a live (non-expired) session with this id exists
    async fn exists(&self, session_id: &str) -> Result<bool, SessionError>;

    async fn get(&self, session_id: &str, key: &str) -> Result<Option<Value>, SessionError>;

    /// Store an attribute, creating the session if needed
    async fn set(&self, session_id: &str, key: &str, value: Value) -> Result<(), SessionError>;

    async fn remove(&self, session_id: &str, key: &str) -> Result<(), SessionError>;
}

/// Handle to one client's session for the duration of a request
pub struct Session {
    id: String,
    store: Arc<dyn SessionStore>,
    is_new: bool,
    written: bool,
}

impl Session {
    /// Resume the session named by the client's cookie, or start a fresh one.
    ///
    /// Unknown or expired ids are never adopted; a new random id is issued
    /// instead, so a client cannot pick its own session id.
    pub async fn resume(
        store: Arc<dyn SessionStore>,
        cookie_id: Option<&str>,
    ) -> Result<Self, SessionError> {
        if let Some(id) = cookie_id {
            if store.exists(id).await? {
                return Ok(Self {
                    id: id.to_string(),
                    store,
                    is_new: false,
                    written: false,
                });
            }
        }

        Ok(Self {
            id: Uuid::new_v4().simple().to_string(),
            store,
            is_new: true,
            written: false,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// True when this session was created for the current request
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// A new session only needs a cookie once something was stored in it
    pub fn needs_cookie(&self) -> bool {
        self.is_new && self.written
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, SessionError> {
        match self.store.get(&self.id, key).await? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|source| SessionError::Serialization {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    pub async fn set<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), SessionError> {
        let value = serde_json::to_value(value).map_err(|source| SessionError::Serialization {
            key: key.to_string(),
            source,
        })?;
        self.store.set(&self.id, key, value).await?;
        self.written = true;
        Ok(())
    }

    pub async fn remove(&mut self, key: &str) -> Result<(), SessionError> {
        self.store.remove(&self.id, key).await
    }

    /// Currently authenticated user, if any
    pub async fn user(&self) -> Result<Option<UserSession>, SessionError> {
        self.get(USER_SESSION_KEY).await
    }

    /// Record `username` as the authenticated identity of this session
    pub async fn store_user(&mut self, username: &str) -> Result<UserSession, SessionError> {
        let user = UserSession::new(username);
        self.set(USER_SESSION_KEY, &user).await?;
        tracing::info!("Session {} authenticated as '{}'", self.id, username);
        Ok(user)
    }

    pub async fn clear_user(&mut self) -> Result<(), SessionError> {
        self.remove(USER_SESSION_KEY).await
    }
}

/// Extract the session id from the `Cookie` header(s)
pub fn session_id_from_headers(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == cookie_name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Build the `Set-Cookie` value that hands a session id to the client
pub fn session_cookie(cookie_name: &str, session_id: &str, secure: bool) -> Option<HeaderValue> {
    let mut cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", cookie_name, session_id);
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).ok()
}

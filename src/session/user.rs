use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session attribute holding the authenticated identity
pub const USER_SESSION_KEY: &str = "userSession";

pub const MESSAGE_LOGGED_OUT: &str = "Logged out";
pub const MESSAGE_NOT_LOGGED_IN: &str = "Not logged in";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    pub username: String,
    pub logged_in_at: DateTime<Utc>,
}

impl UserSession {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            logged_in_at: Utc::now(),
        }
    }

    pub fn logged_in_message(&self) -> String {
        format!("Logged in as {}", self.username)
    }
}

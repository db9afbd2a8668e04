use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Session;

/// Per-user profile row, keyed by the auth identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    /// Same identifier as the session's user
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// Builds the profile for a freshly authenticated identity
    pub fn new(id: Uuid, email: impl Into<String>, full_name: Option<String>) -> Self {
        Self {
            id,
            email: email.into(),
            full_name: full_name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
            created_at: Utc::now(),
        }
    }

    /// Builds a profile from what the session already knows about the user
    pub fn from_session(session: &Session) -> Self {
        Self::new(
            session.user_id(),
            session.email().unwrap_or_default(),
            session.user.full_name().map(str::to_string),
        )
    }
}

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User metadata key holding the display name captured at sign-up
pub const FULL_NAME_KEY: &str = "full_name";

/// Identity as reported by the auth service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: HashMap<String, serde_json::Value>,
}

impl User {
    /// Display name stored in the user metadata, if any
    pub fn full_name(&self) -> Option<&str> {
        self.user_metadata
            .get(FULL_NAME_KEY)
            .and_then(|value| value.as_str())
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

/// An authenticated session held by the client
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

impl Session {
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    pub fn email(&self) -> Option<&str> {
        self.user.email.as_deref()
    }

    /// Expired sessions are treated as expired slightly early to avoid racing the server
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(10) <= now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Kind of session change reported to listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

/// Result of a sign-up request
#[derive(Debug, Clone, PartialEq)]
pub enum SignUpOutcome {
    /// The identity was created and a session issued immediately
    Active(Session),
    /// The identity exists but no session was issued (e.g. awaiting email confirmation)
    Pending(User),
}

/// Email/password pair submitted to the auth service
#[derive(Clone, Serialize, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

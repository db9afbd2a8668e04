/// External service abstraction
///
/// The client talks to three collaborators it does not own: the hosted auth service,
/// the profile table behind it, and the recommendation backend. Each sits behind a
/// trait so the flows can be exercised against mocks.
use crate::{
    error::AppResult,
    models::{Credentials, Profile, RecommendationResult, Session, SignUpOutcome},
};

pub mod recommender;
pub mod supabase;

pub use recommender::HttpRecommender;
pub use supabase::SupabaseClient;

/// Hosted email/password authentication
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Create a new identity. `full_name` is stored in the user metadata.
    async fn sign_up(
        &self,
        credentials: &Credentials,
        full_name: Option<String>,
    ) -> AppResult<SignUpOutcome>;

    /// Exchange credentials for a session
    async fn sign_in(&self, credentials: &Credentials) -> AppResult<Session>;

    /// Exchange a refresh token for a new session
    async fn refresh(&self, refresh_token: &str) -> AppResult<Session>;

    /// Revoke the session identified by `access_token`
    async fn sign_out(&self, access_token: &str) -> AppResult<()>;
}

/// Profile storage keyed by user identifier
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fetch the profile row for the session's user, if one exists
    async fn fetch(&self, session: &Session) -> AppResult<Option<Profile>>;

    /// Create-or-update keyed by `profile.id`; repeating the call never duplicates rows
    async fn upsert(&self, session: &Session, profile: &Profile) -> AppResult<()>;
}

/// Mood-based recommendation backend
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RecommendationBackend: Send + Sync {
    async fn recommend(&self, mood: &str) -> AppResult<RecommendationResult>;
}

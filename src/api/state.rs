use std::sync::Arc;
use std::time::Duration;

use crate::{
    config::Config,
    error::AppResult,
    render::Renderer,
    services::{
        providers::{
            AuthService, HttpRecommender, ProfileStore, RecommendationBackend, SupabaseClient,
        },
        AuthFlow, RouteGuard, SessionStore, VibeSearch,
    },
};

/// Shared application state
///
/// One Session Store per process; the guard, auth flow and vibe search all observe it.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionStore>,
    pub auth: Arc<AuthFlow>,
    pub guard: Arc<RouteGuard>,
    pub vibe: Arc<VibeSearch>,
    pub renderer: Arc<Renderer>,
    /// Delay before the automatic sign-in after an unconfirmed sign-up
    pub sign_in_delay: Duration,
}

impl AppState {
    pub fn new(
        auth: Arc<dyn AuthService>,
        profiles: Arc<dyn ProfileStore>,
        recommender: Arc<dyn RecommendationBackend>,
        sign_in_delay: Duration,
    ) -> AppResult<Self> {
        let sessions = Arc::new(SessionStore::new(auth));
        let guard = Arc::new(RouteGuard::attach(&sessions));

        Ok(Self {
            auth: Arc::new(AuthFlow::new(sessions.clone(), profiles, sign_in_delay)),
            guard,
            vibe: Arc::new(VibeSearch::attach(recommender, &sessions)),
            renderer: Arc::new(Renderer::new()?),
            sessions,
            sign_in_delay,
        })
    }

    /// Wires the hosted service and recommendation backend named in `config`
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let supabase = Arc::new(SupabaseClient::new(
            config.supabase_url.clone(),
            config.supabase_anon_key.clone(),
        ));
        let recommender = Arc::new(HttpRecommender::new(config.recommender_url.clone()));

        Self::new(
            supabase.clone(),
            supabase,
            recommender,
            config.auto_sign_in_delay(),
        )
    }

    /// Runs the guard's initial session query
    pub async fn resolve_guard(&self) {
        self.guard.resolve(&self.sessions).await;
    }
}

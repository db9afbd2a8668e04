use std::sync::{Arc, PoisonError, RwLock};

use crate::{
    error::AppResult,
    models::Session,
    services::session::{SessionStore, Subscription},
};

/// What the guard currently knows about the session
#[derive(Debug, Clone, PartialEq)]
pub enum GuardState {
    /// The initial session query has not resolved yet
    Unknown,
    Authenticated(Session),
    Unauthenticated,
}

/// What a protected view should do right now
#[derive(Debug, Clone, PartialEq)]
pub enum GuardDecision {
    /// Show a loading indicator and nothing else
    Loading,
    RedirectToAuth,
    Render(Session),
}

/// Session gate in front of a protected view
///
/// Starts `Unknown`, leaves it once the initial query resolves, and from then on follows
/// Session Store notifications. It never returns to `Unknown`. Dropping the guard
/// releases its listener.
pub struct RouteGuard {
    state: Arc<RwLock<GuardState>>,
    _subscription: Subscription,
}

impl RouteGuard {
    /// Subscribes to `sessions`; call [`RouteGuard::resolve`] to run the initial query
    pub fn attach(sessions: &SessionStore) -> Self {
        let state = Arc::new(RwLock::new(GuardState::Unknown));
        let listener_state = state.clone();

        let subscription = sessions.subscribe(move |event, session| {
            let next = match session {
                Some(session) => GuardState::Authenticated(session.clone()),
                None => GuardState::Unauthenticated,
            };
            tracing::debug!(?event, authenticated = session.is_some(), "Route guard updated");
            *listener_state.write().unwrap_or_else(PoisonError::into_inner) = next;
        });

        Self {
            state,
            _subscription: subscription,
        }
    }

    /// Runs the initial session query
    pub async fn resolve(&self, sessions: &SessionStore) {
        let result = sessions.current_session().await;
        self.apply_initial(result);
    }

    /// Leaves `Unknown` with the query result; a notification that already arrived wins
    fn apply_initial(&self, result: AppResult<Option<Session>>) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if *state != GuardState::Unknown {
            tracing::debug!("Initial session query superseded by a notification");
            return;
        }

        *state = match result {
            Ok(Some(session)) => GuardState::Authenticated(session),
            Ok(None) => GuardState::Unauthenticated,
            Err(e) => {
                tracing::warn!(error = %e, "Initial session query failed, treating as signed out");
                GuardState::Unauthenticated
            }
        };
    }

    pub fn state(&self) -> GuardState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn decide(&self) -> GuardDecision {
        match self.state() {
            GuardState::Unknown => GuardDecision::Loading,
            GuardState::Unauthenticated => GuardDecision::RedirectToAuth,
            GuardState::Authenticated(session) => GuardDecision::Render(session),
        }
    }
}

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use crate::{
    error::{AppError, AppResult},
    models::{Credentials, Session, SessionEvent, SignUpOutcome},
    services::providers::AuthService,
};

type Listener = Arc<dyn Fn(SessionEvent, Option<&Session>) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: BTreeMap<u64, Listener>,
}

/// Latest known session plus a counter bumped on every change
#[derive(Default)]
struct SessionState {
    session: Option<Session>,
    generation: u64,
}

/// Process-wide view of the auth service's session
///
/// Construct once at startup and share it by `Arc`. The session is a single-writer value:
/// every change goes through `commit`, readers only ever see snapshots, and the most
/// recent change wins.
pub struct SessionStore {
    auth: Arc<dyn AuthService>,
    state: RwLock<SessionState>,
    listeners: Arc<Mutex<Listeners>>,
}

/// Listener registration returned by [`SessionStore::subscribe`]
///
/// Released by `unsubscribe()` or when dropped, whichever comes first.
pub struct Subscription {
    id: u64,
    listeners: Weak<Mutex<Listeners>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }

    fn release(&self) {
        if let Some(listeners) = self.listeners.upgrade() {
            let mut listeners = listeners.lock().unwrap_or_else(PoisonError::into_inner);
            if listeners.entries.remove(&self.id).is_some() {
                tracing::debug!(subscription = self.id, "Session listener released");
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl SessionStore {
    pub fn new(auth: Arc<dyn AuthService>) -> Self {
        Self {
            auth,
            state: RwLock::new(SessionState::default()),
            listeners: Arc::new(Mutex::new(Listeners::default())),
        }
    }

    /// Last known session without contacting the auth service
    pub fn snapshot(&self) -> Option<Session> {
        self.read_state().session.clone()
    }

    /// Returns the active session, refreshing it first if it has expired
    pub async fn current_session(&self) -> AppResult<Option<Session>> {
        let (session, generation) = {
            let state = self.read_state();
            (state.session.clone(), state.generation)
        };

        let Some(session) = session else {
            return Ok(None);
        };
        if !session.is_expired() {
            return Ok(Some(session));
        }

        let Some(refresh_token) = session.refresh_token.as_deref() else {
            tracing::info!(user_id = %session.user_id(), "Session expired without refresh token");
            return Ok(self.commit_if(generation, SessionEvent::SignedOut, None));
        };

        match self.auth.refresh(refresh_token).await {
            Ok(refreshed) => {
                tracing::debug!(user_id = %refreshed.user_id(), "Session refreshed");
                Ok(self.commit_if(generation, SessionEvent::TokenRefreshed, Some(refreshed)))
            }
            Err(e) if e.is_transport() => {
                tracing::warn!(error = %e, "Auth service unreachable during refresh");
                Err(AppError::ServiceUnavailable(e.to_string()))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Session refresh rejected, signing out");
                Ok(self.commit_if(generation, SessionEvent::SignedOut, None))
            }
        }
    }

    /// Registers `on_change`, invoked with the new session (or none) on every change
    pub fn subscribe<F>(&self, on_change: F) -> Subscription
    where
        F: Fn(SessionEvent, Option<&Session>) + Send + Sync + 'static,
    {
        let mut listeners = self.lock_listeners();
        listeners.next_id += 1;
        let id = listeners.next_id;
        listeners.entries.insert(id, Arc::new(on_change));

        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.lock_listeners().entries.len()
    }

    pub async fn sign_in(&self, credentials: &Credentials) -> AppResult<Session> {
        let session = self.auth.sign_in(credentials).await?;
        self.commit(SessionEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    pub async fn sign_up(
        &self,
        credentials: &Credentials,
        full_name: Option<String>,
    ) -> AppResult<SignUpOutcome> {
        let outcome = self.auth.sign_up(credentials, full_name).await?;
        if let SignUpOutcome::Active(session) = &outcome {
            self.commit(SessionEvent::SignedIn, Some(session.clone()));
        }
        Ok(outcome)
    }

    /// Clears the local session, then revokes it remotely
    ///
    /// The local session is gone even when the remote call fails.
    pub async fn sign_out(&self) -> AppResult<()> {
        let Some(session) = self.snapshot() else {
            return Ok(());
        };

        self.commit(SessionEvent::SignedOut, None);
        tracing::info!(user_id = %session.user_id(), "Signed out");

        self.auth.sign_out(&session.access_token).await
    }

    fn commit(&self, event: SessionEvent, session: Option<Session>) {
        {
            let mut state = self.write_state();
            state.session = session.clone();
            state.generation += 1;
        }
        self.notify(event, session.as_ref());
    }

    /// Applies a change computed from the state at `generation`, unless something newer landed
    fn commit_if(
        &self,
        generation: u64,
        event: SessionEvent,
        session: Option<Session>,
    ) -> Option<Session> {
        {
            let mut state = self.write_state();
            if state.generation != generation {
                tracing::debug!("Discarding stale session update");
                return state.session.clone();
            }
            state.session = session.clone();
            state.generation += 1;
        }
        self.notify(event, session.as_ref());
        session
    }

    fn notify(&self, event: SessionEvent, session: Option<&Session>) {
        // Listeners run outside the lock so they may unsubscribe themselves
        let listeners: Vec<Listener> = self.lock_listeners().entries.values().cloned().collect();
        tracing::debug!(?event, listeners = listeners.len(), "Session changed");
        for listener in listeners {
            listener(event, session);
        }
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, Listeners> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

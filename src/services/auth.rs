use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::{
    error::{AppError, AppResult},
    models::{Credentials, Profile, Session, SignUpOutcome},
    services::{providers::ProfileStore, session::SessionStore},
};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const SIGN_UP_PENDING: &str = "Account created! Logging you in...";
pub const SIGN_UP_CONFIRM: &str = "Account created! Please check your email or try signing in.";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    #[default]
    SignIn,
    SignUp,
}

/// Message shown above the auth form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Error(String),
}

/// Submitted auth form
#[derive(Debug, Clone, Deserialize)]
pub struct AuthForm {
    #[serde(default)]
    pub mode: AuthMode,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Snapshot of the form state for rendering
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthView {
    pub mode: AuthMode,
    pub notice: Option<Notice>,
    /// True while a submission is in flight; the submit control is disabled
    pub submitting: bool,
}

/// What the auth page does on entry
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEntry {
    /// A session already exists; skip the form
    Navigate,
    ShowForm(AuthView),
}

/// Result of a successful submission
#[derive(Debug)]
pub enum AuthOutcome {
    /// Session active; go to the main view
    Navigate,
    /// Identity created without a session; one automatic sign-in is scheduled
    Pending(PendingSignUp),
}

/// How the automatic sign-in after an unconfirmed sign-up ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    SignedIn,
    AwaitingConfirmation,
}

/// Handle on the scheduled automatic sign-in
///
/// Dropping it detaches the task; the sign-in still runs.
#[derive(Debug)]
pub struct PendingSignUp {
    retry: JoinHandle<RetryOutcome>,
}

impl PendingSignUp {
    pub async fn finish(self) -> RetryOutcome {
        match self.retry.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Automatic sign-in task failed");
                RetryOutcome::AwaitingConfirmation
            }
        }
    }
}

/// Sign-in / sign-up form logic
pub struct AuthFlow {
    sessions: Arc<SessionStore>,
    profiles: Arc<dyn ProfileStore>,
    retry_delay: Duration,
    view: Arc<Mutex<AuthView>>,
}

/// Clears the in-flight flag when the submission ends, however it ends
struct Submitting(Arc<Mutex<AuthView>>);

impl Drop for Submitting {
    fn drop(&mut self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).submitting = false;
    }
}

impl AuthFlow {
    pub fn new(
        sessions: Arc<SessionStore>,
        profiles: Arc<dyn ProfileStore>,
        retry_delay: Duration,
    ) -> Self {
        Self {
            sessions,
            profiles,
            retry_delay,
            view: Arc::new(Mutex::new(AuthView::default())),
        }
    }

    pub fn view(&self) -> AuthView {
        self.lock_view().clone()
    }

    /// Switches between sign-in and sign-up, clearing any message
    pub fn set_mode(&self, mode: AuthMode) {
        let mut view = self.lock_view();
        if view.mode != mode {
            view.mode = mode;
            view.notice = None;
        }
    }

    /// Entering the auth page with a session already active skips the form
    pub async fn enter(&self) -> AuthEntry {
        match self.sessions.current_session().await {
            Ok(Some(_)) => AuthEntry::Navigate,
            Ok(None) => AuthEntry::ShowForm(self.view()),
            Err(e) => {
                tracing::warn!(error = %e, "Could not determine session, showing auth form");
                AuthEntry::ShowForm(self.view())
            }
        }
    }

    /// Validates and submits the form
    ///
    /// Failures are also recorded as the form's error notice.
    pub async fn submit(&self, form: AuthForm) -> AppResult<AuthOutcome> {
        let _submitting = self.begin(form.mode)?;

        let result = match form.mode {
            AuthMode::SignIn => self.sign_in(&form).await,
            AuthMode::SignUp => self.sign_up(&form).await,
        };

        if let Err(e) = &result {
            tracing::info!(error = %e, mode = ?form.mode, "Auth submission failed");
            self.lock_view().notice = Some(Notice::Error(e.to_string()));
        }
        result
    }

    fn begin(&self, mode: AuthMode) -> AppResult<Submitting> {
        let mut view = self.lock_view();
        if view.submitting {
            return Err(AppError::InFlight("Authentication"));
        }
        view.mode = mode;
        view.notice = None;
        view.submitting = true;
        Ok(Submitting(self.view.clone()))
    }

    async fn sign_in(&self, form: &AuthForm) -> AppResult<AuthOutcome> {
        let credentials = validate(form)?;
        let session = self.sessions.sign_in(&credentials).await?;
        ensure_profile(self.profiles.as_ref(), &session).await;
        Ok(AuthOutcome::Navigate)
    }

    async fn sign_up(&self, form: &AuthForm) -> AppResult<AuthOutcome> {
        let credentials = validate(form)?;
        let full_name = form
            .full_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        match self.sessions.sign_up(&credentials, full_name.clone()).await? {
            SignUpOutcome::Active(session) => {
                sync_profile(self.profiles.as_ref(), &session, &credentials.email, full_name)
                    .await;
                Ok(AuthOutcome::Navigate)
            }
            SignUpOutcome::Pending(user) => {
                tracing::info!(user_id = %user.id, "Sign-up awaiting session, scheduling sign-in");
                self.lock_view().notice = Some(Notice::Success(SIGN_UP_PENDING.to_string()));
                Ok(AuthOutcome::Pending(self.schedule_sign_in(credentials, full_name)))
            }
        }
    }

    /// Exactly one delayed sign-in; failure leaves the success message in place
    fn schedule_sign_in(&self, credentials: Credentials, full_name: Option<String>) -> PendingSignUp {
        let sessions = self.sessions.clone();
        let profiles = self.profiles.clone();
        let view = self.view.clone();
        let delay = self.retry_delay;

        let retry = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            match sessions.sign_in(&credentials).await {
                Ok(session) => {
                    sync_profile(profiles.as_ref(), &session, &credentials.email, full_name).await;
                    view.lock().unwrap_or_else(PoisonError::into_inner).notice = None;
                    RetryOutcome::SignedIn
                }
                Err(e) => {
                    tracing::info!(error = %e, "Automatic sign-in after sign-up did not succeed");
                    view.lock().unwrap_or_else(PoisonError::into_inner).notice =
                        Some(Notice::Success(SIGN_UP_CONFIRM.to_string()));
                    RetryOutcome::AwaitingConfirmation
                }
            }
        });

        PendingSignUp { retry }
    }

    fn lock_view(&self) -> std::sync::MutexGuard<'_, AuthView> {
        self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn validate(form: &AuthForm) -> AppResult<Credentials> {
    let email = form.email.trim();
    if email.is_empty() {
        return Err(AppError::Validation("Email is required".to_string()));
    }
    if !email.contains('@') {
        return Err(AppError::Validation(
            "Email must be a valid address".to_string(),
        ));
    }
    if form.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(Credentials::new(email, form.password.clone()))
}

/// Upserts the profile for a new identity; failures are logged, never surfaced
async fn sync_profile(
    profiles: &dyn ProfileStore,
    session: &Session,
    email: &str,
    full_name: Option<String>,
) {
    let profile = Profile::new(session.user_id(), email, full_name);
    match profiles.upsert(session, &profile).await {
        Ok(()) => tracing::info!(user_id = %profile.id, "Profile synced"),
        Err(e) => {
            let e = AppError::ProfileSync(e.to_string());
            tracing::error!(user_id = %profile.id, error = %e, "Profile upsert failed");
        }
    }
}

/// Creates the profile on sign-in when none exists yet
async fn ensure_profile(profiles: &dyn ProfileStore, session: &Session) {
    match profiles.fetch(session).await {
        Ok(Some(profile)) => {
            tracing::debug!(user_id = %profile.id, "Profile found");
        }
        Ok(None) => {
            tracing::info!(user_id = %session.user_id(), "Profile not found, creating one");
            let profile = Profile::from_session(session);
            if let Err(e) = profiles.upsert(session, &profile).await {
                tracing::error!(user_id = %profile.id, error = %e, "Profile creation failed");
            }
        }
        Err(e) => {
            tracing::error!(user_id = %session.user_id(), error = %e, "Error fetching profile");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::{MockAuthService, MockProfileStore};
    use crate::services::session::tests::test_session;
    use std::collections::HashMap;
    use uuid::Uuid;

    const DELAY: Duration = Duration::from_millis(10);

    fn form(mode: AuthMode, email: &str, password: &str, full_name: Option<&str>) -> AuthForm {
        AuthForm {
            mode,
            email: email.to_string(),
            password: password.to_string(),
            full_name: full_name.map(str::to_string),
        }
    }

    fn flow(auth: MockAuthService, profiles: MockProfileStore) -> (AuthFlow, Arc<SessionStore>) {
        let sessions = Arc::new(SessionStore::new(Arc::new(auth)));
        (
            AuthFlow::new(sessions.clone(), Arc::new(profiles), DELAY),
            sessions,
        )
    }

    /// Profile store that keeps rows by id, as the real table does with on_conflict=id
    #[derive(Default)]
    struct TableProfiles {
        rows: Mutex<HashMap<Uuid, Profile>>,
        upserts: Mutex<usize>,
    }

    #[async_trait::async_trait]
    impl ProfileStore for TableProfiles {
        async fn fetch(&self, session: &Session) -> AppResult<Option<Profile>> {
            Ok(self.rows.lock().unwrap().get(&session.user_id()).cloned())
        }

        async fn upsert(&self, _session: &Session, profile: &Profile) -> AppResult<()> {
            *self.upserts.lock().unwrap() += 1;
            self.rows.lock().unwrap().insert(profile.id, profile.clone());
            Ok(())
        }
    }

    #[test]
    fn test_default_mode_is_sign_in() {
        let (flow, _) = flow(MockAuthService::new(), MockProfileStore::new());
        assert_eq!(flow.view().mode, AuthMode::SignIn);
    }

    #[test]
    fn test_validation() {
        assert!(validate(&form(AuthMode::SignIn, "", "secret1", None)).is_err());
        assert!(validate(&form(AuthMode::SignIn, "not-an-email", "secret1", None)).is_err());
        assert!(validate(&form(AuthMode::SignIn, "ana@example.com", "12345", None)).is_err());

        let credentials =
            validate(&form(AuthMode::SignIn, " ana@example.com ", "123456", None)).unwrap();
        assert_eq!(credentials.email, "ana@example.com");
    }

    #[tokio::test]
    async fn test_invalid_form_sends_nothing() {
        // No expectations: any call into the mocks would panic
        let (flow, _) = flow(MockAuthService::new(), MockProfileStore::new());

        let err = flow
            .submit(form(AuthMode::SignIn, "ana@example.com", "short", None))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert!(matches!(flow.view().notice, Some(Notice::Error(_))));
        assert!(!flow.view().submitting);
    }

    #[tokio::test]
    async fn test_toggle_clears_message() {
        let (flow, _) = flow(MockAuthService::new(), MockProfileStore::new());
        let _ = flow
            .submit(form(AuthMode::SignIn, "", "secret1", None))
            .await;
        assert!(flow.view().notice.is_some());

        flow.set_mode(AuthMode::SignUp);
        assert_eq!(flow.view().mode, AuthMode::SignUp);
        assert!(flow.view().notice.is_none());
    }

    #[tokio::test]
    async fn test_enter_with_session_navigates() {
        let mut auth = MockAuthService::new();
        auth.expect_sign_in()
            .returning(|_| Ok(test_session("ana@example.com")));
        let mut profiles = MockProfileStore::new();
        profiles.expect_fetch().returning(|session| {
            Ok(Some(Profile::from_session(session)))
        });

        let (flow, _) = flow(auth, profiles);
        assert!(matches!(flow.enter().await, AuthEntry::ShowForm(_)));

        flow.submit(form(AuthMode::SignIn, "ana@example.com", "secret1", None))
            .await
            .unwrap();
        assert_eq!(flow.enter().await, AuthEntry::Navigate);
    }

    #[tokio::test]
    async fn test_sign_in_with_existing_profile_skips_upsert() {
        let mut auth = MockAuthService::new();
        auth.expect_sign_in()
            .times(1)
            .returning(|_| Ok(test_session("ana@example.com")));
        let mut profiles = MockProfileStore::new();
        profiles
            .expect_fetch()
            .times(1)
            .returning(|session| Ok(Some(Profile::from_session(session))));
        profiles.expect_upsert().never();

        let (flow, sessions) = flow(auth, profiles);
        let outcome = flow
            .submit(form(AuthMode::SignIn, "ana@example.com", "secret1", None))
            .await
            .unwrap();

        assert!(matches!(outcome, AuthOutcome::Navigate));
        assert!(sessions.snapshot().is_some());
    }

    #[tokio::test]
    async fn test_sign_in_creates_missing_profile() {
        let mut auth = MockAuthService::new();
        auth.expect_sign_in()
            .returning(|_| Ok(test_session("ana@example.com")));
        let mut profiles = MockProfileStore::new();
        profiles.expect_fetch().returning(|_| Ok(None));
        profiles
            .expect_upsert()
            .withf(|session, profile| {
                profile.id == session.user_id() && profile.email == "ana@example.com"
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let (flow, _) = flow(auth, profiles);
        flow.submit(form(AuthMode::SignIn, "ana@example.com", "secret1", None))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_sign_in_profile_failure_does_not_block() {
        let mut auth = MockAuthService::new();
        auth.expect_sign_in()
            .returning(|_| Ok(test_session("ana@example.com")));
        let mut profiles = MockProfileStore::new();
        profiles
            .expect_fetch()
            .returning(|_| Err(AppError::ProfileSync("permission denied".to_string())));

        let (flow, _) = flow(auth, profiles);
        let outcome = flow
            .submit(form(AuthMode::SignIn, "ana@example.com", "secret1", None))
            .await
            .unwrap();
        assert!(matches!(outcome, AuthOutcome::Navigate));
    }

    #[tokio::test]
    async fn test_sign_in_rejection_surfaces_message() {
        let mut auth = MockAuthService::new();
        auth.expect_sign_in()
            .returning(|_| Err(AppError::Auth("Invalid login credentials".to_string())));

        let (flow, sessions) = flow(auth, MockProfileStore::new());
        let err = flow
            .submit(form(AuthMode::SignIn, "ana@example.com", "wrong-pass", None))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Auth(_)));
        assert_eq!(
            flow.view().notice,
            Some(Notice::Error("Invalid login credentials".to_string()))
        );
        assert!(sessions.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_sign_up_with_session_upserts_profile() {
        let mut auth = MockAuthService::new();
        auth.expect_sign_up()
            .withf(|credentials, full_name| {
                credentials.email == "ana@example.com" && full_name.as_deref() == Some("Ana Lima")
            })
            .returning(|_, _| Ok(SignUpOutcome::Active(test_session("ana@example.com"))));
        let mut profiles = MockProfileStore::new();
        profiles
            .expect_upsert()
            .withf(|_, profile| profile.full_name.as_deref() == Some("Ana Lima"))
            .times(1)
            .returning(|_, _| Ok(()));

        let (flow, sessions) = flow(auth, profiles);
        let outcome = flow
            .submit(form(
                AuthMode::SignUp,
                "ana@example.com",
                "secret1",
                Some("  Ana Lima "),
            ))
            .await
            .unwrap();

        assert!(matches!(outcome, AuthOutcome::Navigate));
        assert!(sessions.snapshot().is_some());
    }

    #[tokio::test]
    async fn test_sign_up_profile_failure_still_navigates() {
        let mut auth = MockAuthService::new();
        auth.expect_sign_up()
            .returning(|_, _| Ok(SignUpOutcome::Active(test_session("ana@example.com"))));
        let mut profiles = MockProfileStore::new();
        profiles
            .expect_upsert()
            .returning(|_, _| Err(AppError::ProfileSync("rls".to_string())));

        let (flow, _) = flow(auth, profiles);
        let outcome = flow
            .submit(form(AuthMode::SignUp, "ana@example.com", "secret1", None))
            .await
            .unwrap();
        assert!(matches!(outcome, AuthOutcome::Navigate));
        assert!(flow.view().notice.is_none());
    }

    #[tokio::test]
    async fn test_sign_up_already_registered() {
        let mut auth = MockAuthService::new();
        auth.expect_sign_up()
            .returning(|_, _| Err(AppError::Auth("User already registered".to_string())));
        let mut profiles = MockProfileStore::new();
        profiles.expect_upsert().never();

        let (flow, sessions) = flow(auth, profiles);
        let err = flow
            .submit(form(AuthMode::SignUp, "ana@example.com", "secret1", None))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Auth(ref msg) if msg == "User already registered"));
        assert!(sessions.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_pending_sign_up_then_auto_sign_in() {
        let session = test_session("ana@example.com");
        let user = session.user.clone();
        let mut auth = MockAuthService::new();
        auth.expect_sign_up()
            .times(1)
            .returning(move |_, _| Ok(SignUpOutcome::Pending(user.clone())));
        auth.expect_sign_in()
            .times(1)
            .returning(move |_| Ok(session.clone()));

        let profiles = Arc::new(TableProfiles::default());
        let sessions = Arc::new(SessionStore::new(Arc::new(auth)));
        let flow = AuthFlow::new(sessions.clone(), profiles.clone(), DELAY);

        let outcome = flow
            .submit(form(AuthMode::SignUp, "ana@example.com", "secret1", Some("Ana")))
            .await
            .unwrap();

        let AuthOutcome::Pending(pending) = outcome else {
            panic!("expected a pending sign-up");
        };
        assert_eq!(
            flow.view().notice,
            Some(Notice::Success(SIGN_UP_PENDING.to_string()))
        );
        assert!(sessions.snapshot().is_none());

        assert_eq!(pending.finish().await, RetryOutcome::SignedIn);
        assert!(sessions.snapshot().is_some());
        assert_eq!(flow.enter().await, AuthEntry::Navigate);
        assert_eq!(*profiles.upserts.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_pending_sign_up_retry_fails_quietly() {
        let user = test_session("ana@example.com").user;
        let mut auth = MockAuthService::new();
        auth.expect_sign_up()
            .returning(move |_, _| Ok(SignUpOutcome::Pending(user.clone())));
        auth.expect_sign_in()
            .times(1)
            .returning(|_| Err(AppError::Auth("Email not confirmed".to_string())));
        let mut profiles = MockProfileStore::new();
        profiles.expect_upsert().never();

        let (flow, sessions) = flow(auth, profiles);
        let AuthOutcome::Pending(pending) = flow
            .submit(form(AuthMode::SignUp, "ana@example.com", "secret1", None))
            .await
            .unwrap()
        else {
            panic!("expected a pending sign-up");
        };

        assert_eq!(pending.finish().await, RetryOutcome::AwaitingConfirmation);
        assert_eq!(
            flow.view().notice,
            Some(Notice::Success(SIGN_UP_CONFIRM.to_string()))
        );
        assert!(sessions.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_upsert_twice_keeps_one_row() {
        let profiles = TableProfiles::default();
        let session = test_session("ana@example.com");

        sync_profile(&profiles, &session, "ana@example.com", Some("Ana".to_string())).await;
        sync_profile(&profiles, &session, "ana@example.com", Some("Ana Lima".to_string())).await;

        let rows = profiles.rows.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows.get(&session.user_id()).unwrap().full_name.as_deref(),
            Some("Ana Lima")
        );
    }

    #[tokio::test]
    async fn test_second_submission_rejected_while_in_flight() {
        let (flow, _) = flow(MockAuthService::new(), MockProfileStore::new());
        let held = flow.begin(AuthMode::SignUp).unwrap();
        assert!(flow.view().submitting);
        let pending = Some(Notice::Success(SIGN_UP_PENDING.to_string()));
        flow.lock_view().notice = pending.clone();

        let err = flow
            .submit(form(AuthMode::SignIn, "ana@example.com", "secret1", None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InFlight(_)));
        // The running submission keeps its mode and notice
        assert_eq!(flow.view().notice, pending);
        assert_eq!(flow.view().mode, AuthMode::SignUp);

        drop(held);
        assert!(!flow.view().submitting);
    }
}

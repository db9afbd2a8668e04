use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Form, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    models::Session,
    services::{AuthEntry, AuthForm, AuthMode, AuthOutcome, GuardDecision},
};

use super::AppState;

/// Extra time given to a scheduled sign-in before the auth page moves on to `/vibe`
const SIGN_IN_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    #[serde(default)]
    pub mode: Option<AuthMode>,
}

#[derive(Debug, Deserialize)]
pub struct MoodForm {
    #[serde(default)]
    pub mood: String,
}

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

pub async fn about(State(state): State<AppState>) -> AppResult<Html<String>> {
    let session = match state.sessions.current_session().await {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(error = %e, "Could not determine session for header");
            state.sessions.snapshot()
        }
    };
    Ok(Html(state.renderer.about(session.as_ref())?))
}

pub async fn login_page(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
) -> AppResult<Response> {
    if let Some(mode) = query.mode {
        state.auth.set_mode(mode);
    }

    match state.auth.enter().await {
        AuthEntry::Navigate => Ok(Redirect::to("/vibe").into_response()),
        AuthEntry::ShowForm(view) => Ok(Html(state.renderer.login(&view, None)?).into_response()),
    }
}

pub async fn login_submit(
    State(state): State<AppState>,
    Form(form): Form<AuthForm>,
) -> AppResult<Response> {
    match state.auth.submit(form).await {
        Ok(AuthOutcome::Navigate) => Ok(Redirect::to("/vibe").into_response()),
        Ok(AuthOutcome::Pending(_)) => {
            // Dropping the handle detaches the scheduled sign-in; it keeps running
            let refresh_after = state.sign_in_delay + SIGN_IN_GRACE;
            let html = state.renderer.login(&state.auth.view(), Some(refresh_after))?;
            Ok(Html(html).into_response())
        }
        Err(e) => {
            let html = state.renderer.login(&state.auth.view(), None)?;
            Ok((e.status_code(), Html(html)).into_response())
        }
    }
}

pub async fn logout(State(state): State<AppState>) -> Redirect {
    if let Err(e) = state.sessions.sign_out().await {
        tracing::warn!(error = %e, "Remote sign-out failed; local session cleared");
    }
    Redirect::to("/")
}

pub async fn vibe_page(State(state): State<AppState>) -> AppResult<Response> {
    let session = match guard(&state)? {
        Gate::Open(session) => session,
        Gate::Closed(response) => return Ok(response),
    };

    let html = state
        .renderer
        .vibe(&session, "", &state.vibe.snapshot())?;
    Ok(Html(html).into_response())
}

pub async fn vibe_submit(
    State(state): State<AppState>,
    Form(form): Form<MoodForm>,
) -> AppResult<Response> {
    let session = match guard(&state)? {
        Gate::Open(session) => session,
        Gate::Closed(response) => return Ok(response),
    };

    let (search, status) = match state.vibe.submit(&form.mood).await {
        Ok(search) => (search, StatusCode::OK),
        // Blank input is ignored; the page stays as it was
        Err(AppError::Validation(_)) => (state.vibe.snapshot(), StatusCode::OK),
        Err(e) => (state.vibe.snapshot(), e.status_code()),
    };

    let html = state.renderer.vibe(&session, &form.mood, &search)?;
    Ok((status, Html(html)).into_response())
}

/// Unknown paths go back to the landing page
pub async fn fallback() -> Redirect {
    Redirect::to("/")
}

enum Gate {
    Open(Session),
    Closed(Response),
}

/// Applies the route guard in front of the vibe page
fn guard(state: &AppState) -> AppResult<Gate> {
    match state.guard.decide() {
        GuardDecision::Render(session) => Ok(Gate::Open(session)),
        GuardDecision::RedirectToAuth => Ok(Gate::Closed(Redirect::to("/login").into_response())),
        GuardDecision::Loading => Ok(Gate::Closed(
            Html(state.renderer.loading()?).into_response(),
        )),
    }
}

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use super::handlers;
use super::AppState;
use crate::middleware::{make_span_with_request_id, request_id_middleware};

/// Creates the shell router with all pages
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/", get(handlers::about))
        // Auth
        .route("/login", get(handlers::login_page).post(handlers::login_submit))
        .route("/logout", post(handlers::logout))
        // Guarded
        .route("/vibe", get(handlers::vibe_page).post(handlers::vibe_submit))
        .fallback(handlers::fallback)
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        // Outermost, so the trace span already sees the request ID
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

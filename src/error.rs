use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Client-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    /// Malformed local input; no request was sent
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The auth service rejected credentials or a sign-up; carries its message verbatim
    #[error("{0}")]
    Auth(String),

    /// Profile upsert/fetch failed after a successful authentication
    #[error("Profile sync failed: {0}")]
    ProfileSync(String),

    /// An external service could not be reached
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("External API error: {0}")]
    ExternalApi(String),

    /// A submission of the same kind is already in flight
    #[error("{0} already in progress")]
    InFlight(&'static str),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Maps a failed `send()` to `ServiceUnavailable`
    pub fn unreachable(err: reqwest::Error) -> Self {
        AppError::ServiceUnavailable(err.to_string())
    }

    /// True when the failure was a transport problem rather than a rejection
    pub fn is_transport(&self) -> bool {
        matches!(self, AppError::ServiceUnavailable(_) | AppError::HttpClient(_))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::InFlight(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::HttpClient(_) | AppError::ExternalApi(_) => StatusCode::BAD_GATEWAY,
            AppError::ProfileSync(_)
            | AppError::Template(_)
            | AppError::Config(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

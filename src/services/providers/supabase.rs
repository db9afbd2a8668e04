/// Supabase provider
///
/// Implements authentication against the GoTrue REST API and profile storage against
/// the PostgREST `profiles` table of the same project. Both share one base URL and the
/// project's anon key.
///
/// API Flow:
/// 1. Sign-up: /auth/v1/signup → token response, or a bare user when confirmation is pending
/// 2. Sign-in / refresh: /auth/v1/token?grant_type=... → token response
/// 3. Profiles: /rest/v1/profiles (upsert with on_conflict=id)
use crate::{
    error::{AppError, AppResult},
    models::{Credentials, Profile, Session, SignUpOutcome, User},
    services::providers::{AuthService, ProfileStore},
};
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client as HttpClient, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;

const PROFILES_TABLE: &str = "profiles";

#[derive(Clone)]
pub struct SupabaseClient {
    http_client: HttpClient,
    api_url: String,
    api_key: String,
}

/// GoTrue token response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: User,
}

impl From<TokenResponse> for Session {
    fn from(token: TokenResponse) -> Self {
        let expires_at = token
            .expires_at
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .unwrap_or_else(|| Utc::now() + Duration::seconds(token.expires_in.unwrap_or(3600)));

        Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at,
            user: token.user,
        }
    }
}

/// Sign-up answers with a session when confirmation is disabled, otherwise with the user
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    User(User),
}

/// Error bodies differ between GoTrue versions and PostgREST
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ApiErrorBody {
    fn into_message(self) -> Option<String> {
        self.msg
            .or(self.error_description)
            .or(self.message)
            .or(self.error)
    }
}

impl SupabaseClient {
    pub fn new(api_url: String, api_key: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn auth_url(&self, endpoint: &str) -> String {
        format!("{}/auth/v1/{}", self.api_url, endpoint)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.api_url, table)
    }

    /// Attaches the project key and the bearer token (anon key when signed out)
    fn authorized(&self, request: RequestBuilder, access_token: Option<&str>) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(access_token.unwrap_or(&self.api_key))
    }

    /// Reads the service's own message out of a failed response
    async fn error_message(response: Response) -> String {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        serde_json::from_str::<ApiErrorBody>(&body)
            .ok()
            .and_then(ApiErrorBody::into_message)
            .unwrap_or_else(|| format!("Supabase returned status {}: {}", status, body))
    }

    /// Client errors are rejections to show the user; anything else is a service fault
    async fn auth_failure(response: Response) -> AppError {
        let status = response.status();
        let message = Self::error_message(response).await;
        if status.is_client_error() {
            AppError::Auth(message)
        } else {
            AppError::ExternalApi(message)
        }
    }

    async fn request_token(&self, grant_type: &str, body: serde_json::Value) -> AppResult<Session> {
        let response = self
            .authorized(self.http_client.post(self.auth_url("token")), None)
            .query(&[("grant_type", grant_type)])
            .json(&body)
            .send()
            .await
            .map_err(AppError::unreachable)?;

        if !response.status().is_success() {
            return Err(Self::auth_failure(response).await);
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.into())
    }
}

#[async_trait::async_trait]
impl AuthService for SupabaseClient {
    async fn sign_up(
        &self,
        credentials: &Credentials,
        full_name: Option<String>,
    ) -> AppResult<SignUpOutcome> {
        let response = self
            .authorized(self.http_client.post(self.auth_url("signup")), None)
            .json(&json!({
                "email": credentials.email,
                "password": credentials.password,
                "data": { "full_name": full_name.unwrap_or_default() },
            }))
            .send()
            .await
            .map_err(AppError::unreachable)?;

        if !response.status().is_success() {
            return Err(Self::auth_failure(response).await);
        }

        let outcome = match response.json::<SignUpResponse>().await? {
            SignUpResponse::Session(token) => SignUpOutcome::Active(token.into()),
            SignUpResponse::User(user) => SignUpOutcome::Pending(user),
        };

        tracing::info!(
            email = %credentials.email,
            session_issued = matches!(outcome, SignUpOutcome::Active(_)),
            provider = "supabase",
            "Sign-up accepted"
        );

        Ok(outcome)
    }

    async fn sign_in(&self, credentials: &Credentials) -> AppResult<Session> {
        let session = self
            .request_token(
                "password",
                json!({ "email": credentials.email, "password": credentials.password }),
            )
            .await?;

        tracing::info!(
            user_id = %session.user_id(),
            provider = "supabase",
            "Signed in"
        );

        Ok(session)
    }

    async fn refresh(&self, refresh_token: &str) -> AppResult<Session> {
        self.request_token("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
    }

    async fn sign_out(&self, access_token: &str) -> AppResult<()> {
        let response = self
            .authorized(self.http_client.post(self.auth_url("logout")), Some(access_token))
            .send()
            .await
            .map_err(AppError::unreachable)?;

        if !response.status().is_success() {
            return Err(Self::auth_failure(response).await);
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl ProfileStore for SupabaseClient {
    async fn fetch(&self, session: &Session) -> AppResult<Option<Profile>> {
        let id_filter = format!("eq.{}", session.user_id());
        let response = self
            .authorized(
                self.http_client.get(self.table_url(PROFILES_TABLE)),
                Some(&session.access_token),
            )
            .query(&[("id", id_filter.as_str()), ("select", "*")])
            .send()
            .await
            .map_err(AppError::unreachable)?;

        if !response.status().is_success() {
            return Err(AppError::ProfileSync(Self::error_message(response).await));
        }

        let mut rows: Vec<Profile> = response.json().await?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.swap_remove(0))
        })
    }

    async fn upsert(&self, session: &Session, profile: &Profile) -> AppResult<()> {
        let response = self
            .authorized(
                self.http_client.post(self.table_url(PROFILES_TABLE)),
                Some(&session.access_token),
            )
            .query(&[("on_conflict", "id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&[profile])
            .send()
            .await
            .map_err(AppError::unreachable)?;

        if !response.status().is_success() {
            return Err(AppError::ProfileSync(Self::error_message(response).await));
        }

        tracing::debug!(user_id = %profile.id, "Profile upserted");
        Ok(())
    }
}

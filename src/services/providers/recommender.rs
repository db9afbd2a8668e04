/// Recommendation backend provider
///
/// Posts the mood to `/recommend` and normalizes the reply into a `RecommendationResult`
/// before anything else sees it.
use crate::{
    error::{AppError, AppResult},
    models::{ApiRecommendation, MoodRequest, RecommendationResult},
    services::providers::RecommendationBackend,
};
use reqwest::Client as HttpClient;

#[derive(Clone)]
pub struct HttpRecommender {
    http_client: HttpClient,
    api_url: String,
}

impl HttpRecommender {
    pub fn new(api_url: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait::async_trait]
impl RecommendationBackend for HttpRecommender {
    async fn recommend(&self, mood: &str) -> AppResult<RecommendationResult> {
        let url = format!("{}/recommend", self.api_url);

        let response = self
            .http_client
            .post(&url)
            .json(&MoodRequest { mood })
            .send()
            .await
            .map_err(AppError::unreachable)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Recommendation backend returned status {}: {}",
                status, body
            )));
        }

        let response_text = response.text().await?;
        tracing::debug!(response = %response_text, "Raw recommendation response");

        let api: ApiRecommendation = serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(
                error = %e,
                response = %response_text,
                "Failed to deserialize recommendation response"
            );
            AppError::ExternalApi(format!("Failed to parse recommendation response: {}", e))
        })?;

        let result = RecommendationResult::try_from(api)?;

        tracing::info!(
            movies = result.movies.len(),
            match_type = ?result.match_type,
            generated_new = result.generated_new,
            "Recommendations fetched"
        );

        Ok(result)
    }
}

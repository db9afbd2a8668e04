use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

pub mod profile;
pub mod session;

pub use profile::Profile;
pub use session::{Credentials, Session, SessionEvent, SignUpOutcome, User};

/// Markers of stock placeholder artwork; such posters render as a text card
pub const PLACEHOLDER_MARKERS: [&str; 2] = ["via.placeholder", "placehold.co"];

/// A non-empty free-text mood description for one search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoodQuery(String);

impl MoodQuery {
    /// Rejects empty or whitespace-only input; the text is otherwise sent as typed
    pub fn parse(input: &str) -> AppResult<Self> {
        if input.trim().is_empty() {
            return Err(AppError::Validation(
                "Mood query cannot be empty".to_string(),
            ));
        }
        Ok(Self(input.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// How closely the returned movies matched the mood
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Exact,
    Related,
    None,
}

impl MatchType {
    fn from_wire(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "exact" => Some(MatchType::Exact),
            "related" => Some(MatchType::Related),
            "none" => Some(MatchType::None),
            _ => None,
        }
    }
}

/// A movie as rendered by the client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Movie {
    pub title: String,
    pub description: String,
    pub mood_tags: Vec<String>,
    pub poster_url: Option<String>,
    /// Streaming provider label (e.g. "Netflix")
    pub ott: Option<String>,
}

impl Movie {
    /// True when the poster can be shown as an image
    pub fn has_valid_poster(&self) -> bool {
        match self.poster_url.as_deref() {
            Some(url) => {
                url.starts_with("http")
                    && !PLACEHOLDER_MARKERS.iter().any(|marker| url.contains(marker))
            }
            None => false,
        }
    }
}

/// The outcome of one recommendation request
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecommendationResult {
    pub movies: Vec<Movie>,
    /// `None` when the backend did not classify the result
    pub match_type: Option<MatchType>,
    pub generated_new: bool,
    pub target_genre: Option<String>,
}

/// Request body sent to the recommendation backend
#[derive(Debug, Serialize)]
pub struct MoodRequest<'a> {
    pub mood: &'a str,
}

// ============================================================================
// Recommendation backend wire types
// ============================================================================

/// Movie object as returned by the backend; tag and poster fields vary by source
#[derive(Debug, Clone, Deserialize)]
pub struct ApiMovie {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub mood_tags: Option<Vec<String>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub poster_url: Option<String>,
    #[serde(default, rename = "imageUrl")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub ott: Option<String>,
}

impl From<ApiMovie> for Movie {
    fn from(api: ApiMovie) -> Self {
        let poster_url = api
            .poster_url
            .or(api.image_url)
            .filter(|url| !url.trim().is_empty());

        Movie {
            title: api.title.unwrap_or_default(),
            description: api.description.unwrap_or_default(),
            mood_tags: api.mood_tags.or(api.tags).unwrap_or_default(),
            poster_url,
            ott: api.ott.filter(|ott| !ott.trim().is_empty()),
        }
    }
}

/// Raw `/recommend` response body
#[derive(Debug, Clone, Deserialize)]
pub struct ApiRecommendation {
    #[serde(default)]
    pub movies: Option<Vec<ApiMovie>>,
    #[serde(default)]
    pub match_type: Option<String>,
    #[serde(default)]
    pub generated_new: Option<bool>,
    #[serde(default)]
    pub target_genre: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl TryFrom<ApiRecommendation> for RecommendationResult {
    type Error = AppError;

    fn try_from(api: ApiRecommendation) -> AppResult<Self> {
        if let Some(error) = api.error {
            return Err(AppError::ExternalApi(format!(
                "Recommendation backend reported: {}",
                error
            )));
        }

        let match_type = api.match_type.as_deref().and_then(|value| {
            let parsed = MatchType::from_wire(value);
            if parsed.is_none() {
                tracing::debug!(match_type = %value, "Unrecognized match type");
            }
            parsed
        });

        Ok(RecommendationResult {
            movies: api
                .movies
                .unwrap_or_default()
                .into_iter()
                .map(Movie::from)
                .collect(),
            match_type,
            generated_new: api.generated_new.unwrap_or(false),
            target_genre: api.target_genre.filter(|genre| !genre.trim().is_empty()),
        })
    }
}

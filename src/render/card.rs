use serde::Serialize;

use crate::models::Movie;

/// Tags shown per card
pub const MAX_TAGS: usize = 3;

/// Display-ready view of one movie
///
/// The poster decision is made per card: a missing, non-http or placeholder URL leaves
/// `poster` empty and the card renders its text fallback.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CardView {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub poster: Option<String>,
    pub ott: Option<String>,
}

impl From<&Movie> for CardView {
    fn from(movie: &Movie) -> Self {
        let poster = if movie.has_valid_poster() {
            movie.poster_url.clone()
        } else {
            None
        };

        Self {
            title: movie.title.clone(),
            description: movie.description.clone(),
            tags: movie.mood_tags.iter().take(MAX_TAGS).cloned().collect(),
            poster,
            ott: movie
                .ott
                .as_deref()
                .map(str::trim)
                .filter(|ott| !ott.is_empty())
                .map(str::to_string),
        }
    }
}

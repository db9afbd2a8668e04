use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use crate::{
    error::{AppError, AppResult},
    models::{MatchType, MoodQuery, Movie, RecommendationResult, SessionEvent},
    services::{
        providers::RecommendationBackend,
        session::{SessionStore, Subscription},
    },
};

pub const FAILURE_NOTICE: &str = "Failed to fetch recommendations. Ensure backend is running.";

/// Which banner (if any) accompanies the results
///
/// Exactly one mode applies to any search state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresentationMode {
    /// The backend generated new movies for a genre it had none of
    Generated { genre: Option<String> },
    /// No exact match; the results are related movies
    Related,
    /// Nothing found; render the empty state only
    Empty,
    /// Plain results, no banner
    Results,
}

/// Transient state of the vibe page
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchState {
    pub movies: Vec<Movie>,
    pub match_type: Option<MatchType>,
    pub generated_new: bool,
    pub target_genre: Option<String>,
    pub loading: bool,
    /// User-visible notice after a failed request
    pub failure: Option<String>,
}

impl SearchState {
    fn loading() -> Self {
        Self {
            loading: true,
            ..Default::default()
        }
    }

    fn apply(&mut self, result: RecommendationResult) {
        self.movies = result.movies;
        self.match_type = result.match_type;
        self.generated_new = result.generated_new;
        self.target_genre = result.target_genre;
        self.loading = false;
        self.failure = None;
    }

    fn fail(&mut self) {
        *self = Self {
            failure: Some(FAILURE_NOTICE.to_string()),
            ..Default::default()
        };
    }

    /// Picks the presentation mode, in priority order
    pub fn mode(&self) -> PresentationMode {
        if self.generated_new {
            PresentationMode::Generated {
                genre: self.target_genre.clone(),
            }
        } else if self.match_type == Some(MatchType::Related) {
            PresentationMode::Related
        } else if self.match_type == Some(MatchType::None) && !self.loading {
            PresentationMode::Empty
        } else {
            PresentationMode::Results
        }
    }

    /// Movies to render as cards; the empty state renders none
    pub fn visible_movies(&self) -> &[Movie] {
        match self.mode() {
            PresentationMode::Empty => &[],
            _ => &self.movies,
        }
    }
}

/// Latest search plus a counter bumped whenever a search starts or results are discarded
#[derive(Default)]
struct Tracked {
    search: SearchState,
    generation: u64,
}

/// Mood search against the recommendation backend
///
/// Holds the result of the latest search only. At most one request is in flight.
pub struct VibeSearch {
    backend: Arc<dyn RecommendationBackend>,
    state: Arc<RwLock<Tracked>>,
    _subscription: Option<Subscription>,
}

/// An in-flight search; dropped before `finish`, it ends the search as failed
struct Pending<'a> {
    state: &'a RwLock<Tracked>,
    generation: u64,
    armed: bool,
}

impl Pending<'_> {
    fn finish(mut self, outcome: AppResult<RecommendationResult>) -> SearchState {
        self.armed = false;

        let mut tracked = write_tracked(self.state);
        if tracked.generation != self.generation {
            tracing::debug!("Discarding results of a superseded search");
            return tracked.search.clone();
        }

        match outcome {
            Ok(result) => {
                tracked.search.apply(result);
                tracing::info!(
                    movies = tracked.search.movies.len(),
                    mode = ?tracked.search.mode(),
                    "Vibe search completed"
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "Error fetching movies");
                tracked.search.fail();
            }
        }
        tracked.search.clone()
    }
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut tracked = write_tracked(self.state);
        if tracked.generation == self.generation && tracked.search.loading {
            tracing::warn!("Vibe search abandoned before the backend answered");
            tracked.search.fail();
        }
    }
}

impl VibeSearch {
    pub fn new(backend: Arc<dyn RecommendationBackend>) -> Self {
        Self {
            backend,
            state: Arc::new(RwLock::new(Tracked::default())),
            _subscription: None,
        }
    }

    /// Like [`VibeSearch::new`], but results are dropped whenever `sessions` signs out
    pub fn attach(backend: Arc<dyn RecommendationBackend>, sessions: &SessionStore) -> Self {
        let mut search = Self::new(backend);
        let state = search.state.clone();

        search._subscription = Some(sessions.subscribe(move |event, _| {
            if event == SessionEvent::SignedOut {
                let mut tracked = write_tracked(&state);
                tracked.generation += 1;
                tracked.search = SearchState::default();
                tracing::debug!("Vibe search cleared on sign-out");
            }
        }));
        search
    }

    pub fn snapshot(&self) -> SearchState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .search
            .clone()
    }

    /// Submits `mood` and returns the resulting state
    ///
    /// Blank input and re-submission while loading are rejected without a request.
    /// Backend failures are not errors here: they land in `SearchState::failure`.
    pub async fn submit(&self, mood: &str) -> AppResult<SearchState> {
        let query = MoodQuery::parse(mood)?;

        let generation = {
            let mut tracked = write_tracked(&self.state);
            if tracked.search.loading {
                return Err(AppError::InFlight("Search"));
            }
            // Stale results never coexist with the new request
            tracked.generation += 1;
            tracked.search = SearchState::loading();
            tracked.generation
        };
        let pending = Pending {
            state: &self.state,
            generation,
            armed: true,
        };

        tracing::info!(mood = %query.as_str(), "Searching by vibe");
        let outcome = self.backend.recommend(query.as_str()).await;
        Ok(pending.finish(outcome))
    }
}

fn write_tracked(state: &RwLock<Tracked>) -> RwLockWriteGuard<'_, Tracked> {
    state.write().unwrap_or_else(PoisonError::into_inner)
}

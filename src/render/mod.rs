/// Server-side HTML rendering
///
/// Templates are compiled into the binary and auto-escaped, so every piece of user or
/// backend text reaches the page escaped.
use std::time::Duration;

use minijinja::{context, Environment, Value};
use serde::Serialize;

use crate::{
    error::AppResult,
    models::Session,
    services::{
        auth::{AuthMode, AuthView, Notice, MIN_PASSWORD_LEN},
        vibe::{PresentationMode, SearchState},
    },
};

mod card;

pub use card::{CardView, MAX_TAGS};

const TEMPLATES: &[(&str, &str)] = &[
    ("layout.html", include_str!("../../templates/layout.html")),
    ("about.html", include_str!("../../templates/about.html")),
    ("login.html", include_str!("../../templates/login.html")),
    ("loading.html", include_str!("../../templates/loading.html")),
    ("card.html", include_str!("../../templates/card.html")),
    ("vibe.html", include_str!("../../templates/vibe.html")),
];

#[derive(Serialize)]
struct Feature {
    title: &'static str,
    description: &'static str,
}

const FEATURES: [Feature; 3] = [
    Feature {
        title: "AI-Powered Vibe Matching",
        description: "We don't just match keywords. Whether you want 'sad but hopeful' or \
                      'mind-bending sci-fi', the nuance of your request is what gets matched.",
    },
    Feature {
        title: "Infinite Database",
        description: "When a genre is missing, new movies are found on the fly and saved, \
                      so the collection grows every time you search.",
    },
    Feature {
        title: "Curated for You",
        description: "Built for movie lovers who hate algorithms that only suggest what's \
                      popular. Find the hidden gems that match how you feel.",
    },
];

#[derive(Serialize)]
struct NoticeView<'a> {
    kind: &'static str,
    text: &'a str,
}

impl<'a> From<&'a Notice> for NoticeView<'a> {
    fn from(notice: &'a Notice) -> Self {
        match notice {
            Notice::Success(text) => Self {
                kind: "success",
                text,
            },
            Notice::Error(text) => Self {
                kind: "error",
                text,
            },
        }
    }
}

pub struct Renderer {
    env: Environment<'static>,
}

impl Renderer {
    pub fn new() -> AppResult<Self> {
        let mut env = Environment::new();
        for &(name, source) in TEMPLATES {
            env.add_template(name, source)?;
        }
        Ok(Self { env })
    }

    pub fn about(&self, session: Option<&Session>) -> AppResult<String> {
        self.render(
            "about.html",
            context! {
                features => FEATURES,
                ..chrome(session)
            },
        )
    }

    /// Auth form; `refresh_after` sends the browser on to `/vibe` once a scheduled
    /// sign-in has had time to finish
    pub fn login(&self, view: &AuthView, refresh_after: Option<Duration>) -> AppResult<String> {
        let refresh_secs = refresh_after.map(|delay| delay.as_millis().div_ceil(1000).max(1) as u64);
        self.render(
            "login.html",
            context! {
                sign_up => view.mode == AuthMode::SignUp,
                notice => view.notice.as_ref().map(NoticeView::from),
                submitting => view.submitting,
                min_password_len => MIN_PASSWORD_LEN,
                refresh_secs => refresh_secs,
                ..chrome(None)
            },
        )
    }

    /// Placeholder while the session is still being determined
    pub fn loading(&self) -> AppResult<String> {
        self.render("loading.html", chrome(None))
    }

    pub fn vibe(&self, session: &Session, mood: &str, state: &SearchState) -> AppResult<String> {
        let (banner, genre) = match state.mode() {
            PresentationMode::Generated { genre } => ("generated", genre),
            PresentationMode::Related => ("related", None),
            PresentationMode::Empty => ("empty", None),
            PresentationMode::Results => ("none", None),
        };
        let cards: Vec<CardView> = state.visible_movies().iter().map(CardView::from).collect();

        self.render(
            "vibe.html",
            context! {
                mood => mood,
                loading => state.loading,
                failure => &state.failure,
                banner => banner,
                genre => genre,
                cards => cards,
                ..chrome(Some(session))
            },
        )
    }

    fn render(&self, name: &str, ctx: Value) -> AppResult<String> {
        Ok(self.env.get_template(name)?.render(ctx)?)
    }
}

/// Header context shared by every page
fn chrome(session: Option<&Session>) -> Value {
    let user_label = session.map(|session| {
        session
            .user
            .full_name()
            .or_else(|| session.email())
            .unwrap_or("Signed in")
            .to_string()
    });

    context! {
        signed_in => session.is_some(),
        user_label => user_label,
    }
}

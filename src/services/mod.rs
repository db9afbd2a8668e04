pub mod auth;
pub mod guard;
pub mod providers;
pub mod session;
pub mod vibe;

pub use auth::{AuthEntry, AuthFlow, AuthForm, AuthMode, AuthOutcome, AuthView, Notice};
pub use guard::{GuardDecision, GuardState, RouteGuard};
pub use session::{SessionStore, Subscription};
pub use vibe::{PresentationMode, SearchState, VibeSearch};

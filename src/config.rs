use std::time::Duration;

use serde::Deserialize;

use crate::error::{AppError, AppResult};

/// Client configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Base URL of the hosted auth/profile service (e.g. https://xyz.supabase.co)
    pub supabase_url: String,

    /// Public (anon) access key for the hosted service
    pub supabase_anon_key: String,

    /// Recommendation backend base URL
    #[serde(default = "default_recommender_url")]
    pub recommender_url: String,

    /// Shell listener host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Shell listener port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Delay before the one automatic sign-in after an unconfirmed sign-up
    #[serde(default = "default_auto_sign_in_delay_ms")]
    pub auto_sign_in_delay_ms: u64,
}

fn default_recommender_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5173
}

fn default_auto_sign_in_delay_ms() -> u64 {
    1500
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present)
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        Self::finish(envy::from_env::<Config>())
    }

    /// Load configuration from an explicit set of variables
    pub fn from_vars<I>(vars: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self::finish(envy::from_iter::<_, Config>(vars))
    }

    fn finish(parsed: Result<Config, envy::Error>) -> AppResult<Self> {
        let mut config =
            parsed.map_err(|e| AppError::Config(format!("Failed to load config: {}", e)))?;

        if config.supabase_url.trim().is_empty() {
            return Err(AppError::Config("SUPABASE_URL is empty".to_string()));
        }
        if config.supabase_anon_key.trim().is_empty() {
            return Err(AppError::Config("SUPABASE_ANON_KEY is empty".to_string()));
        }

        config.supabase_url = config.supabase_url.trim_end_matches('/').to_string();
        config.recommender_url = config.recommender_url.trim_end_matches('/').to_string();
        Ok(config)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn auto_sign_in_delay(&self) -> Duration {
        Duration::from_millis(self.auto_sign_in_delay_ms)
    }
}

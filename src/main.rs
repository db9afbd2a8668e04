use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cinevibe::{
    api::{create_router, AppState},
    config::Config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("cinevibe=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().map_err(|e| {
        tracing::error!(error = %e, "Missing or invalid configuration");
        e
    })?;

    // Initialize application state
    let state = AppState::from_config(&config)?;

    // The guard leaves `Unknown` once this resolves; until then /vibe shows a loading page
    let initial = state.clone();
    tokio::spawn(async move { initial.resolve_guard().await });

    let app = create_router(state);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    tracing::info!(%address, "CineVibe running on http://{}", address);

    axum::serve(listener, app).await?;
    Ok(())
}

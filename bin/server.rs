// Cookie Vote - Vote Server
// Serves the shared counter store over REST so every device votes into one tally

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use cookie_vote::server::{router, shutdown_signal, AppState};
use cookie_vote::{Config, SqliteCounterStore};

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load()?;

    info!(path = ?config.store_path, "Opening store database");
    let store = SqliteCounterStore::open(&config.store_path)?;

    let app = router(AppState {
        store: Arc::new(store),
    });

    let address = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind to {}", address))?;

    info!("Server running on http://{address}");
    info!("API: http://{address}/api/competitors");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

//! Lending core bootstrap
//!
//! Opens the configured database, applies migrations and logs a summary of
//! the collection. Interactive front ends link the library instead.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lending_core::{config::AppConfig, AppState, SystemClock};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("lending_core={},sqlx=warn", config.logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.json_logs() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting lending core v{}", env!("CARGO_PKG_VERSION"));

    let state = AppState::open(config, Arc::new(SystemClock)).await?;
    tracing::info!("Connected to database {}", state.config.database.url);

    let result = summarize(&state).await;

    // Connections are released whether or not the summary succeeded
    state.close().await;
    tracing::info!("Database closed");

    result
}

async fn summarize(state: &AppState) -> anyhow::Result<()> {
    let lending = state.lending();

    let counts = lending.counts().await?;
    tracing::info!(
        "{} copies available, {} borrowed",
        counts.available,
        counts.borrowed
    );

    for title in lending.list_available().await? {
        tracing::info!(
            id = title.id,
            count = title.count_available,
            "Available: '{}' by {} ({} pages)",
            title.title,
            title.author,
            title.pages
        );
    }

    for copy in lending.list_overdue().await? {
        tracing::warn!(
            id = copy.id,
            "Overdue: '{}' lent to {} was due {}",
            copy.title,
            copy.borrower,
            copy.due_at
        );
    }

    Ok(())
}

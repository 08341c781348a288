use std::sync::Arc;

use anyhow::Context;

use milkbot_bot::app::{build_app, SharedStore};
use milkbot_infra::config::Config;
use milkbot_infra::store::{InMemoryInventoryStore, PostgresInventoryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    milkbot_observability::init();

    let config = Config::from_env().context("invalid configuration")?;

    let store: SharedStore = match &config.database {
        Some(database) => {
            let store = PostgresInventoryStore::connect(database)
                .await
                .context("failed to connect to Postgres")?;
            store
                .ensure_schema()
                .await
                .context("failed to apply the inventory schema")?;
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory store (data is lost on exit)");
            Arc::new(InMemoryInventoryStore::new())
        }
    };

    let app = build_app(store, config.bot_token);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}

//! savium-ledger server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use savium_ledger::api;
use savium_ledger::app_state::AppState;
use savium_ledger::config::SaviumConfig;
use savium_ledger::service::{
    DepositIntentClient, HttpDepositIntentClient, HttpIdentityVerifier, IdentityVerifier,
};
use savium_ledger::store::{DocumentStore, MemoryStore, PostgresStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = SaviumConfig::from_env()?;
    tracing::info!(addr = %config.listen_addr, "starting savium-ledger");

    // Build store
    let store: Arc<dyn DocumentStore> = if config.persistence_enabled {
        let pg = PostgresStore::connect(&config.postgres_settings())
            .await
            .context("connecting to PostgreSQL")?;
        Arc::new(pg)
    } else {
        tracing::warn!("persistence disabled; using the in-memory store");
        Arc::new(MemoryStore::new())
    };

    // Build deposit backend client
    let deposit_client: Arc<dyn DepositIntentClient> = Arc::new(
        HttpDepositIntentClient::new(config.deposit_backend_url.clone())
            .context("building deposit backend client")?,
    );

    // Build identity verifier
    let identity: Arc<dyn IdentityVerifier> = Arc::new(
        HttpIdentityVerifier::new(
            config.identity_lookup_url.clone(),
            config.identity_api_key.clone(),
        )
        .context("building identity verifier")?,
    );

    // Build application
    let listen_addr = config.listen_addr;
    let backend = store.backend();
    let app = api::build_app(AppState::new(config, store, deposit_client, identity));

    // Start server
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("binding {listen_addr}"))?;
    tracing::info!(addr = %listen_addr, backend, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

//! archivist server binary.

use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt};

use archivist::config::ArchiveConfig;
use archivist::gateway::ArchiveGateway;
use archivist::server::{AppState, serve};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let config = ArchiveConfig::from_env()?;
    let gateway = ArchiveGateway::connect(&config).await;
    if !gateway.is_ready() {
        tracing::warn!("degraded mode: ingestion disabled, search answers with the offline notice");
    }

    let state = Arc::new(AppState {
        gateway,
        split: config.split,
    });
    serve(state, config.port).await?;
    Ok(())
}

//! Retrieva API Server
//!
//! HTTP API server for semantic code search with vector embeddings.

use retrieva_api::{bootstrap, routes};
use std::net::SocketAddr;
use tracing::info;

type MainResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> MainResult {
    retrieva_common::initialize_environment();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("starting retrieva-api server...");

    let config = bootstrap::load_config()?;
    info!(
        backend = ?config.storage.backend,
        port = config.api.port,
        "configuration loaded"
    );

    let state = bootstrap::initialize_app_state(&config).await?;
    let app = routes::create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.api.host, config.api.port).parse()?;

    bootstrap::write_discovery_file(&config)?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {addr}");
    axum::serve(listener, app).await?;

    Ok(())
}

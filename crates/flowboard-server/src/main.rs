//! Flowboard relay binary.

use flowboard_server::{AppState, ServerConfig, build_router};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flowboard_server=info,tower_http=info".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let state = Arc::new(AppState::load(&config).await);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("Flowboard relay listening on {}", listener.local_addr()?);
    info!("Board file: {}", config.board_path.display());

    axum::serve(listener, app).await?;
    Ok(())
}

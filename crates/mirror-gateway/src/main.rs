use std::net::SocketAddr;

use clap::Parser;
use mirror_gateway::{router, AppState, GatewayConfig};
use tokio::net::TcpListener;

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::parse();
    mirror_common::init_tracing_with_default(&config.log_level);
    config.validate()?;

    let state = AppState::new(config.limits());
    let app = router(state);

    let listener = TcpListener::bind(config.bind).await?;
    let bound_addr = listener.local_addr()?;
    tracing::info!("gateway listening on {}", bound_addr);
    tracing::info!("signaling url ws://{}/ws", bound_addr);
    tracing::info!("health check http://{}/health", bound_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

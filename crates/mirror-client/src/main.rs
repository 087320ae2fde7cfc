use anyhow::Context;
use clap::Parser;
use mirror_client::presence::{presence_channel, spawn_stdin_presence};
use mirror_client::{
    local_video_track, CallSession, ClientArgs, Orchestrator, SignalingClient, WebRtcLinkFactory,
};
use tokio::sync::mpsc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ClientArgs::parse();
    mirror_common::init_tracing_with_default(&args.log_level);
    let config = args.into_config();
    config.validate()?;

    let mut signaling = SignalingClient::connect(&config.server_url)
        .await
        .context("signaling connection failed")?;

    let factory = WebRtcLinkFactory::new(&config.ice_servers)?;
    let (link_tx, link_rx) = mpsc::unbounded_channel();
    let orchestrator = Orchestrator::new(
        factory,
        Some(local_video_track()),
        signaling.sender(),
        link_tx,
    )?;

    let (visibility_tx, mut visibility_rx) = mpsc::unbounded_channel();
    let session = CallSession::new(
        orchestrator,
        signaling.sender(),
        visibility_tx,
        config.retry,
    );

    let (presence_tx, presence_rx) = presence_channel();
    spawn_stdin_presence(presence_tx);
    info!("type 1 when present, 0 when absent");

    tokio::spawn(async move {
        while let Some(visible) = visibility_rx.recv().await {
            if visible {
                info!("remote video shown");
            } else {
                info!("remote video hidden");
            }
        }
    });

    let result = tokio::select! {
        result = session.run(&mut signaling, link_rx, presence_rx) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
            Ok(())
        }
    };
    signaling.close();
    result?;
    Ok(())
}

//! Live chat client entry point
//!
//! Run with:
//! ```bash
//! cargo run -p livechat-service -- <room id>:<channel id> [more rooms...]
//! ```
//!
//! Configuration is loaded from environment variables.

use livechat_common::{try_init_tracing_with_config, ClientConfig, TracingConfig};
use livechat_gateway::{GatewayRuntime, PusherCodec, WsConnector};
use livechat_service::{KickRoom, KickRouter, RoomRegistry};
use livechat_timeline::TimelineEvent;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = try_init_tracing_with_config(TracingConfig::for_environment(config.app.env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run(config).await {
        error!(error = %e, "Client failed");
        std::process::exit(1);
    }
}

async fn run(config: ClientConfig) -> anyhow::Result<()> {
    let rooms = std::env::args()
        .skip(1)
        .map(|arg| arg.parse::<KickRoom>())
        .collect::<Result<Vec<_>, _>>()?;
    if rooms.is_empty() {
        anyhow::bail!("usage: livechat <room id>:<channel id>...");
    }

    info!(
        env = ?config.app.env,
        backend = %config.gateway.backend,
        rooms = rooms.len(),
        "Configuration loaded"
    );

    let url = config.gateway.url.clone();
    let (gateway, task) = GatewayRuntime::spawn(config.gateway.clone(), PusherCodec::new(), |sink| {
        WsConnector::new(url, sink)
    });

    let registry = RoomRegistry::new(gateway.clone(), &config.timeline);
    registry.attach_router(KickRouter::new()).await?;

    for room in rooms {
        let timeline = registry.open_room_with(room.key(), room.topics()).await?;
        let topic = room.key();
        let mut events = timeline.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(TimelineEvent::Appended(message)) => {
                        info!(room = %topic, user = %message.login_name, "{}", message.content);
                    }
                    Ok(TimelineEvent::Replaced { replacement, .. }) if replacement.is_disabled() => {
                        info!(room = %topic, id = %replacement.id, "Message deleted");
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(room = %topic, skipped, "Timeline printer lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    gateway.shutdown().await?;
    task.await?;

    Ok(())
}

//! Test helpers for integration tests
//!
//! [`TestClient`] wires a gateway runtime to a [`MemoryNetwork`] and a room
//! registry, and exposes the backend side of every connection.

use std::time::Duration;

use anyhow::{Context, Result};
use livechat_common::{GatewayConfig, TimelineConfig};
use livechat_core::Topic;
use livechat_gateway::{
    ConnectionId, GatewayEvent, GatewayHandle, GatewayRuntime, MemoryNetwork, PusherCodec,
};
use livechat_service::{DispatchRouter, KickRoom, RoomRegistry};
use livechat_timeline::Timeline;
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;

/// How long to wait for an expected gateway event
const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Gateway, registry, and in-memory backend of one test
pub struct TestClient {
    pub network: MemoryNetwork,
    pub gateway: GatewayHandle,
    pub registry: RoomRegistry,
    task: JoinHandle<()>,
}

impl TestClient {
    /// Start with default configuration
    pub async fn start<R>(router: R) -> Result<Self>
    where
        R: DispatchRouter + 'static,
    {
        Self::start_with_config(GatewayConfig::default(), TimelineConfig::default(), router).await
    }

    /// Start with custom configuration
    pub async fn start_with_config<R>(
        gateway_config: GatewayConfig,
        timeline_config: TimelineConfig,
        router: R,
    ) -> Result<Self>
    where
        R: DispatchRouter + 'static,
    {
        let network = MemoryNetwork::new();
        let net = network.clone();
        let (gateway, task) =
            GatewayRuntime::spawn(gateway_config, PusherCodec::new(), |sink| {
                net.attached_connector(sink)
            });

        let registry = RoomRegistry::new(gateway.clone(), &timeline_config);
        registry.attach_router(router).await?;

        Ok(Self {
            network,
            gateway,
            registry,
            task,
        })
    }

    /// Open a room and wait until the subscription is queued
    pub async fn open_room(&self, topic: &str) -> Result<Arc<Timeline>> {
        let timeline = self.registry.open_room(Topic::new(topic)).await?;
        self.settle().await?;
        Ok(timeline)
    }

    /// Open a Kick room on all of its topics
    pub async fn open_kick_room(&self, room: KickRoom) -> Result<Arc<Timeline>> {
        let timeline = self.registry.open_room_with(room.key(), room.topics()).await?;
        self.settle().await?;
        Ok(timeline)
    }

    /// Wait until everything queued so far has been processed
    pub async fn settle(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.gateway
            .post(move || {
                let _ = tx.send(());
            })
            .await?;
        rx.await.context("mutator dropped the settle probe")
    }

    /// Complete the handshake of `connection`
    pub async fn open(&self, connection: ConnectionId) -> Result<()> {
        self.network.open(connection).await;
        self.settle().await
    }

    /// Deliver `frame` on `connection` and wait for it to be processed
    pub async fn backend_sends(&self, connection: ConnectionId, frame: String) -> Result<()> {
        self.network.deliver(connection, frame).await;
        self.settle().await
    }

    /// Drop `connection` from the backend side
    pub async fn drop_connection(&self, connection: ConnectionId) -> Result<()> {
        self.network
            .drop_connection(connection, Some("reset by peer".to_string()))
            .await;
        self.settle().await
    }

    /// Connection currently owning `topic`
    pub fn owner(&self, topic: &str) -> Option<ConnectionId> {
        self.gateway
            .assignments()
            .assignment(&Topic::new(topic))
            .map(|assignment| assignment.connection)
    }

    /// Stop the runtime and wait for it
    pub async fn shutdown(self) -> Result<()> {
        self.gateway.shutdown().await?;
        self.task.await?;
        Ok(())
    }
}

pub fn conn(id: u64) -> ConnectionId {
    ConnectionId::new(id)
}

/// Wait for the first event matching `wanted`
pub async fn wait_for_event(
    events: &mut broadcast::Receiver<GatewayEvent>,
    wanted: impl Fn(&GatewayEvent) -> bool,
) -> Result<GatewayEvent> {
    tokio::time::timeout(EVENT_TIMEOUT, next_matching(events, wanted))
        .await
        .context("timed out waiting for gateway event")?
}

async fn next_matching(
    events: &mut broadcast::Receiver<GatewayEvent>,
    wanted: impl Fn(&GatewayEvent) -> bool,
) -> Result<GatewayEvent> {
    loop {
        let event = events.recv().await?;
        if wanted(&event) {
            return Ok(event);
        }
    }
}

/// Drain every event already queued
pub fn drain_events(events: &mut broadcast::Receiver<GatewayEvent>) -> Vec<GatewayEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

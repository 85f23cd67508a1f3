//! Mutator context
//!
//! One tokio task owns the [`SubscriptionManager`] and processes a single
//! bounded queue carrying both commands and transport events, so everything
//! that touches the index happens in one total order.

mod handle;
mod queue;

pub use handle::GatewayHandle;
pub use queue::{Command, MutatorMessage};

use livechat_common::GatewayConfig;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::connection::SubscriptionManager;
use crate::protocol::FrameCodec;
use crate::transport::{Connector, EventSink};

/// Spawns the gateway's mutator task
pub struct GatewayRuntime;

impl GatewayRuntime {
    /// Start the mutator task
    ///
    /// `make_connector` receives the sink its connections must report to.
    pub fn spawn<C, K, F>(
        config: GatewayConfig,
        codec: C,
        make_connector: F,
    ) -> (GatewayHandle, JoinHandle<()>)
    where
        C: FrameCodec,
        K: Connector,
        F: FnOnce(EventSink) -> K,
    {
        let (tx, rx) = mpsc::channel(config.event_queue_capacity.max(1));
        let connector = make_connector(EventSink::new(tx.clone()));
        let backend = config.backend.clone();
        let manager = SubscriptionManager::new(config, codec, connector);

        let handle = GatewayHandle::new(
            tx,
            manager.event_sender(),
            manager.assignments(),
            manager.diag(),
        );

        tracing::info!(backend = %backend, "Gateway runtime starting");
        let task = tokio::spawn(run(manager, rx));

        (handle, task)
    }
}

fn heartbeat_timer(period: Duration) -> Interval {
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}

async fn run<C: FrameCodec, K: Connector>(
    mut manager: SubscriptionManager<C, K>,
    mut rx: mpsc::Receiver<MutatorMessage>,
) {
    let mut period = manager.check_interval();
    let mut heartbeat = heartbeat_timer(period);

    loop {
        tokio::select! {
            message = rx.recv() => {
                let now = Instant::now().into_std();
                match message {
                    Some(MutatorMessage::Transport(event)) => {
                        manager.handle_transport_event(event, now);
                    }
                    Some(MutatorMessage::Command(Command::Subscribe(topic))) => {
                        manager.subscribe(topic, now);
                    }
                    Some(MutatorMessage::Command(Command::Unsubscribe(topic))) => {
                        manager.unsubscribe(&topic);
                    }
                    Some(MutatorMessage::Command(Command::RegisterDataHandler(handler))) => {
                        manager.register_data_handler(handler);
                    }
                    Some(MutatorMessage::Command(Command::Post(task))) => task(),
                    Some(MutatorMessage::Command(Command::Shutdown)) | None => {
                        manager.shutdown();
                        break;
                    }
                }
            }
            _ = heartbeat.tick() => {
                manager.check_heartbeats(Instant::now().into_std());
            }
        }

        let next = manager.check_interval();
        if next != period {
            tracing::debug!(interval_ms = next.as_millis(), "Heartbeat interval changed");
            period = next;
            heartbeat = heartbeat_timer(period);
        }
    }

    tracing::info!("Gateway runtime stopped");
}

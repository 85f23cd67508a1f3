//! Gateway handle
//!
//! Cheap to clone; every call is forwarded to the mutator task.

use livechat_core::{SnapshotCell, Topic};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

use super::{Command, MutatorMessage};
use crate::connection::{AssignmentView, DataHandler, GatewayDiag, GatewayEvent};
use crate::error::{GatewayError, GatewayResult};

/// Handle to a running gateway
#[derive(Clone)]
pub struct GatewayHandle {
    tx: mpsc::Sender<MutatorMessage>,
    events: broadcast::Sender<GatewayEvent>,
    view: Arc<SnapshotCell<AssignmentView>>,
    diag: Arc<GatewayDiag>,
}

impl GatewayHandle {
    pub(crate) fn new(
        tx: mpsc::Sender<MutatorMessage>,
        events: broadcast::Sender<GatewayEvent>,
        view: Arc<SnapshotCell<AssignmentView>>,
        diag: Arc<GatewayDiag>,
    ) -> Self {
        Self {
            tx,
            events,
            view,
            diag,
        }
    }

    async fn submit(&self, command: Command) -> GatewayResult<()> {
        self.tx
            .send(MutatorMessage::Command(command))
            .await
            .map_err(|_| GatewayError::RuntimeClosed)
    }

    /// Subscribe to a topic (idempotent, never fails)
    pub async fn subscribe(&self, topic: Topic) {
        if self.submit(Command::Subscribe(topic.clone())).await.is_err() {
            tracing::warn!(topic = %topic, "Subscribe dropped, gateway is not running");
        }
    }

    /// Unsubscribe from a topic (fire-and-forget)
    pub async fn unsubscribe(&self, topic: Topic) {
        if self.submit(Command::Unsubscribe(topic.clone())).await.is_err() {
            tracing::warn!(topic = %topic, "Unsubscribe dropped, gateway is not running");
        }
    }

    /// Run `task` inside the mutator context
    pub async fn post<F>(&self, task: F) -> GatewayResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(Command::Post(Box::new(task))).await
    }

    /// Add a receiver for every decoded data frame
    pub async fn register_data_handler<H>(&self, handler: H) -> GatewayResult<()>
    where
        H: DataHandler + 'static,
    {
        self.submit(Command::RegisterDataHandler(Box::new(handler)))
            .await
    }

    pub fn events(&self) -> broadcast::Receiver<GatewayEvent> {
        self.events.subscribe()
    }

    /// Latest published topic placement
    pub fn assignments(&self) -> Arc<AssignmentView> {
        self.view.load()
    }

    pub fn diag(&self) -> Arc<GatewayDiag> {
        self.diag.clone()
    }

    /// Close every connection and stop the mutator task
    pub async fn shutdown(&self) -> GatewayResult<()> {
        self.submit(Command::Shutdown).await
    }
}

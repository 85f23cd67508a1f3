//! Physical connections
//!
//! A [`Connector`] dials connections on behalf of the subscription manager and
//! reports everything that happens on them as [`TransportEvent`]s through the
//! shared mutator queue.

mod memory;
mod websocket;

pub use memory::{Dial, MemoryConnector, MemoryNetwork};
pub use websocket::WsConnector;

use std::time::Duration;
use tokio::sync::mpsc;

use crate::connection::ConnectionId;
use crate::runtime::MutatorMessage;

/// Something that happened on a physical connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEvent {
    pub connection: ConnectionId,
    /// Dial attempt the event belongs to
    pub epoch: u64,
    pub kind: TransportEventKind,
}

/// Transport event payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEventKind {
    Opened,
    Frame(String),
    Closed { reason: Option<String> },
}

impl TransportEvent {
    pub fn opened(connection: ConnectionId, epoch: u64) -> Self {
        Self {
            connection,
            epoch,
            kind: TransportEventKind::Opened,
        }
    }

    pub fn frame(connection: ConnectionId, epoch: u64, text: impl Into<String>) -> Self {
        Self {
            connection,
            epoch,
            kind: TransportEventKind::Frame(text.into()),
        }
    }

    pub fn closed(connection: ConnectionId, epoch: u64, reason: Option<String>) -> Self {
        Self {
            connection,
            epoch,
            kind: TransportEventKind::Closed { reason },
        }
    }
}

/// Write side of one dial attempt
pub trait TransportHandle: Send {
    /// Queue a text frame; false when the connection cannot take it
    fn send(&self, text: String) -> bool;

    /// Close the connection without reporting a `Closed` event
    fn close(&self);
}

/// Dials physical connections
pub trait Connector: Send + 'static {
    /// Start connecting after `delay` without blocking the caller
    fn connect(
        &mut self,
        connection: ConnectionId,
        epoch: u64,
        delay: Duration,
    ) -> Box<dyn TransportHandle>;
}

/// Posts transport events into the mutator queue
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<MutatorMessage>,
}

impl EventSink {
    pub(crate) fn new(tx: mpsc::Sender<MutatorMessage>) -> Self {
        Self { tx }
    }

    /// Deliver an event, waiting for queue space
    ///
    /// Returns false once the runtime has stopped.
    pub async fn deliver(&self, event: TransportEvent) -> bool {
        self.tx.send(MutatorMessage::Transport(event)).await.is_ok()
    }
}

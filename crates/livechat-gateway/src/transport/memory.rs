//! In-process loopback transport
//!
//! Records every dial and outbound frame, and lets the caller play the server
//! side by injecting transport events. Used by tests and offline tooling.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::{Connector, EventSink, TransportEvent, TransportEventKind, TransportHandle};
use crate::connection::ConnectionId;

/// One recorded `Connector::connect` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dial {
    pub connection: ConnectionId,
    pub epoch: u64,
    pub delay: Duration,
}

#[derive(Debug, Default)]
struct Link {
    epoch: u64,
    sent: Vec<String>,
    closed: bool,
}

#[derive(Debug, Default)]
struct NetworkState {
    dials: Vec<Dial>,
    links: HashMap<ConnectionId, Link>,
    sink: Option<EventSink>,
}

/// Shared view of every connection dialed through a [`MemoryConnector`]
#[derive(Debug, Clone, Default)]
pub struct MemoryNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connector that only records; events are injected by the caller
    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector {
            state: self.state.clone(),
        }
    }

    /// Connector whose injected events flow into a running gateway
    pub fn attached_connector(&self, sink: EventSink) -> MemoryConnector {
        self.state.lock().sink = Some(sink);
        self.connector()
    }

    pub fn dials(&self) -> Vec<Dial> {
        self.state.lock().dials.clone()
    }

    /// Epoch of the most recent dial for `connection`
    pub fn epoch(&self, connection: ConnectionId) -> Option<u64> {
        self.state.lock().links.get(&connection).map(|link| link.epoch)
    }

    /// Every frame written to `connection` so far
    pub fn sent(&self, connection: ConnectionId) -> Vec<String> {
        self.state
            .lock()
            .links
            .get(&connection)
            .map(|link| link.sent.clone())
            .unwrap_or_default()
    }

    /// Drain the frames written to `connection`
    pub fn take_sent(&self, connection: ConnectionId) -> Vec<String> {
        self.state
            .lock()
            .links
            .get_mut(&connection)
            .map(|link| std::mem::take(&mut link.sent))
            .unwrap_or_default()
    }

    /// Whether the gateway closed the current dial of `connection`
    pub fn is_closed(&self, connection: ConnectionId) -> bool {
        self.state
            .lock()
            .links
            .get(&connection)
            .is_some_and(|link| link.closed)
    }

    /// Report the current dial as open
    pub async fn open(&self, connection: ConnectionId) -> bool {
        self.inject(connection, TransportEventKind::Opened).await
    }

    /// Deliver a frame as if the server sent it
    pub async fn deliver(&self, connection: ConnectionId, text: impl Into<String>) -> bool {
        self.inject(connection, TransportEventKind::Frame(text.into()))
            .await
    }

    /// Drop the current dial from the server side
    pub async fn drop_connection(&self, connection: ConnectionId, reason: Option<String>) -> bool {
        self.inject(connection, TransportEventKind::Closed { reason })
            .await
    }

    async fn inject(&self, connection: ConnectionId, kind: TransportEventKind) -> bool {
        let (sink, epoch) = {
            let state = self.state.lock();
            let Some(epoch) = state.links.get(&connection).map(|link| link.epoch) else {
                return false;
            };
            match state.sink.clone() {
                Some(sink) => (sink, epoch),
                None => return false,
            }
        };

        sink.deliver(TransportEvent {
            connection,
            epoch,
            kind,
        })
        .await
    }
}

/// [`Connector`] backed by a [`MemoryNetwork`]
#[derive(Debug)]
pub struct MemoryConnector {
    state: Arc<Mutex<NetworkState>>,
}

impl Connector for MemoryConnector {
    fn connect(
        &mut self,
        connection: ConnectionId,
        epoch: u64,
        delay: Duration,
    ) -> Box<dyn TransportHandle> {
        let mut state = self.state.lock();
        state.dials.push(Dial {
            connection,
            epoch,
            delay,
        });
        let link = state.links.entry(connection).or_default();
        link.epoch = epoch;
        link.closed = false;

        Box::new(MemoryHandle {
            connection,
            epoch,
            state: self.state.clone(),
        })
    }
}

struct MemoryHandle {
    connection: ConnectionId,
    epoch: u64,
    state: Arc<Mutex<NetworkState>>,
}

impl TransportHandle for MemoryHandle {
    fn send(&self, text: String) -> bool {
        let mut state = self.state.lock();
        match state.links.get_mut(&self.connection) {
            Some(link) if link.epoch == self.epoch && !link.closed => {
                link.sent.push(text);
                true
            }
            _ => false,
        }
    }

    fn close(&self) {
        let mut state = self.state.lock();
        if let Some(link) = state.links.get_mut(&self.connection) {
            if link.epoch == self.epoch {
                link.closed = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_dials_and_frames() {
        let network = MemoryNetwork::new();
        let mut connector = network.connector();
        let id = ConnectionId::new(1);

        let handle = connector.connect(id, 1, Duration::ZERO);
        assert!(handle.send("a".to_string()));
        assert!(handle.send("b".to_string()));

        assert_eq!(network.dials().len(), 1);
        assert_eq!(network.epoch(id), Some(1));
        assert_eq!(network.take_sent(id), vec!["a", "b"]);
        assert!(network.sent(id).is_empty());
    }

    #[test]
    fn test_closed_handle_rejects_frames() {
        let network = MemoryNetwork::new();
        let mut connector = network.connector();
        let id = ConnectionId::new(3);

        let handle = connector.connect(id, 1, Duration::ZERO);
        handle.close();
        assert!(network.is_closed(id));
        assert!(!handle.send("late".to_string()));
    }

    #[test]
    fn test_redial_invalidates_old_handle() {
        let network = MemoryNetwork::new();
        let mut connector = network.connector();
        let id = ConnectionId::new(1);

        let old = connector.connect(id, 1, Duration::ZERO);
        let new = connector.connect(id, 2, Duration::from_secs(1));

        assert!(!old.send("stale".to_string()));
        assert!(new.send("fresh".to_string()));
        old.close();
        assert!(!network.is_closed(id));
        assert_eq!(network.sent(id), vec!["fresh"]);
        assert_eq!(network.dials()[1].delay, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_inject_without_sink_fails() {
        let network = MemoryNetwork::new();
        let mut connector = network.connector();
        let id = ConnectionId::new(1);
        let _handle = connector.connect(id, 1, Duration::ZERO);

        assert!(!network.open(id).await);
    }
}

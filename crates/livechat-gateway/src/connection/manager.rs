//! Subscription manager
//!
//! Multiplexes topics onto a pool of connections, keeps the topic index in
//! step with the connections, and drives heartbeats and reconnects.
//!
//! The manager is synchronous and deterministic: every method that depends
//! on time takes `now`, and physical I/O goes through the [`Connector`] and
//! [`TransportHandle`](crate::transport::TransportHandle) seams.

use livechat_common::GatewayConfig;
use livechat_core::{SnapshotCell, Topic};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

use super::{
    AssignmentView, Backoff, ConnectionId, ConnectionState, ConnectionSummary, GatewayConnection,
    GatewayDiag, GatewayEvent, SubscriptionStatus, TopicAssignment,
};
use crate::protocol::{ControlFrame, DataFrame, DecodedFrame, FrameCodec};
use crate::transport::{Connector, TransportEvent, TransportEventKind};

/// Buffer size of the gateway event broadcast
const EVENT_BUFFER_SIZE: usize = 256;

/// Receives every data frame decoded on any connection
pub trait DataHandler: Send {
    fn on_data(&mut self, frame: &DataFrame);
}

impl<F> DataHandler for F
where
    F: FnMut(&DataFrame) + Send,
{
    fn on_data(&mut self, frame: &DataFrame) {
        self(frame);
    }
}

/// Owns the connection pool and the topic index
///
/// Invariant: a topic is in `index` iff exactly one connection holds it, and
/// `index` names that connection.
pub struct SubscriptionManager<C, K> {
    config: GatewayConfig,
    codec: C,
    connector: K,
    connections: BTreeMap<ConnectionId, GatewayConnection>,
    index: HashMap<Topic, ConnectionId>,
    next_id: u64,
    handlers: Vec<Box<dyn DataHandler>>,
    events: broadcast::Sender<GatewayEvent>,
    diag: Arc<GatewayDiag>,
    view: Arc<SnapshotCell<AssignmentView>>,
}

impl<C: FrameCodec, K: Connector> SubscriptionManager<C, K> {
    pub fn new(config: GatewayConfig, codec: C, connector: K) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER_SIZE);
        Self {
            config,
            codec,
            connector,
            connections: BTreeMap::new(),
            index: HashMap::new(),
            next_id: 0,
            handlers: Vec::new(),
            events,
            diag: Arc::new(GatewayDiag::default()),
            view: Arc::new(SnapshotCell::default()),
        }
    }

    pub fn diag(&self) -> Arc<GatewayDiag> {
        self.diag.clone()
    }

    /// Cell holding the latest published [`AssignmentView`]
    pub fn assignments(&self) -> Arc<SnapshotCell<AssignmentView>> {
        self.view.clone()
    }

    pub fn events(&self) -> broadcast::Receiver<GatewayEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<GatewayEvent> {
        self.events.clone()
    }

    pub fn register_data_handler(&mut self, handler: Box<dyn DataHandler>) {
        self.handlers.push(handler);
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&GatewayConnection> {
        self.connections.get(&id)
    }

    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.connections.keys().copied().collect()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn topic_count(&self) -> usize {
        self.index.len()
    }

    pub fn assignment(&self, topic: &Topic) -> Option<TopicAssignment> {
        let connection = *self.index.get(topic)?;
        let status = self.connections.get(&connection)?.status(topic)?;
        Some(TopicAssignment { connection, status })
    }

    fn max_subscriptions(&self) -> usize {
        self.config.max_subscriptions_per_connection.max(1)
    }

    // ------------------------------------------------------------------
    // Topic operations
    // ------------------------------------------------------------------

    /// Subscribe to `topic`; a no-op if it is already assigned
    pub fn subscribe(&mut self, topic: Topic, now: Instant) {
        if let Some(id) = self.index.get(&topic) {
            tracing::trace!(connection = %id, topic = %topic, "Already subscribed");
            return;
        }

        self.assign(topic, now);
        self.publish_view();
    }

    /// Unsubscribe from `topic`; a no-op if it is not assigned
    ///
    /// A connection left without topics is closed and removed.
    pub fn unsubscribe(&mut self, topic: &Topic) {
        let Some(id) = self.index.remove(topic) else {
            tracing::trace!(topic = %topic, "Not subscribed");
            return;
        };

        let mut empty = false;
        if let Some(conn) = self.connections.get_mut(&id) {
            conn.remove(topic);
            if conn.is_open() {
                conn.send(self.codec.encode_unsubscribe(topic));
            }
            empty = conn.subscription_count() == 0;
        }
        tracing::debug!(connection = %id, topic = %topic, "Topic unsubscribed");

        if empty {
            self.teardown(id, "no topics left");
        }
        self.publish_view();
    }

    /// Place `topic` on the preferred connection, opening one if needed
    fn assign(&mut self, topic: Topic, now: Instant) {
        let id = match self.select_connection() {
            Some(id) => id,
            None => self.open_connection(now),
        };

        let Some(conn) = self.connections.get_mut(&id) else {
            return;
        };
        conn.add_pending(topic.clone());
        if conn.is_open() && conn.send(self.codec.encode_subscribe(&topic)) {
            conn.mark_sent(&topic);
        }
        self.index.insert(topic.clone(), id);

        tracing::debug!(connection = %id, topic = %topic, "Topic assigned");
        self.emit(GatewayEvent::TopicAssigned {
            topic,
            connection: id,
        });
    }

    /// Pick a connection with spare capacity: open first, then connecting,
    /// then closed-awaiting-reconnect; lowest id wins ties
    fn select_connection(&self) -> Option<ConnectionId> {
        let max = self.max_subscriptions();
        self.connections
            .values()
            .filter(|conn| conn.has_capacity(max))
            .filter_map(|conn| Self::preference(conn.state()).map(|rank| (rank, conn.id())))
            .min()
            .map(|(_, id)| id)
    }

    fn preference(state: ConnectionState) -> Option<u8> {
        match state {
            ConnectionState::Open => Some(0),
            ConnectionState::Connecting => Some(1),
            ConnectionState::Closed => Some(2),
            ConnectionState::Closing => None,
        }
    }

    // ------------------------------------------------------------------
    // Connection lifecycle
    // ------------------------------------------------------------------

    fn open_connection(&mut self, now: Instant) -> ConnectionId {
        self.next_id += 1;
        let id = ConnectionId::new(self.next_id);
        let backoff = Backoff::new(self.config.reconnect_base(), self.config.reconnect_max());
        self.connections.insert(
            id,
            GatewayConnection::new(id, self.config.heartbeat_interval(), backoff, now),
        );

        tracing::info!(
            connection = %id,
            backend = %self.config.backend,
            pool_size = self.connections.len(),
            "Opening connection"
        );
        self.dial(id, Duration::ZERO);
        id
    }

    fn dial(&mut self, id: ConnectionId, delay: Duration) {
        let Some(conn) = self.connections.get_mut(&id) else {
            return;
        };
        let epoch = conn.begin_dial();
        conn.attach(self.connector.connect(id, epoch, delay));

        self.emit(GatewayEvent::ConnectionStateChanged {
            connection: id,
            state: ConnectionState::Connecting,
        });
    }

    /// Close a connection on our side and run the close path
    fn close_connection(&mut self, id: ConnectionId, reason: &str, now: Instant) {
        let Some(conn) = self.connections.get_mut(&id) else {
            return;
        };
        conn.begin_close();
        self.diag.record_closed();
        tracing::info!(connection = %id, reason = %reason, "Closing connection");

        self.emit(GatewayEvent::ConnectionStateChanged {
            connection: id,
            state: ConnectionState::Closing,
        });
        self.enter_closed(id, now);
    }

    /// Close path: redistribute topics, then reconnect or drop the connection
    fn enter_closed(&mut self, id: ConnectionId, now: Instant) {
        let Some(conn) = self.connections.get_mut(&id) else {
            return;
        };
        let topics = conn.mark_closed();
        self.emit(GatewayEvent::ConnectionStateChanged {
            connection: id,
            state: ConnectionState::Closed,
        });

        for topic in &topics {
            self.index.remove(topic);
        }
        for topic in topics {
            self.assign(topic, now);
        }

        let Some(conn) = self.connections.get_mut(&id) else {
            return;
        };
        let remaining = conn.subscription_count();
        if remaining == 0 {
            self.connections.remove(&id);
            tracing::info!(connection = %id, "Connection removed from pool");
            return;
        }

        let delay = conn.backoff_mut().next_delay();
        tracing::info!(
            connection = %id,
            topics = remaining,
            delay_ms = delay.as_millis(),
            "Scheduling reconnect"
        );
        self.dial(id, delay);
    }

    /// Close and forget a connection without reconnecting
    fn teardown(&mut self, id: ConnectionId, reason: &str) {
        let Some(mut conn) = self.connections.remove(&id) else {
            return;
        };
        if conn.state() != ConnectionState::Closed {
            self.diag.record_closed();
        }
        conn.begin_close();
        conn.mark_closed();

        tracing::info!(connection = %id, reason = %reason, "Connection torn down");
        self.emit(GatewayEvent::ConnectionStateChanged {
            connection: id,
            state: ConnectionState::Closed,
        });
    }

    // ------------------------------------------------------------------
    // Transport events
    // ------------------------------------------------------------------

    /// Apply one event reported by the transport
    pub fn handle_transport_event(&mut self, event: TransportEvent, now: Instant) {
        let TransportEvent {
            connection: id,
            epoch,
            kind,
        } = event;

        let Some(conn) = self.connections.get(&id) else {
            tracing::trace!(connection = %id, "Event for unknown connection");
            return;
        };
        if conn.epoch() != epoch {
            tracing::trace!(
                connection = %id,
                epoch,
                current = conn.epoch(),
                "Ignoring stale transport event"
            );
            return;
        }

        match kind {
            TransportEventKind::Opened => self.on_opened(id, now),
            TransportEventKind::Frame(text) => self.on_frame(id, &text, now),
            TransportEventKind::Closed { reason } => self.on_closed(id, reason, now),
        }
        self.publish_view();
    }

    fn on_opened(&mut self, id: ConnectionId, now: Instant) {
        let Some(conn) = self.connections.get_mut(&id) else {
            return;
        };
        if conn.state() != ConnectionState::Connecting {
            tracing::debug!(connection = %id, state = ?conn.state(), "Unexpected open");
            return;
        }

        conn.mark_open(now);
        let pending = conn.unsent();
        for topic in &pending {
            if conn.send(self.codec.encode_subscribe(topic)) {
                conn.mark_sent(topic);
            }
        }

        self.diag.record_opened();
        tracing::info!(connection = %id, pending = pending.len(), "Connection open");
        self.emit(GatewayEvent::ConnectionStateChanged {
            connection: id,
            state: ConnectionState::Open,
        });
    }

    fn on_frame(&mut self, id: ConnectionId, text: &str, now: Instant) {
        self.diag.record_message();

        match self.codec.decode(text) {
            Ok(DecodedFrame::Data(frame)) => {
                for handler in &mut self.handlers {
                    handler.on_data(&frame);
                }
            }
            Ok(DecodedFrame::Control(control)) => self.on_control(id, control, now),
            Err(e) => {
                self.diag.record_parse_failure();
                tracing::debug!(connection = %id, error = %e, "Failed to decode frame");
            }
        }
    }

    fn on_control(&mut self, id: ConnectionId, control: ControlFrame, now: Instant) {
        match control {
            ControlFrame::Hello { heartbeat_interval } => {
                let Some(advertised) = heartbeat_interval else {
                    return;
                };
                if let Some(conn) = self.connections.get_mut(&id) {
                    if conn.heartbeat_mut().narrow(advertised) {
                        tracing::debug!(
                            connection = %id,
                            interval_ms = advertised.as_millis(),
                            "Adopted server heartbeat interval"
                        );
                    }
                }
            }
            ControlFrame::LivenessProbe => {
                if let Some(conn) = self.connections.get(&id) {
                    conn.send(self.codec.encode_liveness_reply());
                }
            }
            ControlFrame::LivenessResponse => {
                if let Some(conn) = self.connections.get_mut(&id) {
                    conn.heartbeat_mut().record(now);
                }
            }
            ControlFrame::SubscriptionAcknowledged(topic) => {
                let acked = self
                    .connections
                    .get_mut(&id)
                    .is_some_and(|conn| conn.acknowledge(&topic));
                if acked {
                    self.diag.record_ack();
                    tracing::debug!(connection = %id, topic = %topic, "Subscription active");
                } else {
                    tracing::trace!(connection = %id, topic = %topic, "Ignoring ack for topic not pending");
                }
            }
            ControlFrame::SubscriptionError { topic, reason } => {
                self.on_subscription_error(id, topic, reason);
            }
            ControlFrame::ReconnectRequested { reason } => {
                self.close_connection(id, &reason, now);
            }
            ControlFrame::Error { code, message } => {
                tracing::warn!(connection = %id, code = ?code, message = %message, "Server error");
            }
            ControlFrame::Ignored => {}
        }
    }

    /// A refused topic is dropped for good
    fn on_subscription_error(&mut self, id: ConnectionId, topic: Option<Topic>, reason: String) {
        self.diag.record_subscription_error();
        let Some(topic) = topic else {
            tracing::warn!(connection = %id, reason = %reason, "Subscription error without topic");
            return;
        };

        let Some(conn) = self.connections.get_mut(&id) else {
            return;
        };
        if conn.remove(&topic).is_none() {
            tracing::debug!(connection = %id, topic = %topic, "Subscription error for topic not held");
            return;
        }
        let empty = conn.subscription_count() == 0;
        if self.index.get(&topic) == Some(&id) {
            self.index.remove(&topic);
        }

        tracing::warn!(connection = %id, topic = %topic, reason = %reason, "Subscription rejected");
        self.emit(GatewayEvent::SubscriptionRejected { topic, reason });

        if empty {
            self.teardown(id, "no topics left");
        }
    }

    fn on_closed(&mut self, id: ConnectionId, reason: Option<String>, now: Instant) {
        let Some(conn) = self.connections.get(&id) else {
            return;
        };
        let reason = reason.unwrap_or_default();

        match conn.state() {
            ConnectionState::Closing | ConnectionState::Closed => return,
            ConnectionState::Connecting => {
                self.diag.record_failed();
                tracing::warn!(connection = %id, reason = %reason, "Connection attempt failed");
            }
            ConnectionState::Open => {
                self.diag.record_closed();
                tracing::warn!(connection = %id, reason = %reason, "Connection closed by remote");
            }
        }

        self.enter_closed(id, now);
    }

    // ------------------------------------------------------------------
    // Heartbeat
    // ------------------------------------------------------------------

    /// Close open connections that stopped answering, probe the rest
    pub fn check_heartbeats(&mut self, now: Instant) {
        let open: Vec<ConnectionId> = self
            .connections
            .values()
            .filter(|conn| conn.is_open())
            .map(GatewayConnection::id)
            .collect();

        for id in open {
            let Some(conn) = self.connections.get(&id) else {
                continue;
            };
            // Redistribution may have moved topics onto a connection closed
            // earlier in this sweep
            if !conn.is_open() {
                continue;
            }

            if conn.heartbeat().is_expired(now) {
                tracing::warn!(
                    connection = %id,
                    timeout_ms = conn.heartbeat().timeout().as_millis(),
                    "Heartbeat timed out"
                );
                self.diag.record_liveness_timeout();
                self.close_connection(id, "heartbeat timeout", now);
            } else {
                conn.send(self.codec.encode_liveness_probe());
            }
        }

        self.publish_view();
    }

    /// How often [`check_heartbeats`](Self::check_heartbeats) should run
    pub fn check_interval(&self) -> Duration {
        self.connections
            .values()
            .filter(|conn| conn.state() != ConnectionState::Closed)
            .map(|conn| conn.heartbeat().interval())
            .min()
            .unwrap_or_else(|| self.config.heartbeat_interval())
    }

    /// Close every connection and forget every topic
    pub fn shutdown(&mut self) {
        let ids = self.connection_ids();
        for id in ids {
            self.teardown(id, "shutdown");
        }
        self.index.clear();
        self.publish_view();

        tracing::info!(backend = %self.config.backend, "Gateway shut down");
    }

    // ------------------------------------------------------------------
    // Observability
    // ------------------------------------------------------------------

    fn emit(&self, event: GatewayEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    fn publish_view(&self) {
        let topics = self
            .index
            .iter()
            .map(|(topic, id)| {
                let status = self
                    .connections
                    .get(id)
                    .and_then(|conn| conn.status(topic))
                    .unwrap_or(SubscriptionStatus::Pending { sent: false });
                (
                    topic.clone(),
                    TopicAssignment {
                        connection: *id,
                        status,
                    },
                )
            })
            .collect();

        let connections = self
            .connections
            .iter()
            .map(|(id, conn)| {
                let mut held: Vec<Topic> = conn.subscriptions().map(|(t, _)| t.clone()).collect();
                held.sort();
                (
                    *id,
                    ConnectionSummary {
                        state: conn.state(),
                        topics: held,
                    },
                )
            })
            .collect();

        self.view.publish(AssignmentView {
            topics,
            connections,
        });
    }
}

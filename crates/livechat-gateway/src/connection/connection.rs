//! Individual gateway connection
//!
//! Holds the state machine, topic set, and liveness clock of one physical
//! connection. Only the [`SubscriptionManager`](super::SubscriptionManager)
//! mutates it.

use livechat_core::Topic;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use super::{Backoff, Heartbeat};
use crate::transport::TransportHandle;

/// Pool-unique connection id, never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Dial scheduled or in progress
    Connecting,
    /// Handshake done, frames flow
    Open,
    /// Close requested locally
    Closing,
    /// Closed; reconnects if it still owns topics
    Closed,
}

/// Per-topic subscription status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionStatus {
    /// Waiting for acknowledgement; `sent` once the subscribe frame went out
    Pending { sent: bool },
    Active,
}

impl SubscriptionStatus {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

/// A single pooled connection
pub struct GatewayConnection {
    id: ConnectionId,
    state: ConnectionState,
    /// Incremented on every dial; events from older dials are stale
    epoch: u64,
    transport: Option<Box<dyn TransportHandle>>,
    subscriptions: HashMap<Topic, SubscriptionStatus>,
    heartbeat: Heartbeat,
    backoff: Backoff,
    created_at: Instant,
}

impl GatewayConnection {
    pub fn new(id: ConnectionId, heartbeat_interval: Duration, backoff: Backoff, now: Instant) -> Self {
        Self {
            id,
            state: ConnectionState::Closed,
            epoch: 0,
            transport: None,
            subscriptions: HashMap::new(),
            heartbeat: Heartbeat::new(heartbeat_interval, now),
            backoff,
            created_at: now,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn heartbeat(&self) -> &Heartbeat {
        &self.heartbeat
    }

    pub(crate) fn heartbeat_mut(&mut self) -> &mut Heartbeat {
        &mut self.heartbeat
    }

    pub(crate) fn backoff_mut(&mut self) -> &mut Backoff {
        &mut self.backoff
    }

    /// Active plus pending topics
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn has_capacity(&self, max: usize) -> bool {
        self.subscriptions.len() < max
    }

    pub fn status(&self, topic: &Topic) -> Option<SubscriptionStatus> {
        self.subscriptions.get(topic).copied()
    }

    /// Topics in name order
    pub fn topics(&self) -> Vec<Topic> {
        let mut topics: Vec<Topic> = self.subscriptions.keys().cloned().collect();
        topics.sort();
        topics
    }

    pub(crate) fn subscriptions(&self) -> impl Iterator<Item = (&Topic, &SubscriptionStatus)> {
        self.subscriptions.iter()
    }

    /// Start a new dial: `Connecting` with a fresh epoch
    pub(crate) fn begin_dial(&mut self) -> u64 {
        self.epoch += 1;
        self.state = ConnectionState::Connecting;
        self.epoch
    }

    pub(crate) fn attach(&mut self, transport: Box<dyn TransportHandle>) {
        self.transport = Some(transport);
    }

    pub(crate) fn mark_open(&mut self, now: Instant) {
        self.state = ConnectionState::Open;
        self.heartbeat.record(now);
        self.backoff.reset();
    }

    /// Request a local close; the transport is told to shut down
    pub(crate) fn begin_close(&mut self) {
        self.state = ConnectionState::Closing;
        if let Some(transport) = self.transport.take() {
            transport.close();
        }
    }

    /// Enter `Closed` and hand back every topic
    pub(crate) fn mark_closed(&mut self) -> Vec<Topic> {
        self.state = ConnectionState::Closed;
        if let Some(transport) = self.transport.take() {
            transport.close();
        }
        let topics = self.topics();
        self.subscriptions.clear();
        topics
    }

    pub(crate) fn add_pending(&mut self, topic: Topic) {
        self.subscriptions
            .insert(topic, SubscriptionStatus::Pending { sent: false });
    }

    /// Record that the subscribe frame for `topic` went out
    pub(crate) fn mark_sent(&mut self, topic: &Topic) {
        if let Some(status) = self.subscriptions.get_mut(topic) {
            if matches!(status, SubscriptionStatus::Pending { .. }) {
                *status = SubscriptionStatus::Pending { sent: true };
            }
        }
    }

    /// Promote a pending topic; false if it is not pending here
    pub(crate) fn acknowledge(&mut self, topic: &Topic) -> bool {
        match self.subscriptions.get_mut(topic) {
            Some(status) if matches!(status, SubscriptionStatus::Pending { .. }) => {
                *status = SubscriptionStatus::Active;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn remove(&mut self, topic: &Topic) -> Option<SubscriptionStatus> {
        self.subscriptions.remove(topic)
    }

    /// Topics still waiting for their subscribe frame to go out
    pub(crate) fn unsent(&self) -> Vec<Topic> {
        let mut topics: Vec<Topic> = self
            .subscriptions
            .iter()
            .filter(|(_, status)| matches!(status, SubscriptionStatus::Pending { sent: false }))
            .map(|(topic, _)| topic.clone())
            .collect();
        topics.sort();
        topics
    }

    /// Send a text frame; only possible while open
    pub(crate) fn send(&self, text: String) -> bool {
        if self.state != ConnectionState::Open {
            return false;
        }
        match &self.transport {
            Some(transport) => transport.send(text),
            None => false,
        }
    }
}

impl fmt::Debug for GatewayConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConnection")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("epoch", &self.epoch)
            .field("subscriptions", &self.subscriptions.len())
            .field("heartbeat", &self.heartbeat)
            .finish()
    }
}

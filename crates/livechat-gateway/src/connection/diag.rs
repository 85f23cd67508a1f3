//! Gateway observability
//!
//! Counters and events emitted by the subscription manager, plus the
//! read-only assignment snapshot other tasks can inspect.

use livechat_core::Topic;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use super::{ConnectionId, ConnectionState, SubscriptionStatus};

/// Diagnostic counters, readable from any thread
#[derive(Debug, Default)]
pub struct GatewayDiag {
    connections_opened: AtomicU64,
    connections_closed: AtomicU64,
    connections_failed: AtomicU64,
    messages_received: AtomicU64,
    messages_failed_to_parse: AtomicU64,
    subscriptions_acknowledged: AtomicU64,
    subscription_errors: AtomicU64,
    liveness_timeouts: AtomicU64,
}

macro_rules! counters {
    ($($field:ident => $record:ident),* $(,)?) => {
        impl GatewayDiag {
            $(
                pub fn $field(&self) -> u64 {
                    self.$field.load(Ordering::Relaxed)
                }

                pub(crate) fn $record(&self) {
                    self.$field.fetch_add(1, Ordering::Relaxed);
                }
            )*
        }
    };
}

counters! {
    connections_opened => record_opened,
    connections_closed => record_closed,
    connections_failed => record_failed,
    messages_received => record_message,
    messages_failed_to_parse => record_parse_failure,
    subscriptions_acknowledged => record_ack,
    subscription_errors => record_subscription_error,
    liveness_timeouts => record_liveness_timeout,
}

/// Events broadcast by the subscription manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    ConnectionStateChanged {
        connection: ConnectionId,
        state: ConnectionState,
    },
    /// A topic was placed on a connection (initially or after a close)
    TopicAssigned {
        topic: Topic,
        connection: ConnectionId,
    },
    /// The server refused a topic; it will not be retried
    SubscriptionRejected { topic: Topic, reason: String },
}

/// Where a topic lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopicAssignment {
    pub connection: ConnectionId,
    pub status: SubscriptionStatus,
}

/// One pooled connection as seen in a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSummary {
    pub state: ConnectionState,
    /// Topics the connection holds, in name order
    pub topics: Vec<Topic>,
}

/// Snapshot of the topic index and the pool
///
/// `topics` comes from the index, `connections` from the connections
/// themselves; in a consistent pool both describe the same placement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentView {
    pub topics: HashMap<Topic, TopicAssignment>,
    pub connections: BTreeMap<ConnectionId, ConnectionSummary>,
}

impl AssignmentView {
    pub fn assignment(&self, topic: &Topic) -> Option<TopicAssignment> {
        self.topics.get(topic).copied()
    }

    pub fn connection_state(&self, connection: ConnectionId) -> Option<ConnectionState> {
        self.connections.get(&connection).map(|summary| summary.state)
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Check that every topic is held by exactly the connection the index
    /// names, and by no other
    pub fn is_consistent(&self) -> bool {
        let held: usize = self.connections.values().map(|c| c.topics.len()).sum();
        held == self.topics.len()
            && self.connections.iter().all(|(id, summary)| {
                summary.topics.iter().all(|topic| {
                    self.topics
                        .get(topic)
                        .is_some_and(|assignment| assignment.connection == *id)
                })
            })
    }
}

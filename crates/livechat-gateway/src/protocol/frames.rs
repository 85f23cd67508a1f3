//! Decoded frame types

use livechat_core::Topic;
use serde_json::Value;
use std::time::Duration;

/// A decoded inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedFrame {
    /// Consumed by the connection manager
    Control(ControlFrame),
    /// Forwarded to data handlers
    Data(DataFrame),
}

/// Frames the connection manager acts on
#[derive(Debug, Clone, PartialEq)]
pub enum ControlFrame {
    /// Session established; may advertise the server's activity timeout
    Hello { heartbeat_interval: Option<Duration> },
    /// Server asks us to prove we are alive
    LivenessProbe,
    /// Reply to our own liveness probe
    LivenessResponse,
    /// A pending subscription was accepted
    SubscriptionAcknowledged(Topic),
    /// A subscription was refused
    SubscriptionError { topic: Option<Topic>, reason: String },
    /// The server wants the session torn down and re-established
    ReconnectRequested { reason: String },
    /// Non-fatal protocol error
    Error { code: Option<i64>, message: String },
    /// Recognised but irrelevant
    Ignored,
}

/// Application payload addressed to one topic
#[derive(Debug, Clone, PartialEq)]
pub struct DataFrame {
    pub topic: Topic,
    /// Event name with any backend namespace removed
    pub event: String,
    pub payload: Value,
}

impl DataFrame {
    pub fn new(topic: impl Into<Topic>, event: impl Into<String>, payload: Value) -> Self {
        Self {
            topic: topic.into(),
            event: event.into(),
            payload,
        }
    }
}

//! Pusher protocol codec (protocol 7)
//!
//! Envelopes look like `{"event": "...", "channel": "...", "data": "..."}`
//! where `data` is usually a JSON document encoded as a string.

use livechat_core::Topic;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::{CodecError, ControlFrame, DataFrame, DecodedFrame, FrameCodec};

/// Namespace the backend puts in front of application event names
const APP_EVENT_PREFIX: &str = "App\\Events\\";

/// Error codes asking the client to reconnect (4100-4199 after a backoff,
/// 4200-4299 immediately)
const RECONNECT_CODES: std::ops::RangeInclusive<i64> = 4100..=4299;

/// Inbound envelope
#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

/// Codec for Pusher-compatible servers
#[derive(Debug, Clone, Copy, Default)]
pub struct PusherCodec;

impl PusherCodec {
    pub fn new() -> Self {
        Self
    }

    /// Unwrap the `data` member, parsing it again if it is a string
    fn inner_data(data: Option<Value>) -> Result<Value, CodecError> {
        match data {
            Some(Value::String(raw)) if raw.is_empty() || raw == "{}" => Ok(Value::Null),
            Some(Value::String(raw)) => Ok(serde_json::from_str(&raw)?),
            Some(value) => Ok(value),
            None => Ok(Value::Null),
        }
    }

    fn topic(channel: Option<String>) -> Result<Option<Topic>, CodecError> {
        channel
            .map(|name| Topic::parse(&name).map_err(|_| CodecError::InvalidTopic(name)))
            .transpose()
    }

    fn decode_hello(data: &Value) -> ControlFrame {
        let heartbeat_interval = data
            .get("activity_timeout")
            .and_then(Value::as_u64)
            .map(Duration::from_secs);
        ControlFrame::Hello { heartbeat_interval }
    }

    fn decode_subscription_error(topic: Option<Topic>, data: &Value) -> ControlFrame {
        let reason = data
            .get("error")
            .or_else(|| data.get("type"))
            .and_then(Value::as_str)
            .unwrap_or("subscription refused")
            .to_string();
        ControlFrame::SubscriptionError { topic, reason }
    }

    fn decode_error(data: &Value) -> ControlFrame {
        let code = data.get("code").and_then(Value::as_i64);
        let message = data
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        match code {
            Some(code) if RECONNECT_CODES.contains(&code) => ControlFrame::ReconnectRequested {
                reason: format!("{code}: {message}"),
            },
            _ => ControlFrame::Error { code, message },
        }
    }
}

impl FrameCodec for PusherCodec {
    fn encode_subscribe(&self, topic: &Topic) -> String {
        json!({
            "event": "pusher:subscribe",
            "data": { "auth": "", "channel": topic.as_str() },
        })
        .to_string()
    }

    fn encode_unsubscribe(&self, topic: &Topic) -> String {
        json!({
            "event": "pusher:unsubscribe",
            "data": { "channel": topic.as_str() },
        })
        .to_string()
    }

    fn encode_liveness_probe(&self) -> String {
        json!({ "event": "pusher:ping", "data": {} }).to_string()
    }

    fn encode_liveness_reply(&self) -> String {
        json!({ "event": "pusher:pong", "data": {} }).to_string()
    }

    fn decode(&self, raw: &str) -> Result<DecodedFrame, CodecError> {
        let envelope: Envelope = serde_json::from_str(raw)?;
        let data = Self::inner_data(envelope.data)?;
        let topic = Self::topic(envelope.channel)?;

        let control = match envelope.event.as_str() {
            "pusher:pong" => ControlFrame::LivenessResponse,
            "pusher:ping" => ControlFrame::LivenessProbe,
            "pusher:connection_established" => Self::decode_hello(&data),
            "pusher_internal:subscription_succeeded" => ControlFrame::SubscriptionAcknowledged(
                topic.ok_or(CodecError::MissingField("channel"))?,
            ),
            "pusher:subscription_error" => Self::decode_subscription_error(topic, &data),
            "pusher:error" => Self::decode_error(&data),
            event => {
                return Ok(match topic {
                    Some(topic) => DecodedFrame::Data(DataFrame {
                        topic,
                        event: event
                            .strip_prefix(APP_EVENT_PREFIX)
                            .unwrap_or(event)
                            .to_string(),
                        payload: data,
                    }),
                    None => DecodedFrame::Control(ControlFrame::Ignored),
                });
            }
        };

        Ok(DecodedFrame::Control(control))
    }
}

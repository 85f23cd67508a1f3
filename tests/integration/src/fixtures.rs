//! Backend frames and a test router
//!
//! Frames use the Pusher envelope the gateway's codec speaks.

use chrono::{TimeZone, Utc};
use livechat_core::{Message, MessageFlags};
use livechat_gateway::DataFrame;
use livechat_service::{DispatchRouter, RoomAction};
use serde_json::{json, Value};

fn envelope(event: &str, channel: Option<&str>, data: &Value) -> String {
    let mut frame = json!({
        "event": event,
        "data": data.to_string(),
    });
    if let Some(channel) = channel {
        frame["channel"] = Value::String(channel.to_string());
    }
    frame.to_string()
}

/// Handshake advertising `activity_timeout` seconds
pub fn connection_established(activity_timeout: u64) -> String {
    envelope(
        "pusher:connection_established",
        None,
        &json!({"socket_id": "1.1", "activity_timeout": activity_timeout}),
    )
}

pub fn subscription_succeeded(topic: &str) -> String {
    envelope("pusher_internal:subscription_succeeded", Some(topic), &json!({}))
}

pub fn subscription_error(topic: &str, reason: &str) -> String {
    envelope(
        "pusher:subscription_error",
        Some(topic),
        &json!({"type": "AuthError", "error": reason}),
    )
}

pub fn pong() -> String {
    envelope("pusher:pong", None, &json!({}))
}

/// Data frame the [`TestRouter`] turns into an appended message
pub fn test_message(topic: &str, id: &str, ts: i64) -> String {
    envelope("message", Some(topic), &json!({"id": id, "ts": ts}))
}

/// Data frame the [`TestRouter`] turns into a moderation edit of `id`
pub fn test_moderation(topic: &str, id: &str) -> String {
    envelope("moderation", Some(topic), &json!({"id": id}))
}

/// Kick chat message on `topic`
pub fn kick_chat_message(topic: &str, id: &str, user: &str, content: &str) -> String {
    envelope(
        "App\\Events\\ChatMessageEvent",
        Some(topic),
        &json!({
            "id": id,
            "content": content,
            "type": "message",
            "created_at": "2024-05-01T12:00:00+00:00",
            "sender": {"username": user}
        }),
    )
}

pub fn kick_user_banned(topic: &str, user: &str, moderator: &str) -> String {
    envelope(
        "App\\Events\\UserBannedEvent",
        Some(topic),
        &json!({
            "user": {"username": user},
            "banned_by": {"username": moderator},
            "permanent": true
        }),
    )
}

pub fn kick_message_deleted(topic: &str, id: &str) -> String {
    envelope(
        "App\\Events\\MessageDeletedEvent",
        Some(topic),
        &json!({"id": "d1", "message": {"id": id}}),
    )
}

pub fn kick_stream_host(topic: &str, host: &str, viewers: u64) -> String {
    envelope(
        "App\\Events\\StreamHostEvent",
        Some(topic),
        &json!({"host_username": host, "number_viewers": viewers, "optional_message": ""}),
    )
}

/// Minimal router: `message` appends `{id, ts}`, `moderation` disables `{id}`
#[derive(Debug, Default)]
pub struct TestRouter;

impl DispatchRouter for TestRouter {
    fn route(&mut self, frame: &DataFrame) -> Vec<RoomAction> {
        let id = frame.payload["id"].as_str().unwrap_or_default().to_string();
        match frame.event.as_str() {
            "message" => {
                let ts = frame.payload["ts"].as_i64().unwrap_or_default();
                let server_time = Utc.timestamp_opt(ts, 0).single().unwrap_or_else(Utc::now);
                vec![RoomAction::Append(Message::new(id, server_time))]
            }
            "moderation" => vec![RoomAction::Disable { id }],
            "history" => {
                let ts = frame.payload["ts"].as_i64().unwrap_or_default();
                let server_time = Utc.timestamp_opt(ts, 0).single().unwrap_or_else(Utc::now);
                vec![RoomAction::HistoricalBatch(vec![
                    Message::new(id, server_time).with_flags(MessageFlags::HISTORICAL),
                ])]
            }
            _ => Vec::new(),
        }
    }
}

/// Data frame the [`TestRouter`] turns into a one-message backfill
pub fn test_history(topic: &str, id: &str, ts: i64) -> String {
    envelope("history", Some(topic), &json!({"id": id, "ts": ts}))
}

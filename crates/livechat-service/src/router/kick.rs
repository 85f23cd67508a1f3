//! Kick chatroom events
//!
//! Payloads arrive on any of a room's [`KickRoom`](super::KickRoom) topics
//! with the event names the Pusher codec has already stripped of their
//! `App\Events\` prefix.

use chrono::{DateTime, Utc};
use livechat_core::{Message, MessageFlags};
use livechat_gateway::DataFrame;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{DispatchRouter, KickTopic, RoomAction};

/// Events Kick sends that have no timeline representation
const IGNORED_EVENTS: &[&str] = &[
    "KicksLeaderboardUpdated",
    "GiftsLeaderboardUpdated",
    "PredictionUpdated",
    "ChannelSubscriptionEvent",
    "LuckyUsersWhoGotGiftSubscriptionsEvent",
    "StreamHostedEvent",
    "ChatMessageSentEvent",
];

#[derive(Debug, Deserialize)]
struct User {
    #[serde(default)]
    username: String,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    id: String,
    #[serde(default)]
    content: String,
    created_at: Option<String>,
    sender: User,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    metadata: Option<ChatMetadata>,
}

#[derive(Debug, Deserialize)]
struct ChatMetadata {
    original_message: Option<MessageId>,
}

#[derive(Debug, Deserialize)]
struct MessageId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MessageDeleted {
    message: MessageId,
}

#[derive(Debug, Deserialize)]
struct UserBanned {
    user: User,
    banned_by: Option<User>,
    #[serde(default)]
    permanent: bool,
    /// Minutes
    #[serde(default)]
    duration: Option<i64>,
    expires_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserUnbanned {
    user: User,
    unbanned_by: Option<User>,
    #[serde(default)]
    permanent: bool,
}

#[derive(Debug, Deserialize)]
struct Subscription {
    username: String,
    #[serde(default)]
    months: u64,
    #[serde(default)]
    custom_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GiftedSubscriptions {
    gifter_username: String,
    #[serde(default)]
    gifted_usernames: Vec<String>,
    #[serde(default)]
    gifter_total: u64,
}

#[derive(Debug, Deserialize)]
struct PinnedMessageCreated {
    #[serde(rename = "pinnedBy")]
    pinned_by: User,
    message: PinnedMessage,
}

#[derive(Debug, Deserialize)]
struct PinnedMessage {
    id: String,
    #[serde(default, alias = "content")]
    text: String,
}

#[derive(Debug, Deserialize)]
struct RewardRedeemed {
    reward_title: String,
    username: String,
    #[serde(default)]
    user_input: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KicksGifted {
    sender: User,
    gift: Gift,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Gift {
    name: String,
    #[serde(default)]
    amount: u64,
}

#[derive(Debug, Deserialize)]
struct StreamHost {
    host_username: String,
    #[serde(default)]
    number_viewers: u64,
}

/// Router for Kick's chatroom channel
#[derive(Debug, Default)]
pub struct KickRouter;

impl KickRouter {
    pub fn new() -> Self {
        Self
    }

    fn chat_message(payload: ChatMessage) -> RoomAction {
        let server_time = payload
            .created_at
            .as_deref()
            .and_then(parse_time)
            .unwrap_or_else(Utc::now);

        let mut message = Message::new(payload.id, server_time)
            .with_login(payload.sender.username.to_lowercase())
            .with_content(payload.content);

        if payload.kind == "reply" {
            if let Some(parent) = payload.metadata.and_then(|m| m.original_message) {
                message = message.with_reply_parent(parent.id);
            }
        }
        RoomAction::Append(message)
    }

    fn banned(payload: UserBanned, now: DateTime<Utc>) -> RoomAction {
        let user = payload.user.username;
        let moderator = payload
            .banned_by
            .map(|by| by.username)
            .filter(|name| !name.is_empty());

        let mut text = match (&moderator, payload.permanent) {
            (Some(by), true) => format!("{by} permanently banned {user}"),
            (Some(by), false) => format!("{by} timed out {user}"),
            (None, true) => format!("{user} has been permanently banned"),
            (None, false) => format!("{user} has been timed out"),
        };
        if !payload.permanent {
            let seconds = match payload.duration {
                Some(minutes) if minutes != 0 => minutes.saturating_mul(60),
                _ => payload
                    .expires_at
                    .as_deref()
                    .and_then(parse_time)
                    .map_or(0, |expires| (expires - now).num_seconds()),
            };
            text.push_str(" for ");
            text.push_str(&format_duration(seconds));
        }
        text.push('.');

        let mut message = Message::new(String::new(), now)
            .with_flags(MessageFlags::SYSTEM | MessageFlags::TIMEOUT)
            .with_parse_time(now)
            .with_timeout_user(user.to_lowercase())
            .with_content(text);
        if let Some(by) = moderator {
            message = message.with_login(by);
        }
        RoomAction::Timeout(message)
    }

    fn unbanned(payload: UserUnbanned) -> RoomAction {
        let user = payload.user.username;
        let moderator = payload
            .unbanned_by
            .map(|by| by.username)
            .filter(|name| !name.is_empty());

        let text = match (&moderator, payload.permanent) {
            (Some(by), true) => format!("{by} unbanned {user}."),
            (Some(by), false) => format!("{by} untimed out {user}."),
            (None, true) => format!("{user} was unbanned."),
            (None, false) => format!("{user} was untimed out."),
        };

        let mut message = Message::system(text)
            .with_flags(MessageFlags::SYSTEM | MessageFlags::UNTIMEOUT)
            .with_timeout_user(user.to_lowercase());
        if let Some(by) = moderator {
            message = message.with_login(by);
        }
        RoomAction::Append(message)
    }

    fn host(payload: StreamHost) -> RoomAction {
        let text = format!(
            "{} hosted the stream with {} {}.",
            payload.host_username,
            payload.number_viewers,
            plural(payload.number_viewers, "viewer")
        );
        RoomAction::Append(
            Message::system(text).with_login(payload.host_username.to_lowercase()),
        )
    }

    /// The subscriber's own message, if any, followed by the announcement
    fn subscription(payload: Subscription, now: DateTime<Utc>) -> Vec<RoomAction> {
        let login = payload.username.to_lowercase();
        let mut actions = Vec::with_capacity(2);

        if let Some(custom) = payload.custom_message.filter(|text| !text.is_empty()) {
            actions.push(RoomAction::Append(
                Message::new(String::new(), now)
                    .with_flags(MessageFlags::SUBSCRIPTION)
                    .with_login(login.clone())
                    .with_content(custom),
            ));
        }

        let text = format!(
            "{} subscribed for {} {}.",
            payload.username,
            payload.months,
            plural(payload.months, "month")
        );
        actions.push(RoomAction::Append(
            Message::system(text)
                .with_flags(MessageFlags::SYSTEM | MessageFlags::SUBSCRIPTION)
                .with_login(login),
        ));
        actions
    }

    fn gifted_subscriptions(payload: GiftedSubscriptions) -> Option<RoomAction> {
        let count = payload.gifted_usernames.len() as u64;
        if count == 0 {
            return None;
        }

        let text = format!(
            "{} gifted {count} {} to {}. They gifted {} {} in total.",
            payload.gifter_username,
            plural(count, "subscription"),
            join_names(&payload.gifted_usernames),
            payload.gifter_total,
            plural(payload.gifter_total, "sub")
        );
        Some(RoomAction::Append(
            Message::system(text)
                .with_flags(MessageFlags::SYSTEM | MessageFlags::SUBSCRIPTION)
                .with_login(payload.gifter_username.to_lowercase()),
        ))
    }

    fn pinned(payload: PinnedMessageCreated) -> RoomAction {
        RoomAction::Pinned {
            id: payload.message.id,
            pinned_by: payload.pinned_by.username,
            text: payload.message.text,
        }
    }

    fn reward_redeemed(payload: RewardRedeemed, now: DateTime<Utc>) -> RoomAction {
        let text = match payload.user_input.filter(|input| !input.is_empty()) {
            Some(input) => format!("Redeemed {}: {input}", payload.reward_title),
            None => format!("{} redeemed {}", payload.username, payload.reward_title),
        };
        RoomAction::Append(
            Message::new(String::new(), now)
                .with_flags(MessageFlags::REDEEMED_REWARD)
                .with_login(payload.username.to_lowercase())
                .with_content(text),
        )
    }

    fn kicks_gifted(payload: KicksGifted, now: DateTime<Utc>) -> RoomAction {
        let gift = format!(
            "{} ({} {})",
            payload.gift.name,
            payload.gift.amount,
            plural(payload.gift.amount, "Kick")
        );
        let text = match payload.message.filter(|message| !message.is_empty()) {
            Some(message) => format!("Gifted {gift}: {message}"),
            None => format!("{} gifted {gift}", payload.sender.username),
        };
        RoomAction::Append(
            Message::new(String::new(), now)
                .with_flags(MessageFlags::REDEEMED_REWARD)
                .with_login(payload.sender.username.to_lowercase())
                .with_content(text),
        )
    }

    fn clear_chat(now: DateTime<Utc>) -> Vec<RoomAction> {
        let notice = Message::new(String::new(), now)
            .with_flags(MessageFlags::SYSTEM | MessageFlags::CLEAR_CHAT)
            .with_parse_time(now)
            .with_content("Chat has been cleared by a moderator.");
        vec![RoomAction::DisableAll, RoomAction::ClearChat(notice)]
    }
}

impl DispatchRouter for KickRouter {
    fn route(&mut self, frame: &DataFrame) -> Vec<RoomAction> {
        if KickTopic::parse(frame.topic.as_str()).is_none() {
            tracing::debug!(topic = %frame.topic, event = %frame.event, "Frame outside Kick topics");
            return Vec::new();
        }

        let now = Utc::now();
        let routed = match frame.event.as_str() {
            "ChatMessageEvent" => decode(frame).map(|p| vec![Self::chat_message(p)]),
            "MessageDeletedEvent" => decode(frame).map(|p: MessageDeleted| {
                vec![RoomAction::Disable { id: p.message.id }]
            }),
            "ChatroomClearEvent" => Some(Self::clear_chat(now)),
            "UserBannedEvent" => decode(frame).map(|p| vec![Self::banned(p, now)]),
            "UserUnbannedEvent" => decode(frame).map(|p| vec![Self::unbanned(p)]),
            "PinnedMessageDeletedEvent" => Some(vec![RoomAction::System(
                "The pinned message was unpinned.".to_string(),
            )]),
            "StreamHostEvent" => decode(frame).map(|p| vec![Self::host(p)]),
            "SubscriptionEvent" => decode(frame).map(|p| Self::subscription(p, now)),
            "GiftedSubscriptionsEvent" => decode(frame)
                .map(|p| Self::gifted_subscriptions(p).into_iter().collect()),
            "PinnedMessageCreatedEvent" => decode(frame).map(|p| vec![Self::pinned(p)]),
            "RewardRedeemedEvent" => decode(frame).map(|p| vec![Self::reward_redeemed(p, now)]),
            "KicksGifted" => decode(frame).map(|p| vec![Self::kicks_gifted(p, now)]),
            event if IGNORED_EVENTS.contains(&event) => Some(Vec::new()),
            event => {
                tracing::debug!(topic = %frame.topic, event = %event, "Unhandled Kick event");
                Some(Vec::new())
            }
        };
        routed.unwrap_or_default()
    }
}

fn decode<T: DeserializeOwned>(frame: &DataFrame) -> Option<T> {
    match T::deserialize(&frame.payload) {
        Ok(payload) => Some(payload),
        Err(e) => {
            tracing::debug!(
                topic = %frame.topic,
                event = %frame.event,
                error = %e,
                "Malformed Kick payload"
            );
            None
        }
    }
}

fn plural(count: u64, noun: &str) -> String {
    if count == 1 {
        noun.to_string()
    } else {
        format!("{noun}s")
    }
}

/// `a`, `a and b`, `a, b, and c`
fn join_names(names: &[String]) -> String {
    match names {
        [] => String::new(),
        [only] => only.clone(),
        [first, second] => format!("{first} and {second}"),
        [init @ .., last] => format!("{}, and {last}", init.join(", ")),
    }
}

fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|time| time.with_timezone(&Utc))
}

/// Compact duration such as `1h 30m`
fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let parts = [
        (seconds / 86_400, "d"),
        (seconds % 86_400 / 3_600, "h"),
        (seconds % 3_600 / 60, "m"),
        (seconds % 60, "s"),
    ];
    let formatted: Vec<String> = parts
        .iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| format!("{value}{unit}"))
        .collect();

    if formatted.is_empty() {
        "0s".to_string()
    } else {
        formatted.join(" ")
    }
}

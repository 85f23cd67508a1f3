//! Kick topic naming
//!
//! One Kick channel has a chatroom id and a channel id. Its events are spread
//! over six Pusher topics, three named after each id.

use livechat_core::Topic;
use std::fmt;
use std::str::FromStr;

use crate::error::ServiceError;

/// Ids of one Kick channel's chat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KickRoom {
    pub room_id: u64,
    pub channel_id: u64,
}

impl KickRoom {
    pub fn new(room_id: u64, channel_id: u64) -> Self {
        Self {
            room_id,
            channel_id,
        }
    }

    /// Main chat topic, used as the room key
    pub fn key(&self) -> Topic {
        Topic::new(format!("chatrooms.{}.v2", self.room_id))
    }

    /// Every topic carrying events for this room
    pub fn topics(&self) -> Vec<Topic> {
        let room = self.room_id;
        let channel = self.channel_id;
        vec![
            Topic::new(format!("chatroom_{room}")),
            Topic::new(format!("chatrooms.{room}")),
            self.key(),
            Topic::new(format!("channel.{channel}")),
            Topic::new(format!("channel_{channel}")),
            Topic::new(format!("predictions-channel-{channel}")),
        ]
    }
}

impl fmt::Display for KickRoom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.room_id, self.channel_id)
    }
}

/// Parses `<room id>:<channel id>`
impl FromStr for KickRoom {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ServiceError::InvalidRoom(s.to_string());
        let (room, channel) = s.split_once(':').ok_or_else(invalid)?;
        let room_id: u64 = room.trim().parse().map_err(|_| invalid())?;
        let channel_id: u64 = channel.trim().parse().map_err(|_| invalid())?;
        if room_id == 0 || channel_id == 0 {
            return Err(invalid());
        }
        Ok(Self::new(room_id, channel_id))
    }
}

/// Id carried by a Kick topic name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KickTopic {
    Room(u64),
    Channel(u64),
}

impl KickTopic {
    /// `None` for topics outside Kick's naming scheme
    pub fn parse(topic: &str) -> Option<Self> {
        let room = topic
            .strip_prefix("chatrooms.")
            .or_else(|| topic.strip_prefix("chatroom_"))
            .map(|rest| rest.strip_suffix(".v2").unwrap_or(rest));
        if let Some(id) = room {
            return parse_id(id).map(Self::Room);
        }

        ["channel_", "channel.", "predictions-channel-"]
            .iter()
            .find_map(|prefix| topic.strip_prefix(prefix))
            .and_then(parse_id)
            .map(Self::Channel)
    }
}

fn parse_id(raw: &str) -> Option<u64> {
    raw.parse().ok().filter(|id| *id > 0)
}

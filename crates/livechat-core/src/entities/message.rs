//! Message entity - one displayed line of a chat room
//!
//! A message is frozen once it is wrapped in a [`MessagePtr`]: the timeline
//! only ever swaps whole messages, so readers holding an older pointer keep
//! seeing a consistent value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::value_objects::MessageFlags;

/// Shared, frozen message
pub type MessagePtr = Arc<Message>;

/// Message entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Server-assigned id, empty for synthetic messages
    pub id: String,
    /// Server ordering key
    pub server_time: DateTime<Utc>,
    /// Local time the message was built
    pub parse_time: DateTime<Utc>,
    pub flags: MessageFlags,
    /// Login of the sender, empty for system messages
    pub login_name: String,
    /// Target of a timeout/ban notice
    pub timeout_user: Option<String>,
    /// Number of stacked moderation notices this message stands for
    pub count: u32,
    /// Id of the message this one replies to
    pub reply_parent_id: Option<String>,
    /// Display text, opaque to the pipeline
    pub content: String,
}

impl Message {
    /// Create a new message ordered at `server_time`
    pub fn new(id: impl Into<String>, server_time: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            server_time,
            parse_time: Utc::now(),
            flags: MessageFlags::empty(),
            login_name: String::new(),
            timeout_user: None,
            count: 1,
            reply_parent_id: None,
            content: String::new(),
        }
    }

    /// Create a synthetic system message stamped with the current time
    pub fn system(content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self::new(String::new(), now)
            .with_flags(MessageFlags::SYSTEM)
            .with_content(content)
    }

    /// Set the sender login
    #[must_use]
    pub fn with_login(mut self, login_name: impl Into<String>) -> Self {
        self.login_name = login_name.into();
        self
    }

    /// Set the display text
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Replace the flag set
    #[must_use]
    pub fn with_flags(mut self, flags: MessageFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the local parse time
    #[must_use]
    pub fn with_parse_time(mut self, parse_time: DateTime<Utc>) -> Self {
        self.parse_time = parse_time;
        self
    }

    /// Mark this message as a timeout notice for `user`
    #[must_use]
    pub fn with_timeout_user(mut self, user: impl Into<String>) -> Self {
        self.timeout_user = Some(user.into());
        self
    }

    /// Set the stack counter
    #[must_use]
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count.max(1);
        self
    }

    /// Set the reply parent
    #[must_use]
    pub fn with_reply_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.reply_parent_id = Some(parent_id.into());
        self
    }

    /// Clone this message with additional flags set
    #[must_use]
    pub fn with_flags_added(&self, flags: MessageFlags) -> Self {
        let mut copy = self.clone();
        copy.flags |= flags;
        copy
    }

    /// Freeze the message for storage
    #[inline]
    pub fn freeze(self) -> MessagePtr {
        Arc::new(self)
    }

    /// Check if the message is synthetic (system flag or no server id)
    #[inline]
    pub fn is_system(&self) -> bool {
        self.flags.contains(MessageFlags::SYSTEM) || self.id.is_empty()
    }

    /// Check if moderation has disabled this message
    #[inline]
    pub fn is_disabled(&self) -> bool {
        self.flags.contains(MessageFlags::DISABLED)
    }

    /// Check if the message is a reply
    #[inline]
    pub fn is_reply(&self) -> bool {
        self.reply_parent_id.is_some()
    }
}

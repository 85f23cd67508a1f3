//! Message addressing

use livechat_core::MessagePtr;

/// How a replacement target is identified
#[derive(Debug, Clone, Copy)]
pub enum MessageRef<'a> {
    /// Most recent entry with this id
    Id(&'a str),
    /// Slot index, oldest first
    Index(usize),
    /// Expected slot of a known entry; falls back to a full scan when the
    /// entry has moved
    Hinted {
        index: usize,
        message: &'a MessagePtr,
    },
}

/// Result of resolving an id through the lookup table
#[derive(Debug, Clone)]
pub enum Lookup {
    Live(MessagePtr),
    /// Evicted, cleared, or never seen
    Expired,
}

impl Lookup {
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live(_))
    }

    pub fn live(self) -> Option<MessagePtr> {
        match self {
            Self::Live(message) => Some(message),
            Self::Expired => None,
        }
    }
}

impl From<Option<MessagePtr>> for Lookup {
    fn from(value: Option<MessagePtr>) -> Self {
        value.map_or(Self::Expired, Self::Live)
    }
}

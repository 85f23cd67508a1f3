//! Message flags - moderation and presentation markers
//!
//! Flags never change on a stored message; a flagged copy replaces the
//! original slot in the timeline instead.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Per-message marker set
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct MessageFlags: u32 {
        /// Synthetic message produced by the client (joined, unpinned, ...)
        const SYSTEM               = 1 << 0;
        /// Notice that a user was timed out or banned
        const TIMEOUT              = 1 << 1;
        /// Notice that a timeout or ban was lifted
        const UNTIMEOUT            = 1 << 2;
        /// Message removed by moderation, still shown greyed out
        const DISABLED             = 1 << 3;
        /// Private message
        const WHISPER              = 1 << 4;
        /// Notice that the room's chat was cleared
        const CLEAR_CHAT           = 1 << 5;
        /// Never write this message to chat logs
        const DO_NOT_LOG           = 1 << 6;
        /// Deleted messages can no longer be replied to
        const INVALID_REPLY_TARGET = 1 << 7;
        /// Matched a highlight rule
        const HIGHLIGHTED          = 1 << 8;
        /// Loaded through historical backfill rather than the live stream
        const HISTORICAL           = 1 << 9;
        /// Subscription or gifted subscription announcement
        const SUBSCRIPTION         = 1 << 10;
        /// Reward redemption or paid gift
        const REDEEMED_REWARD      = 1 << 11;
    }
}

impl MessageFlags {
    /// Check if the set has any of the given flags
    #[inline]
    pub fn has_any(&self, flags: MessageFlags) -> bool {
        self.intersects(flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_set() {
        let flags = MessageFlags::TIMEOUT | MessageFlags::DISABLED;
        assert!(flags.contains(MessageFlags::TIMEOUT));
        assert!(!flags.contains(MessageFlags::SYSTEM));
        assert!(flags.has_any(MessageFlags::SYSTEM | MessageFlags::DISABLED));
        assert!(!flags.has_any(MessageFlags::SYSTEM | MessageFlags::WHISPER));
    }

    #[test]
    fn test_default_is_empty() {
        assert!(MessageFlags::default().is_empty());
    }

    #[test]
    fn test_serde_roundtrip() {
        let flags = MessageFlags::SYSTEM | MessageFlags::DO_NOT_LOG;
        let json = serde_json::to_string(&flags).unwrap();
        let parsed: MessageFlags = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, flags);
    }
}

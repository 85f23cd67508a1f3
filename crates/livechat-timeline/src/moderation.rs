//! Moderation edits
//!
//! Every edit swaps whole messages: a flagged copy takes the original's slot,
//! so readers holding the old pointer are unaffected.

use chrono::{DateTime, Duration, Utc};
use livechat_core::{Message, MessageFlags, MessagePtr};

use crate::lookup::MessageRef;
use crate::timeline::Timeline;

/// How many recent entries a stacking notice may merge with
const STACK_SCAN_LIMIT: usize = 20;

/// How old a notice may be and still absorb a repeat
const STACK_WINDOW_SECS: i64 = 20;

/// Where a moderation notice ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationOutcome {
    /// Merged into the existing notice at this slot
    Replaced(usize),
    Appended,
}

impl Timeline {
    /// Grey out one message and forbid replies to it
    pub fn disable_message(&self, id: &str) -> Option<usize> {
        let target = self.find_by_id(id)?;
        let replacement =
            target.with_flags_added(MessageFlags::DISABLED | MessageFlags::INVALID_REPLY_TARGET);
        self.replace(MessageRef::Id(id), replacement)
    }

    /// Grey out everything except notices and whispers
    ///
    /// Returns the number of entries replaced.
    pub fn disable_all_messages(&self) -> usize {
        let skip = MessageFlags::SYSTEM | MessageFlags::TIMEOUT | MessageFlags::WHISPER;
        self.disable_where(|message| !message.flags.has_any(skip))
    }

    /// Record a timeout or ban notice
    ///
    /// A notice for the same user posted within the stacking window is
    /// replaced by `message` with its counter incremented, unless an
    /// untimeout for that user came in between. Messages by the user are
    /// disabled either way.
    pub fn add_or_replace_timeout(&self, message: Message, now: DateTime<Utc>) -> ModerationOutcome {
        let Some(user) = message.timeout_user.clone() else {
            self.append(message);
            return ModerationOutcome::Appended;
        };

        let same_user = |entry: &MessagePtr| entry.timeout_user.as_deref() == Some(user.as_str());
        let previous = self.stackable(now, |entry| {
            if entry.flags.contains(MessageFlags::UNTIMEOUT) && same_user(entry) {
                Some(false)
            } else if entry.flags.contains(MessageFlags::TIMEOUT) && same_user(entry) {
                Some(true)
            } else {
                None
            }
        });

        let skip = MessageFlags::TIMEOUT | MessageFlags::UNTIMEOUT | MessageFlags::WHISPER;
        let disabled = self.disable_where(|entry| {
            entry.login_name == user && !entry.flags.has_any(skip)
        });
        tracing::debug!(user = %user, disabled, "Applied timeout");

        self.stack_or_append(previous, message)
    }

    /// Record a chat clear notice, merging with a recent one
    pub fn add_or_replace_clear_chat(&self, message: Message, now: DateTime<Utc>) -> ModerationOutcome {
        let previous = self.stackable(now, |entry| {
            entry.flags.contains(MessageFlags::CLEAR_CHAT).then_some(true)
        });
        self.stack_or_append(previous, message)
    }

    /// Scan recent entries newest first
    ///
    /// `verdict` returns `Some(true)` for a notice to merge with and
    /// `Some(false)` to stop looking.
    fn stackable<F>(&self, now: DateTime<Utc>, verdict: F) -> Option<(usize, MessagePtr)>
    where
        F: Fn(&MessagePtr) -> Option<bool>,
    {
        let oldest = now - Duration::seconds(STACK_WINDOW_SECS);
        let recent = self.last_n(STACK_SCAN_LIMIT);
        let offset = self.len().saturating_sub(recent.len());

        for (position, entry) in recent.iter().enumerate().rev() {
            if entry.parse_time < oldest {
                break;
            }
            match verdict(entry) {
                Some(true) => return Some((offset + position, entry.clone())),
                Some(false) => break,
                None => {}
            }
        }
        None
    }

    fn stack_or_append(
        &self,
        previous: Option<(usize, MessagePtr)>,
        message: Message,
    ) -> ModerationOutcome {
        if let Some((index, previous)) = previous {
            let replacement = message.with_count(previous.count.saturating_add(1));
            if let Some(index) = self.replace(
                MessageRef::Hinted {
                    index,
                    message: &previous,
                },
                replacement.clone(),
            ) {
                return ModerationOutcome::Replaced(index);
            }
            self.append(replacement);
            return ModerationOutcome::Appended;
        }

        self.append(message);
        ModerationOutcome::Appended
    }

    fn disable_where<P>(&self, predicate: P) -> usize
    where
        P: Fn(&MessagePtr) -> bool,
    {
        let mut replaced = 0;
        for (index, entry) in self.snapshot().iter().enumerate() {
            if entry.is_disabled() || !predicate(entry) {
                continue;
            }
            let target = MessageRef::Hinted {
                index,
                message: entry,
            };
            if self
                .replace(target, entry.with_flags_added(MessageFlags::DISABLED))
                .is_some()
            {
                replaced += 1;
            }
        }
        replaced
    }
}

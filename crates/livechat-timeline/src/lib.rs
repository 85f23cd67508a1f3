//! # livechat-timeline
//!
//! The per-room message store: a bounded, ordered sequence of frozen
//! messages that absorbs live appends, historical backfill, and in-place
//! moderation edits.

pub mod events;
pub mod lookup;
pub mod moderation;
pub mod threads;
pub mod timeline;

pub use events::TimelineEvent;
pub use lookup::{Lookup, MessageRef};
pub use moderation::ModerationOutcome;
pub use threads::ReplyThread;
pub use timeline::Timeline;

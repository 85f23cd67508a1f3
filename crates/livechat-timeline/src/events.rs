//! Timeline change notifications

use livechat_core::MessagePtr;

/// Net change applied to a timeline
#[derive(Debug, Clone)]
pub enum TimelineEvent {
    Appended(MessagePtr),
    /// Backfilled messages, in input order
    HistoricalBatchAdded(Vec<MessagePtr>),
    /// Messages added in front of the oldest entry
    PrependedBatch(Vec<MessagePtr>),
    Replaced {
        index: usize,
        previous: MessagePtr,
        replacement: MessagePtr,
    },
    Cleared,
    /// Oldest entry dropped to stay within capacity
    Evicted(MessagePtr),
}

//! Reply threads
//!
//! A thread refers to its messages by id only. Whether the root or a reply
//! is still in the timeline is answered by the timeline's lookup table, so
//! eviction never waits on a thread.

use livechat_core::MessagePtr;

use crate::lookup::Lookup;
use crate::timeline::Timeline;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyThread {
    root_id: String,
    replies: Vec<String>,
}

impl ReplyThread {
    pub fn new(root_id: impl Into<String>) -> Self {
        Self {
            root_id: root_id.into(),
            replies: Vec::new(),
        }
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    /// Reply ids in arrival order
    pub fn reply_ids(&self) -> &[String] {
        &self.replies
    }

    /// Track a reply; returns false if it was already part of the thread
    pub fn add_reply(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if id.is_empty() || id == self.root_id || self.replies.contains(&id) {
            return false;
        }
        self.replies.push(id);
        true
    }

    /// The thread's root message, if still held by `timeline`
    pub fn root(&self, timeline: &Timeline) -> Lookup {
        timeline.resolve(&self.root_id)
    }

    /// Replies still held by `timeline`, in arrival order
    pub fn live_replies(&self, timeline: &Timeline) -> Vec<MessagePtr> {
        self.replies
            .iter()
            .filter_map(|id| timeline.resolve(id).live())
            .collect()
    }
}

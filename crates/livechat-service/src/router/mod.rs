//! Dispatch routing
//!
//! A [`DispatchRouter`] understands one backend's event payloads and turns
//! each data frame into [`RoomAction`]s. The [`RoomDispatcher`] applies them
//! to the timeline of the frame's room.

mod dispatcher;
mod kick;
mod kick_room;

pub use dispatcher::RoomDispatcher;
pub use kick::KickRouter;
pub use kick_room::{KickRoom, KickTopic};

use livechat_core::Message;
use livechat_gateway::DataFrame;

/// Edit requested by a router for the frame's room
#[derive(Debug, Clone, PartialEq)]
pub enum RoomAction {
    Append(Message),
    /// Older messages in ascending time order
    HistoricalBatch(Vec<Message>),
    Replace {
        id: String,
        replacement: Message,
    },
    /// Grey out one message by id
    Disable {
        id: String,
    },
    /// Grey out every message except notices
    DisableAll,
    ClearChat(Message),
    Timeout(Message),
    /// Announce that `pinned_by` pinned message `id`
    ///
    /// The text of the stored message wins over `text` while it is still in
    /// the timeline.
    Pinned {
        id: String,
        pinned_by: String,
        text: String,
    },
    /// Plain system line
    System(String),
}

/// Backend-specific interpretation of data frames
pub trait DispatchRouter: Send {
    /// Decode `frame`; unknown or malformed events yield no actions
    fn route(&mut self, frame: &DataFrame) -> Vec<RoomAction>;
}

impl<F> DispatchRouter for F
where
    F: FnMut(&DataFrame) -> Vec<RoomAction> + Send,
{
    fn route(&mut self, frame: &DataFrame) -> Vec<RoomAction> {
        self(frame)
    }
}

//! Applies routed actions to room timelines

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use livechat_core::{Message, Topic};
use livechat_gateway::{DataFrame, DataHandler};
use livechat_timeline::{MessageRef, Timeline};
use std::sync::Arc;

use super::{DispatchRouter, RoomAction};

/// Data handler feeding every open room
///
/// Runs inside the gateway's mutator context, which makes it the only
/// writer of the timelines it owns.
pub struct RoomDispatcher<R> {
    rooms: Arc<DashMap<Topic, Arc<Timeline>>>,
    router: R,
}

impl<R: DispatchRouter> RoomDispatcher<R> {
    pub fn new(rooms: Arc<DashMap<Topic, Arc<Timeline>>>, router: R) -> Self {
        Self { rooms, router }
    }

    fn timeline(&self, topic: &Topic) -> Option<Arc<Timeline>> {
        self.rooms.get(topic).map(|room| room.value().clone())
    }
}

impl<R: DispatchRouter> DataHandler for RoomDispatcher<R> {
    fn on_data(&mut self, frame: &DataFrame) {
        let Some(timeline) = self.timeline(&frame.topic) else {
            tracing::debug!(topic = %frame.topic, event = %frame.event, "Dropping frame for closed room");
            return;
        };

        let now = Utc::now();
        for action in self.router.route(frame) {
            apply(&timeline, action, now);
        }
    }
}

fn apply(timeline: &Timeline, action: RoomAction, now: DateTime<Utc>) {
    match action {
        RoomAction::Append(message) => {
            timeline.append(message);
        }
        RoomAction::HistoricalBatch(messages) => {
            let added = timeline.insert_historical_batch(messages);
            tracing::debug!(added = added.len(), "Backfilled history");
        }
        RoomAction::Replace { id, replacement } => {
            if timeline.replace(MessageRef::Id(&id), replacement).is_none() {
                tracing::trace!(id = %id, "Replace target no longer present");
            }
        }
        RoomAction::Disable { id } => {
            if timeline.disable_message(&id).is_none() {
                tracing::trace!(id = %id, "Deleted message no longer present");
            }
        }
        RoomAction::DisableAll => {
            timeline.disable_all_messages();
        }
        RoomAction::ClearChat(message) => {
            timeline.add_or_replace_clear_chat(message, now);
        }
        RoomAction::Timeout(message) => {
            timeline.add_or_replace_timeout(message, now);
        }
        RoomAction::Pinned { id, pinned_by, text } => {
            let text = timeline
                .find_by_id(&id)
                .map_or(text, |pinned| pinned.content.clone());
            timeline.append(
                Message::system(format!("{pinned_by} pinned {text}"))
                    .with_login(pinned_by.to_lowercase()),
            );
        }
        RoomAction::System(text) => {
            timeline.append(Message::system(text));
        }
    }
}

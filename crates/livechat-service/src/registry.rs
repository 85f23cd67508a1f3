//! Room registry
//!
//! A room is one timeline fed by one or more topics. The registry keeps the
//! topic routes used by the dispatcher and the gateway subscriptions in step
//! with the set of open rooms.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use livechat_common::TimelineConfig;
use livechat_core::Topic;
use livechat_gateway::GatewayHandle;
use livechat_timeline::Timeline;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::error::ServiceResult;
use crate::router::{DispatchRouter, RoomDispatcher};

#[derive(Debug)]
struct Room {
    timeline: Arc<Timeline>,
    topics: Vec<Topic>,
}

/// Open rooms of one gateway
#[derive(Clone)]
pub struct RoomRegistry {
    /// Rooms by key
    rooms: Arc<DashMap<Topic, Room>>,
    /// Timeline of every subscribed topic
    routes: Arc<DashMap<Topic, Arc<Timeline>>>,
    gateway: GatewayHandle,
    scrollback_limit: usize,
}

impl RoomRegistry {
    pub fn new(gateway: GatewayHandle, config: &TimelineConfig) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            routes: Arc::new(DashMap::new()),
            gateway,
            scrollback_limit: config.scrollback_limit,
        }
    }

    pub fn gateway(&self) -> &GatewayHandle {
        &self.gateway
    }

    /// Open a room fed by the single topic `topic`
    pub async fn open_room(&self, topic: Topic) -> ServiceResult<Arc<Timeline>> {
        self.open_room_with(topic.clone(), [topic]).await
    }

    /// Open the room `key` and subscribe to every topic in `topics`
    ///
    /// Reopening an open room returns its existing timeline. A topic already
    /// routed to another room stays with that room.
    #[instrument(skip(self, topics), fields(room = %key))]
    pub async fn open_room_with<I>(&self, key: Topic, topics: I) -> ServiceResult<Arc<Timeline>>
    where
        I: IntoIterator<Item = Topic>,
    {
        if let Some(existing) = self.room(&key) {
            return Ok(existing);
        }

        let timeline = Timeline::new_shared(self.scrollback_limit)?;
        let mut owned = Vec::new();
        {
            let entry = self.rooms.entry(key.clone());
            if let Entry::Occupied(room) = &entry {
                return Ok(room.get().timeline.clone());
            }

            for topic in topics {
                if owned.contains(&topic) {
                    continue;
                }
                match self.routes.entry(topic.clone()) {
                    Entry::Occupied(_) => {
                        warn!(topic = %topic, "Topic already belongs to another room");
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(timeline.clone());
                        owned.push(topic);
                    }
                }
            }
            entry.or_insert(Room {
                timeline: timeline.clone(),
                topics: owned.clone(),
            });
        }

        for topic in owned.iter().cloned() {
            self.gateway.subscribe(topic).await;
        }
        info!(capacity = timeline.capacity(), topics = owned.len(), "Room opened");
        Ok(timeline)
    }

    /// Close a room and unsubscribe its topics; returns false if it was not open
    #[instrument(skip(self), fields(room = %key))]
    pub async fn close_room(&self, key: &Topic) -> bool {
        let Some((_, room)) = self.rooms.remove(key) else {
            return false;
        };
        for topic in room.topics {
            self.routes.remove(&topic);
            self.gateway.unsubscribe(topic).await;
        }
        info!("Room closed");
        true
    }

    /// Timeline of the room `key`
    pub fn room(&self, key: &Topic) -> Option<Arc<Timeline>> {
        self.rooms.get(key).map(|room| room.timeline.clone())
    }

    /// Timeline fed by `topic`
    pub fn route(&self, topic: &Topic) -> Option<Arc<Timeline>> {
        self.routes.get(topic).map(|route| route.value().clone())
    }

    /// Topics subscribed for the room `key`
    pub fn topics(&self, key: &Topic) -> Vec<Topic> {
        self.rooms
            .get(key)
            .map(|room| room.topics.clone())
            .unwrap_or_default()
    }

    /// Keys of every open room, sorted
    pub fn rooms(&self) -> Vec<Topic> {
        let mut keys: Vec<Topic> = self.rooms.iter().map(|room| room.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Data handler applying `router` output to this registry's rooms
    pub fn dispatcher<R: DispatchRouter>(&self, router: R) -> RoomDispatcher<R> {
        RoomDispatcher::new(self.routes.clone(), router)
    }

    /// Register a dispatcher for `router` with the gateway
    pub async fn attach_router<R>(&self, router: R) -> ServiceResult<()>
    where
        R: DispatchRouter + 'static,
    {
        self.gateway
            .register_data_handler(self.dispatcher(router))
            .await?;
        Ok(())
    }
}

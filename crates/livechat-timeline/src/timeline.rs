//! Channel message timeline
//!
//! Entries live in a ring buffer ordered oldest first. All mutations come
//! from the mutator context; the lock only guarantees that readers observe
//! whole snapshots.

use livechat_core::{CoreError, MessagePtr};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::events::TimelineEvent;
use crate::lookup::{Lookup, MessageRef};

/// Buffer size of the change notification channel
const EVENT_BUFFER_SIZE: usize = 256;

#[derive(Debug, Default)]
struct Inner {
    entries: VecDeque<MessagePtr>,
    /// Live entries by id; the most recently stored entry wins
    by_id: HashMap<String, MessagePtr>,
}

impl Inner {
    fn index(&mut self, message: &MessagePtr) {
        if !message.id.is_empty() {
            self.by_id.insert(message.id.clone(), message.clone());
        }
    }

    fn unindex(&mut self, message: &MessagePtr) {
        if self
            .by_id
            .get(&message.id)
            .is_some_and(|indexed| Arc::ptr_eq(indexed, message))
        {
            self.by_id.remove(&message.id);
        }
    }

    fn push_back(&mut self, message: MessagePtr) {
        self.index(&message);
        self.entries.push_back(message);
    }

    fn pop_front(&mut self) -> Option<MessagePtr> {
        let evicted = self.entries.pop_front()?;
        self.unindex(&evicted);
        Some(evicted)
    }

    fn insert(&mut self, position: usize, message: MessagePtr) {
        self.index(&message);
        self.entries.insert(position, message);
    }

    fn replace_at(&mut self, position: usize, replacement: MessagePtr) -> Option<MessagePtr> {
        let slot = self.entries.get_mut(position)?;
        let previous = std::mem::replace(slot, replacement.clone());
        self.unindex(&previous);
        self.index(&replacement);
        Some(previous)
    }

    fn position_of(&self, message: &MessagePtr) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| Arc::ptr_eq(entry, message))
    }

    fn resolve(&self, target: MessageRef<'_>) -> Option<usize> {
        match target {
            MessageRef::Id(id) if id.is_empty() => None,
            MessageRef::Id(id) => self.entries.iter().rposition(|entry| entry.id == id),
            MessageRef::Index(index) => (index < self.entries.len()).then_some(index),
            MessageRef::Hinted { index, message } => match self.entries.get(index) {
                Some(entry) if Arc::ptr_eq(entry, message) => Some(index),
                _ => self.position_of(message),
            },
        }
    }
}

/// Bounded, ordered message store of one room
#[derive(Debug)]
pub struct Timeline {
    capacity: usize,
    inner: RwLock<Inner>,
    events: broadcast::Sender<TimelineEvent>,
}

impl Timeline {
    /// Create an empty timeline holding at most `capacity` messages
    pub fn new(capacity: usize) -> Result<Self, CoreError> {
        if capacity == 0 {
            return Err(CoreError::InvalidCapacity(capacity));
        }
        let (events, _) = broadcast::channel(EVENT_BUFFER_SIZE);
        Ok(Self {
            capacity,
            inner: RwLock::new(Inner {
                entries: VecDeque::with_capacity(capacity),
                by_id: HashMap::new(),
            }),
            events,
        })
    }

    /// Create a timeline wrapped in Arc
    pub fn new_shared(capacity: usize) -> Result<Arc<Self>, CoreError> {
        Self::new(capacity).map(Arc::new)
    }

    /// Receive every future change
    pub fn subscribe(&self) -> broadcast::Receiver<TimelineEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: TimelineEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Append at the tail, returning the entry evicted to make room
    pub fn append(&self, message: impl Into<MessagePtr>) -> Option<MessagePtr> {
        let message = message.into();
        let evicted = {
            let mut inner = self.inner.write();
            let evicted = if inner.entries.len() >= self.capacity {
                inner.pop_front()
            } else {
                None
            };
            inner.push_back(message.clone());
            evicted
        };

        if let Some(evicted) = &evicted {
            self.emit(TimelineEvent::Evicted(evicted.clone()));
        }
        self.emit(TimelineEvent::Appended(message));
        evicted
    }

    /// Backfill older messages, given in ascending time order
    ///
    /// Each candidate goes right before the first non-system entry that is
    /// newer than it; failing that, right after the previous candidate placed
    /// at the end (initially the current tail). Candidates whose non-empty id
    /// is already present, or appeared earlier in the batch, are skipped. On
    /// a full timeline the oldest entry is evicted, and a candidate that
    /// would itself become the oldest entry is dropped.
    ///
    /// Returns the inserted messages still present when the batch ends, in
    /// input order. Evictions of entries this batch inserted are not reported.
    pub fn insert_historical_batch<I>(&self, messages: I) -> Vec<MessagePtr>
    where
        I: IntoIterator,
        I::Item: Into<MessagePtr>,
    {
        let mut added = Vec::new();
        let mut evicted = Vec::new();
        {
            let mut inner = self.inner.write();
            let snapshot: Vec<MessagePtr> = inner.entries.iter().cloned().collect();
            let mut seen: HashSet<String> = snapshot
                .iter()
                .filter(|entry| !entry.is_system())
                .map(|entry| entry.id.clone())
                .collect();
            let mut anchor = snapshot.last().cloned();

            for message in messages {
                let message: MessagePtr = message.into();
                if !message.id.is_empty() && !seen.insert(message.id.clone()) {
                    continue;
                }

                // Targets evicted earlier in this batch no longer count
                let before = snapshot
                    .iter()
                    .filter(|entry| !entry.is_system() && message.server_time < entry.server_time)
                    .find_map(|entry| inner.position_of(entry));

                let (mut position, at_end) = match before {
                    Some(position) => (position, false),
                    None => {
                        let after = anchor
                            .as_ref()
                            .and_then(|anchor| inner.position_of(anchor))
                            .map_or(inner.entries.len(), |position| position + 1);
                        (after, true)
                    }
                };

                if inner.entries.len() >= self.capacity {
                    if position == 0 {
                        tracing::trace!(id = %message.id, "Dropping backfill older than a full timeline");
                        continue;
                    }
                    if let Some(oldest) = inner.pop_front() {
                        // A candidate of this batch leaving again is not reported
                        match added.iter().position(|entry| Arc::ptr_eq(entry, &oldest)) {
                            Some(index) => {
                                added.remove(index);
                            }
                            None => evicted.push(oldest),
                        }
                    }
                    position -= 1;
                }

                inner.insert(position, message.clone());
                if at_end {
                    anchor = Some(message.clone());
                }
                added.push(message);
            }
        }

        for message in evicted {
            self.emit(TimelineEvent::Evicted(message));
        }
        if !added.is_empty() {
            self.emit(TimelineEvent::HistoricalBatchAdded(added.clone()));
        }
        added
    }

    /// Add messages in front of the oldest entry, only into free capacity
    ///
    /// When not all fit, the newest of `messages` are kept.
    pub fn prepend_batch<I>(&self, messages: I) -> Vec<MessagePtr>
    where
        I: IntoIterator,
        I::Item: Into<MessagePtr>,
    {
        let messages: Vec<MessagePtr> = messages.into_iter().map(Into::into).collect();
        let added = {
            let mut inner = self.inner.write();
            let free = self.capacity.saturating_sub(inner.entries.len());
            let skip = messages.len().saturating_sub(free);
            let added: Vec<MessagePtr> = messages.into_iter().skip(skip).collect();

            for message in added.iter().rev() {
                inner.index(message);
                inner.entries.push_front(message.clone());
            }
            added
        };

        if !added.is_empty() {
            self.emit(TimelineEvent::PrependedBatch(added.clone()));
        }
        added
    }

    /// Substitute the entry at `target`, keeping its slot
    ///
    /// Returns the slot index, or `None` when the target is gone.
    pub fn replace(&self, target: MessageRef<'_>, replacement: impl Into<MessagePtr>) -> Option<usize> {
        let replacement = replacement.into();
        let (index, previous) = {
            let mut inner = self.inner.write();
            let index = inner.resolve(target)?;
            let previous = inner.replace_at(index, replacement.clone())?;
            (index, previous)
        };

        self.emit(TimelineEvent::Replaced {
            index,
            previous,
            replacement,
        });
        Some(index)
    }

    /// Remove every entry
    pub fn evict_all(&self) {
        {
            let mut inner = self.inner.write();
            inner.entries.clear();
            inner.by_id.clear();
        }
        self.emit(TimelineEvent::Cleared);
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Linear scan, newest first when `from_tail`
    pub fn find<P>(&self, predicate: P, from_tail: bool) -> Option<MessagePtr>
    where
        P: Fn(&MessagePtr) -> bool,
    {
        let inner = self.inner.read();
        if from_tail {
            inner.entries.iter().rev().find(|m| predicate(m)).cloned()
        } else {
            inner.entries.iter().find(|m| predicate(m)).cloned()
        }
    }

    /// Most recent entry with `id`
    pub fn find_by_id(&self, id: &str) -> Option<MessagePtr> {
        if id.is_empty() {
            return None;
        }
        self.find(|message| message.id == id, true)
    }

    /// Most recent message sent by `login` among the last `within` entries
    pub fn find_last_by_sender(&self, login: &str, within: usize) -> Option<MessagePtr> {
        let inner = self.inner.read();
        inner
            .entries
            .iter()
            .rev()
            .take(within)
            .find(|message| !message.is_system() && message.login_name == login)
            .cloned()
    }

    /// Resolve an id through the lookup table
    pub fn resolve(&self, id: &str) -> Lookup {
        self.inner.read().by_id.get(id).cloned().into()
    }

    /// Whole ordered copy of the current entries
    pub fn snapshot(&self) -> Vec<MessagePtr> {
        self.inner.read().entries.iter().cloned().collect()
    }

    /// The newest `n` entries, oldest first
    pub fn last_n(&self, n: usize) -> Vec<MessagePtr> {
        let inner = self.inner.read();
        let skip = inner.entries.len().saturating_sub(n);
        inner.entries.iter().skip(skip).cloned().collect()
    }

    pub fn last(&self) -> Option<MessagePtr> {
        self.inner.read().entries.back().cloned()
    }
}

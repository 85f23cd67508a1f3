//! Immutable snapshot swap
//!
//! Data produced by the mutator context and read elsewhere is published as a
//! whole new value; readers always get a complete `Arc<T>` and writers never
//! mutate in place.

use arc_swap::ArcSwap;
use std::fmt;
use std::sync::Arc;

/// Atomically replaceable handle to an immutable value
pub struct SnapshotCell<T> {
    current: ArcSwap<T>,
}

impl<T> SnapshotCell<T> {
    /// Create a cell holding `value`
    pub fn new(value: T) -> Self {
        Self {
            current: ArcSwap::from_pointee(value),
        }
    }

    /// Get the current snapshot
    pub fn load(&self) -> Arc<T> {
        self.current.load_full()
    }

    /// Publish a new snapshot, returning the previous one
    pub fn publish(&self, value: T) -> Arc<T> {
        self.current.swap(Arc::new(value))
    }

    /// Derive and publish a new snapshot from the current one
    ///
    /// `f` may run more than once if another writer publishes concurrently.
    pub fn update<F>(&self, f: F) -> Arc<T>
    where
        F: Fn(&T) -> T,
    {
        self.current.rcu(|current| Arc::new(f(current)))
    }
}

impl<T: Default> Default for SnapshotCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for SnapshotCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SnapshotCell").field(&self.load()).finish()
    }
}

// src/pool.rs

//! Bounded free-list allocator for [`Event`] records.
//!
//! Registering an action obtains one slot per awaited key; cancelling (or
//! tearing the engine down) recycles them. Reuse avoids per-registration
//! allocation churn when actions are registered and cancelled frequently.
//!
//! The pool is an explicit object owned by the engine instance rather than
//! process-global state, so every test can start from a fresh pool.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::action::{Event, EventKey};

/// Default bound on the free list. Beyond this, recycled instances are
/// simply dropped for the allocator to reclaim.
pub const DEFAULT_POOL_CAPACITY: usize = 50;

/// Free list of reset [`Event`] instances, guarded by an internal lock
/// since the pool may be touched from either execution context.
pub struct EventPool<K> {
    free: Mutex<Vec<Event<K>>>,
    capacity: usize,
}

impl<K: EventKey> EventPool<K> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_POOL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            capacity,
        }
    }

    /// Hand out a reset event carrying `key`, reusing a recycled instance
    /// when one is available. Reuse order is last-in-first-out.
    pub fn obtain(&self, key: K) -> Event<K> {
        let mut free = self.lock_free();
        match free.pop() {
            Some(mut event) => {
                event.rebind(key);
                event
            }
            None => Event::new(key),
        }
    }

    /// Return an event to the free list, unless the pool is already at
    /// capacity, in which case the instance is dropped.
    pub fn recycle(&self, mut event: Event<K>) {
        let mut free = self.lock_free();
        if free.len() < self.capacity {
            event.reset();
            free.push(event);
        }
    }

    /// Empty the free list. Used on full engine teardown.
    pub fn release_all(&self) {
        let mut free = self.lock_free();
        let released = free.len();
        free.clear();
        debug!(released, "event pool released");
    }

    /// Number of instances currently on the free list.
    pub fn free_len(&self) -> usize {
        self.lock_free().len()
    }

    fn lock_free(&self) -> MutexGuard<'_, Vec<Event<K>>> {
        // Pool state is trivially consistent; tolerate a poisoned lock.
        self.free.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K: EventKey> Default for EventPool<K> {
    fn default() -> Self {
        Self::new()
    }
}

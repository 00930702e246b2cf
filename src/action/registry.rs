// src/action/registry.rs

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::action::event::EventKey;
use crate::action::state::{Action, ActionFlags, ActionId, JoinMode, ResultMode};
use crate::dispatch::Callback;
use crate::errors::{FlowError, Result};
use crate::pool::EventPool;

/// Owner of the current set of live actions, keyed by id.
///
/// Enforces at-most-one action per id: registering a duplicate replaces
/// the prior one (cancel, recycle, re-create). Event slots come out of the
/// owned [`EventPool`] and go back into it on cancellation.
pub struct ActionRegistry<K: EventKey> {
    actions: HashMap<ActionId, Action<K>>,
    pool: EventPool<K>,
}

impl<K: EventKey> ActionRegistry<K> {
    pub fn new(pool: EventPool<K>) -> Self {
        Self {
            actions: HashMap::new(),
            pool,
        }
    }

    /// Construct and store a new action for `id`, replacing any existing
    /// one with the same id.
    pub fn register(
        &mut self,
        id: ActionId,
        join_mode: JoinMode,
        result_mode: ResultMode,
        flags: ActionFlags,
        keys: Vec<K>,
        callback: Option<Callback>,
    ) {
        if self.cancel(id) {
            debug!(action = id, "action already exists, replacing it");
        }

        debug!(action = id, keys = ?keys, ?join_mode, ?result_mode, "action registered");

        let events = keys.into_iter().map(|k| self.pool.obtain(k)).collect();
        let action = Action::new(id, join_mode, result_mode, flags, events, callback);
        self.actions.insert(id, action);
    }

    /// Recycle the action's events and remove it. Returns whether an
    /// action was actually removed; a missing id is a no-op.
    pub fn cancel(&mut self, id: ActionId) -> bool {
        match self.actions.remove(&id) {
            Some(mut action) => {
                for event in action.take_events() {
                    self.pool.recycle(event);
                }
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: ActionId) -> bool {
        self.actions.contains_key(&id)
    }

    pub fn get(&self, id: ActionId) -> Option<&Action<K>> {
        self.actions.get(&id)
    }

    pub fn get_mut(&mut self, id: ActionId) -> Option<&mut Action<K>> {
        self.actions.get_mut(&id)
    }

    /// Snapshot of the currently registered ids. Delivery iterates over
    /// this rather than the live map, since a run-once firing removes its
    /// action mid-scan.
    pub fn ids(&self) -> Vec<ActionId> {
        self.actions.keys().copied().collect()
    }

    /// Return every event of `id` to Waiting without removing the action.
    pub fn reset(&mut self, id: ActionId) -> Result<()> {
        match self.actions.get_mut(&id) {
            Some(action) => {
                action.reset();
                debug!(action = id, "action reset to waiting");
                Ok(())
            }
            None => Err(FlowError::NoSuchAction(id)),
        }
    }

    /// First event of `id` not yet satisfied.
    ///
    /// Errors if the action does not exist or if every event is already
    /// satisfied.
    pub fn waiting_key(&self, id: ActionId) -> Result<K> {
        let action = self.actions.get(&id).ok_or(FlowError::NoSuchAction(id))?;
        action
            .waiting_key()
            .cloned()
            .ok_or(FlowError::AllEventsSatisfied(id))
    }

    pub fn set_result_mode(&mut self, id: ActionId, mode: ResultMode) -> Result<()> {
        match self.actions.get_mut(&id) {
            Some(action) => {
                action.set_result_mode(mode);
                Ok(())
            }
            None => Err(FlowError::NoSuchAction(id)),
        }
    }

    /// Recycle every action and release the pool. Whole-engine teardown.
    pub fn teardown(&mut self) {
        let ids = self.ids();
        for id in ids {
            if !self.cancel(id) {
                warn!(action = id, "action vanished during teardown");
            }
        }
        self.pool.release_all();
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn pool(&self) -> &EventPool<K> {
        &self.pool
    }
}

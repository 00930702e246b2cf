// src/dispatch/dispatcher.rs

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::time::sleep;
use tracing::debug;

use crate::action::ActionId;
use crate::dispatch::message::FireMessage;

/// Posting side of the two serial execution contexts, plus the validity
/// ledger for cancellation.
///
/// Every fire becomes a [`FireMessage`] posted to either the worker
/// channel (drained by a per-engine background task) or the host-main
/// channel (drained cooperatively by the embedding application). Each
/// context delivers in post order; there is no ordering between them.
///
/// Queued messages cannot be plucked back out of a channel, so
/// cancellation works by stamping: each message carries the engine epoch
/// and the per-id generation current at post time, and a dequeued message
/// with stale stamps is dropped at the dispatch boundary. This closes the
/// cancelled-but-queued race; a callback already executing is never
/// interrupted.
pub(crate) struct Dispatcher {
    worker_tx: Mutex<Option<UnboundedSender<FireMessage>>>,
    main_tx: Mutex<Option<UnboundedSender<FireMessage>>>,
    /// Bumped by pause/stop; invalidates everything queued anywhere.
    epoch: AtomicU64,
    /// Bumped per id by cancel/cancel_timer; invalidates that id's
    /// queued messages. Missing entry reads as zero.
    generations: Mutex<HashMap<ActionId, u64>>,
}

impl Dispatcher {
    pub fn new(
        worker_tx: UnboundedSender<FireMessage>,
        main_tx: UnboundedSender<FireMessage>,
    ) -> Self {
        Self {
            worker_tx: Mutex::new(Some(worker_tx)),
            main_tx: Mutex::new(Some(main_tx)),
            epoch: AtomicU64::new(0),
            generations: Mutex::new(HashMap::new()),
        }
    }

    /// Current validity stamps for a message about to be posted for `id`.
    pub fn stamp(&self, id: ActionId) -> (u64, u64) {
        let epoch = self.epoch.load(Ordering::Acquire);
        let generation = self.lock_generations().get(&id).copied().unwrap_or(0);
        (epoch, generation)
    }

    /// Whether a dequeued message is still current.
    pub fn is_current(&self, msg: &FireMessage) -> bool {
        if msg.epoch != self.epoch.load(Ordering::Acquire) {
            return false;
        }
        msg.generation == self.lock_generations().get(&msg.id).copied().unwrap_or(0)
    }

    /// Post a message to its target context immediately.
    pub fn post(&self, msg: FireMessage) {
        let id = msg.id;
        let tx = if msg.run_on_main {
            self.main_sender()
        } else {
            self.worker_sender()
        };
        let sent = match tx {
            Some(tx) => tx.send(msg).is_ok(),
            None => false,
        };

        if !sent {
            debug!(action = id, "execution context closed, message dropped");
        }
    }

    /// Post a message to its target context after `delay`.
    pub fn post_delayed(&self, msg: FireMessage, delay: Duration) {
        let tx = if msg.run_on_main {
            self.main_sender()
        } else {
            self.worker_sender()
        };

        let Some(tx) = tx else {
            debug!(action = msg.id, "execution context shut down, delayed message dropped");
            return;
        };

        tokio::spawn(async move {
            sleep(delay).await;
            let _ = tx.send(msg);
        });
    }

    /// Invalidate every message currently queued for `id`, on both
    /// contexts and in pending timers.
    pub fn cancel_messages(&self, id: ActionId) {
        let mut generations = self.lock_generations();
        *generations.entry(id).or_insert(0) += 1;
        debug!(action = id, "queued messages for action invalidated");
    }

    /// Invalidate everything queued anywhere. Used by pause/stop.
    pub fn drop_all_pending(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.lock_generations().clear();
        debug!("all pending messages invalidated");
    }

    /// Close both channels so the worker drain task and a host driving
    /// the main context exit once pending timer handles let go of their
    /// sender clones. Irreversible.
    pub fn shutdown(&self) {
        self.worker_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.main_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    fn worker_sender(&self) -> Option<UnboundedSender<FireMessage>> {
        self.worker_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn main_sender(&self) -> Option<UnboundedSender<FireMessage>> {
        self.main_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lock_generations(&self) -> MutexGuard<'_, HashMap<ActionId, u64>> {
        self.generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

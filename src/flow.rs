// src/flow.rs

//! The public engine facade.
//!
//! A [`Flow`] owns one action registry (with its event pool), the message
//! dispatcher, a running flag and an optional global callback used when an
//! action has no per-action callback. Construction also hands back the
//! [`MainContext`], the receiving half of the host-main execution context,
//! which the embedding application drains from its own loop.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tracing::{debug, error, info, warn};

use crate::action::{
    ActionFlags, ActionId, ActionRegistry, EventKey, JoinMode, Payload, ResultMode,
};
use crate::dispatch::{Callback, Dispatcher, FireMessage, Fired, MessageKind, spawn_worker};
use crate::errors::{FlowError, Result};
use crate::pool::EventPool;

/// State shared between the facade, the worker drain task and the
/// host-main context.
struct FlowCore<K: EventKey> {
    registry: Mutex<ActionRegistry<K>>,
    dispatcher: Dispatcher,
    running: AtomicBool,
    global_callback: Mutex<Option<Callback>>,
}

impl<K: EventKey> FlowCore<K> {
    fn lock_registry(&self) -> MutexGuard<'_, ActionRegistry<K>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_global_callback(&self) -> MutexGuard<'_, Option<Callback>> {
        self.global_callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver one dequeued fire message on the current context.
    ///
    /// Stale or post-shutdown messages are dropped silently; a panicking
    /// callback is caught and logged so the context keeps draining.
    fn handle(&self, msg: FireMessage) {
        if !self.running.load(Ordering::Acquire) {
            debug!(action = msg.id, "engine not running, message dropped");
            return;
        }
        if !self.dispatcher.is_current(&msg) {
            debug!(action = msg.id, "stale message dropped");
            return;
        }

        let callback = match msg.kind {
            MessageKind::Repeat { period } => {
                let callback = match self.lock_registry().get(msg.id) {
                    Some(action) => action.callback(),
                    None => {
                        debug!(action = msg.id, "repeat action cancelled, chain stopped");
                        return;
                    }
                };

                // Re-post before invoking, so a long callback does not
                // stretch the period.
                let (epoch, generation) = self.dispatcher.stamp(msg.id);
                self.dispatcher.post_delayed(
                    FireMessage {
                        id: msg.id,
                        success: msg.success,
                        extra: msg.extra.wrapping_add(1),
                        payload: msg.payload.clone(),
                        callback: None,
                        kind: msg.kind,
                        run_on_main: msg.run_on_main,
                        epoch,
                        generation,
                    },
                    period,
                );
                callback
            }
            _ => msg.callback.clone(),
        };

        let callback = callback.or_else(|| self.lock_global_callback().clone());
        let Some(callback) = callback else {
            debug!(action = msg.id, "no callback for fired action");
            return;
        };

        let fired = Fired {
            id: msg.id,
            success: msg.success,
            extra: msg.extra,
            payload: msg.payload,
        };
        debug!(?fired, kind = ?msg.kind, "invoking action callback");

        if catch_unwind(AssertUnwindSafe(|| callback(&fired))).is_err() {
            error!(action = msg.id, "action callback panicked, dispatch continues");
        }
    }
}

/// The action/event coordination engine.
///
/// Cheap to clone; clones share the same registry, pool and dispatcher.
pub struct Flow<K: EventKey> {
    core: Arc<FlowCore<K>>,
}

impl<K: EventKey> Clone for Flow<K> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<K: EventKey> Flow<K> {
    /// Create an engine plus the host-main context to drain.
    ///
    /// Spawns the worker drain task, so this must be called inside a
    /// tokio runtime. `global_callback` handles every firing for which
    /// no per-action callback was registered.
    pub fn new(global_callback: Option<Callback>) -> (Self, MainContext<K>) {
        let (worker_tx, worker_rx) = unbounded_channel();
        let (main_tx, main_rx) = unbounded_channel();

        let core = Arc::new(FlowCore {
            registry: Mutex::new(ActionRegistry::new(EventPool::new())),
            dispatcher: Dispatcher::new(worker_tx, main_tx),
            running: AtomicBool::new(true),
            global_callback: Mutex::new(global_callback),
        });

        {
            let core = Arc::clone(&core);
            spawn_worker(worker_rx, move |msg| core.handle(msg));
        }

        info!("flow engine started");

        let flow = Self {
            core: Arc::clone(&core),
        };
        let main = MainContext { rx: main_rx, core };
        (flow, main)
    }

    /// Replace the global callback.
    pub fn set_callback(&self, callback: Callback) {
        *self.core.lock_global_callback() = Some(callback);
    }

    // ---- registration ------------------------------------------------

    /// AND-join action on the worker context: fires when all `keys` have
    /// been delivered, then again whenever the joint status flips.
    pub fn register(&self, id: ActionId, keys: Vec<K>, callback: Option<Callback>) {
        self.register_internal(
            id,
            JoinMode::AllOf,
            ResultMode::OnChange,
            ActionFlags::default(),
            keys,
            callback,
        );
    }

    /// Same as [`register`](Self::register), delivered on host-main.
    pub fn register_on_main(&self, id: ActionId, keys: Vec<K>, callback: Option<Callback>) {
        self.register_internal(
            id,
            JoinMode::AllOf,
            ResultMode::OnChange,
            ActionFlags {
                run_on_main: true,
                ..Default::default()
            },
            keys,
            callback,
        );
    }

    /// Ordered AND-join: events must complete left to right.
    pub fn register_sequence(
        &self,
        id: ActionId,
        keys: Vec<K>,
        run_on_main: bool,
        callback: Option<Callback>,
    ) {
        self.register_internal(
            id,
            JoinMode::Sequence,
            ResultMode::OnChange,
            ActionFlags {
                run_on_main,
                ..Default::default()
            },
            keys,
            callback,
        );
    }

    /// AND-join removed automatically after its first qualifying firing.
    pub fn wait_once(
        &self,
        id: ActionId,
        keys: Vec<K>,
        run_on_main: bool,
        callback: Option<Callback>,
    ) {
        self.register_internal(
            id,
            JoinMode::AllOf,
            ResultMode::OnChange,
            ActionFlags {
                run_on_main,
                run_once: true,
                ..Default::default()
            },
            keys,
            callback,
        );
    }

    /// Fires on every matching delivery, passing through the delivered
    /// success and extra, regardless of joint completeness.
    pub fn register_on_every_update(
        &self,
        id: ActionId,
        keys: Vec<K>,
        run_on_main: bool,
        callback: Option<Callback>,
    ) {
        self.register_internal(
            id,
            JoinMode::AllOf,
            ResultMode::OnEveryUpdate,
            ActionFlags {
                run_on_main,
                ..Default::default()
            },
            keys,
            callback,
        );
    }

    /// Change when an already registered action fires, e.g. to
    /// [`ResultMode::OnAllTrue`].
    pub fn set_result_mode(&self, id: ActionId, mode: ResultMode) -> Result<()> {
        self.core.lock_registry().set_result_mode(id, mode)
    }

    fn register_internal(
        &self,
        id: ActionId,
        join_mode: JoinMode,
        result_mode: ResultMode,
        flags: ActionFlags,
        keys: Vec<K>,
        callback: Option<Callback>,
    ) {
        if keys.is_empty() {
            warn!(action = id, "registration without events ignored");
            return;
        }

        let mut registry = self.core.lock_registry();
        if registry.contains(id) {
            self.core.dispatcher.cancel_messages(id);
        }
        registry.register(id, join_mode, result_mode, flags, keys, callback);
    }

    // ---- direct and timed runs ---------------------------------------

    /// Immediate one-shot fire on the worker context, no action involved.
    pub fn run(&self, id: ActionId) {
        self.run_with(id, false, true, 0, None);
    }

    /// Immediate one-shot fire on the host-main context.
    pub fn run_on_main(&self, id: ActionId) {
        self.run_with(id, true, true, 0, None);
    }

    pub fn run_with(
        &self,
        id: ActionId,
        run_on_main: bool,
        success: bool,
        extra: i32,
        payload: Option<Payload>,
    ) {
        if !self.is_running() {
            return;
        }

        let (epoch, generation) = self.core.dispatcher.stamp(id);
        self.core.dispatcher.post(FireMessage {
            id,
            success,
            extra,
            payload,
            callback: None,
            kind: MessageKind::Direct,
            run_on_main,
            epoch,
            generation,
        });
    }

    /// One-shot fire after `delay`. Replaces any timer already pending
    /// for this id.
    pub fn run_delayed(&self, id: ActionId, run_on_main: bool, delay: Duration) {
        self.run_delayed_with(id, run_on_main, delay, true, 0, None, None);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn run_delayed_with(
        &self,
        id: ActionId,
        run_on_main: bool,
        delay: Duration,
        success: bool,
        extra: i32,
        payload: Option<Payload>,
        callback: Option<Callback>,
    ) {
        if !self.is_running() {
            return;
        }

        self.core.dispatcher.cancel_messages(id);
        let (epoch, generation) = self.core.dispatcher.stamp(id);
        self.core.dispatcher.post_delayed(
            FireMessage {
                id,
                success,
                extra,
                payload,
                callback,
                kind: MessageKind::Delay,
                run_on_main,
                epoch,
                generation,
            },
            delay,
        );
        debug!(action = id, ?delay, "delayed run scheduled");
    }

    /// Re-fires every `period` until cancelled, carrying a wrapping
    /// counter in `extra`. The first firing comes after one period.
    pub fn run_repeating(
        &self,
        id: ActionId,
        run_on_main: bool,
        period: Duration,
        callback: Option<Callback>,
    ) {
        if !self.is_running() {
            return;
        }

        self.core.lock_registry().register(
            id,
            JoinMode::AllOf,
            ResultMode::OnChange,
            ActionFlags {
                run_on_main,
                run_once: false,
                repeating: true,
            },
            Vec::new(),
            callback,
        );

        self.core.dispatcher.cancel_messages(id);
        let (epoch, generation) = self.core.dispatcher.stamp(id);
        self.core.dispatcher.post_delayed(
            FireMessage {
                id,
                success: true,
                extra: 0,
                payload: None,
                callback: None,
                kind: MessageKind::Repeat { period },
                run_on_main,
                epoch,
                generation,
            },
            period,
        );
        debug!(action = id, ?period, "repeating run scheduled");
    }

    // ---- event delivery ----------------------------------------------

    /// Deliver a successful signal. See [`event_with`](Self::event_with).
    pub fn event(&self, key: &K) -> bool {
        self.event_with(key, true, 0, None)
    }

    /// Deliver a signal with an explicit outcome.
    pub fn event_result(&self, key: &K, success: bool) -> bool {
        self.event_with(key, success, 0, None)
    }

    /// Deliver a signal to all registered actions, synchronously on the
    /// caller's thread. Event state is mutated immediately; qualifying
    /// callbacks are posted to their execution contexts afterwards.
    ///
    /// Returns whether any action fired in response. A matching delivery
    /// that only advances partial join state returns `false`, as does a
    /// delivery while the engine is paused or stopped.
    pub fn event_with(
        &self,
        key: &K,
        success: bool,
        extra: i32,
        payload: Option<Payload>,
    ) -> bool {
        if !self.is_running() {
            return false;
        }

        debug!(?key, success, extra, "event received");

        let mut any_fired = false;
        let mut fires = Vec::new();
        {
            let mut registry = self.core.lock_registry();
            for id in registry.ids() {
                let Some(action) = registry.get_mut(id) else {
                    continue;
                };
                let delivery = action.deliver(key, success, extra, payload.clone());
                if !delivery.matched {
                    continue;
                }

                if let Some(fire) = delivery.fire {
                    any_fired = true;
                    let flags = action.flags();
                    let callback = action.callback();
                    if flags.run_once {
                        registry.cancel(id);
                        debug!(action = id, "run-once action removed after firing");
                    }
                    fires.push((id, flags.run_on_main, callback, fire));
                }
            }
        }

        for (id, run_on_main, callback, fire) in fires {
            let (epoch, generation) = self.core.dispatcher.stamp(id);
            self.core.dispatcher.post(FireMessage {
                id,
                success: fire.success,
                extra: fire.extra,
                payload: payload.clone(),
                callback,
                kind: MessageKind::Joint,
                run_on_main,
                epoch,
                generation,
            });
        }

        any_fired
    }

    // ---- queries and cancellation ------------------------------------

    pub fn contains(&self, id: ActionId) -> bool {
        self.core.lock_registry().contains(id)
    }

    /// First event of `id` not yet satisfied. Errors if the action does
    /// not exist or everything is already satisfied.
    pub fn waiting_key(&self, id: ActionId) -> Result<K> {
        self.core.lock_registry().waiting_key(id)
    }

    pub fn is_waiting_for(&self, id: ActionId, key: &K) -> bool {
        self.waiting_key(id).map(|k| k == *key).unwrap_or(false)
    }

    /// Key of the most recently delivered event for `id`, if any.
    pub fn last_fired_key(&self, id: ActionId) -> Result<Option<K>> {
        let registry = self.core.lock_registry();
        let action = registry
            .get(id)
            .ok_or(FlowError::NoSuchAction(id))?;
        Ok(action.last_fired_key().cloned())
    }

    /// Return every event of `id` to Waiting without removing the action.
    pub fn reset(&self, id: ActionId) -> Result<()> {
        self.core.lock_registry().reset(id)
    }

    /// Remove the action and invalidate anything queued for it. No-op if
    /// the id is not registered.
    pub fn cancel(&self, id: ActionId) {
        self.core.dispatcher.cancel_messages(id);
        if self.core.lock_registry().cancel(id) {
            debug!(action = id, "action cancelled and removed");
        }
    }

    /// Stop pending delayed or repeating runs for `id` without touching
    /// the registry.
    pub fn cancel_timer(&self, id: ActionId) {
        if !self.is_running() {
            return;
        }
        self.core.dispatcher.cancel_messages(id);
    }

    // ---- lifecycle ---------------------------------------------------

    pub fn is_running(&self) -> bool {
        self.core.running.load(Ordering::Acquire)
    }

    /// Drop everything queued on both contexts and stop accepting
    /// deliveries. Registered actions keep their state.
    pub fn pause(&self) {
        self.core.dispatcher.drop_all_pending();
        self.core.running.store(false, Ordering::Release);
        info!("flow paused");
    }

    /// Accept deliveries again. Nothing missed while paused is replayed.
    pub fn resume(&self) {
        self.core.running.store(true, Ordering::Release);
        info!("flow resumed");
    }

    /// Irreversible teardown: pause semantics plus clearing the global
    /// callback, recycling every action and closing both execution
    /// contexts.
    pub fn stop(&self) {
        self.core.running.store(false, Ordering::Release);
        self.core.dispatcher.drop_all_pending();
        *self.core.lock_global_callback() = None;
        self.core.lock_registry().teardown();
        self.core.dispatcher.shutdown();
        info!("flow stopped");
    }
}

/// Receiving half of the host-main execution context.
///
/// The embedding application owns this and decides when main-targeted
/// callbacks run: either by calling [`drain`](Self::drain) from its own
/// loop, or by handing the context to a dedicated task via
/// [`run`](Self::run).
pub struct MainContext<K: EventKey> {
    rx: UnboundedReceiver<FireMessage>,
    core: Arc<FlowCore<K>>,
}

impl<K: EventKey> MainContext<K> {
    /// Deliver everything currently queued for the main context, in post
    /// order. Returns how many messages were handled.
    pub fn drain(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(msg) = self.rx.try_recv() {
            self.core.handle(msg);
            handled += 1;
        }
        handled
    }

    /// Drive the main context until the engine is stopped and the last
    /// pending timer has let go of its sender clone. Messages dequeued
    /// after `stop` are dropped as stale.
    pub async fn run(mut self) {
        while let Some(msg) = self.rx.recv().await {
            self.core.handle(msg);
        }
        debug!("main context closed");
    }
}

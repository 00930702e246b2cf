// src/action/state.rs

use tracing::debug;

use crate::action::event::{Event, EventKey, EventStatus, Payload};
use crate::dispatch::Callback;

/// Integer id identifying one registered action. At most one action exists
/// per id at any time.
pub type ActionId = i32;

/// How the awaited events combine before an action may fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinMode {
    /// All events, in any order.
    AllOf,
    /// Events must complete left to right; a gap resets the predecessor.
    Sequence,
}

/// When a joint state change triggers the callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultMode {
    /// Fire only when the joint status flips, once all events have fired.
    OnChange,
    /// Fire on every delivery that keeps the joint status all-true.
    OnAllTrue,
    /// Fire on every matching delivery, regardless of joint completeness.
    OnEveryUpdate,
}

/// Named per-action flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionFlags {
    /// Deliver the fire on the host-main context instead of the worker.
    pub run_on_main: bool,
    /// Tear the action down after its first qualifying firing.
    pub run_once: bool,
    /// Timer action driven by a self-reposting repeat message.
    pub repeating: bool,
}

/// What an action decided to do with one delivered event.
#[derive(Debug)]
pub(crate) struct Delivery {
    /// Whether the delivered key matched one of this action's events.
    pub matched: bool,
    /// A firing to post, when the result mode qualified this delivery.
    pub fire: Option<FireParams>,
}

impl Delivery {
    fn ignored() -> Self {
        Self {
            matched: false,
            fire: None,
        }
    }
}

/// Parameters of one qualifying firing, handed to the dispatcher.
#[derive(Debug)]
pub(crate) struct FireParams {
    pub success: bool,
    pub extra: i32,
}

/// The join/sequence/repeat state machine for one registered rule.
///
/// Tracks a fixed set of events (order = registration order) and decides,
/// on every delivery, whether the callback should fire. Event-join actions
/// always hold at least one event; timer actions hold none.
pub struct Action<K: EventKey> {
    id: ActionId,
    events: Vec<Event<K>>,
    join_mode: JoinMode,
    result_mode: ResultMode,
    flags: ActionFlags,
    last_joint_status: EventStatus,
    last_fired: Option<usize>,
    callback: Option<Callback>,
}

impl<K: EventKey> Action<K> {
    pub(crate) fn new(
        id: ActionId,
        join_mode: JoinMode,
        result_mode: ResultMode,
        flags: ActionFlags,
        events: Vec<Event<K>>,
        callback: Option<Callback>,
    ) -> Self {
        Self {
            id,
            events,
            join_mode,
            result_mode,
            flags,
            last_joint_status: EventStatus::Waiting,
            last_fired: None,
            callback,
        }
    }

    pub fn id(&self) -> ActionId {
        self.id
    }

    pub fn flags(&self) -> ActionFlags {
        self.flags
    }

    pub fn join_mode(&self) -> JoinMode {
        self.join_mode
    }

    pub fn result_mode(&self) -> ResultMode {
        self.result_mode
    }

    pub(crate) fn set_result_mode(&mut self, mode: ResultMode) {
        self.result_mode = mode;
    }

    pub fn events(&self) -> &[Event<K>] {
        &self.events
    }

    /// The event slot for `key`, if this action awaits it.
    pub fn event(&self, key: &K) -> Option<&Event<K>> {
        self.events.iter().find(|e| e.key() == key)
    }

    /// Key of the most recently delivered event, if any has fired.
    pub fn last_fired_key(&self) -> Option<&K> {
        self.last_fired.map(|i| self.events[i].key())
    }

    /// First event not yet satisfied, i.e. what the action is waiting on.
    pub fn waiting_key(&self) -> Option<&K> {
        self.events.iter().find(|e| !e.is_success()).map(|e| e.key())
    }

    pub fn is_waiting_for(&self, key: &K) -> bool {
        self.waiting_key() == Some(key)
    }

    /// Per-action callback, if one was supplied at registration.
    pub(crate) fn callback(&self) -> Option<Callback> {
        self.callback.clone()
    }

    /// Return every event to Waiting and the joint status with them,
    /// without removing the action.
    pub(crate) fn reset(&mut self) {
        self.last_joint_status = EventStatus::Waiting;
        self.last_fired = None;
        for event in &mut self.events {
            event.reset();
        }
    }

    /// Hand the event slots back for recycling on teardown.
    pub(crate) fn take_events(&mut self) -> Vec<Event<K>> {
        self.callback = None;
        std::mem::take(&mut self.events)
    }

    /// Apply one delivered signal to this action's event list and decide
    /// whether to fire.
    ///
    /// The scan is linear by key equality. Under Sequence mode the scan
    /// stops at the first still-Waiting event that is not the delivered
    /// one, resetting its predecessor so completion stays contiguous
    /// left to right; it also stops right after the delivered event, so
    /// the joint tally only completes when the final event arrives.
    pub(crate) fn deliver(
        &mut self,
        key: &K,
        success: bool,
        extra: i32,
        payload: Option<Payload>,
    ) -> Delivery {
        let total = self.events.len();
        let mut fired_count = 0;
        let mut success_count = 0;
        let mut matched = false;

        for i in 0..total {
            if self.events[i].key() == key {
                matched = true;
                self.last_fired = Some(i);
                self.events[i].set_outcome(success, extra, payload.clone());
            } else if self.join_mode == JoinMode::Sequence
                && self.events[i].status() == EventStatus::Waiting
            {
                if i != 0 {
                    self.events[i - 1].set_waiting();
                }
                break;
            }

            match self.events[i].status() {
                EventStatus::Success => {
                    success_count += 1;
                    fired_count += 1;
                }
                EventStatus::Failure => {
                    fired_count += 1;
                }
                EventStatus::Waiting => {}
            }

            if matched && self.join_mode == JoinMode::Sequence {
                break;
            }
        }

        if !matched {
            return Delivery::ignored();
        }

        debug!(
            action = self.id,
            ?key,
            success,
            total,
            fired = fired_count,
            successes = success_count,
            "event applied to action"
        );

        let fire = match self.result_mode {
            ResultMode::OnEveryUpdate => Some(FireParams { success, extra }),
            ResultMode::OnChange | ResultMode::OnAllTrue if fired_count == total => {
                let joint = success_count == total;
                let current = if joint {
                    EventStatus::Success
                } else {
                    EventStatus::Failure
                };

                match self.result_mode {
                    ResultMode::OnChange => {
                        if current != self.last_joint_status {
                            self.last_joint_status = current;
                            Some(FireParams {
                                success: joint,
                                extra: success_count as i32,
                            })
                        } else {
                            None
                        }
                    }
                    ResultMode::OnAllTrue => joint.then_some(FireParams {
                        success: true,
                        extra: success_count as i32,
                    }),
                    ResultMode::OnEveryUpdate => unreachable!(),
                }
            }
            _ => None,
        };

        Delivery { matched: true, fire }
    }
}

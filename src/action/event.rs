// src/action/event.rs

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Bounds every event key type must satisfy.
///
/// Keys are compared by equality during delivery, cloned into diagnostics,
/// and may cross between the caller's thread and either execution context.
pub trait EventKey: Clone + Eq + fmt::Debug + Send + Sync + 'static {}

impl<T: Clone + Eq + fmt::Debug + Send + Sync + 'static> EventKey for T {}

/// Opaque payload attached to a delivery.
///
/// The concrete type is the caller's responsibility to know; the engine
/// never inspects it, only carries it to the callback.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Status of one awaited signal slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    /// Not fired yet.
    Waiting,
    /// Fired with success.
    Success,
    /// Fired with failure.
    Failure,
}

/// One slot of state for one awaited signal within one action.
///
/// An event is exclusively owned by its action while in use and by the
/// [`EventPool`](crate::pool::EventPool) while free, never shared.
pub struct Event<K> {
    key: K,
    status: EventStatus,
    payload: Option<Payload>,
    extra: i32,
}

impl<K: EventKey> Event<K> {
    pub fn new(key: K) -> Self {
        Self {
            key,
            status: EventStatus::Waiting,
            payload: None,
            extra: 0,
        }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn status(&self) -> EventStatus {
        self.status
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    pub fn extra(&self) -> i32 {
        self.extra
    }

    pub fn is_success(&self) -> bool {
        self.status == EventStatus::Success
    }

    /// True once the event has been delivered at least once, with either
    /// outcome. Waiting does not count as fired.
    pub fn fired(&self) -> bool {
        matches!(self.status, EventStatus::Success | EventStatus::Failure)
    }

    /// Record a delivery. An event can toggle between Success and Failure
    /// repeatedly; payload and extra are overwritten every time.
    pub(crate) fn set_outcome(&mut self, success: bool, extra: i32, payload: Option<Payload>) {
        self.status = if success {
            EventStatus::Success
        } else {
            EventStatus::Failure
        };
        self.extra = extra;
        self.payload = payload;
    }

    pub(crate) fn set_waiting(&mut self) {
        self.status = EventStatus::Waiting;
    }

    /// Return the slot to its initial state, keeping the key.
    pub(crate) fn reset(&mut self) {
        self.status = EventStatus::Waiting;
        self.payload = None;
        self.extra = 0;
    }

    /// Re-arm a recycled instance for a new key.
    pub(crate) fn rebind(&mut self, key: K) {
        self.key = key;
        self.reset();
    }
}

impl<K: fmt::Debug> fmt::Debug for Event<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Payload is an opaque Any, so only note its presence.
        f.debug_struct("Event")
            .field("key", &self.key)
            .field("status", &self.status)
            .field("extra", &self.extra)
            .field("has_payload", &self.payload.is_some())
            .finish()
    }
}

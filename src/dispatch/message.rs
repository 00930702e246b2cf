// src/dispatch/message.rs

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::action::{ActionId, Payload};

/// What a callback receives for one firing.
#[derive(Clone)]
pub struct Fired {
    pub id: ActionId,
    pub success: bool,
    pub extra: i32,
    pub payload: Option<Payload>,
}

impl fmt::Debug for Fired {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fired")
            .field("id", &self.id)
            .field("success", &self.success)
            .field("extra", &self.extra)
            .field("has_payload", &self.payload.is_some())
            .finish()
    }
}

/// Handler invoked on the target execution context when an action fires.
pub type Callback = Arc<dyn Fn(&Fired) + Send + Sync>;

/// What produced a fire message. Only `Repeat` changes dispatch behaviour
/// (the message re-posts itself); the rest is for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MessageKind {
    /// Direct `run` call, no action registered.
    Direct,
    /// Joint completion of a registered action.
    Joint,
    /// One-shot delay timer.
    Delay,
    /// Self-reposting repeat timer.
    Repeat { period: Duration },
}

/// One fire request posted to an execution context.
///
/// `epoch` and `generation` are the validity stamps taken at post time;
/// a dequeued message whose stamps no longer match the engine's current
/// values is dropped instead of dispatched.
pub(crate) struct FireMessage {
    pub id: ActionId,
    pub success: bool,
    pub extra: i32,
    pub payload: Option<Payload>,
    pub callback: Option<Callback>,
    pub kind: MessageKind,
    pub run_on_main: bool,
    pub epoch: u64,
    pub generation: u64,
}

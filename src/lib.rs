// src/lib.rs

//! eventflow — an in-process action/event coordination engine.
//!
//! The engine lets a program declare "run this code when these N
//! conditions have all been satisfied (optionally in order, optionally
//! repeatedly), on a specific execution context", replacing hand-rolled
//! counters and boolean flags around asynchronous, independently-arriving
//! signals (UI taps, network replies, timers).
//!
//! The pieces, leaves first:
//! - [`pool::EventPool`]: bounded free-list allocator for event records
//! - [`action::Event`]: one awaited signal slot (key + status + payload)
//! - [`action::Action`]: the join/sequence state machine per registered rule
//! - [`action::ActionRegistry`]: the live actions, keyed by integer id
//! - [`dispatch`]: fire messages and the two serial execution contexts
//!   (a per-engine worker task and the host-drained main context)
//! - [`flow::Flow`]: the facade composing all of the above
//!
//! Delivery flows one direction: `Flow::event()` synchronously updates
//! every matching action on the caller's thread, then posts qualifying
//! firings as messages to the worker or host-main context, where the
//! callback actually runs. Callers never block on handler code.

pub mod action;
pub mod dispatch;
pub mod errors;
pub mod flow;
pub mod logging;
pub mod pool;

pub use action::{
    Action, ActionFlags, ActionId, ActionRegistry, Event, EventKey, EventStatus, JoinMode,
    Payload, ResultMode,
};
pub use dispatch::{Callback, Fired};
pub use errors::{FlowError, Result};
pub use flow::{Flow, MainContext};
pub use pool::{DEFAULT_POOL_CAPACITY, EventPool};

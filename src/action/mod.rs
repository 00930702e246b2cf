// src/action/mod.rs

//! Actions and the events they await.
//!
//! This module holds:
//! - the [`Event`] slot type and its key/payload contracts
//! - the [`Action`] join/sequence state machine
//! - the [`ActionRegistry`] that owns all live actions, keyed by id

pub mod event;
pub mod registry;
pub mod state;

pub use event::{Event, EventKey, EventStatus, Payload};
pub use registry::ActionRegistry;
pub use state::{Action, ActionFlags, ActionId, JoinMode, ResultMode};

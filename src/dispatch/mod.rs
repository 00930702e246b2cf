// src/dispatch/mod.rs

//! Message dispatch across the two serial execution contexts.
//!
//! This module ties together:
//! - the fire message type and its validity stamps
//! - the posting side (worker channel + host-main channel + timers)
//! - the worker drain task
//!
//! The receiving side of the host-main context lives in
//! [`MainContext`](crate::flow::MainContext), which the embedding
//! application drains from its own loop.

pub mod context;
pub mod dispatcher;
pub mod message;

pub(crate) use context::spawn_worker;
pub(crate) use dispatcher::Dispatcher;
pub use message::{Callback, Fired};
pub(crate) use message::{FireMessage, MessageKind};

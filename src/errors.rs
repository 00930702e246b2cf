// src/errors.rs

//! Crate-wide error types and aliases.
//!
//! Only misuse of the registry surface signals explicitly; delivery-time
//! problems (stale messages, panicking callbacks, events arriving after
//! `stop`) are logged and swallowed at the dispatch boundary instead.

use thiserror::Error;

use crate::action::ActionId;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("no action registered with id {0}")]
    NoSuchAction(ActionId),

    #[error("all events for action {0} are already satisfied")]
    AllEventsSatisfied(ActionId),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, FlowError>;

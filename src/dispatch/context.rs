// src/dispatch/context.rs

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::dispatch::message::FireMessage;

/// Spawn the per-engine worker context: a background task draining fire
/// messages strictly in post order and handing each to `handle`.
///
/// The task exits when every sender clone has been dropped, which the
/// engine arranges on `stop`.
pub(crate) fn spawn_worker<F>(
    mut rx: UnboundedReceiver<FireMessage>,
    mut handle: F,
) -> JoinHandle<()>
where
    F: FnMut(FireMessage) + Send + 'static,
{
    tokio::spawn(async move {
        debug!("worker context started");
        while let Some(msg) = rx.recv().await {
            handle(msg);
        }
        debug!("worker context closed");
    })
}

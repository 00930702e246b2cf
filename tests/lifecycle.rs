use std::sync::Arc;
use std::time::Duration;

use eventflow::{Callback, Fired, Flow, FlowError};
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tokio::time::timeout;

fn capture() -> (Callback, UnboundedReceiver<(i32, bool, i32)>) {
    let (tx, rx) = unbounded_channel();
    let cb: Callback = Arc::new(move |fired: &Fired| {
        let _ = tx.send((fired.id, fired.success, fired.extra));
    });
    (cb, rx)
}

async fn next_fire(rx: &mut UnboundedReceiver<(i32, bool, i32)>) -> (i32, bool, i32) {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for a firing")
        .expect("capture channel closed")
}

async fn assert_no_fire(rx: &mut UnboundedReceiver<(i32, bool, i32)>) {
    assert!(
        timeout(Duration::from_millis(150), rx.recv()).await.is_err(),
        "unexpected firing"
    );
}

#[tokio::test]
async fn wait_once_is_unreachable_after_its_single_firing() {
    let (cb, mut rx) = capture();
    let (flow, _main) = Flow::new(Some(cb));

    flow.wait_once(2, vec!["a", "b"], false, None);

    flow.event(&"a");
    flow.event(&"b");
    assert_eq!(next_fire(&mut rx).await, (2, true, 2));

    assert!(!flow.contains(2));
    assert!(matches!(flow.waiting_key(2), Err(FlowError::NoSuchAction(2))));
    assert!(matches!(flow.reset(2), Err(FlowError::NoSuchAction(2))));
    assert!(!flow.event(&"a"));
    assert_no_fire(&mut rx).await;
}

#[tokio::test]
async fn reset_reproduces_an_identical_firing_sequence() {
    let (cb, mut rx) = capture();
    let (flow, _main) = Flow::new(Some(cb));

    flow.register(1, vec!["a", "b"], None);

    flow.event(&"a");
    flow.event(&"b");
    assert_eq!(next_fire(&mut rx).await, (1, true, 2));

    flow.reset(1).unwrap();
    assert_eq!(flow.waiting_key(1).unwrap(), "a");

    flow.event(&"a");
    assert_no_fire(&mut rx).await;
    flow.event(&"b");
    assert_eq!(next_fire(&mut rx).await, (1, true, 2));
}

#[tokio::test]
async fn paused_engine_ignores_events() {
    let (cb, mut rx) = capture();
    let (flow, _main) = Flow::new(Some(cb));

    flow.register(1, vec!["a"], None);

    flow.pause();
    assert!(!flow.is_running());
    assert!(!flow.event(&"a"));
    assert_no_fire(&mut rx).await;

    flow.resume();
    assert!(flow.event(&"a"));
    assert_eq!(next_fire(&mut rx).await, (1, true, 1));
}

#[tokio::test]
async fn pause_drops_messages_already_queued() {
    let (cb, mut rx) = capture();
    let (flow, mut main) = Flow::<&str>::new(Some(cb));

    flow.run_on_main(5);
    flow.pause();
    flow.resume();

    // The queued message was stamped before the pause, so draining the
    // main context discards it.
    assert_eq!(main.drain(), 1);
    assert_no_fire(&mut rx).await;
}

#[tokio::test]
async fn resume_does_not_replay_missed_events() {
    let (cb, mut rx) = capture();
    let (flow, _main) = Flow::new(Some(cb));

    flow.register(1, vec!["a", "b"], None);

    flow.pause();
    flow.event(&"a");
    flow.resume();

    flow.event(&"b");
    assert_no_fire(&mut rx).await;

    flow.event(&"a");
    assert_eq!(next_fire(&mut rx).await, (1, true, 2));
}

#[tokio::test]
async fn stop_tears_everything_down() {
    let (cb, mut rx) = capture();
    let (flow, _main) = Flow::new(Some(cb));

    flow.register(1, vec!["a"], None);
    flow.stop();

    assert!(!flow.is_running());
    assert!(!flow.contains(1));
    assert!(matches!(flow.waiting_key(1), Err(FlowError::NoSuchAction(1))));
    assert!(!flow.event(&"a"));

    flow.run(1);
    assert_no_fire(&mut rx).await;
}

#[tokio::test]
async fn cancel_on_an_unknown_id_is_a_no_op() {
    let (cb, _rx) = capture();
    let (flow, _main) = Flow::<&str>::new(Some(cb));

    flow.cancel(99);
    assert!(!flow.contains(99));
}

#[tokio::test]
async fn a_panicking_callback_does_not_kill_the_worker() {
    let panicking: Callback = Arc::new(|_fired: &Fired| panic!("callback exploded"));
    let (cb, mut rx) = capture();
    let (flow, _main) = Flow::new(None);

    flow.register(1, vec!["a"], Some(panicking));
    flow.register(2, vec!["b"], Some(cb));

    flow.event(&"a");
    flow.event(&"b");

    // The second action still fires after the first one's callback panicked.
    assert_eq!(next_fire(&mut rx).await, (2, true, 1));
}

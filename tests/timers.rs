use std::sync::Arc;
use std::time::{Duration, Instant};

use eventflow::{Callback, Fired, Flow};
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tokio::time::{sleep, timeout};

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

/// Give any in-flight message time to land, then assert sustained silence.
async fn assert_settled_silent(rx: &mut UnboundedReceiver<(i32, bool, i32)>) {
    sleep(Duration::from_millis(100)).await;
    while rx.try_recv().is_ok() {}
    assert!(
        timeout(Duration::from_millis(200), rx.recv()).await.is_err(),
        "firing observed after cancellation settled"
    );
}

#[tokio::test]
async fn run_posts_a_one_shot_fire() {
    let (cb, mut rx) = capture();
    let (flow, _main) = Flow::<&str>::new(Some(cb));

    flow.run(5);
    assert_eq!(next_fire(&mut rx).await, (5, true, 0));
}

#[tokio::test]
async fn run_with_carries_outcome_and_extra() {
    let (cb, mut rx) = capture();
    let (flow, _main) = Flow::<&str>::new(Some(cb));

    flow.run_with(6, false, false, 9, None);
    assert_eq!(next_fire(&mut rx).await, (6, false, 9));
}

#[tokio::test]
async fn run_delayed_fires_after_the_requested_wait() {
    let (cb, mut rx) = capture();
    let (flow, _main) = Flow::<&str>::new(Some(cb));

    let started = Instant::now();
    flow.run_delayed(3, false, Duration::from_millis(50));

    assert_eq!(next_fire(&mut rx).await, (3, true, 0));
    assert!(started.elapsed() >= Duration::from_millis(45));
}

#[tokio::test]
async fn run_delayed_with_callback_bypasses_the_global_one() {
    let (global_cb, mut global_rx) = capture();
    let (local_cb, mut local_rx) = capture();
    let (flow, _main) = Flow::<&str>::new(Some(global_cb));

    flow.run_delayed_with(
        8,
        false,
        Duration::from_millis(20),
        false,
        7,
        None,
        Some(local_cb),
    );

    assert_eq!(next_fire(&mut local_rx).await, (8, false, 7));
    assert!(
        timeout(Duration::from_millis(150), global_rx.recv())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn cancelled_delay_never_fires() {
    let (cb, mut rx) = capture();
    let (flow, _main) = Flow::<&str>::new(Some(cb));

    flow.run_delayed(3, false, Duration::from_millis(80));
    flow.cancel_timer(3);

    assert!(
        timeout(Duration::from_millis(300), rx.recv()).await.is_err(),
        "cancelled delayed run still fired"
    );
}

#[tokio::test]
async fn run_repeating_increments_extra_until_timer_cancelled() {
    let (cb, mut rx) = capture();
    let (flow, _main) = Flow::<&str>::new(None);

    flow.run_repeating(9, false, Duration::from_millis(25), Some(cb));

    assert_eq!(next_fire(&mut rx).await, (9, true, 0));
    assert_eq!(next_fire(&mut rx).await, (9, true, 1));

    flow.cancel_timer(9);
    assert_settled_silent(&mut rx).await;

    // The action itself is still registered; only the timer chain stopped.
    assert!(flow.contains(9));
}

#[tokio::test]
async fn cancelling_the_action_stops_the_repeat_chain() {
    let (cb, mut rx) = capture();
    let (flow, _main) = Flow::<&str>::new(None);

    flow.run_repeating(9, false, Duration::from_millis(25), Some(cb));
    assert_eq!(next_fire(&mut rx).await, (9, true, 0));

    flow.cancel(9);
    assert!(!flow.contains(9));
    assert_settled_silent(&mut rx).await;
}

#[tokio::test]
async fn repeat_without_local_callback_falls_back_to_global() {
    let (cb, mut rx) = capture();
    let (flow, _main) = Flow::<&str>::new(Some(cb));

    flow.run_repeating(4, false, Duration::from_millis(25), None);

    assert_eq!(next_fire(&mut rx).await, (4, true, 0));
    flow.cancel(4);
    assert_settled_silent(&mut rx).await;
}

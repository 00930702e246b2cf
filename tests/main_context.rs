use std::sync::Arc;
use std::time::Duration;

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

#[tokio::test]
async fn main_targeted_fires_wait_for_the_host_to_drain() {
    let (cb, mut rx) = capture();
    let (flow, mut main) = Flow::new(Some(cb));

    flow.register_on_main(1, vec!["a"], None);
    flow.event(&"a");

    // Nothing runs until the host drains its context.
    sleep(Duration::from_millis(100)).await;
    assert!(rx.try_recv().is_err());

    assert_eq!(main.drain(), 1);
    assert_eq!(next_fire(&mut rx).await, (1, true, 1));
}

#[tokio::test]
async fn worker_and_main_contexts_are_independent() {
    let (cb, mut rx) = capture();
    let (flow, mut main) = Flow::new(Some(cb));

    flow.register(1, vec!["a"], None);
    flow.register_on_main(2, vec!["b"], None);

    flow.event(&"a");
    flow.event(&"b");

    // The worker delivers without any cooperation from the host.
    assert_eq!(next_fire(&mut rx).await, (1, true, 1));
    sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());

    main.drain();
    assert_eq!(next_fire(&mut rx).await, (2, true, 1));
}

#[tokio::test]
async fn drain_reports_the_number_of_messages_handled() {
    let (cb, mut rx) = capture();
    let (flow, mut main) = Flow::<&str>::new(Some(cb));

    flow.run_on_main(5);
    flow.run_on_main(6);

    sleep(Duration::from_millis(20)).await;
    assert_eq!(main.drain(), 2);
    assert_eq!(next_fire(&mut rx).await, (5, true, 0));
    assert_eq!(next_fire(&mut rx).await, (6, true, 0));
    assert_eq!(main.drain(), 0);
}

#[tokio::test]
async fn run_finishes_once_the_engine_is_stopped() {
    let (cb, _rx) = capture();
    let (flow, main) = Flow::<&str>::new(Some(cb));

    let driver = tokio::spawn(main.run());
    flow.stop();

    timeout(Duration::from_secs(2), driver)
        .await
        .expect("main context task kept running after stop")
        .expect("main context task panicked");
}

#[tokio::test]
async fn main_context_preserves_post_order() {
    let (cb, mut rx) = capture();
    let (flow, mut main) = Flow::<&str>::new(Some(cb));

    for id in 10..15 {
        flow.run_on_main(id);
    }

    main.drain();
    for id in 10..15 {
        assert_eq!(next_fire(&mut rx).await, (id, true, 0));
    }
}

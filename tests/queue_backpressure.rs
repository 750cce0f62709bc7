//! Bounded-queue behavior at both ends of the cross-context pipeline.

mod common;

use common::net_fixture;
use tokio::sync::mpsc;
use tokio_test::{assert_pending, assert_ready, task};

#[tokio::test(start_paused = true)]
async fn full_command_queue_is_reported_back_to_the_peer() {
    let mut fx = net_fixture(irdeck::COMMAND_QUEUE_DEPTH);

    // Nothing drains the queue, so the first ten replays fit exactly.
    for id in 1..=irdeck::COMMAND_QUEUE_DEPTH as u32 {
        fx.task.handle_message(&id.to_string()).await;
    }
    assert!(fx.sent.lock().unwrap().is_empty());

    // The eleventh waits out the enqueue timeout and is dropped with a reply.
    fx.task.handle_message("11").await;
    assert_eq!(
        fx.sent.lock().unwrap().as_slice(),
        ["Error: Command queue is full"]
    );

    let mut drained = Vec::new();
    while let Ok(id) = fx.command_rx.try_recv() {
        drained.push(id);
    }
    assert_eq!(drained, (1..=10).collect::<Vec<u32>>());
}

#[tokio::test]
async fn notice_producer_blocks_until_the_consumer_drains() {
    let (tx, mut rx) = mpsc::channel::<String>(irdeck::NOTICE_QUEUE_DEPTH);
    for i in 0..irdeck::NOTICE_QUEUE_DEPTH {
        tx.try_send(format!("notice {}", i)).unwrap();
    }
    assert!(tx.try_send("overflow".to_string()).is_err());

    // A blocking send parks instead of dropping, and resumes on first drain.
    let mut send = task::spawn(tx.send("overflow".to_string()));
    assert_pending!(send.poll());
    assert_eq!(rx.try_recv().unwrap(), "notice 0");
    assert!(send.is_woken());
    assert_ready!(send.poll()).unwrap();
}

#[tokio::test(start_paused = true)]
async fn notice_delivery_retries_then_drops_silently() {
    let mut fx = net_fixture(irdeck::COMMAND_QUEUE_DEPTH);

    // Two failures still land on the third attempt.
    fx.task.transport_mut().fail_sends = 2;
    fx.task.deliver_with_retry("eventually").await;
    assert_eq!(fx.sent.lock().unwrap().as_slice(), ["eventually"]);

    // Three failures exhaust the budget; the notice vanishes without a
    // substitute error message.
    fx.task.transport_mut().fail_sends = 3;
    fx.task.deliver_with_retry("never").await;
    assert_eq!(fx.sent.lock().unwrap().as_slice(), ["eventually"]);
}

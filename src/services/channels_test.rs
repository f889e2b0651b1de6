use super::*;
use tokio::time::{Duration, timeout};

async fn assert_channel_has_payload(rx: &mut mpsc::Receiver<Utf8Bytes>) -> Utf8Bytes {
    timeout(Duration::from_millis(200), rx.recv())
        .await
        .expect("payload receive timed out")
        .expect("channel closed")
}

#[test]
fn register_and_unregister() {
    let mut set = ChannelSet::new();
    let id = Uuid::new_v4();
    let (tx, _rx) = mpsc::channel(4);

    assert!(set.register(id, tx));
    assert!(set.contains(id));
    assert_eq!(set.len(), 1);

    assert!(set.unregister(id));
    assert!(set.is_empty());
}

#[test]
fn unregister_is_idempotent() {
    let mut set = ChannelSet::new();
    let id = Uuid::new_v4();
    let (tx, _rx) = mpsc::channel(4);
    set.register(id, tx);

    assert!(set.unregister(id));
    assert!(!set.unregister(id));
    assert!(set.is_empty());
}

#[tokio::test]
async fn duplicate_register_keeps_first_handle() {
    let mut set = ChannelSet::new();
    let id = Uuid::new_v4();
    let (first_tx, mut first_rx) = mpsc::channel(4);
    let (second_tx, mut second_rx) = mpsc::channel(4);

    assert!(set.register(id, first_tx));
    assert!(!set.register(id, second_tx));
    assert_eq!(set.len(), 1);

    assert!(set.send_to_all(&Utf8Bytes::from("hello")).is_empty());
    assert_eq!(assert_channel_has_payload(&mut first_rx).await.as_str(), "hello");
    assert!(second_rx.try_recv().is_err());
}

#[tokio::test]
async fn send_to_all_reaches_every_channel() {
    let mut set = ChannelSet::new();
    let (tx_a, mut rx_a) = mpsc::channel(4);
    let (tx_b, mut rx_b) = mpsc::channel(4);
    set.register(Uuid::new_v4(), tx_a);
    set.register(Uuid::new_v4(), tx_b);

    let failures = set.send_to_all(&Utf8Bytes::from("{}"));
    assert!(failures.is_empty());
    assert_eq!(assert_channel_has_payload(&mut rx_a).await.as_str(), "{}");
    assert_eq!(assert_channel_has_payload(&mut rx_b).await.as_str(), "{}");
}

#[tokio::test]
async fn closed_channel_does_not_block_the_rest() {
    let mut set = ChannelSet::new();
    let dead = Uuid::new_v4();
    let (dead_tx, dead_rx) = mpsc::channel(4);
    let (live_tx_a, mut live_rx_a) = mpsc::channel(4);
    let (live_tx_b, mut live_rx_b) = mpsc::channel(4);
    set.register(Uuid::new_v4(), live_tx_a);
    set.register(dead, dead_tx);
    set.register(Uuid::new_v4(), live_tx_b);
    drop(dead_rx);

    let failures = set.send_to_all(&Utf8Bytes::from("payload"));

    assert_eq!(failures, vec![DeliveryFailure { session_id: dead, error: DeliveryError::Closed }]);
    assert_eq!(assert_channel_has_payload(&mut live_rx_a).await.as_str(), "payload");
    assert_eq!(assert_channel_has_payload(&mut live_rx_b).await.as_str(), "payload");
    // The broadcaster never unregisters; that is the connection's job.
    assert!(set.contains(dead));
}

#[tokio::test]
async fn full_queue_is_reported_and_skipped() {
    let mut set = ChannelSet::new();
    let slow = Uuid::new_v4();
    let (slow_tx, mut slow_rx) = mpsc::channel(1);
    set.register(slow, slow_tx);

    assert!(set.send_to_all(&Utf8Bytes::from("first")).is_empty());
    let failures = set.send_to_all(&Utf8Bytes::from("second"));

    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].session_id, slow);
    assert_eq!(failures[0].error, DeliveryError::Full);
    assert_eq!(failures[0].error.error_code(), "E_DELIVERY_QUEUE_FULL");
    assert_eq!(assert_channel_has_payload(&mut slow_rx).await.as_str(), "first");
}

#[test]
fn for_each_visits_every_channel_even_when_all_fail() {
    let mut set = ChannelSet::new();
    let mut receivers = Vec::new();
    for _ in 0..3 {
        let (tx, rx) = mpsc::channel(1);
        set.register(Uuid::new_v4(), tx);
        receivers.push(rx);
    }

    let mut visited = 0;
    let failures = set.for_each(|_, _| {
        visited += 1;
        Err(DeliveryError::Closed)
    });

    assert_eq!(visited, 3);
    assert_eq!(failures.len(), 3);
}

#[test]
fn clear_drops_every_handle() {
    let mut set = ChannelSet::new();
    let (tx, mut rx) = mpsc::channel::<Utf8Bytes>(1);
    set.register(Uuid::new_v4(), tx);

    assert_eq!(set.clear(), 1);
    assert!(set.is_empty());
    // Receiver observes the close once every sender is gone.
    assert!(matches!(rx.try_recv(), Err(mpsc::error::TryRecvError::Disconnected)));
}

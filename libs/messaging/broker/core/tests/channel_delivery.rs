//! Channel delivery behaviour: buffering, acknowledgement, requeue, timeout
//! redelivery and shutdown.

use broker_core::{Channel, ChannelConfig, ChannelError, Consumer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use types::{Message, MessageId};

#[derive(Debug, Default)]
struct FlagConsumer {
    closed: AtomicBool,
}

impl Consumer for FlagConsumer {
    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

fn config(buffer_size: usize, timeout: Duration) -> ChannelConfig {
    ChannelConfig {
        buffer_size,
        message_timeout: timeout,
        inbox_size: 16,
    }
}

fn msg(id: u64) -> Message {
    Message::new(MessageId::new(id), format!("body-{id}"))
}

#[tokio::test]
async fn test_full_buffer_keeps_first_n_messages() {
    let channel = Channel::spawn("bounded", config(3, Duration::from_secs(60)));

    for id in 1..=4 {
        assert!(channel.put(msg(id)).await);
    }

    let snapshot = channel.snapshot().await.unwrap();
    assert_eq!(
        snapshot.buffered,
        vec![MessageId::new(1), MessageId::new(2), MessageId::new(3)]
    );
    assert_eq!(snapshot.stats.published, 3);
    assert_eq!(snapshot.stats.dropped, 1);
}

#[tokio::test]
async fn test_pull_is_fifo_and_moves_message_in_flight() {
    let channel = Channel::spawn("fifo", ChannelConfig::default());
    channel.put(msg(1)).await;
    channel.put(msg(2)).await;

    let first = channel.pull().await.unwrap();
    let second = channel.pull().await.unwrap();
    assert_eq!(first.id(), MessageId::new(1));
    assert_eq!(second.id(), MessageId::new(2));
    assert_eq!(&first.body()[..], b"body-1");

    let snapshot = channel.snapshot().await.unwrap();
    assert!(snapshot.buffered.is_empty());
    assert_eq!(snapshot.in_flight, vec![MessageId::new(1), MessageId::new(2)]);
}

#[tokio::test]
async fn test_pull_waits_for_publish() {
    let channel = Channel::spawn("waiting", ChannelConfig::default());

    let puller = {
        let channel = channel.clone();
        tokio::spawn(async move { channel.pull().await })
    };
    tokio::task::yield_now().await;
    channel.put(msg(42)).await;

    let message = puller.await.unwrap().unwrap();
    assert_eq!(message.id(), MessageId::new(42));
}

#[tokio::test]
async fn test_finish_twice_reports_not_in_flight() {
    let channel = Channel::spawn("ack", ChannelConfig::default());
    channel.put(msg(7)).await;
    let message = channel.pull().await.unwrap();

    channel.finish(message.id()).await.unwrap();
    assert_eq!(
        channel.finish(message.id()).await,
        Err(ChannelError::NotInFlight(MessageId::new(7)))
    );

    let snapshot = channel.snapshot().await.unwrap();
    assert!(snapshot.in_flight.is_empty());
    assert!(snapshot.buffered.is_empty());
    assert_eq!(snapshot.stats.finished, 1);
}

#[tokio::test]
async fn test_requeue_then_finish_reports_not_in_flight() {
    let channel = Channel::spawn("requeue", ChannelConfig::default());
    channel.put(msg(1)).await;
    channel.put(msg(2)).await;
    let message = channel.pull().await.unwrap();

    channel.requeue(message.id()).await.unwrap();
    assert_eq!(
        channel.finish(message.id()).await,
        Err(ChannelError::NotInFlight(MessageId::new(1)))
    );

    // Requeued message goes to the back
    let snapshot = channel.snapshot().await.unwrap();
    assert_eq!(snapshot.buffered, vec![MessageId::new(2), MessageId::new(1)]);
}

#[tokio::test]
async fn test_settle_unknown_id() {
    let channel = Channel::spawn("unknown", ChannelConfig::default());
    assert_eq!(
        channel.requeue(MessageId::new(99)).await,
        Err(ChannelError::NotInFlight(MessageId::new(99)))
    );
}

#[tokio::test(start_paused = true)]
async fn test_unacknowledged_message_is_redelivered_after_timeout() {
    let timeout = Duration::from_secs(5);
    let channel = Channel::spawn("timeout", config(10, timeout));
    channel.put(msg(11)).await;

    let first = channel.pull().await.unwrap();
    tokio::time::sleep(timeout + Duration::from_millis(1)).await;

    let snapshot = channel.snapshot().await.unwrap();
    assert_eq!(snapshot.buffered, vec![MessageId::new(11)]);
    assert!(snapshot.in_flight.is_empty());
    assert_eq!(snapshot.stats.timed_out, 1);

    let again = channel.pull().await.unwrap();
    assert_eq!(again.id(), first.id());
    channel.finish(again.id()).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_finished_message_is_not_redelivered() {
    let timeout = Duration::from_secs(5);
    let channel = Channel::spawn("no-redelivery", config(10, timeout));
    channel.put(msg(3)).await;

    let message = channel.pull().await.unwrap();
    channel.finish(message.id()).await.unwrap();
    tokio::time::sleep(timeout * 2).await;

    let snapshot = channel.snapshot().await.unwrap();
    assert!(snapshot.buffered.is_empty());
    assert_eq!(snapshot.stats.timed_out, 0);
}

#[tokio::test(start_paused = true)]
async fn test_redelivery_gets_a_fresh_timeout() {
    let timeout = Duration::from_secs(10);
    let channel = Channel::spawn("fresh-timeout", config(10, timeout));
    channel.put(msg(1)).await;

    let message = channel.pull().await.unwrap();
    tokio::time::sleep(Duration::from_secs(6)).await;
    channel.requeue(message.id()).await.unwrap();
    let message = channel.pull().await.unwrap();

    // The first delivery would have expired by now
    tokio::time::sleep(Duration::from_secs(6)).await;
    let snapshot = channel.snapshot().await.unwrap();
    assert_eq!(snapshot.in_flight, vec![message.id()]);
    assert_eq!(snapshot.stats.timed_out, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_add_and_remove_consumers() {
    let channel = Channel::spawn("consumers", ChannelConfig::default());
    let consumers: Vec<Arc<dyn Consumer>> = (0..32)
        .map(|_| Arc::new(FlagConsumer::default()) as Arc<dyn Consumer>)
        .collect();

    let mut tasks = Vec::new();
    for consumer in consumers.iter().cloned() {
        let channel = channel.clone();
        tasks.push(tokio::spawn(async move {
            channel.add_consumer(Arc::clone(&consumer)).await.unwrap();
            // Duplicate registration is ignored
            channel.add_consumer(Arc::clone(&consumer)).await.unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(channel.snapshot().await.unwrap().consumers, 32);

    let mut tasks = Vec::new();
    for consumer in consumers.iter().take(20).cloned() {
        let channel = channel.clone();
        tasks.push(tokio::spawn(async move {
            channel.remove_consumer(&consumer).await.unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(channel.snapshot().await.unwrap().consumers, 12);

    // Unknown consumer removal succeeds
    let stranger: Arc<dyn Consumer> = Arc::new(FlagConsumer::default());
    channel.remove_consumer(&stranger).await.unwrap();
    assert_eq!(channel.snapshot().await.unwrap().consumers, 12);
}

#[tokio::test]
async fn test_close_closes_consumers_and_fails_pullers() {
    let channel = Channel::spawn("closing", ChannelConfig::default());
    let flag = Arc::new(FlagConsumer::default());
    channel
        .add_consumer(Arc::clone(&flag) as Arc<dyn Consumer>)
        .await
        .unwrap();

    let puller = {
        let channel = channel.clone();
        tokio::spawn(async move { channel.pull().await })
    };
    // Let the pull park before closing
    while channel.snapshot().await.unwrap().waiting_pullers == 0 {
        tokio::task::yield_now().await;
    }

    channel.close().await;

    assert!(flag.closed.load(Ordering::SeqCst));
    assert!(matches!(
        puller.await.unwrap(),
        Err(ChannelError::Closed { .. })
    ));
    assert!(channel.is_closed());
}

#[tokio::test]
async fn test_closed_channel_rejects_requests() {
    let channel = Channel::spawn("inert", ChannelConfig::default());
    channel.put(msg(1)).await;
    let message = channel.pull().await.unwrap();

    channel.close().await;
    // Second close is a no-op
    channel.close().await;

    assert!(!channel.put(msg(2)).await);
    assert!(matches!(
        channel.pull().await,
        Err(ChannelError::Closed { .. })
    ));
    assert!(matches!(
        channel.finish(message.id()).await,
        Err(ChannelError::Closed { .. })
    ));
    assert!(matches!(
        channel.requeue(message.id()).await,
        Err(ChannelError::Closed { .. })
    ));
    let consumer: Arc<dyn Consumer> = Arc::new(FlagConsumer::default());
    assert!(matches!(
        channel.add_consumer(consumer).await,
        Err(ChannelError::Closed { .. })
    ));
    assert!(channel.snapshot().await.is_err());
}

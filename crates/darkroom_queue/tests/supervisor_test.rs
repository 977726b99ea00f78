//! Tests for the connection supervisor against the in-memory broker.

use async_trait::async_trait;
use bytes::Bytes;
use darkroom_queue::{
    BrokerChannel, ConnectionSupervisor, Delivery, DeliveryHandler, HandlerOutcome, MemoryBroker,
    SupervisorConfig, SupervisorConfigBuilder,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};

fn config(queue: &str) -> SupervisorConfigBuilder {
    let mut builder = SupervisorConfigBuilder::default();
    builder.queue(queue);
    builder
}

fn build(builder: &SupervisorConfigBuilder) -> SupervisorConfig {
    builder.build().unwrap()
}

struct Recorder {
    broker: MemoryBroker,
    seen: Mutex<Vec<(Bytes, bool)>>,
    drop_connection_once: AtomicBool,
}

impl Recorder {
    fn new(broker: &MemoryBroker) -> Self {
        Self {
            broker: broker.clone(),
            seen: Mutex::new(Vec::new()),
            drop_connection_once: AtomicBool::new(false),
        }
    }

    async fn seen(&self) -> Vec<(Bytes, bool)> {
        self.seen.lock().await.clone()
    }
}

#[async_trait]
impl DeliveryHandler for Recorder {
    async fn handle(&self, delivery: &Delivery) -> HandlerOutcome {
        self.seen
            .lock()
            .await
            .push((delivery.payload.clone(), delivery.redelivered));

        if self.drop_connection_once.swap(false, Ordering::SeqCst) {
            self.broker.drop_connections().await;
        }

        if delivery.payload.as_ref() == b"bad" {
            HandlerOutcome::DeadLetter("not an image".to_string())
        } else {
            HandlerOutcome::Ack
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_connect_retries_at_fixed_interval() {
    let broker = MemoryBroker::new();
    broker.fail_next_connects(3).await;

    let mut supervisor = ConnectionSupervisor::new(broker.clone(), build(&config("images")));
    assert!(!supervisor.is_connected());

    let started = Instant::now();
    supervisor.connect().await.unwrap();

    assert_eq!(started.elapsed(), Duration::from_secs(21));
    assert_eq!(broker.connect_attempts().await, 4);
    assert!(supervisor.current_channel().is_some());
    assert_eq!(*supervisor.stats().connections(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_delay_is_configurable() {
    let broker = MemoryBroker::new();
    broker.fail_next_connects(2).await;

    let mut builder = config("images");
    builder.reconnect_delay(Duration::from_millis(500));
    let mut supervisor = ConnectionSupervisor::new(broker.clone(), build(&builder));

    let started = Instant::now();
    supervisor.connect().await.unwrap();
    assert_eq!(started.elapsed(), Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_acknowledges_every_delivery() {
    let broker = MemoryBroker::new();
    broker.push("images", "a").await;
    broker.push("images", "b").await;
    let handler = Recorder::new(&broker);

    let mut supervisor = ConnectionSupervisor::new(broker.clone(), build(&config("images")));
    supervisor
        .run(&handler, sleep(Duration::from_secs(5)))
        .await;

    assert_eq!(
        broker.acked("images").await,
        vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]
    );
    assert_eq!(broker.unacked().await, 0);
    assert_eq!(*supervisor.stats().acknowledged(), 2);
    assert!(!supervisor.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_dropped_connection_is_rebuilt_and_redelivers() {
    let broker = MemoryBroker::new();
    broker.push("images", "a").await;
    broker.push("images", "b").await;
    let handler = Recorder::new(&broker);
    handler.drop_connection_once.store(true, Ordering::SeqCst);

    let mut supervisor = ConnectionSupervisor::new(broker.clone(), build(&config("images")));
    supervisor
        .run(&handler, sleep(Duration::from_secs(20)))
        .await;

    assert_eq!(
        handler.seen().await,
        vec![
            (Bytes::from_static(b"a"), false),
            (Bytes::from_static(b"a"), true),
            (Bytes::from_static(b"b"), false),
        ]
    );
    assert_eq!(
        broker.acked("images").await,
        vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]
    );
    assert_eq!(*supervisor.stats().faults(), 1);
    assert_eq!(*supervisor.stats().connections(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_heartbeat_triggers_reconnect() {
    let broker = MemoryBroker::new();
    broker.fail_heartbeats(true).await;
    let handler = Recorder::new(&broker);

    let mut builder = config("images");
    builder
        .heartbeat_interval(Duration::from_secs(1))
        .reconnect_delay(Duration::from_secs(1));
    let mut supervisor = ConnectionSupervisor::new(broker.clone(), build(&builder));

    supervisor
        .run(&handler, sleep(Duration::from_millis(2500)))
        .await;

    assert_eq!(*supervisor.stats().faults(), 1);
    assert_eq!(*supervisor.stats().connections(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_dead_letter_publishes_then_acks() {
    let broker = MemoryBroker::new();
    broker.push("images", "bad").await;
    broker.push("images", "good").await;
    let handler = Recorder::new(&broker);

    let mut builder = config("images");
    builder.dead_letter_queue(Some("images.dead".to_string()));
    let mut supervisor = ConnectionSupervisor::new(broker.clone(), build(&builder));
    supervisor
        .run(&handler, sleep(Duration::from_secs(5)))
        .await;

    assert_eq!(
        broker.queued("images.dead").await,
        vec![Bytes::from_static(b"bad")]
    );
    assert_eq!(broker.acked("images").await.len(), 2);
    assert_eq!(*supervisor.stats().dead_lettered(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dead_letter_without_queue_drops() {
    let broker = MemoryBroker::new();
    broker.push("images", "bad").await;
    let handler = Recorder::new(&broker);

    let mut supervisor = ConnectionSupervisor::new(broker.clone(), build(&config("images")));
    supervisor
        .run(&handler, sleep(Duration::from_secs(5)))
        .await;

    assert_eq!(broker.acked("images").await, vec![Bytes::from_static(b"bad")]);
    assert_eq!(*supervisor.stats().dead_lettered(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_nothing_consumed_until_connected() {
    let broker = MemoryBroker::new();
    broker.fail_next_connects(100).await;
    broker.push("images", "a").await;
    let handler = Recorder::new(&broker);

    let mut supervisor = ConnectionSupervisor::new(broker.clone(), build(&config("images")));
    supervisor
        .run(&handler, sleep(Duration::from_secs(30)))
        .await;

    assert!(handler.seen().await.is_empty());
    assert_eq!(broker.queued("images").await.len(), 1);
    assert_eq!(*supervisor.stats().connections(), 0);
    assert_eq!(broker.connect_attempts().await, 5);
}

#[tokio::test(start_paused = true)]
async fn test_channel_publish_reaches_consumer() {
    let broker = MemoryBroker::new();
    let mut supervisor = ConnectionSupervisor::new(broker.clone(), build(&config("images")));
    supervisor
        .connect()
        .await
        .unwrap()
        .publish("images", b"from-channel")
        .await
        .unwrap();

    assert_eq!(
        broker.queued("images").await,
        vec![Bytes::from_static(b"from-channel")]
    );
}

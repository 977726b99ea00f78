//! In-process broker with fault injection.

use crate::{BrokerChannel, BrokerConnector, Delivery};
use async_trait::async_trait;
use bytes::Bytes;
use darkroom_error::{DarkroomResult, QueueError, QueueErrorKind};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};

#[derive(Debug, Clone)]
struct QueuedMessage {
    payload: Bytes,
    redelivered: bool,
}

#[derive(Debug, Default)]
struct BrokerState {
    queues: HashMap<String, VecDeque<QueuedMessage>>,
    /// Handed out on the current generation, not yet acknowledged
    unacked: HashMap<String, (u64, String, Bytes)>,
    acked: HashMap<String, Vec<Bytes>>,
    generation: u64,
    next_tag: u64,
    failing_connects: u32,
    failing_heartbeats: bool,
    connect_attempts: u32,
}

impl BrokerState {
    /// Put every unacknowledged delivery back at the head of its queue.
    fn requeue_unacked(&mut self) {
        let mut unacked: Vec<_> = self.unacked.drain().map(|(_, entry)| entry).collect();
        unacked.sort_by(|a, b| b.0.cmp(&a.0));
        for (_, queue, payload) in unacked {
            self.queues.entry(queue).or_default().push_front(QueuedMessage {
                payload,
                redelivered: true,
            });
        }
    }
}

/// Broker held in memory, shared by every channel it hands out.
///
/// Channels belong to a connection generation. [`MemoryBroker::drop_connections`]
/// starts a new generation: every existing channel starts failing with
/// [`QueueErrorKind::Closed`] and unacknowledged deliveries are requeued as
/// redelivered, the way a real broker behaves when a consumer disappears.
#[derive(Debug, Clone)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
    notify: Arc<Notify>,
    poll: Duration,
}

impl MemoryBroker {
    /// Create an empty broker whose reads wait up to 100ms.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BrokerState::default())),
            notify: Arc::new(Notify::new()),
            poll: Duration::from_millis(100),
        }
    }

    /// Enqueue a message without going through a channel.
    pub async fn push(&self, queue: &str, payload: impl Into<Bytes>) {
        self.state
            .lock()
            .await
            .queues
            .entry(queue.to_string())
            .or_default()
            .push_back(QueuedMessage {
                payload: payload.into(),
                redelivered: false,
            });
        self.notify.notify_waiters();
    }

    /// Make the next `count` connection attempts fail.
    pub async fn fail_next_connects(&self, count: u32) {
        self.state.lock().await.failing_connects = count;
    }

    /// Make heartbeats fail (or succeed again).
    pub async fn fail_heartbeats(&self, failing: bool) {
        self.state.lock().await.failing_heartbeats = failing;
    }

    /// Sever every open channel.
    pub async fn drop_connections(&self) {
        let mut state = self.state.lock().await;
        state.generation += 1;
        state.requeue_unacked();
        drop(state);
        self.notify.notify_waiters();
    }

    /// Connection attempts seen so far, failed ones included.
    pub async fn connect_attempts(&self) -> u32 {
        self.state.lock().await.connect_attempts
    }

    /// Messages waiting in `queue`.
    pub async fn queued(&self, queue: &str) -> Vec<Bytes> {
        self.state
            .lock()
            .await
            .queues
            .get(queue)
            .map(|messages| messages.iter().map(|m| m.payload.clone()).collect())
            .unwrap_or_default()
    }

    /// Payloads acknowledged on `queue`, in order.
    pub async fn acked(&self, queue: &str) -> Vec<Bytes> {
        self.state
            .lock()
            .await
            .acked
            .get(queue)
            .cloned()
            .unwrap_or_default()
    }

    /// Deliveries handed out but not acknowledged.
    pub async fn unacked(&self) -> usize {
        self.state.lock().await.unacked.len()
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerConnector for MemoryBroker {
    type Channel = MemoryChannel;

    async fn connect(&self) -> DarkroomResult<MemoryChannel> {
        let mut state = self.state.lock().await;
        state.connect_attempts += 1;
        if state.failing_connects > 0 {
            state.failing_connects -= 1;
            return Err(QueueError::new(QueueErrorKind::Connection(
                "connection refused".to_string(),
            ))
            .into());
        }

        Ok(MemoryChannel {
            broker: self.clone(),
            generation: state.generation,
        })
    }

    fn endpoint(&self) -> String {
        "memory".to_string()
    }
}

/// Channel onto a [`MemoryBroker`].
#[derive(Debug)]
pub struct MemoryChannel {
    broker: MemoryBroker,
    generation: u64,
}

impl MemoryChannel {
    fn check_live(&self, state: &BrokerState) -> DarkroomResult<()> {
        if state.generation != self.generation {
            return Err(QueueError::new(QueueErrorKind::Closed(
                "connection dropped".to_string(),
            ))
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl BrokerChannel for MemoryChannel {
    async fn declare_queue(&mut self, queue: &str) -> DarkroomResult<()> {
        let mut state = self.broker.state.lock().await;
        self.check_live(&state)?;
        state.queues.entry(queue.to_string()).or_default();
        Ok(())
    }

    async fn next_delivery(&mut self, queue: &str) -> DarkroomResult<Option<Delivery>> {
        let notified = self.broker.notify.notified();
        {
            let mut state = self.broker.state.lock().await;
            self.check_live(&state)?;
            if let Some(message) = state.queues.get_mut(queue).and_then(|q| q.pop_front()) {
                state.next_tag += 1;
                let sequence = state.next_tag;
                let tag = format!("{}-{}", self.generation, sequence);
                state.unacked.insert(
                    tag.clone(),
                    (sequence, queue.to_string(), message.payload.clone()),
                );
                return Ok(Some(Delivery {
                    tag,
                    payload: message.payload,
                    redelivered: message.redelivered,
                }));
            }
        }

        let _ = tokio::time::timeout(self.broker.poll, notified).await;
        let state = self.broker.state.lock().await;
        self.check_live(&state)?;
        Ok(None)
    }

    async fn ack(&mut self, queue: &str, delivery: &Delivery) -> DarkroomResult<()> {
        let mut state = self.broker.state.lock().await;
        self.check_live(&state)?;
        if state.unacked.remove(&delivery.tag).is_some() {
            state
                .acked
                .entry(queue.to_string())
                .or_default()
                .push(delivery.payload.clone());
        }
        Ok(())
    }

    async fn publish(&mut self, queue: &str, payload: &[u8]) -> DarkroomResult<()> {
        {
            let mut state = self.broker.state.lock().await;
            self.check_live(&state)?;
            state
                .queues
                .entry(queue.to_string())
                .or_default()
                .push_back(QueuedMessage {
                    payload: Bytes::copy_from_slice(payload),
                    redelivered: false,
                });
        }
        self.broker.notify.notify_waiters();
        Ok(())
    }

    async fn heartbeat(&mut self) -> DarkroomResult<()> {
        let state = self.broker.state.lock().await;
        self.check_live(&state)?;
        if state.failing_heartbeats {
            return Err(QueueError::new(QueueErrorKind::Heartbeat(
                "no answer".to_string(),
            ))
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_dropped_connection_requeues_unacked_as_redelivered() {
        let broker = MemoryBroker::new();
        broker.push("images", "a").await;
        broker.push("images", "b").await;

        let mut channel = broker.connect().await.unwrap();
        let first = channel.next_delivery("images").await.unwrap().unwrap();
        assert_eq!(&first.payload[..], b"a");
        assert!(!first.redelivered);

        broker.drop_connections().await;
        assert!(channel.next_delivery("images").await.is_err());
        assert!(channel.ack("images", &first).await.is_err());

        let mut channel = broker.connect().await.unwrap();
        let again = channel.next_delivery("images").await.unwrap().unwrap();
        assert_eq!(&again.payload[..], b"a");
        assert!(again.redelivered);
        channel.ack("images", &again).await.unwrap();

        let next = channel.next_delivery("images").await.unwrap().unwrap();
        assert_eq!(&next.payload[..], b"b");
        assert_eq!(broker.acked("images").await, vec![Bytes::from_static(b"a")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_queue_yields_none() {
        let broker = MemoryBroker::new();
        let mut channel = broker.connect().await.unwrap();
        channel.declare_queue("images").await.unwrap();
        assert!(channel.next_delivery("images").await.unwrap().is_none());
    }
}

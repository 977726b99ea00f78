//! Broker boundary traits.

use async_trait::async_trait;
use bytes::Bytes;
use darkroom_error::DarkroomResult;

/// One message taken from the queue, awaiting acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Broker-assigned delivery tag, used to acknowledge
    pub tag: String,
    /// Opaque message body
    pub payload: Bytes,
    /// Whether the broker handed this message out before
    pub redelivered: bool,
}

/// A live channel to the broker.
#[async_trait]
pub trait BrokerChannel: Send {
    /// Declare a durable queue; idempotent.
    async fn declare_queue(&mut self, queue: &str) -> DarkroomResult<()>;

    /// Wait a bounded time for the next message.
    ///
    /// Returns `Ok(None)` when nothing arrived. Messages received but never
    /// acknowledged on an earlier channel come back before new ones.
    async fn next_delivery(&mut self, queue: &str) -> DarkroomResult<Option<Delivery>>;

    /// Acknowledge a delivery so it is never handed out again.
    async fn ack(&mut self, queue: &str, delivery: &Delivery) -> DarkroomResult<()>;

    /// Append a message to a queue.
    async fn publish(&mut self, queue: &str, payload: &[u8]) -> DarkroomResult<()>;

    /// Liveness probe.
    async fn heartbeat(&mut self) -> DarkroomResult<()>;
}

/// Opens fresh broker channels.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    /// Channel type produced by this connector.
    type Channel: BrokerChannel + 'static;

    /// Open a new connection and channel.
    async fn connect(&self) -> DarkroomResult<Self::Channel>;

    /// Where this connector points, for logs.
    fn endpoint(&self) -> String;
}

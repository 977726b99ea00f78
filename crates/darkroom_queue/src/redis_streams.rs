//! Redis Streams broker backend.
//!
//! Each queue is a stream read through one consumer group:
//! - **Declare**: `XGROUP CREATE ... MKSTREAM`, tolerating an existing group
//! - **Consume**: `XREADGROUP`, this consumer's pending entries first (`0`),
//!   then new entries (`>`)
//! - **Acknowledge**: `XACK`
//! - **Publish**: `XADD` with the body in the single field `payload`
//! - **Heartbeat**: `PING`

use crate::{BrokerChannel, BrokerConnector, Delivery};
use async_trait::async_trait;
use bytes::Bytes;
use darkroom_error::{DarkroomResult, QueueError, QueueErrorKind};
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamReadOptions, StreamReadReply};
use std::collections::HashSet;
use std::time::Duration;

/// Stream field carrying the message body.
const PAYLOAD_FIELD: &str = "payload";

/// Connection settings for the Redis Streams backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisStreamsConfig {
    /// Redis connection URL (e.g. `redis://localhost:6379`)
    pub url: String,
    /// Consumer group shared by all workers
    pub group: String,
    /// Name of this consumer within the group
    pub consumer: String,
    /// How long a read blocks waiting for new entries
    pub block: Duration,
}

impl RedisStreamsConfig {
    /// Settings for `url` with the default group, a per-process consumer
    /// name and a 5 second read block.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            group: "darkroom".to_string(),
            consumer: format!("darkroom-{}", std::process::id()),
            block: Duration::from_secs(5),
        }
    }
}

/// Opens Redis connections.
#[derive(Debug, Clone)]
pub struct RedisConnector {
    client: redis::Client,
    config: RedisStreamsConfig,
}

impl RedisConnector {
    /// Validate the URL and prepare a client; no connection is made yet.
    pub fn new(config: RedisStreamsConfig) -> DarkroomResult<Self> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| QueueError::new(QueueErrorKind::Connection(e.to_string())))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl BrokerConnector for RedisConnector {
    type Channel = RedisChannel;

    #[tracing::instrument(skip(self), fields(endpoint = %self.config.url, consumer = %self.config.consumer))]
    async fn connect(&self) -> DarkroomResult<RedisChannel> {
        let connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::new(QueueErrorKind::Connection(e.to_string())))?;

        tracing::debug!("Opened Redis connection");
        Ok(RedisChannel {
            connection,
            group: self.config.group.clone(),
            consumer: self.config.consumer.clone(),
            block_ms: usize::try_from(self.config.block.as_millis()).unwrap_or(usize::MAX),
            drained: HashSet::new(),
        })
    }

    fn endpoint(&self) -> String {
        self.config.url.clone()
    }
}

/// A live Redis connection reading through a consumer group.
pub struct RedisChannel {
    connection: MultiplexedConnection,
    group: String,
    consumer: String,
    block_ms: usize,
    /// Queues whose pending entries for this consumer have been replayed
    drained: HashSet<String>,
}

fn command_error(command: &str, e: redis::RedisError) -> QueueError {
    if e.is_connection_dropped() || e.is_io_error() || e.is_connection_refusal() {
        QueueError::new(QueueErrorKind::Closed(format!("{} failed: {}", command, e)))
    } else {
        QueueError::new(QueueErrorKind::Command(format!("{} failed: {}", command, e)))
    }
}

#[async_trait]
impl BrokerChannel for RedisChannel {
    #[tracing::instrument(skip(self), fields(group = %self.group))]
    async fn declare_queue(&mut self, queue: &str) -> DarkroomResult<()> {
        let created: redis::RedisResult<()> = self
            .connection
            .xgroup_create_mkstream(queue, &self.group, "0")
            .await;

        match created {
            Ok(()) => tracing::info!("Created consumer group"),
            Err(e) if e.code() == Some("BUSYGROUP") => {
                tracing::debug!("Consumer group already exists");
            }
            Err(e) => return Err(command_error("XGROUP CREATE", e).into()),
        }

        self.drained.remove(queue);
        Ok(())
    }

    async fn next_delivery(&mut self, queue: &str) -> DarkroomResult<Option<Delivery>> {
        let replay = !self.drained.contains(queue);
        let options = StreamReadOptions::default()
            .group(&self.group, &self.consumer)
            .count(1);
        let (start, options) = if replay {
            ("0", options)
        } else {
            (">", options.block(self.block_ms))
        };

        let reply: Option<StreamReadReply> = self
            .connection
            .xread_options(&[queue], &[start], &options)
            .await
            .map_err(|e| command_error("XREADGROUP", e))?;

        let entry = reply
            .and_then(|reply| reply.keys.into_iter().next())
            .and_then(|key| key.ids.into_iter().next());

        match entry {
            Some(entry) => {
                let payload: Vec<u8> = entry.get(PAYLOAD_FIELD).unwrap_or_default();
                if replay {
                    tracing::info!(tag = %entry.id, "Replaying unacknowledged entry");
                }
                Ok(Some(Delivery {
                    tag: entry.id,
                    payload: Bytes::from(payload),
                    redelivered: replay,
                }))
            }
            None => {
                if replay {
                    tracing::debug!(queue, "No unacknowledged entries left to replay");
                    self.drained.insert(queue.to_string());
                }
                Ok(None)
            }
        }
    }

    async fn ack(&mut self, queue: &str, delivery: &Delivery) -> DarkroomResult<()> {
        let _: i64 = self
            .connection
            .xack(queue, &self.group, &[delivery.tag.as_str()])
            .await
            .map_err(|e| command_error("XACK", e))?;
        Ok(())
    }

    async fn publish(&mut self, queue: &str, payload: &[u8]) -> DarkroomResult<()> {
        let _: String = self
            .connection
            .xadd(queue, "*", &[(PAYLOAD_FIELD, payload)])
            .await
            .map_err(|e| command_error("XADD", e))?;
        Ok(())
    }

    async fn heartbeat(&mut self) -> DarkroomResult<()> {
        let _: String = redis::cmd("PING")
            .query_async(&mut self.connection)
            .await
            .map_err(|e| {
                QueueError::new(QueueErrorKind::Heartbeat(format!("PING failed: {}", e)))
            })?;

        // A read interrupted by the heartbeat may have left an entry pending.
        self.drained.clear();
        Ok(())
    }
}

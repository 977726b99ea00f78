//! Durable work queue consumption for Darkroom.
//!
//! The broker is consumed as an at-least-once queue with explicit
//! acknowledgment. A [`ConnectionSupervisor`] exclusively owns the broker
//! channel: it connects with a fixed-interval retry, watches the channel with
//! a heartbeat, and rebuilds everything from scratch on any fault.
//!
//! # Backends
//!
//! - [`RedisConnector`]: Redis Streams with a consumer group
//! - [`MemoryBroker`]: in-process queue with fault injection, for tests

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod broker;
mod memory;
mod redis_streams;
mod supervisor;

pub use broker::{BrokerChannel, BrokerConnector, Delivery};
pub use memory::{MemoryBroker, MemoryChannel};
pub use redis_streams::{RedisChannel, RedisConnector, RedisStreamsConfig};
pub use supervisor::{
    ConnectionSupervisor, DeliveryHandler, HandlerOutcome, SupervisorConfig,
    SupervisorConfigBuilder, SupervisorStats,
};

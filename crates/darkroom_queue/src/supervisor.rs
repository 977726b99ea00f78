//! Connection supervision and the consumption loop.

use crate::{BrokerChannel, BrokerConnector, Delivery};
use async_trait::async_trait;
use darkroom_error::{DarkroomError, DarkroomResult, QueueError, QueueErrorKind};
use std::future::Future;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval, sleep, timeout};
use tokio_retry2::strategy::FixedInterval;
use tokio_retry2::{Retry, RetryError};

/// What the consumer loop should do with a handled delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// Acknowledge and forget
    Ack,
    /// Copy the payload to the dead-letter queue (if one is configured),
    /// then acknowledge
    DeadLetter(String),
}

/// Processes one delivery.
///
/// Handlers never fail: every outcome ends in an acknowledgment, so a
/// message is only ever redelivered after a broker fault.
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    /// Handle a delivery.
    async fn handle(&self, delivery: &Delivery) -> HandlerOutcome;
}

/// Supervisor settings.
#[derive(Debug, Clone, PartialEq, Eq, derive_builder::Builder, derive_getters::Getters)]
#[builder(setter(into))]
pub struct SupervisorConfig {
    /// Queue to consume
    queue: String,
    /// Fixed wait between connection attempts
    #[builder(default = "Duration::from_secs(7)")]
    reconnect_delay: Duration,
    /// Interval between liveness probes
    #[builder(default = "Duration::from_secs(60)")]
    heartbeat_interval: Duration,
    /// How long a liveness probe may take
    #[builder(default = "Duration::from_secs(10)")]
    heartbeat_timeout: Duration,
    /// Where dead-lettered payloads go; `None` drops them
    #[builder(default)]
    dead_letter_queue: Option<String>,
}

/// Counters describing a supervisor's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, derive_getters::Getters)]
pub struct SupervisorStats {
    /// Channels established
    connections: u64,
    /// Faults that tore a channel down
    faults: u64,
    /// Deliveries acknowledged
    acknowledged: u64,
    /// Deliveries copied to the dead-letter queue
    dead_lettered: u64,
}

enum Step {
    Shutdown,
    Heartbeat,
    Delivery(DarkroomResult<Option<Delivery>>),
}

/// Owns the broker channel and rebuilds it on every fault.
///
/// Until a channel is live nothing is consumed. A transport error, an
/// explicit close and a failed heartbeat are all handled the same way: the
/// channel is dropped wholesale, the supervisor waits the reconnect delay and
/// then connects, declares the queue and resumes consuming from scratch.
pub struct ConnectionSupervisor<C: BrokerConnector> {
    connector: C,
    config: SupervisorConfig,
    channel: Option<C::Channel>,
    stats: SupervisorStats,
}

impl<C: BrokerConnector> ConnectionSupervisor<C> {
    /// Create a supervisor; no connection is attempted yet.
    pub fn new(connector: C, config: SupervisorConfig) -> Self {
        Self {
            connector,
            config,
            channel: None,
            stats: SupervisorStats::default(),
        }
    }

    /// Settings in use.
    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Lifetime counters.
    pub fn stats(&self) -> SupervisorStats {
        self.stats
    }

    /// The live channel, if any.
    pub fn current_channel(&mut self) -> Option<&mut C::Channel> {
        self.channel.as_mut()
    }

    /// Whether a channel is currently live.
    pub fn is_connected(&self) -> bool {
        self.channel.is_some()
    }

    /// Connect and declare the queue, retrying at a fixed interval until it
    /// works. Returns the live channel.
    #[tracing::instrument(skip(self), fields(endpoint = %self.connector.endpoint(), queue = %self.config.queue))]
    pub async fn connect(&mut self) -> DarkroomResult<&mut C::Channel> {
        let channel = match self.channel.take() {
            Some(channel) => channel,
            None => {
                let channel = self.establish().await?;
                self.stats.connections += 1;
                tracing::info!("Broker channel established");
                channel
            }
        };
        Ok(self.channel.insert(channel))
    }

    async fn establish(&self) -> DarkroomResult<C::Channel> {
        let delay_ms = u64::try_from(self.config.reconnect_delay.as_millis()).unwrap_or(u64::MAX);
        let mut attempt = 0u32;

        Retry::spawn(FixedInterval::from_millis(delay_ms), || {
            attempt += 1;
            let attempt = attempt;
            async move {
                self.open_channel().await.map_err(|e| {
                    tracing::warn!(
                        error = %e,
                        attempt,
                        retry_in_ms = delay_ms,
                        "Broker connection failed, will retry"
                    );
                    RetryError::Transient {
                        err: e,
                        retry_after: None,
                    }
                })
            }
        })
        .await
    }

    async fn open_channel(&self) -> DarkroomResult<C::Channel> {
        let mut channel = self.connector.connect().await?;
        channel.declare_queue(&self.config.queue).await?;
        if let Some(dead_letter_queue) = &self.config.dead_letter_queue {
            channel.declare_queue(dead_letter_queue).await?;
        }
        Ok(channel)
    }

    /// Tear down the channel after a fault and wait the reconnect delay.
    #[tracing::instrument(skip(self, fault), fields(queue = %self.config.queue))]
    pub async fn on_fault(&mut self, fault: &DarkroomError) {
        self.stats.faults += 1;
        self.channel = None;
        tracing::warn!(
            error = %fault,
            retry_in_ms = self.config.reconnect_delay.as_millis() as u64,
            "Broker channel lost, reconnecting"
        );
        sleep(self.config.reconnect_delay).await;
    }

    /// Consume until `shutdown` resolves.
    ///
    /// Deliveries are handled one at a time. A delivery in progress when
    /// shutdown is requested is finished and acknowledged first.
    pub async fn run<H, S>(&mut self, handler: &H, shutdown: S)
    where
        H: DeliveryHandler + ?Sized,
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        tracing::info!(queue = %self.config.queue, "Starting consumer");

        loop {
            let connected = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                connected = self.connect() => connected.map(|_| ()),
            };

            let consumed = match connected {
                Ok(()) => self.consume(handler, &mut shutdown).await,
                Err(e) => Err(e),
            };
            let fault = match consumed {
                Ok(()) => break,
                Err(fault) => fault,
            };

            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = self.on_fault(&fault) => {}
            }
        }

        self.channel = None;
        tracing::info!(
            acknowledged = self.stats.acknowledged,
            faults = self.stats.faults,
            "Consumer stopped"
        );
    }

    /// Consume on the live channel until shutdown (`Ok`) or a fault (`Err`).
    async fn consume<H, S>(&mut self, handler: &H, shutdown: &mut S) -> DarkroomResult<()>
    where
        H: DeliveryHandler + ?Sized,
        S: Future<Output = ()> + Unpin,
    {
        let queue = self.config.queue.clone();
        let heartbeat_timeout = self.config.heartbeat_timeout;
        let mut heartbeat = interval(self.config.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        heartbeat.tick().await;

        loop {
            let channel = self.live_channel()?;
            let step = tokio::select! {
                biased;
                _ = &mut *shutdown => Step::Shutdown,
                _ = heartbeat.tick() => Step::Heartbeat,
                next = channel.next_delivery(&queue) => Step::Delivery(next),
            };

            match step {
                Step::Shutdown => return Ok(()),
                Step::Heartbeat => {
                    tracing::trace!("Sending heartbeat");
                    match timeout(heartbeat_timeout, channel.heartbeat()).await {
                        Ok(result) => result?,
                        Err(_) => {
                            return Err(QueueError::new(QueueErrorKind::Heartbeat(format!(
                                "no answer within {:?}",
                                heartbeat_timeout
                            )))
                            .into());
                        }
                    }
                }
                Step::Delivery(next) => {
                    if let Some(delivery) = next? {
                        self.dispatch(handler, delivery).await?;
                    }
                }
            }
        }
    }

    #[tracing::instrument(skip(self, handler, delivery), fields(tag = %delivery.tag, redelivered = delivery.redelivered))]
    async fn dispatch<H>(&mut self, handler: &H, delivery: Delivery) -> DarkroomResult<()>
    where
        H: DeliveryHandler + ?Sized,
    {
        let outcome = handler.handle(&delivery).await;
        let queue = self.config.queue.clone();
        let dead_letter_queue = self.config.dead_letter_queue.clone();
        let channel = self.live_channel()?;

        if let HandlerOutcome::DeadLetter(reason) = outcome {
            match dead_letter_queue {
                Some(dead_letter_queue) => {
                    channel.publish(&dead_letter_queue, &delivery.payload).await?;
                    self.stats.dead_lettered += 1;
                    tracing::warn!(%reason, %dead_letter_queue, "Delivery dead-lettered");
                }
                None => tracing::warn!(%reason, "Delivery dropped"),
            }
        }

        let channel = self.live_channel()?;
        channel.ack(&queue, &delivery).await?;
        self.stats.acknowledged += 1;
        tracing::debug!("Delivery acknowledged");
        Ok(())
    }

    fn live_channel(&mut self) -> DarkroomResult<&mut C::Channel> {
        self.channel.as_mut().ok_or_else(|| {
            QueueError::new(QueueErrorKind::Closed("no live channel".to_string())).into()
        })
    }
}

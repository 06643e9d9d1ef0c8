//! The consume–process loop shared by every participant.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use events::EventEnvelope;
use tokio::sync::watch;

use crate::bus::{MessageBus, Subscription};
use crate::dlq::DlqWriter;
use crate::error::Result;
use crate::message::Delivery;
use crate::retry::RetryPolicy;

/// How long a worker blocks on the bus before re-checking for shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A participant's reaction to one decoded envelope.
///
/// Implementations must be idempotent: the bus is at-least-once and a
/// crash between commit and ack replays the event. Events that are not of
/// interest must return `Ok(())` so they are acknowledged without side
/// effects. An `Err` is counted against the per-message retry budget.
#[async_trait]
pub trait EventHandler: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn handle(&self, envelope: &EventEnvelope) -> std::result::Result<(), Self::Error>;
}

/// One consumer worker: polls a subscription, dispatches to a handler,
/// and acknowledges manually.
///
/// Per delivered message:
///
/// 1. decode the envelope; malformed payloads go straight to the
///    dead-letter topic and are acknowledged;
/// 2. run the handler, holding the message and retrying with exponential
///    backoff on error;
/// 3. on retry exhaustion, write the original record to the dead-letter
///    topic and acknowledge so the partition advances;
/// 4. acknowledge only after the handler returned `Ok`, which is only
///    after the participant's local store commit.
pub struct ConsumerWorker<B: MessageBus, H: EventHandler> {
    subscription: Box<dyn Subscription>,
    handler: Arc<H>,
    dlq: DlqWriter<B>,
    policy: RetryPolicy,
    shutdown: watch::Receiver<bool>,
    group: String,
    topic: String,
}

impl<B, H> ConsumerWorker<B, H>
where
    B: MessageBus,
    H: EventHandler,
{
    /// Subscribes the worker to `topic` within `group`.
    pub async fn new(
        bus: B,
        group: impl Into<String>,
        topic: impl Into<String>,
        handler: Arc<H>,
        policy: RetryPolicy,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self> {
        let group = group.into();
        let topic = topic.into();
        let subscription = bus.subscribe(&group, &topic).await?;
        Ok(Self {
            subscription,
            handler,
            dlq: DlqWriter::new(bus),
            policy,
            shutdown,
            group,
            topic,
        })
    }

    /// Runs the consume loop until shutdown is signalled.
    ///
    /// An in-flight message is always processed to completion before the
    /// worker exits, so shutdown drains rather than aborts.
    #[tracing::instrument(skip(self), fields(group = %self.group, topic = %self.topic))]
    pub async fn run(mut self) {
        tracing::info!("consumer worker started");
        loop {
            if *self.shutdown.borrow() {
                break;
            }
            match self.subscription.poll(POLL_INTERVAL).await {
                Ok(Some(delivery)) => self.process(delivery).await,
                Ok(None) => {}
                Err(err) => {
                    tracing::error!(%err, "poll failed, stopping worker");
                    break;
                }
            }
        }
        tracing::info!("consumer worker stopped");
    }

    async fn process(&mut self, delivery: Delivery) {
        let start = std::time::Instant::now();

        let envelope = match EventEnvelope::decode(&delivery.payload) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!(
                    partition = delivery.partition,
                    offset = delivery.offset,
                    %err,
                    "rejecting malformed envelope"
                );
                self.dlq
                    .write(&delivery, &format!("malformed envelope: {err}"))
                    .await;
                self.acknowledge(&delivery).await;
                return;
            }
        };

        tracing::debug!(
            event_type = %envelope.event_type(),
            saga_id = %envelope.saga_id,
            offset = delivery.offset,
            "processing event"
        );

        let mut attempt = 0;
        loop {
            match self.handler.handle(&envelope).await {
                Ok(()) => {
                    self.acknowledge(&delivery).await;
                    metrics::counter!("saga_events_handled_total").increment(1);
                    metrics::histogram!("saga_handler_duration_seconds")
                        .record(start.elapsed().as_secs_f64());
                    return;
                }
                Err(err) if attempt < self.policy.max_retries => {
                    let delay = self.policy.delay_for(attempt);
                    attempt += 1;
                    tracing::warn!(
                        event_type = %envelope.event_type(),
                        saga_id = %envelope.saga_id,
                        attempt,
                        max = self.policy.max_retries,
                        %err,
                        ?delay,
                        "handler failed, retrying"
                    );
                    metrics::counter!("saga_handler_retries_total").increment(1);
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    tracing::error!(
                        event_type = %envelope.event_type(),
                        saga_id = %envelope.saga_id,
                        %err,
                        "retry budget exhausted, dead-lettering"
                    );
                    self.dlq.write(&delivery, &err.to_string()).await;
                    self.acknowledge(&delivery).await;
                    return;
                }
            }
        }
    }

    async fn acknowledge(&mut self, delivery: &Delivery) {
        if let Err(err) = self.subscription.ack(delivery).await {
            tracing::error!(%err, offset = delivery.offset, "ack failed");
        }
    }
}

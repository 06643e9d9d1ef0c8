//! Publishing side of the consume–process–publish contract.

use common::SagaId;
use events::EventEnvelope;

use crate::bus::MessageBus;
use crate::error::{BusError, Result};
use crate::message::RecordMetadata;
use crate::retry::{RetryPolicy, retry_with};

/// Publishes envelopes keyed by saga so per-saga ordering holds.
///
/// The envelope builder fills in any missing `eventId`, `timestamp`, and
/// `correlationId` before the envelope reaches this publisher; here the
/// envelope is serialized, its bus headers attached, and the publish
/// retried under a bounded policy. Exhaustion surfaces as
/// [`BusError::PublishFailed`] so the caller's handler fails and the
/// incoming message is redelivered rather than lost.
#[derive(Clone)]
pub struct EventPublisher<B: MessageBus> {
    bus: B,
    policy: RetryPolicy,
}

impl<B: MessageBus> EventPublisher<B> {
    /// Creates a publisher with the default publish retry policy.
    pub fn new(bus: B) -> Self {
        Self::with_policy(bus, RetryPolicy::publisher())
    }

    /// Creates a publisher with an explicit retry policy.
    pub fn with_policy(bus: B, policy: RetryPolicy) -> Self {
        Self { bus, policy }
    }

    /// Publishes the envelope on the topic, keyed by its `sagaId`.
    #[tracing::instrument(skip(self, envelope), fields(event_type = %envelope.event_type(), saga_id = %envelope.saga_id))]
    pub async fn publish(&self, topic: &str, envelope: &EventEnvelope) -> Result<RecordMetadata> {
        let payload = envelope.encode()?;
        let headers = envelope.bus_headers();
        let key = partition_key(envelope.saga_id);

        let result = retry_with(self.policy, |_| {
            self.bus
                .publish(topic, &key, payload.clone(), headers.clone())
        })
        .await;

        match result {
            Ok(metadata) => {
                metrics::counter!("saga_events_published_total").increment(1);
                tracing::info!(
                    partition = metadata.partition,
                    offset = metadata.offset,
                    "event published"
                );
                Ok(metadata)
            }
            Err(err) => {
                metrics::counter!("saga_events_publish_failures_total").increment(1);
                tracing::error!(%err, "event publish exhausted retries");
                Err(BusError::PublishFailed {
                    topic: topic.to_string(),
                    reason: err.to_string(),
                })
            }
        }
    }
}

/// Partition key for a saga: all of a saga's events share one partition.
pub fn partition_key(saga_id: SagaId) -> String {
    saga_id.to_string()
}

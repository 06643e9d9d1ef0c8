//! Dead-letter routing for messages that exhausted their retry budget.

use chrono::{DateTime, Utc};
use events::topics;
use serde::{Deserialize, Serialize};

use crate::bus::MessageBus;
use crate::message::Delivery;

/// Everything needed to triage a poisoned message by hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    pub original_topic: String,
    pub partition: u32,
    pub offset: u64,
    pub key: String,
    /// The original record payload, lossily decoded for readability.
    pub value: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

impl DeadLetter {
    /// Captures a delivery and the error that exhausted it.
    pub fn capture(delivery: &Delivery, error: &str) -> Self {
        Self {
            original_topic: delivery.topic.clone(),
            partition: delivery.partition,
            offset: delivery.offset,
            key: delivery.key.clone(),
            value: String::from_utf8_lossy(&delivery.payload).into_owned(),
            error: error.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Writes dead letters to the `dead-letter` topic.
///
/// A failing dead-letter write is logged and swallowed: a broken DLQ must
/// never block the partition the poison message came from.
pub struct DlqWriter<B: MessageBus> {
    bus: B,
}

impl<B: MessageBus> DlqWriter<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    pub async fn write(&self, delivery: &Delivery, error: &str) {
        let dead_letter = DeadLetter::capture(delivery, error);
        let payload = match serde_json::to_vec(&dead_letter) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!(%err, "failed to serialize dead letter");
                return;
            }
        };

        match self
            .bus
            .publish(topics::DEAD_LETTER, &delivery.key, payload, Default::default())
            .await
        {
            Ok(_) => {
                metrics::counter!("saga_dead_letters_total").increment(1);
                tracing::warn!(
                    topic = %delivery.topic,
                    partition = delivery.partition,
                    offset = delivery.offset,
                    %error,
                    "message routed to dead-letter topic"
                );
            }
            Err(err) => {
                tracing::error!(%err, "failed to write dead letter, dropping");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{MessageBus as _, Subscription as _};
    use crate::memory::InMemoryBus;
    use std::collections::HashMap;
    use std::time::Duration;

    fn delivery(payload: &[u8]) -> Delivery {
        Delivery {
            topic: "risk-events".to_string(),
            partition: 2,
            offset: 7,
            key: "saga-1".to_string(),
            payload: payload.to_vec(),
            headers: HashMap::new(),
            attempt: 4,
        }
    }

    #[test]
    fn capture_preserves_provenance() {
        let dead = DeadLetter::capture(&delivery(b"{\"broken\":"), "unexpected end of input");
        assert_eq!(dead.original_topic, "risk-events");
        assert_eq!(dead.partition, 2);
        assert_eq!(dead.offset, 7);
        assert_eq!(dead.key, "saga-1");
        assert_eq!(dead.value, "{\"broken\":");
        assert_eq!(dead.error, "unexpected end of input");
    }

    #[tokio::test]
    async fn write_publishes_to_dead_letter_topic() {
        let bus = InMemoryBus::new();
        let writer = DlqWriter::new(bus.clone());

        writer.write(&delivery(b"oops"), "handler exploded").await;

        assert_eq!(bus.topic_len(topics::DEAD_LETTER).await, 1);

        let mut sub = bus.subscribe("triage", topics::DEAD_LETTER).await.unwrap();
        let record = sub
            .poll(Duration::from_millis(200))
            .await
            .unwrap()
            .unwrap();
        let dead: DeadLetter = serde_json::from_slice(&record.payload).unwrap();
        assert_eq!(dead.error, "handler exploded");
        assert_eq!(dead.key, "saga-1");
        sub.ack(&record).await.unwrap();
    }
}

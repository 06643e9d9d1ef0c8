use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::message::{Delivery, RecordMetadata};

/// A durable, partitioned, at-least-once message log.
///
/// The contract assumed of implementations:
///
/// - every published record is eventually delivered to every subscribed
///   group, possibly more than once;
/// - records with the same key land on the same partition and are
///   delivered in publish order within a group (per-partition FIFO);
/// - acknowledgment is manual, and an unacknowledged record is
///   redelivered.
///
/// Consumers must therefore tolerate duplicates and rebalance-induced
/// reprocessing.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publishes a record to the topic, keyed for partition assignment.
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: Vec<u8>,
        headers: HashMap<String, String>,
    ) -> Result<RecordMetadata>;

    /// Joins the consumer group on the topic, reading from the earliest
    /// unconsumed offset.
    async fn subscribe(&self, group: &str, topic: &str) -> Result<Box<dyn Subscription>>;
}

/// A consumer-group membership on one topic.
///
/// At most one delivery per partition is in flight for a group at a time,
/// which is what makes per-saga processing strictly serial.
#[async_trait]
pub trait Subscription: Send {
    /// Waits up to `timeout` for the next deliverable record.
    ///
    /// Returns `Ok(None)` when nothing became available in time.
    async fn poll(&mut self, timeout: Duration) -> Result<Option<Delivery>>;

    /// Acknowledges the delivery, advancing the group offset past it.
    async fn ack(&mut self, delivery: &Delivery) -> Result<()>;

    /// Releases the delivery without acknowledging it; the same offset
    /// will be redelivered with an incremented attempt count.
    async fn nack(&mut self, delivery: &Delivery) -> Result<()>;
}

//! In-memory bus implementing the partitioned-log contract.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, RwLock};
use tokio::time::Instant;

use crate::bus::{MessageBus, Subscription};
use crate::error::Result;
use crate::message::{Delivery, RecordMetadata};

const DEFAULT_PARTITIONS: u32 = 4;

#[derive(Debug, Clone)]
struct StoredRecord {
    key: String,
    payload: Vec<u8>,
    headers: HashMap<String, String>,
}

#[derive(Debug, Default)]
struct TopicLog {
    partitions: Vec<Vec<StoredRecord>>,
}

/// Consumption progress of one group on one partition.
#[derive(Debug, Default, Clone, Copy)]
struct PartitionCursor {
    next_offset: u64,
    in_flight: bool,
    /// Deliveries of the current offset, reset on ack.
    attempts: u32,
}

#[derive(Default)]
struct BusState {
    topics: HashMap<String, TopicLog>,
    cursors: HashMap<(String, String), Vec<PartitionCursor>>,
}

/// An in-process message bus for wiring and tests.
///
/// Provides the same delivery contract the core assumes of a real broker:
/// per-key partitioning, per-partition FIFO within a consumer group,
/// manual acknowledgment, and redelivery of unacknowledged records. All
/// clones share one log.
#[derive(Clone)]
pub struct InMemoryBus {
    state: Arc<RwLock<BusState>>,
    notify: Arc<Notify>,
    partitions: u32,
}

impl InMemoryBus {
    /// Creates a bus with the default partition count.
    pub fn new() -> Self {
        Self::with_partitions(DEFAULT_PARTITIONS)
    }

    /// Creates a bus with an explicit partition count per topic.
    pub fn with_partitions(partitions: u32) -> Self {
        Self {
            state: Arc::new(RwLock::new(BusState::default())),
            notify: Arc::new(Notify::new()),
            partitions: partitions.max(1),
        }
    }

    /// Total number of records published to the topic.
    pub async fn topic_len(&self, topic: &str) -> usize {
        let state = self.state.read().await;
        state
            .topics
            .get(topic)
            .map(|log| log.partitions.iter().map(Vec::len).sum())
            .unwrap_or(0)
    }

    fn partition_for(&self, key: &str) -> u32 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % u64::from(self.partitions)) as u32
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: Vec<u8>,
        headers: HashMap<String, String>,
    ) -> Result<RecordMetadata> {
        let partition = self.partition_for(key);
        let offset = {
            let mut state = self.state.write().await;
            let log = state
                .topics
                .entry(topic.to_string())
                .or_insert_with(|| TopicLog {
                    partitions: vec![Vec::new(); self.partitions as usize],
                });
            let records = &mut log.partitions[partition as usize];
            records.push(StoredRecord {
                key: key.to_string(),
                payload,
                headers,
            });
            (records.len() - 1) as u64
        };
        self.notify.notify_waiters();

        Ok(RecordMetadata {
            topic: topic.to_string(),
            partition,
            offset,
        })
    }

    async fn subscribe(&self, group: &str, topic: &str) -> Result<Box<dyn Subscription>> {
        let partitions = self.partitions as usize;
        {
            let mut state = self.state.write().await;
            state
                .cursors
                .entry((group.to_string(), topic.to_string()))
                .or_insert_with(|| vec![PartitionCursor::default(); partitions]);
        }

        Ok(Box::new(InMemorySubscription {
            state: self.state.clone(),
            notify: self.notify.clone(),
            group: group.to_string(),
            topic: topic.to_string(),
        }))
    }
}

struct InMemorySubscription {
    state: Arc<RwLock<BusState>>,
    notify: Arc<Notify>,
    group: String,
    topic: String,
}

impl InMemorySubscription {
    /// Claims the next available record on any partition that has no
    /// delivery in flight for this group.
    async fn try_take(&self) -> Option<Delivery> {
        let mut state = self.state.write().await;
        let BusState { topics, cursors } = &mut *state;
        let log = topics.get(&self.topic)?;
        let cursors = cursors
            .get_mut(&(self.group.clone(), self.topic.clone()))
            .expect("subscribed group has cursors");

        for (partition, records) in log.partitions.iter().enumerate() {
            let cursor = &mut cursors[partition];
            if cursor.in_flight || (cursor.next_offset as usize) >= records.len() {
                continue;
            }
            cursor.in_flight = true;
            cursor.attempts += 1;
            let record = &records[cursor.next_offset as usize];
            return Some(Delivery {
                topic: self.topic.clone(),
                partition: partition as u32,
                offset: cursor.next_offset,
                key: record.key.clone(),
                payload: record.payload.clone(),
                headers: record.headers.clone(),
                attempt: cursor.attempts,
            });
        }
        None
    }

    async fn with_cursor<F: FnOnce(&mut PartitionCursor)>(&self, delivery: &Delivery, f: F) {
        let mut state = self.state.write().await;
        if let Some(cursors) = state
            .cursors
            .get_mut(&(self.group.clone(), self.topic.clone()))
            && let Some(cursor) = cursors.get_mut(delivery.partition as usize)
            && cursor.in_flight
            && cursor.next_offset == delivery.offset
        {
            f(cursor);
        }
    }
}

#[async_trait]
impl Subscription for InMemorySubscription {
    async fn poll(&mut self, timeout: Duration) -> Result<Option<Delivery>> {
        let deadline = Instant::now() + timeout;
        loop {
            // Register for wakeups before checking, so a publish racing
            // with the check cannot be missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);

            if let Some(delivery) = self.try_take().await {
                return Ok(Some(delivery));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            if tokio::time::timeout_at(deadline, &mut notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn ack(&mut self, delivery: &Delivery) -> Result<()> {
        self.with_cursor(delivery, |cursor| {
            cursor.next_offset += 1;
            cursor.in_flight = false;
            cursor.attempts = 0;
        })
        .await;
        self.notify.notify_waiters();
        Ok(())
    }

    async fn nack(&mut self, delivery: &Delivery) -> Result<()> {
        self.with_cursor(delivery, |cursor| {
            cursor.in_flight = false;
        })
        .await;
        self.notify.notify_waiters();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLL: Duration = Duration::from_millis(200);

    async fn publish(bus: &InMemoryBus, topic: &str, key: &str, body: &str) {
        bus.publish(topic, key, body.as_bytes().to_vec(), HashMap::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn same_key_lands_on_same_partition() {
        let bus = InMemoryBus::new();
        let first = bus
            .publish("orders", "saga-1", b"a".to_vec(), HashMap::new())
            .await
            .unwrap();
        let second = bus
            .publish("orders", "saga-1", b"b".to_vec(), HashMap::new())
            .await
            .unwrap();
        assert_eq!(first.partition, second.partition);
        assert_eq!(second.offset, first.offset + 1);
    }

    #[tokio::test]
    async fn per_key_fifo_within_group() {
        let bus = InMemoryBus::new();
        let mut sub = bus.subscribe("group", "orders").await.unwrap();

        publish(&bus, "orders", "saga-1", "first").await;
        publish(&bus, "orders", "saga-1", "second").await;

        let d1 = sub.poll(POLL).await.unwrap().unwrap();
        assert_eq!(d1.payload, b"first");

        // Second record is withheld while the first is in flight.
        assert!(sub.poll(Duration::from_millis(50)).await.unwrap().is_none());

        sub.ack(&d1).await.unwrap();
        let d2 = sub.poll(POLL).await.unwrap().unwrap();
        assert_eq!(d2.payload, b"second");
        sub.ack(&d2).await.unwrap();
    }

    #[tokio::test]
    async fn nack_redelivers_with_incremented_attempt() {
        let bus = InMemoryBus::new();
        let mut sub = bus.subscribe("group", "orders").await.unwrap();
        publish(&bus, "orders", "saga-1", "poison").await;

        let d1 = sub.poll(POLL).await.unwrap().unwrap();
        assert_eq!(d1.attempt, 1);
        sub.nack(&d1).await.unwrap();

        let d2 = sub.poll(POLL).await.unwrap().unwrap();
        assert_eq!(d2.offset, d1.offset);
        assert_eq!(d2.attempt, 2);
        sub.ack(&d2).await.unwrap();
    }

    #[tokio::test]
    async fn groups_consume_independently() {
        let bus = InMemoryBus::new();
        let mut a = bus.subscribe("group-a", "orders").await.unwrap();
        let mut b = bus.subscribe("group-b", "orders").await.unwrap();
        publish(&bus, "orders", "saga-1", "event").await;

        let da = a.poll(POLL).await.unwrap().unwrap();
        let db = b.poll(POLL).await.unwrap().unwrap();
        assert_eq!(da.payload, b"event");
        assert_eq!(db.payload, b"event");
        a.ack(&da).await.unwrap();
        b.ack(&db).await.unwrap();
    }

    #[tokio::test]
    async fn distinct_keys_deliver_in_parallel() {
        // Enough partitions that two random saga keys rarely collide is
        // not good enough for a test; force distinct partitions.
        let bus = InMemoryBus::with_partitions(97);
        let mut sub = bus.subscribe("group", "orders").await.unwrap();

        let mut keys = vec!["saga-a".to_string(), "saga-b".to_string()];
        while bus.partition_for(&keys[0]) == bus.partition_for(&keys[1]) {
            keys[1].push('x');
        }

        publish(&bus, "orders", &keys[0], "one").await;
        publish(&bus, "orders", &keys[1], "two").await;

        // Both are claimable without acking either.
        let d1 = sub.poll(POLL).await.unwrap().unwrap();
        let d2 = sub.poll(POLL).await.unwrap().unwrap();
        assert_ne!(d1.partition, d2.partition);
        sub.ack(&d1).await.unwrap();
        sub.ack(&d2).await.unwrap();
    }

    #[tokio::test]
    async fn poll_times_out_empty() {
        let bus = InMemoryBus::new();
        let mut sub = bus.subscribe("group", "orders").await.unwrap();
        let result = sub.poll(Duration::from_millis(20)).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn topic_len_counts_all_partitions() {
        let bus = InMemoryBus::new();
        publish(&bus, "orders", "a", "1").await;
        publish(&bus, "orders", "b", "2").await;
        publish(&bus, "orders", "c", "3").await;
        assert_eq!(bus.topic_len("orders").await, 3);
        assert_eq!(bus.topic_len("unknown").await, 0);
    }
}

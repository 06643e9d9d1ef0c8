use std::collections::HashMap;

/// Where a published record landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMetadata {
    pub topic: String,
    pub partition: u32,
    pub offset: u64,
}

/// One message handed to a consumer.
///
/// `attempt` counts deliveries of this offset to this consumer group,
/// starting at 1; a redelivery after a `nack` (or a rebalance) increments
/// it.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub topic: String,
    pub partition: u32,
    pub offset: u64,
    pub key: String,
    pub payload: Vec<u8>,
    pub headers: HashMap<String, String>,
    pub attempt: u32,
}

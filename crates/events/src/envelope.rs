//! The event envelope wrapping every message on the bus.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::{CorrelationId, EventId, SagaId};
use serde::{Deserialize, Serialize};

use crate::SCHEMA_VERSION;
use crate::event_type::EventType;
use crate::metadata::EventMetadata;
use crate::payload::EventPayload;

/// Standard header names carried alongside the serialized envelope.
pub mod headers {
    pub const EVENT_TYPE: &str = "eventType";
    pub const EVENT_ID: &str = "eventId";
    pub const CORRELATION_ID: &str = "correlationId";
    pub const TIMESTAMP: &str = "timestamp";
    pub const RETRY_COUNT: &str = "retry-count";
}

/// An event envelope: saga identity, tracing metadata, and payload.
///
/// The payload is flattened into the envelope's JSON so the `eventType`
/// discriminator sits at the top level of the document. The event type is
/// derived from the payload variant and can never disagree with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    /// Globally unique identifier of this emission.
    pub event_id: EventId,

    /// Wall-clock time of emission.
    pub timestamp: DateTime<Utc>,

    /// The saga instance this event belongs to. Used as the partition key.
    pub saga_id: SagaId,

    /// Copied across a causal chain of events for tracing.
    pub correlation_id: CorrelationId,

    /// Envelope schema version.
    pub version: String,

    /// Delivery metadata.
    #[serde(default)]
    pub metadata: EventMetadata,

    /// The event payload, tagged with `eventType` on the wire.
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl EventEnvelope {
    /// Creates a new envelope builder.
    pub fn builder() -> EventEnvelopeBuilder {
        EventEnvelopeBuilder::default()
    }

    /// Returns the event type discriminating the payload.
    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }

    /// Serializes the envelope to its wire form.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decodes an envelope from its wire form.
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Builds the message headers published alongside the envelope.
    pub fn bus_headers(&self) -> HashMap<String, String> {
        HashMap::from([
            (
                headers::EVENT_TYPE.to_string(),
                self.event_type().as_str().to_string(),
            ),
            (headers::EVENT_ID.to_string(), self.event_id.to_string()),
            (
                headers::CORRELATION_ID.to_string(),
                self.correlation_id.to_string(),
            ),
            (
                headers::TIMESTAMP.to_string(),
                self.timestamp.to_rfc3339(),
            ),
            (
                headers::RETRY_COUNT.to_string(),
                self.metadata.retry_count.to_string(),
            ),
        ])
    }
}

/// Builder for event envelopes.
///
/// `event_id`, `timestamp`, and `correlation_id` are generated when not
/// supplied, `version` defaults to [`SCHEMA_VERSION`], and `metadata`
/// defaults per [`EventMetadata::default`].
#[derive(Debug, Default)]
pub struct EventEnvelopeBuilder {
    event_id: Option<EventId>,
    timestamp: Option<DateTime<Utc>>,
    saga_id: Option<SagaId>,
    correlation_id: Option<CorrelationId>,
    version: Option<String>,
    metadata: Option<EventMetadata>,
    payload: Option<EventPayload>,
}

impl EventEnvelopeBuilder {
    /// Sets the event ID. Generated if not set.
    pub fn event_id(mut self, id: EventId) -> Self {
        self.event_id = Some(id);
        self
    }

    /// Sets the emission timestamp. Defaults to now.
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets the saga ID.
    pub fn saga_id(mut self, saga_id: SagaId) -> Self {
        self.saga_id = Some(saga_id);
        self
    }

    /// Sets the correlation ID. Generated if not set.
    pub fn correlation_id(mut self, id: CorrelationId) -> Self {
        self.correlation_id = Some(id);
        self
    }

    /// Sets the schema version. Defaults to [`SCHEMA_VERSION`].
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Sets the delivery metadata.
    pub fn metadata(mut self, metadata: EventMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Sets the payload.
    pub fn payload(mut self, payload: EventPayload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Builds the envelope.
    ///
    /// # Panics
    ///
    /// Panics if `saga_id` or `payload` is not set.
    pub fn build(self) -> EventEnvelope {
        EventEnvelope {
            event_id: self.event_id.unwrap_or_default(),
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            saga_id: self.saga_id.expect("saga_id is required"),
            correlation_id: self.correlation_id.unwrap_or_default(),
            version: self.version.unwrap_or_else(|| SCHEMA_VERSION.to_string()),
            metadata: self.metadata.unwrap_or_default(),
            payload: self.payload.expect("payload is required"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::OrderCancelledPayload;
    use common::OrderId;

    fn cancelled_payload() -> EventPayload {
        EventPayload::OrderCancelled(OrderCancelledPayload {
            order_id: OrderId::new(),
            reason: "Payment failed: gateway timeout".to_string(),
            cancelled_at: Utc::now(),
        })
    }

    #[test]
    fn builder_generates_missing_identifiers() {
        let saga_id = SagaId::new();
        let envelope = EventEnvelope::builder()
            .saga_id(saga_id)
            .payload(cancelled_payload())
            .build();

        assert_eq!(envelope.saga_id, saga_id);
        assert_eq!(envelope.version, SCHEMA_VERSION);
        assert_eq!(envelope.event_type(), EventType::OrderCancelled);

        let other = EventEnvelope::builder()
            .saga_id(saga_id)
            .payload(cancelled_payload())
            .build();
        assert_ne!(envelope.event_id, other.event_id);
    }

    #[test]
    fn builder_preserves_correlation() {
        let correlation_id = CorrelationId::new();
        let envelope = EventEnvelope::builder()
            .saga_id(SagaId::new())
            .correlation_id(correlation_id)
            .payload(cancelled_payload())
            .build();
        assert_eq!(envelope.correlation_id, correlation_id);
    }

    #[test]
    fn encode_decode_roundtrip() {
        let envelope = EventEnvelope::builder()
            .saga_id(SagaId::new())
            .metadata(EventMetadata::for_source("order-service"))
            .payload(cancelled_payload())
            .build();

        let bytes = envelope.encode().unwrap();
        let back = EventEnvelope::decode(&bytes).unwrap();
        assert_eq!(back, envelope);
    }

    #[test]
    fn discriminator_at_top_level_of_wire_form() {
        let envelope = EventEnvelope::builder()
            .saga_id(SagaId::new())
            .payload(cancelled_payload())
            .build();

        let json: serde_json::Value =
            serde_json::from_slice(&envelope.encode().unwrap()).unwrap();
        assert_eq!(json["eventType"], "ORDER_CANCELLED");
        assert!(json["payload"].is_object());
        assert!(json["sagaId"].is_string());
    }

    #[test]
    fn missing_metadata_defaults_on_decode() {
        let envelope = EventEnvelope::builder()
            .saga_id(SagaId::new())
            .payload(cancelled_payload())
            .build();

        let mut json: serde_json::Value =
            serde_json::from_slice(&envelope.encode().unwrap()).unwrap();
        json.as_object_mut().unwrap().remove("metadata");

        let back: EventEnvelope = serde_json::from_value(json).unwrap();
        assert_eq!(back.metadata, EventMetadata::default());
    }

    #[test]
    fn bus_headers_describe_the_event() {
        let envelope = EventEnvelope::builder()
            .saga_id(SagaId::new())
            .payload(cancelled_payload())
            .build();

        let headers = envelope.bus_headers();
        assert_eq!(
            headers.get(headers::EVENT_TYPE).map(String::as_str),
            Some("ORDER_CANCELLED")
        );
        assert_eq!(
            headers.get(headers::EVENT_ID),
            Some(&envelope.event_id.to_string())
        );
        assert_eq!(
            headers.get(headers::RETRY_COUNT).map(String::as_str),
            Some("0")
        );
    }
}

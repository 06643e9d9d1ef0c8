//! Shared event contract for the payment saga.
//!
//! Every participant publishes and consumes [`EventEnvelope`]s. The
//! envelope carries the saga identity, tracing metadata, and a payload
//! drawn from the closed [`EventPayload`] enumeration. On the wire the
//! payload is discriminated by an `eventType` tag at the top level of the
//! JSON document, so a consumer can decide whether an event is of
//! interest before decoding the variant shape.
//!
//! No participant depends on another at runtime; this crate and the topic
//! names in [`topics`] are the only coupling between them.

pub mod envelope;
pub mod event_type;
pub mod metadata;
pub mod payload;
pub mod topics;

pub use envelope::{EventEnvelope, EventEnvelopeBuilder};
pub use event_type::EventType;
pub use metadata::EventMetadata;
pub use payload::{
    EventPayload, OrderCancelledPayload, OrderItem, PaymentFailedPayload,
    PaymentInitiatedPayload, PaymentProcessedPayload, PaymentRefundedPayload, RiskCheckCompletedPayload,
    RiskCheckFailedPayload, RiskCheckRollbackPayload, RiskChecks,
};

/// Envelope schema version stamped into every event.
pub const SCHEMA_VERSION: &str = "1.0";

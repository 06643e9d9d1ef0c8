//! The closed set of event type discriminators.

use serde::{Deserialize, Serialize};

use crate::topics;

/// Every event type that can appear on the bus.
///
/// The types marked *reserved* are part of the taxonomy but are not
/// emitted on the baseline happy or compensation paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    // Order
    PaymentInitiated,
    /// Reserved.
    OrderConfirmed,
    OrderCancelled,

    // Risk
    /// Reserved.
    RiskCheckStarted,
    RiskCheckCompleted,
    RiskCheckFailed,
    RiskCheckRollback,

    // Payment
    /// Reserved.
    PaymentProcessing,
    PaymentProcessed,
    PaymentFailed,
    PaymentRefunded,

    // Notification (reserved)
    NotificationSent,
    NotificationFailed,

    // Saga lifecycle (reserved)
    SagaCompleted,
    SagaFailed,
    SagaTimeout,
}

impl EventType {
    /// Returns the wire discriminator for this event type.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::PaymentInitiated => "PAYMENT_INITIATED",
            EventType::OrderConfirmed => "ORDER_CONFIRMED",
            EventType::OrderCancelled => "ORDER_CANCELLED",
            EventType::RiskCheckStarted => "RISK_CHECK_STARTED",
            EventType::RiskCheckCompleted => "RISK_CHECK_COMPLETED",
            EventType::RiskCheckFailed => "RISK_CHECK_FAILED",
            EventType::RiskCheckRollback => "RISK_CHECK_ROLLBACK",
            EventType::PaymentProcessing => "PAYMENT_PROCESSING",
            EventType::PaymentProcessed => "PAYMENT_PROCESSED",
            EventType::PaymentFailed => "PAYMENT_FAILED",
            EventType::PaymentRefunded => "PAYMENT_REFUNDED",
            EventType::NotificationSent => "NOTIFICATION_SENT",
            EventType::NotificationFailed => "NOTIFICATION_FAILED",
            EventType::SagaCompleted => "SAGA_COMPLETED",
            EventType::SagaFailed => "SAGA_FAILED",
            EventType::SagaTimeout => "SAGA_TIMEOUT",
        }
    }

    /// Returns the canonical topic this event type is published on, or
    /// `None` for the saga-lifecycle types that have no topic assigned.
    pub fn topic(&self) -> Option<&'static str> {
        match self {
            EventType::PaymentInitiated => Some(topics::PAYMENT_SAGA),
            EventType::RiskCheckStarted
            | EventType::RiskCheckCompleted
            | EventType::RiskCheckFailed => Some(topics::RISK_EVENTS),
            EventType::OrderConfirmed
            | EventType::PaymentProcessing
            | EventType::PaymentProcessed
            | EventType::PaymentFailed => Some(topics::PAYMENT_EVENTS),
            EventType::OrderCancelled
            | EventType::RiskCheckRollback
            | EventType::PaymentRefunded => Some(topics::SAGA_COMPENSATION),
            EventType::NotificationSent | EventType::NotificationFailed => {
                Some(topics::NOTIFICATION_EVENTS)
            }
            EventType::SagaCompleted | EventType::SagaFailed | EventType::SagaTimeout => None,
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_discriminators() {
        assert_eq!(EventType::PaymentInitiated.as_str(), "PAYMENT_INITIATED");
        assert_eq!(EventType::RiskCheckRollback.as_str(), "RISK_CHECK_ROLLBACK");
        assert_eq!(
            serde_json::to_string(&EventType::PaymentRefunded).unwrap(),
            "\"PAYMENT_REFUNDED\""
        );
    }

    #[test]
    fn serde_roundtrip() {
        let parsed: EventType = serde_json::from_str("\"ORDER_CANCELLED\"").unwrap();
        assert_eq!(parsed, EventType::OrderCancelled);
    }

    #[test]
    fn topic_mapping() {
        assert_eq!(
            EventType::PaymentInitiated.topic(),
            Some(topics::PAYMENT_SAGA)
        );
        assert_eq!(
            EventType::RiskCheckCompleted.topic(),
            Some(topics::RISK_EVENTS)
        );
        assert_eq!(
            EventType::PaymentProcessed.topic(),
            Some(topics::PAYMENT_EVENTS)
        );
        assert_eq!(
            EventType::OrderCancelled.topic(),
            Some(topics::SAGA_COMPENSATION)
        );
        assert_eq!(
            EventType::PaymentRefunded.topic(),
            Some(topics::SAGA_COMPENSATION)
        );
        assert_eq!(EventType::SagaTimeout.topic(), None);
    }
}

//! Event payload variants, discriminated by `eventType` on the wire.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, TransactionId};
use serde::{Deserialize, Serialize};

use crate::event_type::EventType;

/// The payload of an event, one variant per concrete event type.
///
/// Serialized adjacently tagged, so the JSON carries
/// `"eventType": "...", "payload": {...}`. Reserved event types (see
/// [`EventType`]) have no variant here because nothing emits them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "eventType", content = "payload")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventPayload {
    PaymentInitiated(PaymentInitiatedPayload),
    RiskCheckCompleted(RiskCheckCompletedPayload),
    RiskCheckFailed(RiskCheckFailedPayload),
    RiskCheckRollback(RiskCheckRollbackPayload),
    PaymentProcessed(PaymentProcessedPayload),
    PaymentFailed(PaymentFailedPayload),
    PaymentRefunded(PaymentRefundedPayload),
    OrderCancelled(OrderCancelledPayload),
}

impl EventPayload {
    /// Returns the event type discriminating this payload.
    pub fn event_type(&self) -> EventType {
        match self {
            EventPayload::PaymentInitiated(_) => EventType::PaymentInitiated,
            EventPayload::RiskCheckCompleted(_) => EventType::RiskCheckCompleted,
            EventPayload::RiskCheckFailed(_) => EventType::RiskCheckFailed,
            EventPayload::RiskCheckRollback(_) => EventType::RiskCheckRollback,
            EventPayload::PaymentProcessed(_) => EventType::PaymentProcessed,
            EventPayload::PaymentFailed(_) => EventType::PaymentFailed,
            EventPayload::PaymentRefunded(_) => EventType::PaymentRefunded,
            EventPayload::OrderCancelled(_) => EventType::OrderCancelled,
        }
    }
}

/// One line item of the order being paid for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: String,
    pub quantity: u32,
    pub price: Money,
}

/// Starts the saga. Emitted by Order on `payment-saga`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInitiatedPayload {
    pub order_id: OrderId,
    pub user_id: String,
    pub amount: Money,
    pub currency: String,
    pub payment_method: String,
    pub items: Vec<OrderItem>,
}

/// Outcome of the individual risk checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskChecks {
    pub fraud_check: bool,
    pub velocity_check: bool,
    pub blacklist_check: bool,
}

/// A finished risk assessment, approved or declined.
///
/// Carries `amount` and `currency` forward so the Payment participant
/// charges the real order amount without a cross-store lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskCheckCompletedPayload {
    pub order_id: OrderId,
    pub risk_score: u8,
    pub approved: bool,
    pub checks: RiskChecks,
    pub amount: Money,
    pub currency: String,
}

/// The risk assessment itself errored (not a decline).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskCheckFailedPayload {
    pub order_id: OrderId,
    pub reason: String,
    pub risk_score: u8,
}

/// A risk assessment was marked rolled back during compensation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskCheckRollbackPayload {
    pub order_id: OrderId,
}

/// A payment completed at the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentProcessedPayload {
    pub order_id: OrderId,
    pub transaction_id: TransactionId,
    pub amount: Money,
    pub currency: String,
    pub processed_at: DateTime<Utc>,
}

/// A payment failed at the gateway after retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentFailedPayload {
    pub order_id: OrderId,
    pub reason: String,
    pub error_code: String,
}

/// A completed payment was refunded during compensation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRefundedPayload {
    pub order_id: OrderId,
    pub transaction_id: TransactionId,
    pub refund_id: String,
    pub amount: Money,
    pub reason: String,
}

/// The order was cancelled; drives all downstream compensation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCancelledPayload {
    pub order_id: OrderId,
    pub reason: String,
    pub cancelled_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn event_type_mapping() {
        let payload = EventPayload::OrderCancelled(OrderCancelledPayload {
            order_id: OrderId::new(),
            reason: "Risk check declined".to_string(),
            cancelled_at: Utc::now(),
        });
        assert_eq!(payload.event_type(), EventType::OrderCancelled);
    }

    #[test]
    fn discriminator_is_top_level() {
        let payload = EventPayload::PaymentFailed(PaymentFailedPayload {
            order_id: OrderId::new(),
            reason: "gateway timeout".to_string(),
            error_code: "PAYMENT_GATEWAY_ERROR".to_string(),
        });
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["eventType"], "PAYMENT_FAILED");
        assert_eq!(json["payload"]["errorCode"], "PAYMENT_GATEWAY_ERROR");
    }

    #[test]
    fn wire_field_names_are_camel_case() {
        let payload = EventPayload::PaymentInitiated(PaymentInitiatedPayload {
            order_id: OrderId::new(),
            user_id: "user-123".to_string(),
            amount: Money::new(Decimal::new(9999, 2)),
            currency: "USD".to_string(),
            payment_method: "CREDIT_CARD".to_string(),
            items: vec![OrderItem {
                product_id: "p1".to_string(),
                quantity: 2,
                price: Money::new(Decimal::new(4999, 2)),
            }],
        });
        let json = serde_json::to_value(&payload).unwrap();
        let body = &json["payload"];
        assert_eq!(body["userId"], "user-123");
        assert_eq!(body["paymentMethod"], "CREDIT_CARD");
        assert_eq!(body["items"][0]["productId"], "p1");
    }

    #[test]
    fn roundtrip() {
        let payload = EventPayload::RiskCheckCompleted(RiskCheckCompletedPayload {
            order_id: OrderId::new(),
            risk_score: 30,
            approved: true,
            checks: RiskChecks {
                fraud_check: true,
                velocity_check: true,
                blacklist_check: false,
            },
            amount: Money::new(Decimal::new(14999, 2)),
            currency: "USD".to_string(),
        });
        let json = serde_json::to_string(&payload).unwrap();
        let back: EventPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }
}

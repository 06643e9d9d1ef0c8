//! Logical topic names on the message bus.

/// Saga initiation events from the Order service.
pub const PAYMENT_SAGA: &str = "payment-saga";

/// Risk assessment outcomes.
pub const RISK_EVENTS: &str = "risk-events";

/// Payment processing outcomes.
pub const PAYMENT_EVENTS: &str = "payment-events";

/// Compensation triggers: cancellations, refunds, rollbacks.
pub const SAGA_COMPENSATION: &str = "saga-compensation";

/// Messages that exhausted their retry budget.
pub const DEAD_LETTER: &str = "dead-letter";

/// Notification dispatch audit trail (reserved).
pub const NOTIFICATION_EVENTS: &str = "notification-events";

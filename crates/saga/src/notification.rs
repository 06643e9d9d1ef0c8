//! Notification participant: user-facing messaging, at most once per
//! order and category.

use async_trait::async_trait;
use bus::EventHandler;
use common::OrderId;
use events::{EventEnvelope, EventPayload};

use crate::error::{Result, SagaError};
use crate::notify::{Notifier, SentLedger};

/// Where notifications are addressed in the baseline (the real recipient
/// lookup lives outside the saga core).
const RECIPIENT: &str = "user@example.com";

/// One notification per order and category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationCategory {
    Success,
    Failure,
    Cancelled,
    Refund,
}

impl NotificationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationCategory::Success => "SUCCESS",
            NotificationCategory::Failure => "FAILURE",
            NotificationCategory::Cancelled => "CANCELLED",
            NotificationCategory::Refund => "REFUND",
        }
    }
}

impl std::fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The Notification service: renders messages and dispatches them
/// through a channel adapter.
///
/// Dispatch is reported-best-effort, not transactional: a channel failure
/// is logged and the event still acknowledges, and a duplicate delivery
/// of the same event is absorbed by the [`SentLedger`].
pub struct NotificationService<N: Notifier, L: SentLedger> {
    notifier: N,
    ledger: L,
}

impl<N, L> NotificationService<N, L>
where
    N: Notifier,
    L: SentLedger,
{
    pub fn new(notifier: N, ledger: L) -> Self {
        Self { notifier, ledger }
    }

    #[tracing::instrument(skip(self, subject, body), fields(order_id = %order_id, category = %category))]
    async fn dispatch(
        &self,
        order_id: OrderId,
        category: NotificationCategory,
        subject: &str,
        body: &str,
    ) {
        if self.ledger.is_sent(order_id, category).await {
            tracing::debug!("notification already sent");
            return;
        }

        match self.notifier.send(RECIPIENT, subject, body).await {
            Ok(()) => {
                self.ledger.mark_sent(order_id, category).await;
                metrics::counter!("saga_notifications_sent_total").increment(1);
                tracing::info!("notification sent");
            }
            Err(err) => {
                metrics::counter!("saga_notifications_failed_total").increment(1);
                tracing::error!(%err, "notification dispatch failed");
            }
        }
    }
}

#[async_trait]
impl<N, L> EventHandler for NotificationService<N, L>
where
    N: Notifier,
    L: SentLedger,
{
    type Error = SagaError;

    async fn handle(&self, envelope: &EventEnvelope) -> Result<()> {
        match &envelope.payload {
            EventPayload::PaymentProcessed(payload) => {
                let body = format!(
                    "Your payment of {} {} has been processed successfully. Transaction ID: {}",
                    payload.amount, payload.currency, payload.transaction_id
                );
                self.dispatch(
                    payload.order_id,
                    NotificationCategory::Success,
                    "Payment Successful",
                    &body,
                )
                .await;
            }
            EventPayload::PaymentFailed(payload) => {
                let body = format!(
                    "Your payment failed. Reason: {}. Please try again or contact support.",
                    payload.reason
                );
                self.dispatch(
                    payload.order_id,
                    NotificationCategory::Failure,
                    "Payment Failed",
                    &body,
                )
                .await;
            }
            EventPayload::OrderCancelled(payload) => {
                let body = format!("Your order has been cancelled. Reason: {}", payload.reason);
                self.dispatch(
                    payload.order_id,
                    NotificationCategory::Cancelled,
                    "Order Cancelled",
                    &body,
                )
                .await;
            }
            EventPayload::PaymentRefunded(payload) => {
                let body = format!(
                    "Your payment has been refunded. Amount: {}. Refund ID: {}. Reason: {}",
                    payload.amount, payload.refund_id, payload.reason
                );
                self.dispatch(
                    payload.order_id,
                    NotificationCategory::Refund,
                    "Payment Refunded",
                    &body,
                )
                .await;
            }
            _ => {}
        }
        Ok(())
    }
}

//! Order participant: saga initiator and outcome coordinator.
//!
//! The order record walks this state machine:
//!
//! ```text
//! PENDING ──risk approved──► PROCESSING ──payment processed──► CONFIRMED (terminal)
//!    │                           │
//!    │                           └──payment failed────────────┐
//!    └──risk failed / risk declined──────────────────────────►│
//!                                                             ▼
//!                                                         CANCELLED (terminal)
//! ```
//!
//! Cancelling is the compensation fan-out point: the `ORDER_CANCELLED`
//! event it emits is what drives the Risk rollback and the Payment
//! refund. The Order participant never consumes its own compensation
//! event.

use async_trait::async_trait;
use bus::{EventHandler, EventPublisher, MessageBus};
use chrono::{DateTime, Utc};
use common::{Money, OrderId, SagaId, TransactionId};
use events::{
    EventEnvelope, EventMetadata, EventPayload, OrderCancelledPayload, OrderItem,
    PaymentInitiatedPayload, topics,
};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SagaError};
use crate::store::OrderStore;

const SOURCE: &str = "order-service";

/// Status of an order along the saga.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Processing,
    Confirmed,
    Cancelled,
    Failed,
}

impl OrderStatus {
    /// Terminal states can never be left again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Confirmed | OrderStatus::Cancelled | OrderStatus::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "PROCESSING" => Ok(OrderStatus::Processing),
            "CONFIRMED" => Ok(OrderStatus::Confirmed),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            "FAILED" => Ok(OrderStatus::Failed),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

/// How the user wants to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    Paypal,
    BankTransfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "CREDIT_CARD",
            PaymentMethod::DebitCard => "DEBIT_CARD",
            PaymentMethod::Paypal => "PAYPAL",
            PaymentMethod::BankTransfer => "BANK_TRANSFER",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "CREDIT_CARD" => Ok(PaymentMethod::CreditCard),
            "DEBIT_CARD" => Ok(PaymentMethod::DebitCard),
            "PAYPAL" => Ok(PaymentMethod::Paypal),
            "BANK_TRANSFER" => Ok(PaymentMethod::BankTransfer),
            other => Err(format!("unknown payment method: {other}")),
        }
    }
}

/// The order record, owned exclusively by this participant.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub order_id: OrderId,
    pub user_id: String,
    /// Saga identity; unique within the order store.
    pub saga_id: SagaId,
    pub amount: Money,
    pub currency: String,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub cancellation_reason: Option<String>,
    pub transaction_id: Option<TransactionId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a fresh PENDING order for a new saga.
    pub fn new(
        user_id: String,
        saga_id: SagaId,
        amount: Money,
        currency: String,
        payment_method: PaymentMethod,
    ) -> Self {
        let now = Utc::now();
        Self {
            order_id: OrderId::new(),
            user_id,
            saga_id,
            amount,
            currency,
            status: OrderStatus::Pending,
            payment_method,
            cancellation_reason: None,
            transaction_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn transition(&mut self, status: OrderStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

/// A validated payment request entering the saga.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub user_id: String,
    pub amount: Money,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub items: Vec<OrderItem>,
}

/// The Order service: initiates sagas and coordinates their outcome.
pub struct OrderService<S: OrderStore, B: MessageBus> {
    store: S,
    publisher: EventPublisher<B>,
}

impl<S, B> OrderService<S, B>
where
    S: OrderStore,
    B: MessageBus,
{
    pub fn new(store: S, publisher: EventPublisher<B>) -> Self {
        Self { store, publisher }
    }

    /// Creates an order and kicks off its payment saga.
    ///
    /// The only externally triggered entry point; the request must
    /// already be validated at the REST boundary.
    #[tracing::instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn initiate_payment(&self, request: PaymentRequest) -> Result<Order> {
        let saga_id = SagaId::new();
        let order = Order::new(
            request.user_id.clone(),
            saga_id,
            request.amount,
            request.currency.clone(),
            request.payment_method,
        );
        self.store.insert(&order).await?;
        metrics::counter!("saga_initiated_total").increment(1);
        tracing::info!(order_id = %order.order_id, %saga_id, "order created");

        let envelope = EventEnvelope::builder()
            .saga_id(saga_id)
            .metadata(EventMetadata::for_source(SOURCE))
            .payload(EventPayload::PaymentInitiated(PaymentInitiatedPayload {
                order_id: order.order_id,
                user_id: request.user_id,
                amount: request.amount,
                currency: request.currency,
                payment_method: order.payment_method.as_str().to_string(),
                items: request.items,
            }))
            .build();
        self.publisher
            .publish(topics::PAYMENT_SAGA, &envelope)
            .await?;

        Ok(order)
    }

    /// Read-only lookup scoped to the requesting user.
    pub async fn get_order(&self, order_id: OrderId, user_id: &str) -> Result<Option<Order>> {
        Ok(self.store.find_by_id_and_user(order_id, user_id).await?)
    }

    /// Risk approved: PENDING → PROCESSING.
    async fn mark_processing(&self, saga_id: SagaId) -> Result<()> {
        let Some(mut order) = self.store.find_by_saga(saga_id).await? else {
            tracing::warn!(%saga_id, "risk approval for unknown saga");
            return Ok(());
        };

        match order.status {
            OrderStatus::Pending => {
                order.transition(OrderStatus::Processing);
                self.store.update(&order).await?;
                tracing::info!(order_id = %order.order_id, "order moved to PROCESSING");
            }
            status => {
                tracing::debug!(
                    order_id = %order.order_id,
                    %status,
                    "ignoring risk approval in current state"
                );
            }
        }
        Ok(())
    }

    /// Payment succeeded: PROCESSING → CONFIRMED, remember the transaction.
    async fn confirm(&self, saga_id: SagaId, transaction_id: TransactionId) -> Result<()> {
        let Some(mut order) = self.store.find_by_saga(saga_id).await? else {
            tracing::warn!(%saga_id, "payment outcome for unknown saga");
            return Ok(());
        };

        match order.status {
            // PENDING is reachable here when the payment outcome overtakes
            // the risk outcome across topics; the jump stays monotonic.
            OrderStatus::Pending | OrderStatus::Processing => {
                order.transition(OrderStatus::Confirmed);
                order.transaction_id = Some(transaction_id);
                self.store.update(&order).await?;
                metrics::counter!("saga_orders_confirmed_total").increment(1);
                tracing::info!(
                    order_id = %order.order_id,
                    %transaction_id,
                    "order CONFIRMED"
                );
            }
            OrderStatus::Confirmed => {
                tracing::debug!(order_id = %order.order_id, "order already confirmed");
            }
            status => {
                tracing::warn!(
                    order_id = %order.order_id,
                    %status,
                    "payment processed for an order in a terminal state"
                );
            }
        }
        Ok(())
    }

    /// Cancel trigger: the compensation fan-out point.
    ///
    /// The state write is idempotent, but `ORDER_CANCELLED` is emitted on
    /// every trigger so a publish lost to a crash is recovered on
    /// redelivery; downstream compensations absorb the duplicates.
    async fn cancel(&self, saga_id: SagaId, reason: &str) -> Result<()> {
        let Some(mut order) = self.store.find_by_saga(saga_id).await? else {
            tracing::warn!(%saga_id, "cancel trigger for unknown saga");
            return Ok(());
        };

        match order.status {
            OrderStatus::Confirmed => {
                tracing::warn!(
                    order_id = %order.order_id,
                    reason,
                    "refusing to cancel a confirmed order"
                );
                return Ok(());
            }
            OrderStatus::Cancelled => {
                tracing::debug!(order_id = %order.order_id, "order already cancelled");
            }
            _ => {
                order.transition(OrderStatus::Cancelled);
                order.cancellation_reason = Some(reason.to_string());
                self.store.update(&order).await?;
                metrics::counter!("saga_orders_cancelled_total").increment(1);
                tracing::info!(order_id = %order.order_id, reason, "order CANCELLED");
            }
        }

        let envelope = EventEnvelope::builder()
            .saga_id(saga_id)
            .metadata(EventMetadata::for_source(SOURCE))
            .payload(EventPayload::OrderCancelled(OrderCancelledPayload {
                order_id: order.order_id,
                reason: reason.to_string(),
                cancelled_at: Utc::now(),
            }))
            .build();
        self.publisher
            .publish(topics::SAGA_COMPENSATION, &envelope)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl<S, B> EventHandler for OrderService<S, B>
where
    S: OrderStore,
    B: MessageBus,
{
    type Error = SagaError;

    async fn handle(&self, envelope: &EventEnvelope) -> Result<()> {
        match &envelope.payload {
            EventPayload::RiskCheckCompleted(payload) => {
                if payload.approved {
                    self.mark_processing(envelope.saga_id).await
                } else {
                    tracing::warn!(
                        saga_id = %envelope.saga_id,
                        risk_score = payload.risk_score,
                        "risk check declined"
                    );
                    self.cancel(envelope.saga_id, "Risk check declined").await
                }
            }
            EventPayload::RiskCheckFailed(payload) => {
                self.cancel(
                    envelope.saga_id,
                    &format!("Risk check failed: {}", payload.reason),
                )
                .await
            }
            EventPayload::PaymentProcessed(payload) => {
                self.confirm(envelope.saga_id, payload.transaction_id).await
            }
            EventPayload::PaymentFailed(payload) => {
                self.cancel(
                    envelope.saga_id,
                    &format!("Payment failed: {}", payload.reason),
                )
                .await
            }
            _ => Ok(()),
        }
    }
}

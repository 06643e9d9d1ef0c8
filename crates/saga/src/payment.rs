//! Payment participant: gateway charges and compensating refunds.
//!
//! Transaction lifecycle:
//!
//! ```text
//! PROCESSING ──gateway ok──► COMPLETED ──compensate──► REFUNDED (terminal)
//!    │                           │
//!    └──gateway fail──► FAILED (terminal)  (compensation no-op)
//! ```

use async_trait::async_trait;
use bus::{EventHandler, EventPublisher, MessageBus, RetryPolicy, retry_with};
use chrono::{DateTime, Utc};
use common::{CorrelationId, Money, OrderId, SagaId, TransactionId};
use events::{
    EventEnvelope, EventMetadata, EventPayload, PaymentFailedPayload, PaymentProcessedPayload,
    PaymentRefundedPayload, RiskCheckCompletedPayload, topics,
};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SagaError};
use crate::gateway::PaymentGateway;
use crate::store::{PaymentStore, StoreError};

const SOURCE: &str = "payment-service";
const GATEWAY_ERROR_CODE: &str = "PAYMENT_GATEWAY_ERROR";

/// Status of a payment transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
}

impl TransactionStatus {
    /// Terminal states can never be left again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Failed | TransactionStatus::Refunded)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Processing => "PROCESSING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
            TransactionStatus::Refunded => "REFUNDED",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TransactionStatus::Pending),
            "PROCESSING" => Ok(TransactionStatus::Processing),
            "COMPLETED" => Ok(TransactionStatus::Completed),
            "FAILED" => Ok(TransactionStatus::Failed),
            "REFUNDED" => Ok(TransactionStatus::Refunded),
            other => Err(format!("unknown transaction status: {other}")),
        }
    }
}

/// The payment transaction record, owned exclusively by this participant.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentTransaction {
    pub transaction_id: TransactionId,
    pub order_id: OrderId,
    /// Saga identity; unique within the payment store.
    pub saga_id: SagaId,
    pub amount: Money,
    pub currency: String,
    pub status: TransactionStatus,
    pub gateway_transaction_id: Option<String>,
    pub auth_code: Option<String>,
    pub refund_id: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentTransaction {
    /// Creates a fresh PROCESSING transaction for a saga.
    pub fn new(order_id: OrderId, saga_id: SagaId, amount: Money, currency: String) -> Self {
        let now = Utc::now();
        Self {
            transaction_id: TransactionId::new(),
            order_id,
            saga_id,
            amount,
            currency,
            status: TransactionStatus::Processing,
            gateway_transaction_id: None,
            auth_code: None,
            refund_id: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn transition(&mut self, status: TransactionStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

/// The Payment service: charges approved sagas and refunds completed
/// payments during compensation.
pub struct PaymentService<S: PaymentStore, G: PaymentGateway, B: MessageBus> {
    store: S,
    gateway: G,
    publisher: EventPublisher<B>,
    gateway_policy: RetryPolicy,
}

impl<S, G, B> PaymentService<S, G, B>
where
    S: PaymentStore,
    G: PaymentGateway,
    B: MessageBus,
{
    pub fn new(store: S, gateway: G, publisher: EventPublisher<B>) -> Self {
        Self::with_gateway_policy(store, gateway, publisher, RetryPolicy::gateway())
    }

    pub fn with_gateway_policy(
        store: S,
        gateway: G,
        publisher: EventPublisher<B>,
        gateway_policy: RetryPolicy,
    ) -> Self {
        Self {
            store,
            gateway,
            publisher,
            gateway_policy,
        }
    }

    /// Charges an approved saga through the gateway.
    ///
    /// Gateway refusal after retries is a business failure, not a handler
    /// error: the transaction is persisted FAILED and `PAYMENT_FAILED`
    /// drives the compensation, while the handler returns `Ok`.
    #[tracing::instrument(skip(self, payload), fields(saga_id = %saga_id, order_id = %payload.order_id))]
    async fn process(
        &self,
        saga_id: SagaId,
        correlation_id: CorrelationId,
        payload: &RiskCheckCompletedPayload,
    ) -> Result<()> {
        if !payload.approved {
            tracing::debug!("risk not approved, no payment attempted");
            return Ok(());
        }

        let transaction = match self.store.find_by_saga(saga_id).await? {
            Some(existing) => match existing.status {
                TransactionStatus::Completed => {
                    tracing::info!("payment already completed, republishing outcome");
                    return self.publish_processed(correlation_id, &existing).await;
                }
                TransactionStatus::Failed => {
                    tracing::info!("payment already failed, republishing outcome");
                    let reason = existing
                        .error_message
                        .clone()
                        .unwrap_or_else(|| "payment previously failed".to_string());
                    return self.publish_failed(correlation_id, &existing, &reason).await;
                }
                TransactionStatus::Refunded => {
                    tracing::debug!("payment already refunded, nothing to do");
                    return Ok(());
                }
                // A delivery replayed after a crash mid-charge; resume.
                // The gateway may have charged already, the known hazard
                // of choreography without an outbox.
                TransactionStatus::Processing | TransactionStatus::Pending => existing,
            },
            None => {
                let transaction = PaymentTransaction::new(
                    payload.order_id,
                    saga_id,
                    payload.amount,
                    payload.currency.clone(),
                );
                match self.store.insert(&transaction).await {
                    Ok(()) => transaction,
                    // A concurrent duplicate won the race.
                    Err(StoreError::Duplicate(_)) => return Ok(()),
                    Err(err) => return Err(err.into()),
                }
            }
        };

        self.charge(correlation_id, transaction).await
    }

    async fn charge(
        &self,
        correlation_id: CorrelationId,
        mut transaction: PaymentTransaction,
    ) -> Result<()> {
        let start = std::time::Instant::now();
        let outcome = retry_with(self.gateway_policy, |_| self.gateway.charge(&transaction)).await;
        metrics::histogram!("saga_gateway_duration_seconds").record(start.elapsed().as_secs_f64());

        match outcome {
            Ok(charge) => {
                transaction.transition(TransactionStatus::Completed);
                transaction.gateway_transaction_id = Some(charge.gateway_transaction_id);
                transaction.auth_code = Some(charge.auth_code);
                self.store.update(&transaction).await?;
                metrics::counter!("saga_payments_completed_total").increment(1);
                tracing::info!(
                    transaction_id = %transaction.transaction_id,
                    "payment COMPLETED"
                );
                self.publish_processed(correlation_id, &transaction).await
            }
            Err(err) => {
                transaction.transition(TransactionStatus::Failed);
                transaction.error_message = Some(err.to_string());
                self.store.update(&transaction).await?;
                metrics::counter!("saga_payments_failed_total").increment(1);
                tracing::warn!(
                    transaction_id = %transaction.transaction_id,
                    %err,
                    "payment FAILED after gateway retries"
                );
                self.publish_failed(correlation_id, &transaction, &err.to_string())
                    .await
            }
        }
    }

    /// Compensation: refund the transaction only if money actually moved
    /// to completion.
    ///
    /// A refund gateway failure is not retried inline: the transaction
    /// stays COMPLETED and is surfaced for manual intervention, because
    /// an automatic resolution here could lose money twice.
    #[tracing::instrument(skip(self), fields(saga_id = %saga_id))]
    async fn refund(&self, saga_id: SagaId, reason: &str) -> Result<()> {
        let Some(mut transaction) = self.store.find_by_saga(saga_id).await? else {
            tracing::debug!("no transaction for saga, nothing to refund");
            return Ok(());
        };

        match transaction.status {
            TransactionStatus::Completed => {}
            TransactionStatus::Refunded => {
                tracing::debug!(
                    transaction_id = %transaction.transaction_id,
                    "payment already refunded"
                );
                return Ok(());
            }
            status => {
                tracing::info!(
                    transaction_id = %transaction.transaction_id,
                    %status,
                    "no refund needed, payment never completed"
                );
                return Ok(());
            }
        }

        match self.gateway.refund(&transaction).await {
            Ok(refund_id) => {
                transaction.transition(TransactionStatus::Refunded);
                transaction.refund_id = Some(refund_id.clone());
                self.store.update(&transaction).await?;
                metrics::counter!("saga_payments_refunded_total").increment(1);
                tracing::info!(
                    transaction_id = %transaction.transaction_id,
                    refund_id,
                    "payment REFUNDED"
                );

                let envelope = EventEnvelope::builder()
                    .saga_id(saga_id)
                    .metadata(EventMetadata::for_source(SOURCE))
                    .payload(EventPayload::PaymentRefunded(PaymentRefundedPayload {
                        order_id: transaction.order_id,
                        transaction_id: transaction.transaction_id,
                        refund_id,
                        amount: transaction.amount,
                        reason: reason.to_string(),
                    }))
                    .build();
                self.publisher
                    .publish(topics::SAGA_COMPENSATION, &envelope)
                    .await?;
                Ok(())
            }
            Err(err) => {
                metrics::counter!("saga_refunds_manual_intervention_total").increment(1);
                tracing::error!(
                    transaction_id = %transaction.transaction_id,
                    order_id = %transaction.order_id,
                    %err,
                    "refund failed, manual intervention required"
                );
                Ok(())
            }
        }
    }

    async fn publish_processed(
        &self,
        correlation_id: CorrelationId,
        transaction: &PaymentTransaction,
    ) -> Result<()> {
        let envelope = EventEnvelope::builder()
            .saga_id(transaction.saga_id)
            .correlation_id(correlation_id)
            .metadata(EventMetadata::for_source(SOURCE))
            .payload(EventPayload::PaymentProcessed(PaymentProcessedPayload {
                order_id: transaction.order_id,
                transaction_id: transaction.transaction_id,
                amount: transaction.amount,
                currency: transaction.currency.clone(),
                processed_at: Utc::now(),
            }))
            .build();
        self.publisher
            .publish(topics::PAYMENT_EVENTS, &envelope)
            .await?;
        Ok(())
    }

    async fn publish_failed(
        &self,
        correlation_id: CorrelationId,
        transaction: &PaymentTransaction,
        reason: &str,
    ) -> Result<()> {
        let envelope = EventEnvelope::builder()
            .saga_id(transaction.saga_id)
            .correlation_id(correlation_id)
            .metadata(EventMetadata::for_source(SOURCE))
            .payload(EventPayload::PaymentFailed(PaymentFailedPayload {
                order_id: transaction.order_id,
                reason: reason.to_string(),
                error_code: GATEWAY_ERROR_CODE.to_string(),
            }))
            .build();
        self.publisher
            .publish(topics::PAYMENT_EVENTS, &envelope)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl<S, G, B> EventHandler for PaymentService<S, G, B>
where
    S: PaymentStore,
    G: PaymentGateway,
    B: MessageBus,
{
    type Error = SagaError;

    async fn handle(&self, envelope: &EventEnvelope) -> Result<()> {
        match &envelope.payload {
            EventPayload::RiskCheckCompleted(payload) => {
                self.process(envelope.saga_id, envelope.correlation_id, payload)
                    .await
            }
            EventPayload::OrderCancelled(payload) => {
                self.refund(envelope.saga_id, &payload.reason).await
            }
            EventPayload::PaymentFailed(payload) => {
                self.refund(envelope.saga_id, &payload.reason).await
            }
            _ => Ok(()),
        }
    }
}

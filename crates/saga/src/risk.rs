//! Risk participant: fraud, velocity, and blacklist checks.

use async_trait::async_trait;
use bus::{EventHandler, EventPublisher, MessageBus};
use chrono::{DateTime, Utc};
use common::{CorrelationId, OrderId, SagaId};
use events::{
    EventEnvelope, EventMetadata, EventPayload, PaymentInitiatedPayload, RiskCheckCompletedPayload,
    RiskCheckFailedPayload, RiskCheckRollbackPayload, RiskChecks, topics,
};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{Result, SagaError};
use crate::store::{RiskStore, StoreError};

const SOURCE: &str = "risk-service";

/// Scores at or above this threshold are declined.
const RISK_THRESHOLD: u8 = 50;

/// A persisted risk assessment for one saga.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskAssessment {
    pub id: Uuid,
    pub order_id: OrderId,
    /// Saga identity; unique within the risk store.
    pub saga_id: SagaId,
    pub user_id: String,
    /// 0–100; weighted sum of the failed checks.
    pub risk_score: u8,
    pub approved: bool,
    pub fraud_check: bool,
    pub velocity_check: bool,
    pub blacklist_check: bool,
    pub rolled_back: bool,
    pub created_at: DateTime<Utc>,
}

/// The Risk service: assesses initiated payments and rolls assessments
/// back during compensation.
pub struct RiskService<S: RiskStore, B: MessageBus> {
    store: S,
    publisher: EventPublisher<B>,
}

impl<S, B> RiskService<S, B>
where
    S: RiskStore,
    B: MessageBus,
{
    pub fn new(store: S, publisher: EventPublisher<B>) -> Self {
        Self { store, publisher }
    }

    /// Runs the checks, persists the assessment, and publishes the
    /// outcome.
    ///
    /// A declined assessment is still a *completed* one: it goes out as
    /// `RISK_CHECK_COMPLETED` with `approved=false`. Only an error in the
    /// assessment itself (persistence, for instance) produces
    /// `RISK_CHECK_FAILED`.
    #[tracing::instrument(skip(self, payload), fields(saga_id = %saga_id, order_id = %payload.order_id))]
    async fn assess(
        &self,
        saga_id: SagaId,
        correlation_id: CorrelationId,
        payload: &PaymentInitiatedPayload,
    ) -> Result<()> {
        if let Some(existing) = self.store.find_by_saga(saga_id).await? {
            tracing::info!("assessment already exists, republishing outcome");
            return self
                .publish_completed(saga_id, correlation_id, &existing, payload)
                .await;
        }

        let fraud_check = check_fraud(&payload.user_id, payload.amount.amount());
        let velocity_check = check_velocity(&payload.user_id);
        let blacklist_check = check_blacklist(&payload.user_id, &payload.payment_method);

        let risk_score = calculate_risk_score(fraud_check, velocity_check, blacklist_check);
        let approved = risk_score < RISK_THRESHOLD;

        let assessment = RiskAssessment {
            id: Uuid::new_v4(),
            order_id: payload.order_id,
            saga_id,
            user_id: payload.user_id.clone(),
            risk_score,
            approved,
            fraud_check,
            velocity_check,
            blacklist_check,
            rolled_back: false,
            created_at: Utc::now(),
        };

        match self.store.insert(&assessment).await {
            Ok(()) => {
                metrics::counter!("saga_risk_assessments_total").increment(1);
                tracing::info!(risk_score, approved, "risk assessment persisted");
                self.publish_completed(saga_id, correlation_id, &assessment, payload)
                    .await
            }
            // A concurrent duplicate delivery won the race; its outcome
            // event is already on the way.
            Err(StoreError::Duplicate(_)) => Ok(()),
            Err(err) => {
                tracing::error!(%err, "risk assessment could not be persisted");
                self.publish_failed(saga_id, correlation_id, payload.order_id, &err, risk_score)
                    .await
            }
        }
    }

    async fn publish_completed(
        &self,
        saga_id: SagaId,
        correlation_id: CorrelationId,
        assessment: &RiskAssessment,
        payload: &PaymentInitiatedPayload,
    ) -> Result<()> {
        let envelope = EventEnvelope::builder()
            .saga_id(saga_id)
            .correlation_id(correlation_id)
            .metadata(EventMetadata::for_source(SOURCE))
            .payload(EventPayload::RiskCheckCompleted(RiskCheckCompletedPayload {
                order_id: assessment.order_id,
                risk_score: assessment.risk_score,
                approved: assessment.approved,
                checks: RiskChecks {
                    fraud_check: assessment.fraud_check,
                    velocity_check: assessment.velocity_check,
                    blacklist_check: assessment.blacklist_check,
                },
                amount: payload.amount,
                currency: payload.currency.clone(),
            }))
            .build();
        self.publisher.publish(topics::RISK_EVENTS, &envelope).await?;
        Ok(())
    }

    async fn publish_failed(
        &self,
        saga_id: SagaId,
        correlation_id: CorrelationId,
        order_id: OrderId,
        error: &StoreError,
        risk_score: u8,
    ) -> Result<()> {
        let envelope = EventEnvelope::builder()
            .saga_id(saga_id)
            .correlation_id(correlation_id)
            .metadata(EventMetadata::for_source(SOURCE))
            .payload(EventPayload::RiskCheckFailed(RiskCheckFailedPayload {
                order_id,
                reason: error.to_string(),
                risk_score,
            }))
            .build();
        self.publisher.publish(topics::RISK_EVENTS, &envelope).await?;
        Ok(())
    }

    /// Compensation: mark the assessment rolled back.
    ///
    /// A missing assessment means compensation overtook the forward step;
    /// the event is absorbed without effect, and the late forward event
    /// will find the order already cancelled.
    #[tracing::instrument(skip(self), fields(saga_id = %saga_id))]
    async fn rollback(&self, saga_id: SagaId) -> Result<()> {
        let Some(mut assessment) = self.store.find_by_saga(saga_id).await? else {
            tracing::debug!("no assessment to roll back");
            return Ok(());
        };
        if assessment.rolled_back {
            tracing::debug!("assessment already rolled back");
            return Ok(());
        }

        assessment.rolled_back = true;
        self.store.update(&assessment).await?;
        metrics::counter!("saga_risk_rollbacks_total").increment(1);
        tracing::info!(order_id = %assessment.order_id, "risk assessment rolled back");

        let envelope = EventEnvelope::builder()
            .saga_id(saga_id)
            .metadata(EventMetadata::for_source(SOURCE))
            .payload(EventPayload::RiskCheckRollback(RiskCheckRollbackPayload {
                order_id: assessment.order_id,
            }))
            .build();
        self.publisher
            .publish(topics::SAGA_COMPENSATION, &envelope)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl<S, B> EventHandler for RiskService<S, B>
where
    S: RiskStore,
    B: MessageBus,
{
    type Error = SagaError;

    async fn handle(&self, envelope: &EventEnvelope) -> Result<()> {
        match &envelope.payload {
            EventPayload::PaymentInitiated(payload) => {
                self.assess(envelope.saga_id, envelope.correlation_id, payload)
                    .await
            }
            EventPayload::OrderCancelled(_) | EventPayload::PaymentFailed(_) => {
                self.rollback(envelope.saga_id).await
            }
            _ => Ok(()),
        }
    }
}

/// Rejects amounts over 10 000 as likely fraud.
fn check_fraud(user_id: &str, amount: Decimal) -> bool {
    if amount > Decimal::from(10_000) {
        tracing::warn!(user_id, %amount, "fraud check failed: amount too high");
        return false;
    }
    true
}

/// Velocity policy stub: always passes in the baseline.
fn check_velocity(_user_id: &str) -> bool {
    true
}

/// Rejects users carrying the blocklist marker in their ID.
fn check_blacklist(user_id: &str, _payment_method: &str) -> bool {
    if user_id.to_lowercase().contains("blocked") {
        tracing::warn!(user_id, "blacklist hit");
        return false;
    }
    true
}

fn calculate_risk_score(fraud_check: bool, velocity_check: bool, blacklist_check: bool) -> u8 {
    let mut score = 0;
    if !fraud_check {
        score += 40;
    }
    if !velocity_check {
        score += 30;
    }
    if !blacklist_check {
        score += 30;
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryRiskStore;
    use bus::{InMemoryBus, RetryPolicy, Subscription};
    use common::Money;
    use events::OrderItem;
    use std::time::Duration;

    fn service(bus: &InMemoryBus) -> (RiskService<InMemoryRiskStore, InMemoryBus>, InMemoryRiskStore)
    {
        let store = InMemoryRiskStore::new();
        let publisher = EventPublisher::with_policy(bus.clone(), RetryPolicy::immediate(1));
        (RiskService::new(store.clone(), publisher), store)
    }

    fn initiated(user_id: &str, amount: Decimal) -> EventEnvelope {
        EventEnvelope::builder()
            .saga_id(SagaId::new())
            .payload(EventPayload::PaymentInitiated(PaymentInitiatedPayload {
                order_id: OrderId::new(),
                user_id: user_id.to_string(),
                amount: Money::new(amount),
                currency: "USD".to_string(),
                payment_method: "CREDIT_CARD".to_string(),
                items: vec![OrderItem {
                    product_id: "p1".to_string(),
                    quantity: 1,
                    price: Money::new(amount),
                }],
            }))
            .build()
    }

    async fn next_event(bus: &InMemoryBus, group: &str, topic: &str) -> Option<EventEnvelope> {
        let mut sub = bus.subscribe(group, topic).await.unwrap();
        let delivery = sub.poll(Duration::from_millis(200)).await.unwrap()?;
        sub.ack(&delivery).await.unwrap();
        Some(EventEnvelope::decode(&delivery.payload).unwrap())
    }

    #[test]
    fn scoring_weights() {
        assert_eq!(calculate_risk_score(true, true, true), 0);
        assert_eq!(calculate_risk_score(false, true, true), 40);
        assert_eq!(calculate_risk_score(true, false, true), 30);
        assert_eq!(calculate_risk_score(true, true, false), 30);
        assert_eq!(calculate_risk_score(false, false, false), 100);
    }

    #[tokio::test]
    async fn clean_user_is_approved_with_zero_score() {
        let bus = InMemoryBus::new();
        let (service, store) = service(&bus);
        let event = initiated("user-123", Decimal::new(9999, 2));

        service.handle(&event).await.unwrap();

        let assessment = store.find_by_saga(event.saga_id).await.unwrap().unwrap();
        assert!(assessment.approved);
        assert_eq!(assessment.risk_score, 0);
        assert!(!assessment.rolled_back);

        let outcome = next_event(&bus, "t", topics::RISK_EVENTS).await.unwrap();
        let EventPayload::RiskCheckCompleted(payload) = &outcome.payload else {
            panic!("expected RISK_CHECK_COMPLETED");
        };
        assert!(payload.approved);
        assert_eq!(payload.amount, Money::new(Decimal::new(9999, 2)));
        // The outcome keeps the initiating event's correlation.
        assert_eq!(outcome.correlation_id, event.correlation_id);
    }

    #[tokio::test]
    async fn blocked_user_is_declined_not_failed() {
        let bus = InMemoryBus::new();
        let (service, store) = service(&bus);
        let event = initiated("blocked-user-456", Decimal::new(14999, 2));

        service.handle(&event).await.unwrap();

        let assessment = store.find_by_saga(event.saga_id).await.unwrap().unwrap();
        assert!(!assessment.approved);
        assert_eq!(assessment.risk_score, 30);
        assert!(!assessment.blacklist_check);

        let outcome = next_event(&bus, "t", topics::RISK_EVENTS).await.unwrap();
        let EventPayload::RiskCheckCompleted(payload) = &outcome.payload else {
            panic!("declined assessments still complete");
        };
        assert!(!payload.approved);
        assert_eq!(payload.risk_score, 30);
    }

    #[tokio::test]
    async fn large_amount_trips_the_fraud_check() {
        let bus = InMemoryBus::new();
        let (service, store) = service(&bus);
        let event = initiated("user-123", Decimal::from(15_000));

        service.handle(&event).await.unwrap();

        let assessment = store.find_by_saga(event.saga_id).await.unwrap().unwrap();
        assert!(!assessment.approved);
        assert!(assessment.risk_score >= 40);
        assert!(!assessment.fraud_check);
    }

    #[tokio::test]
    async fn duplicate_delivery_keeps_one_assessment_and_republishes() {
        let bus = InMemoryBus::new();
        let (service, store) = service(&bus);
        let event = initiated("user-123", Decimal::new(9999, 2));

        service.handle(&event).await.unwrap();
        service.handle(&event).await.unwrap();

        assert_eq!(store.len().await, 1);
        // Replay re-emits the outcome so a lost publish cannot stall the
        // saga; downstream consumers absorb the duplicate.
        assert_eq!(bus.topic_len(topics::RISK_EVENTS).await, 2);
    }

    #[tokio::test]
    async fn rollback_marks_assessment_and_emits_event() {
        let bus = InMemoryBus::new();
        let (service, store) = service(&bus);
        let event = initiated("user-123", Decimal::new(9999, 2));
        service.handle(&event).await.unwrap();

        let cancelled = EventEnvelope::builder()
            .saga_id(event.saga_id)
            .payload(EventPayload::OrderCancelled(
                events::OrderCancelledPayload {
                    order_id: OrderId::new(),
                    reason: "Payment failed: gateway timeout".to_string(),
                    cancelled_at: Utc::now(),
                },
            ))
            .build();
        service.handle(&cancelled).await.unwrap();

        let assessment = store.find_by_saga(event.saga_id).await.unwrap().unwrap();
        assert!(assessment.rolled_back);

        let rollback = next_event(&bus, "t", topics::SAGA_COMPENSATION)
            .await
            .unwrap();
        assert!(matches!(
            rollback.payload,
            EventPayload::RiskCheckRollback(_)
        ));

        // A second compensation event is a no-op.
        service.handle(&cancelled).await.unwrap();
        assert_eq!(bus.topic_len(topics::SAGA_COMPENSATION).await, 1);
    }

    #[tokio::test]
    async fn compensation_before_forward_step_is_absorbed() {
        let bus = InMemoryBus::new();
        let (service, store) = service(&bus);

        let cancelled = EventEnvelope::builder()
            .saga_id(SagaId::new())
            .payload(EventPayload::OrderCancelled(
                events::OrderCancelledPayload {
                    order_id: OrderId::new(),
                    reason: "Risk check declined".to_string(),
                    cancelled_at: Utc::now(),
                },
            ))
            .build();
        service.handle(&cancelled).await.unwrap();

        assert_eq!(store.len().await, 0);
        assert_eq!(bus.topic_len(topics::SAGA_COMPENSATION).await, 0);
    }
}

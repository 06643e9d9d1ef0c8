//! In-memory store implementations for wiring and tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{OrderId, SagaId};
use tokio::sync::RwLock;

use crate::order::Order;
use crate::payment::PaymentTransaction;
use crate::risk::RiskAssessment;
use crate::store::{OrderStore, PaymentStore, Result, RiskStore, StoreError};

/// In-memory order store keyed by `sagaId`.
///
/// Clones share the same map, mirroring a shared database.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    records: Arc<RwLock<HashMap<SagaId, Order>>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored orders.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: &Order) -> Result<()> {
        let mut records = self.records.write().await;
        if records.contains_key(&order.saga_id) {
            return Err(StoreError::Duplicate(order.saga_id));
        }
        records.insert(order.saga_id, order.clone());
        Ok(())
    }

    async fn find_by_saga(&self, saga_id: SagaId) -> Result<Option<Order>> {
        Ok(self.records.read().await.get(&saga_id).cloned())
    }

    async fn find_by_id_and_user(
        &self,
        order_id: OrderId,
        user_id: &str,
    ) -> Result<Option<Order>> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .find(|order| order.order_id == order_id && order.user_id == user_id)
            .cloned())
    }

    async fn update(&self, order: &Order) -> Result<()> {
        let mut records = self.records.write().await;
        match records.get_mut(&order.saga_id) {
            Some(existing) => {
                *existing = order.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(order.saga_id)),
        }
    }
}

/// In-memory risk assessment store keyed by `sagaId`.
#[derive(Clone, Default)]
pub struct InMemoryRiskStore {
    records: Arc<RwLock<HashMap<SagaId, RiskAssessment>>>,
}

impl InMemoryRiskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl RiskStore for InMemoryRiskStore {
    async fn insert(&self, assessment: &RiskAssessment) -> Result<()> {
        let mut records = self.records.write().await;
        if records.contains_key(&assessment.saga_id) {
            return Err(StoreError::Duplicate(assessment.saga_id));
        }
        records.insert(assessment.saga_id, assessment.clone());
        Ok(())
    }

    async fn find_by_saga(&self, saga_id: SagaId) -> Result<Option<RiskAssessment>> {
        Ok(self.records.read().await.get(&saga_id).cloned())
    }

    async fn update(&self, assessment: &RiskAssessment) -> Result<()> {
        let mut records = self.records.write().await;
        match records.get_mut(&assessment.saga_id) {
            Some(existing) => {
                *existing = assessment.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(assessment.saga_id)),
        }
    }
}

/// In-memory payment transaction store keyed by `sagaId`.
#[derive(Clone, Default)]
pub struct InMemoryPaymentStore {
    records: Arc<RwLock<HashMap<SagaId, PaymentTransaction>>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert(&self, transaction: &PaymentTransaction) -> Result<()> {
        let mut records = self.records.write().await;
        if records.contains_key(&transaction.saga_id) {
            return Err(StoreError::Duplicate(transaction.saga_id));
        }
        records.insert(transaction.saga_id, transaction.clone());
        Ok(())
    }

    async fn find_by_saga(&self, saga_id: SagaId) -> Result<Option<PaymentTransaction>> {
        Ok(self.records.read().await.get(&saga_id).cloned())
    }

    async fn update(&self, transaction: &PaymentTransaction) -> Result<()> {
        let mut records = self.records.write().await;
        match records.get_mut(&transaction.saga_id) {
            Some(existing) => {
                *existing = transaction.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(transaction.saga_id)),
        }
    }
}

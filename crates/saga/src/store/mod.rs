//! Per-participant persistent stores.
//!
//! Each participant owns exactly one store and other participants never
//! touch it; cross-participant communication happens only via events.
//! Every store enforces at most one record per `sagaId` (unique index),
//! and each trait method is atomic: the Postgres implementations execute
//! one statement or one explicit transaction per call. Handlers may
//! read-modify-write because the bus serializes all events of a saga onto
//! one partition.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use common::{OrderId, SagaId};
use thiserror::Error;

use crate::order::Order;
use crate::payment::PaymentTransaction;
use crate::risk::RiskAssessment;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A record with this `sagaId` already exists.
    #[error("duplicate record for saga {0}")]
    Duplicate(SagaId),

    /// No record with this `sagaId` exists to update.
    #[error("record not found for saga {0}")]
    NotFound(SagaId),

    /// A persisted value could not be mapped back into the domain.
    #[error("corrupted record: {0}")]
    Corrupted(String),

    /// The database rejected the operation.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Order records, owned by the Order participant.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists a new order. Fails with [`StoreError::Duplicate`] if a
    /// record for the same saga already exists.
    async fn insert(&self, order: &Order) -> Result<()>;

    /// Looks an order up by its saga identity.
    async fn find_by_saga(&self, saga_id: SagaId) -> Result<Option<Order>>;

    /// Looks an order up by primary key, scoped to its owning user.
    async fn find_by_id_and_user(&self, order_id: OrderId, user_id: &str)
    -> Result<Option<Order>>;

    /// Replaces the stored order identified by its `sagaId`.
    async fn update(&self, order: &Order) -> Result<()>;
}

/// Risk assessment records, owned by the Risk participant.
#[async_trait]
pub trait RiskStore: Send + Sync {
    async fn insert(&self, assessment: &RiskAssessment) -> Result<()>;

    async fn find_by_saga(&self, saga_id: SagaId) -> Result<Option<RiskAssessment>>;

    async fn update(&self, assessment: &RiskAssessment) -> Result<()>;
}

/// Payment transaction records, owned by the Payment participant.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn insert(&self, transaction: &PaymentTransaction) -> Result<()>;

    async fn find_by_saga(&self, saga_id: SagaId) -> Result<Option<PaymentTransaction>>;

    async fn update(&self, transaction: &PaymentTransaction) -> Result<()>;
}

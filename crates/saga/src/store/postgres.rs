//! PostgreSQL-backed store implementations.
//!
//! One table per participant (`orders`, `risk_assessments`,
//! `payment_transactions`), each with a unique index on `saga_id`. Every
//! method is a single atomic statement; the unique index turns a
//! concurrent double-insert into [`StoreError::Duplicate`].

use async_trait::async_trait;
use common::{Money, OrderId, SagaId, TransactionId};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::order::Order;
use crate::payment::PaymentTransaction;
use crate::risk::RiskAssessment;
use crate::store::{OrderStore, PaymentStore, Result, RiskStore, StoreError};

/// Runs the schema migrations for all three stores.
pub async fn run_migrations(pool: &PgPool) -> std::result::Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await
}

fn map_insert_error(err: sqlx::Error, saga_id: SagaId) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        return StoreError::Duplicate(saga_id);
    }
    StoreError::Database(err)
}

/// PostgreSQL order store.
#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        Ok(Order {
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            user_id: row.try_get("user_id")?,
            saga_id: SagaId::from_uuid(row.try_get::<Uuid, _>("saga_id")?),
            amount: Money::new(row.try_get::<Decimal, _>("amount")?),
            currency: row.try_get("currency")?,
            status: row
                .try_get::<String, _>("status")?
                .parse()
                .map_err(StoreError::Corrupted)?,
            payment_method: row
                .try_get::<String, _>("payment_method")?
                .parse()
                .map_err(StoreError::Corrupted)?,
            cancellation_reason: row.try_get("cancellation_reason")?,
            transaction_id: row
                .try_get::<Option<Uuid>, _>("transaction_id")?
                .map(TransactionId::from_uuid),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

const SELECT_ORDER: &str = r#"
    SELECT order_id, user_id, saga_id, amount, currency, status, payment_method,
           cancellation_reason, transaction_id, created_at, updated_at
    FROM orders
"#;

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn insert(&self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (order_id, user_id, saga_id, amount, currency, status,
                                payment_method, cancellation_reason, transaction_id,
                                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(order.order_id.as_uuid())
        .bind(&order.user_id)
        .bind(order.saga_id.as_uuid())
        .bind(order.amount.amount())
        .bind(&order.currency)
        .bind(order.status.as_str())
        .bind(order.payment_method.as_str())
        .bind(&order.cancellation_reason)
        .bind(order.transaction_id.map(|id| id.as_uuid()))
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| map_insert_error(err, order.saga_id))?;
        Ok(())
    }

    async fn find_by_saga(&self, saga_id: SagaId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("{SELECT_ORDER} WHERE saga_id = $1"))
            .bind(saga_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_order).transpose()
    }

    async fn find_by_id_and_user(
        &self,
        order_id: OrderId,
        user_id: &str,
    ) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "{SELECT_ORDER} WHERE order_id = $1 AND user_id = $2"
        ))
        .bind(order_id.as_uuid())
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_order).transpose()
    }

    async fn update(&self, order: &Order) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $1, cancellation_reason = $2, transaction_id = $3, updated_at = $4
            WHERE saga_id = $5
            "#,
        )
        .bind(order.status.as_str())
        .bind(&order.cancellation_reason)
        .bind(order.transaction_id.map(|id| id.as_uuid()))
        .bind(order.updated_at)
        .bind(order.saga_id.as_uuid())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(order.saga_id));
        }
        Ok(())
    }
}

/// PostgreSQL risk assessment store.
#[derive(Clone)]
pub struct PgRiskStore {
    pool: PgPool,
}

impl PgRiskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_assessment(row: PgRow) -> Result<RiskAssessment> {
        Ok(RiskAssessment {
            id: row.try_get("id")?,
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            saga_id: SagaId::from_uuid(row.try_get::<Uuid, _>("saga_id")?),
            user_id: row.try_get("user_id")?,
            risk_score: row.try_get::<i16, _>("risk_score")? as u8,
            approved: row.try_get("approved")?,
            fraud_check: row.try_get("fraud_check")?,
            velocity_check: row.try_get("velocity_check")?,
            blacklist_check: row.try_get("blacklist_check")?,
            rolled_back: row.try_get("rolled_back")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl RiskStore for PgRiskStore {
    async fn insert(&self, assessment: &RiskAssessment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO risk_assessments (id, order_id, saga_id, user_id, risk_score,
                                          approved, fraud_check, velocity_check,
                                          blacklist_check, rolled_back, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(assessment.id)
        .bind(assessment.order_id.as_uuid())
        .bind(assessment.saga_id.as_uuid())
        .bind(&assessment.user_id)
        .bind(assessment.risk_score as i16)
        .bind(assessment.approved)
        .bind(assessment.fraud_check)
        .bind(assessment.velocity_check)
        .bind(assessment.blacklist_check)
        .bind(assessment.rolled_back)
        .bind(assessment.created_at)
        .execute(&self.pool)
        .await
        .map_err(|err| map_insert_error(err, assessment.saga_id))?;
        Ok(())
    }

    async fn find_by_saga(&self, saga_id: SagaId) -> Result<Option<RiskAssessment>> {
        let row = sqlx::query(
            r#"
            SELECT id, order_id, saga_id, user_id, risk_score, approved, fraud_check,
                   velocity_check, blacklist_check, rolled_back, created_at
            FROM risk_assessments
            WHERE saga_id = $1
            "#,
        )
        .bind(saga_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_assessment).transpose()
    }

    async fn update(&self, assessment: &RiskAssessment) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE risk_assessments
            SET approved = $1, rolled_back = $2
            WHERE saga_id = $3
            "#,
        )
        .bind(assessment.approved)
        .bind(assessment.rolled_back)
        .bind(assessment.saga_id.as_uuid())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(assessment.saga_id));
        }
        Ok(())
    }
}

/// PostgreSQL payment transaction store.
#[derive(Clone)]
pub struct PgPaymentStore {
    pool: PgPool,
}

impl PgPaymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_transaction(row: PgRow) -> Result<PaymentTransaction> {
        Ok(PaymentTransaction {
            transaction_id: TransactionId::from_uuid(row.try_get::<Uuid, _>("transaction_id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            saga_id: SagaId::from_uuid(row.try_get::<Uuid, _>("saga_id")?),
            amount: Money::new(row.try_get::<Decimal, _>("amount")?),
            currency: row.try_get("currency")?,
            status: row
                .try_get::<String, _>("status")?
                .parse()
                .map_err(StoreError::Corrupted)?,
            gateway_transaction_id: row.try_get("gateway_transaction_id")?,
            auth_code: row.try_get("auth_code")?,
            refund_id: row.try_get("refund_id")?,
            error_message: row.try_get("error_message")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl PaymentStore for PgPaymentStore {
    async fn insert(&self, transaction: &PaymentTransaction) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payment_transactions (transaction_id, order_id, saga_id, amount,
                                              currency, status, gateway_transaction_id,
                                              auth_code, refund_id, error_message,
                                              created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(transaction.transaction_id.as_uuid())
        .bind(transaction.order_id.as_uuid())
        .bind(transaction.saga_id.as_uuid())
        .bind(transaction.amount.amount())
        .bind(&transaction.currency)
        .bind(transaction.status.as_str())
        .bind(&transaction.gateway_transaction_id)
        .bind(&transaction.auth_code)
        .bind(&transaction.refund_id)
        .bind(&transaction.error_message)
        .bind(transaction.created_at)
        .bind(transaction.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| map_insert_error(err, transaction.saga_id))?;
        Ok(())
    }

    async fn find_by_saga(&self, saga_id: SagaId) -> Result<Option<PaymentTransaction>> {
        let row = sqlx::query(
            r#"
            SELECT transaction_id, order_id, saga_id, amount, currency, status,
                   gateway_transaction_id, auth_code, refund_id, error_message,
                   created_at, updated_at
            FROM payment_transactions
            WHERE saga_id = $1
            "#,
        )
        .bind(saga_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_transaction).transpose()
    }

    async fn update(&self, transaction: &PaymentTransaction) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE payment_transactions
            SET status = $1, gateway_transaction_id = $2, auth_code = $3, refund_id = $4,
                error_message = $5, updated_at = $6
            WHERE saga_id = $7
            "#,
        )
        .bind(transaction.status.as_str())
        .bind(&transaction.gateway_transaction_id)
        .bind(&transaction.auth_code)
        .bind(&transaction.refund_id)
        .bind(&transaction.error_message)
        .bind(transaction.updated_at)
        .bind(transaction.saga_id.as_uuid())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(transaction.saga_id));
        }
        Ok(())
    }
}

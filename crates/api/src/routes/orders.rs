//! Order intake and lookup endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use bus::MessageBus;
use chrono::{DateTime, Utc};
use common::{Money, OrderId};
use events::OrderItem;
use rust_decimal::Decimal;
use saga::{Order, OrderService, OrderStore, PaymentMethod, PaymentRequest};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: OrderStore, B: MessageBus> {
    pub order_service: Arc<OrderService<S, B>>,
}

// -- Request types --

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InitiatePaymentRequest {
    pub user_id: String,
    pub amount: Option<Decimal>,
    pub currency: String,
    pub payment_method: String,
    pub items: Vec<ItemRequest>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ItemRequest {
    pub product_id: String,
    pub quantity: Option<u32>,
    pub price: Option<Decimal>,
}

impl InitiatePaymentRequest {
    /// Validates the request and converts it into the saga entry command.
    ///
    /// Mirrors the intake rules: non-blank user, positive amount,
    /// three-letter currency, known payment method, and at least one
    /// well-formed item. Missing fields are reported as 400s rather than
    /// body-deserialization failures.
    fn validate(self) -> Result<PaymentRequest, ApiError> {
        if self.user_id.trim().is_empty() {
            return Err(ApiError::BadRequest("User ID is required".to_string()));
        }
        let amount = self
            .amount
            .ok_or_else(|| ApiError::BadRequest("Amount is required".to_string()))?;
        if amount <= Decimal::ZERO {
            return Err(ApiError::BadRequest(
                "Amount must be greater than 0".to_string(),
            ));
        }
        if self.currency.chars().count() != 3 {
            return Err(ApiError::BadRequest(
                "Currency must be 3 characters".to_string(),
            ));
        }
        let payment_method: PaymentMethod = self
            .payment_method
            .parse()
            .map_err(ApiError::BadRequest)?;
        if self.items.is_empty() {
            return Err(ApiError::BadRequest("Items cannot be empty".to_string()));
        }
        let items = self
            .items
            .into_iter()
            .map(|item| {
                if item.product_id.trim().is_empty() {
                    return Err(ApiError::BadRequest("Product ID is required".to_string()));
                }
                let quantity = item
                    .quantity
                    .ok_or_else(|| ApiError::BadRequest("Quantity is required".to_string()))?;
                if quantity < 1 {
                    return Err(ApiError::BadRequest(
                        "Quantity must be at least 1".to_string(),
                    ));
                }
                let price = item
                    .price
                    .ok_or_else(|| ApiError::BadRequest("Price is required".to_string()))?;
                if price <= Decimal::ZERO {
                    return Err(ApiError::BadRequest(
                        "Price must be greater than 0".to_string(),
                    ));
                }
                Ok(OrderItem {
                    product_id: item.product_id,
                    quantity,
                    price: Money::new(price),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PaymentRequest {
            user_id: self.user_id,
            amount: Money::new(amount),
            currency: self.currency,
            payment_method,
            items,
        })
    }
}

// -- Response types --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order_id: String,
    pub user_id: String,
    pub saga_id: String,
    pub amount: Money,
    pub currency: String,
    pub status: String,
    pub payment_method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.order_id.to_string(),
            user_id: order.user_id,
            saga_id: order.saga_id.to_string(),
            amount: order.amount,
            currency: order.currency,
            status: order.status.as_str().to_string(),
            payment_method: order.payment_method.as_str().to_string(),
            transaction_id: order.transaction_id.map(|id| id.to_string()),
            cancellation_reason: order.cancellation_reason,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

// -- Handlers --

/// POST /api/v1/orders/payment — validate and kick off the saga.
#[tracing::instrument(skip(state, request))]
pub async fn initiate<S, B>(
    State(state): State<Arc<AppState<S, B>>>,
    Json(request): Json<InitiatePaymentRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError>
where
    S: OrderStore,
    B: MessageBus,
{
    let request = request.validate()?;
    let order = state.order_service.initiate_payment(request).await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

/// GET /api/v1/orders/{order_id} — order snapshot for its owner.
#[tracing::instrument(skip(state, headers))]
pub async fn get<S, B>(
    State(state): State<Arc<AppState<S, B>>>,
    Path(order_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: OrderStore,
    B: MessageBus,
{
    let user_id = headers
        .get("X-User-Id")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("X-User-Id header is required".to_string()))?;

    let order_id: OrderId = order_id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid order id: {order_id}")))?;

    let order = state
        .order_service
        .get_order(order_id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {order_id} not found")))?;

    Ok(Json(order.into()))
}

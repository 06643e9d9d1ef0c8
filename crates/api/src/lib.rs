//! REST surface for the Order participant.
//!
//! The only externally triggered entry point of the saga: submitting a
//! payment request creates a PENDING order and kicks off the
//! choreography. Everything else the caller observes is read-only polls
//! of the order snapshot.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use bus::MessageBus;
use saga::OrderStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, B>(state: Arc<AppState<S, B>>) -> Router
where
    S: OrderStore + 'static,
    B: MessageBus + 'static,
{
    Router::new()
        .route(
            "/api/v1/orders/payment",
            post(routes::orders::initiate::<S, B>),
        )
        .route(
            "/api/v1/orders/{order_id}",
            get(routes::orders::get::<S, B>),
        )
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

//! Shared types for the payment saga services.
//!
//! Every participant exchanges events keyed by [`SagaId`] and references
//! records owned by other participants through the identifiers defined
//! here. Keeping the newtypes in one crate prevents mixing up the various
//! UUID-backed identifiers at compile time.

pub mod money;
pub mod types;

pub use money::Money;
pub use types::{CorrelationId, EventId, OrderId, SagaId, TransactionId};

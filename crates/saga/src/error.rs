//! Participant error types.

use bus::BusError;
use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur inside a participant's handler or service.
///
/// A `SagaError` returned from an event handler counts against the
/// per-message retry budget; business failures (declined risk, gateway
/// refusal) are *not* errors; they become typed failure events and the
/// handler still succeeds.
#[derive(Debug, Error)]
pub enum SagaError {
    /// Local store operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Publishing a follow-on event failed after retries.
    #[error("bus error: {0}")]
    Bus(#[from] BusError),
}

/// Convenience type alias for participant results.
pub type Result<T> = std::result::Result<T, SagaError>;

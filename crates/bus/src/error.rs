use thiserror::Error;

/// Errors from bus operations.
#[derive(Debug, Error)]
pub enum BusError {
    /// Envelope or dead-letter serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A publish did not succeed within its retry budget.
    #[error("publish to topic '{topic}' failed: {reason}")]
    PublishFailed { topic: String, reason: String },

    /// The subscription or bus is no longer usable.
    #[error("bus closed")]
    Closed,
}

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;

//! Per-event delivery metadata.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Default per-message retry budget.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default advisory processing timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;

/// Delivery metadata carried inside every envelope.
///
/// `timeout_ms` is advisory: expired events are still processed, no event
/// is dropped on age alone. All fields have serde defaults so a sparse
/// envelope decodes cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventMetadata {
    pub retry_count: u32,
    pub max_retries: u32,
    pub timeout_ms: u64,
    pub source: String,
    pub additional_data: HashMap<String, String>,
}

impl EventMetadata {
    /// Creates metadata for an event emitted by the given participant.
    pub fn for_source(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }
}

impl Default for EventMetadata {
    fn default() -> Self {
        Self {
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            source: String::new(),
            additional_data: HashMap::new(),
        }
    }
}

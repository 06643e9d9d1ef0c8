//! Message bus plumbing shared by all saga participants.
//!
//! The bus itself is abstract: [`MessageBus`] assumes an at-least-once,
//! per-partition-ordered, durable log with consumer groups, and
//! [`InMemoryBus`] provides that contract in-process. On top of it sit
//! the pieces every participant reuses:
//!
//! - [`EventPublisher`]: envelope enrichment, headers, `sagaId` keying,
//!   bounded publish retries.
//! - [`ConsumerWorker`]: the consume-process-publish loop. Decodes,
//!   dispatches to an [`EventHandler`], retries with exponential
//!   backoff, routes poison messages to the dead-letter topic, and
//!   acknowledges manually after the handler commits.
//! - [`RetryPolicy`]: the explicit backoff policy applied to message
//!   handling, gateway calls, and publishes.

pub mod bus;
pub mod consumer;
pub mod dlq;
pub mod error;
pub mod memory;
pub mod message;
pub mod publisher;
pub mod retry;

pub use bus::{MessageBus, Subscription};
pub use consumer::{ConsumerWorker, EventHandler};
pub use dlq::{DeadLetter, DlqWriter};
pub use error::BusError;
pub use memory::InMemoryBus;
pub use message::{Delivery, RecordMetadata};
pub use publisher::EventPublisher;
pub use retry::{RetryPolicy, retry_with};

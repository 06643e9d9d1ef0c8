//! Notification channel adapters and the sent-message ledger.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::OrderId;
use thiserror::Error;

use crate::notification::NotificationCategory;

/// The channel could not deliver the message.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct NotifyError(pub String);

/// A user-facing message channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// Email channel stub: logs the message it would send.
#[derive(Debug, Clone, Default)]
pub struct EmailNotifier;

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        tracing::info!(recipient, subject, body, "[EMAIL] sending");
        Ok(())
    }
}

/// SMS channel stub: logs the message it would send.
#[derive(Debug, Clone, Default)]
pub struct SmsNotifier;

#[async_trait]
impl Notifier for SmsNotifier {
    async fn send(&self, recipient: &str, _subject: &str, body: &str) -> Result<(), NotifyError> {
        tracing::info!(recipient, body, "[SMS] sending");
        Ok(())
    }
}

/// Records each dispatched message so tests can assert on them, and can
/// fail on demand.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    state: Arc<Mutex<RecordingState>>,
}

#[derive(Debug, Default)]
struct RecordingState {
    sent: Vec<(String, String, String)>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        self.state.lock().unwrap().fail = fail;
    }

    /// All `(recipient, subject, body)` triples sent so far.
    pub fn sent(&self) -> Vec<(String, String, String)> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn sent_count(&self) -> usize {
        self.state.lock().unwrap().sent.len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        let mut state = self.state.lock().unwrap();
        if state.fail {
            return Err(NotifyError("channel down".to_string()));
        }
        state
            .sent
            .push((recipient.to_string(), subject.to_string(), body.to_string()));
        Ok(())
    }
}

/// Remembers which `(orderId, category)` notifications went out.
///
/// The ledger is what makes notifications at-most-once per order and
/// category under duplicate delivery. The in-memory implementation loses
/// its memory on restart, an accepted trade-off; persist the keys behind
/// this trait if the property must survive restarts.
#[async_trait]
pub trait SentLedger: Send + Sync {
    async fn is_sent(&self, order_id: OrderId, category: NotificationCategory) -> bool;

    async fn mark_sent(&self, order_id: OrderId, category: NotificationCategory);
}

/// Process-local ledger backed by a set.
#[derive(Debug, Clone, Default)]
pub struct InMemorySentLedger {
    sent: Arc<Mutex<HashSet<(OrderId, NotificationCategory)>>>,
}

impl InMemorySentLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SentLedger for InMemorySentLedger {
    async fn is_sent(&self, order_id: OrderId, category: NotificationCategory) -> bool {
        self.sent.lock().unwrap().contains(&(order_id, category))
    }

    async fn mark_sent(&self, order_id: OrderId, category: NotificationCategory) {
        self.sent.lock().unwrap().insert((order_id, category));
    }
}

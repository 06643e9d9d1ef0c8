//! The four participants of the choreographed payment saga.
//!
//! Each participant owns one local store and reacts to events on the bus:
//!
//! 1. **Order** initiates the saga, tracks its outcome, and fans out
//!    compensation when any step fails.
//! 2. **Risk** runs fraud, velocity, and blacklist checks and can roll
//!    its assessment back.
//! 3. **Payment** charges the gateway, and refunds completed payments
//!    during compensation.
//! 4. **Notification** keeps the user informed, at most once per order
//!    and category.
//!
//! There is no orchestrator: the forward flow and every compensation path
//! emerge from the handlers below consuming and publishing events keyed
//! by `sagaId`.

pub mod error;
pub mod gateway;
pub mod notification;
pub mod notify;
pub mod order;
pub mod payment;
pub mod risk;
pub mod store;

pub use error::SagaError;
pub use gateway::{GatewayCharge, GatewayError, PaymentGateway, SimulatedGateway};
pub use notification::{NotificationCategory, NotificationService};
pub use notify::{
    EmailNotifier, InMemorySentLedger, Notifier, NotifyError, RecordingNotifier, SentLedger,
    SmsNotifier,
};
pub use order::{Order, OrderService, OrderStatus, PaymentMethod, PaymentRequest};
pub use payment::{PaymentService, PaymentTransaction, TransactionStatus};
pub use risk::{RiskAssessment, RiskService};
pub use store::memory::{InMemoryOrderStore, InMemoryPaymentStore, InMemoryRiskStore};
pub use store::postgres::{PgOrderStore, PgPaymentStore, PgRiskStore, run_migrations};
pub use store::{OrderStore, PaymentStore, RiskStore, StoreError};

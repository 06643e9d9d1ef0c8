//! Payment gateway adapter.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::payment::PaymentTransaction;

/// The gateway refused or failed the operation.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct GatewayError(pub String);

/// A successful charge at the gateway.
#[derive(Debug, Clone)]
pub struct GatewayCharge {
    pub gateway_transaction_id: String,
    pub auth_code: String,
}

/// Side-effectful payment gateway operations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charges the amount of the transaction.
    async fn charge(&self, transaction: &PaymentTransaction)
    -> Result<GatewayCharge, GatewayError>;

    /// Refunds a completed transaction, returning the refund identifier.
    async fn refund(&self, transaction: &PaymentTransaction) -> Result<String, GatewayError>;
}

#[derive(Debug, Default)]
struct SimulatedState {
    charge_failures: u32,
    fail_refund: bool,
    charges: u32,
    refunds: u32,
}

/// In-process gateway with scripted failures for wiring and tests.
#[derive(Debug, Clone, Default)]
pub struct SimulatedGateway {
    state: Arc<Mutex<SimulatedState>>,
}

impl SimulatedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` charge calls fail.
    pub fn fail_next_charges(&self, count: u32) {
        self.state.lock().unwrap().charge_failures = count;
    }

    /// Makes refund calls fail until cleared.
    pub fn set_fail_refund(&self, fail: bool) {
        self.state.lock().unwrap().fail_refund = fail;
    }

    /// Number of successful charges.
    pub fn charge_count(&self) -> u32 {
        self.state.lock().unwrap().charges
    }

    /// Number of successful refunds.
    pub fn refund_count(&self) -> u32 {
        self.state.lock().unwrap().refunds
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn charge(
        &self,
        transaction: &PaymentTransaction,
    ) -> Result<GatewayCharge, GatewayError> {
        let mut state = self.state.lock().unwrap();
        tracing::info!(transaction_id = %transaction.transaction_id, "calling payment gateway");

        if state.charge_failures > 0 {
            state.charge_failures -= 1;
            return Err(GatewayError("Payment gateway timeout".to_string()));
        }

        state.charges += 1;
        Ok(GatewayCharge {
            gateway_transaction_id: Uuid::new_v4().to_string(),
            auth_code: generate_auth_code(),
        })
    }

    async fn refund(&self, transaction: &PaymentTransaction) -> Result<String, GatewayError> {
        let mut state = self.state.lock().unwrap();
        tracing::info!(transaction_id = %transaction.transaction_id, "refunding transaction");

        if state.fail_refund {
            return Err(GatewayError("Refund gateway unavailable".to_string()));
        }

        state.refunds += 1;
        Ok(format!("REF-{}", Uuid::new_v4()))
    }
}

/// 8-character uppercase authorization code.
fn generate_auth_code() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_uppercase()
}

//! External collaborator seams invoked as side effects of the pipeline.

use crate::error::FundsError;
use crate::types::{Expense, PartialPayment};
use async_trait::async_trait;

/// Cash-register balance service notified when a payment settles
/// immediately from a till (cash mode).
///
/// Failures here must not roll back the recorded payment; the engine
/// surfaces them as a warning to the caller instead.
#[async_trait]
pub trait CashRegister: Send + Sync {
    async fn record_till_outflow(
        &self,
        payment: &PartialPayment,
        expense: &Expense,
    ) -> Result<(), FundsError>;
}

/// No-op register for deployments without a till integration.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCashRegister;

#[async_trait]
impl CashRegister for NullCashRegister {
    async fn record_till_outflow(
        &self,
        _payment: &PartialPayment,
        _expense: &Expense,
    ) -> Result<(), FundsError> {
        Ok(())
    }
}

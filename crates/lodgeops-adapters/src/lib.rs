//! Collaborator adapters for the lodgeops funds pipeline.

#![deny(unsafe_code)]

use async_trait::async_trait;
use lodgeops_core::{Authorizer, Capability, CashRegister, Expense, FundsError, PartialPayment};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tracing::info;

/// Explicit actor-to-capability grants, typically loaded from CLI flags or
/// deployment config. Unknown actors hold no capabilities.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectoryAuthorizer {
    grants: HashMap<String, HashSet<Capability>>,
}

impl StaticDirectoryAuthorizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, actor: impl Into<String>, capability: Capability) -> Self {
        self.grants
            .entry(actor.into())
            .or_default()
            .insert(capability);
        self
    }

    pub fn grant_all(mut self, actors: &[String], capability: Capability) -> Self {
        for actor in actors {
            self = self.grant(actor.clone(), capability);
        }
        self
    }
}

#[async_trait]
impl Authorizer for StaticDirectoryAuthorizer {
    async fn allows(&self, actor: &str, capability: Capability) -> Result<bool, FundsError> {
        Ok(self
            .grants
            .get(actor)
            .map(|capabilities| capabilities.contains(&capability))
            .unwrap_or(false))
    }
}

/// Grants every capability to every actor. Local development only.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllAuthorizer;

#[async_trait]
impl Authorizer for AllowAllAuthorizer {
    async fn allows(&self, _actor: &str, _capability: Capability) -> Result<bool, FundsError> {
        Ok(true)
    }
}

/// Cash register that records every till outflow it is told about.
/// Deterministic fixture for tests and local runs.
#[derive(Debug, Default)]
pub struct RecordingCashRegister {
    outflows: Mutex<Vec<TillOutflow>>,
}

#[derive(Debug, Clone)]
pub struct TillOutflow {
    pub payment_id: uuid::Uuid,
    pub expense_id: uuid::Uuid,
    pub amount_minor: u64,
    pub currency: String,
}

impl RecordingCashRegister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outflows(&self) -> Vec<TillOutflow> {
        self.outflows
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CashRegister for RecordingCashRegister {
    async fn record_till_outflow(
        &self,
        payment: &PartialPayment,
        expense: &Expense,
    ) -> Result<(), FundsError> {
        info!(
            payment_id = %payment.id,
            amount_minor = payment.amount_minor,
            "till outflow recorded"
        );
        let outflow = TillOutflow {
            payment_id: payment.id,
            expense_id: expense.id,
            amount_minor: payment.amount_minor,
            currency: expense.currency.clone(),
        };
        self.outflows
            .lock()
            .map_err(|_| FundsError::Inconsistency("till outflow log poisoned".to_string()))?
            .push(outflow);
        Ok(())
    }
}

/// Cash register that always fails. Useful for exercising the
/// warning-not-rollback path.
#[derive(Debug, Clone)]
pub struct FailingCashRegister {
    reason: String,
}

impl FailingCashRegister {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl CashRegister for FailingCashRegister {
    async fn record_till_outflow(
        &self,
        _payment: &PartialPayment,
        _expense: &Expense,
    ) -> Result<(), FundsError> {
        Err(FundsError::Persistence(self.reason.clone()))
    }
}

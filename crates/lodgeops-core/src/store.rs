//! Storage abstraction for the funds pipeline.
//!
//! The store owns the pipeline's atomic units: decide+materialize is
//! one transaction, and every payment/reversal serializes on its expense row
//! while re-deriving the aggregates. Validation that needs no stored state
//! (amount > 0, currency agreement, due dates) happens in the engine before
//! the store is touched.

use crate::approval::Decision;
use crate::error::FundsError;
use crate::memory::MemoryStore;
use crate::payments::PaymentDraft;
use crate::postgres::PostgresStore;
use crate::reminders::{DueCursor, DueReminderPage};
use crate::types::{
    Expense, FundRequest, FundRequestLine, PartialPayment, PaymentReminder, ReminderStatus,
    RequestStatus,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Outcome of a supervisory decision. `expense` is present exactly when the
/// decision was an approval.
#[derive(Debug, Clone)]
pub struct DecisionOutcome {
    pub request: FundRequest,
    pub expense: Option<Expense>,
}

/// Outcome of materialization: the expense plus whether this call created it.
#[derive(Debug, Clone)]
pub struct MaterializeOutcome {
    pub expense: Expense,
    pub created: bool,
}

/// Outcome of recording a payment. `replayed` is true when a request key
/// matched an already recorded payment and nothing was charged again.
#[derive(Debug, Clone)]
pub struct PaymentOutcome {
    pub payment: PartialPayment,
    pub expense: Expense,
    pub replayed: bool,
}

#[derive(Debug, Clone)]
pub struct ReversalOutcome {
    pub payment: PartialPayment,
    pub expense: Expense,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_fund_request(&self, request: FundRequest) -> Result<FundRequest, FundsError>;

    async fn fund_request(&self, id: Uuid) -> Result<FundRequest, FundsError>;

    async fn list_fund_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<FundRequest>, FundsError>;

    /// Replace the lines of a pending request. The caller supplies the
    /// re-validated lines and the recomputed total.
    async fn replace_fund_request_lines(
        &self,
        id: Uuid,
        lines: Vec<FundRequestLine>,
        total_minor: u64,
    ) -> Result<FundRequest, FundsError>;

    /// Delete a pending request. Decided requests are frozen.
    async fn delete_fund_request(&self, id: Uuid) -> Result<(), FundsError>;

    /// Apply a decision and, on approval, materialize the expense within the
    /// same atomic unit. Both commit or neither does.
    async fn decide_fund_request(
        &self,
        id: Uuid,
        decision: Decision,
        supervisor: &str,
        comment: Option<String>,
        decided_at: DateTime<Utc>,
    ) -> Result<DecisionOutcome, FundsError>;

    /// Idempotent materialization for an approved request: returns the
    /// existing expense when one is already anchored to `source_request_id`.
    async fn materialize_expense(&self, request_id: Uuid)
        -> Result<MaterializeOutcome, FundsError>;

    async fn expense(&self, id: Uuid) -> Result<Expense, FundsError>;

    /// Record a payment against the expense: replay the request key if seen
    /// before, otherwise insert the payment and re-derive the aggregates,
    /// all against a serialized view of the expense row.
    async fn record_partial_payment(
        &self,
        expense_id: Uuid,
        draft: PaymentDraft,
    ) -> Result<PaymentOutcome, FundsError>;

    async fn partial_payment(&self, id: Uuid) -> Result<PartialPayment, FundsError>;

    /// Delete the payment and re-derive the parent's aggregates.
    async fn reverse_partial_payment(&self, id: Uuid) -> Result<ReversalOutcome, FundsError>;

    /// Insert an already validated reminder; the parent expense must exist.
    async fn insert_reminder(
        &self,
        reminder: PaymentReminder,
    ) -> Result<PaymentReminder, FundsError>;

    async fn reminder(&self, id: Uuid) -> Result<PaymentReminder, FundsError>;

    /// Advance a reminder through the forward-only status machine.
    async fn transition_reminder(
        &self,
        id: Uuid,
        next: ReminderStatus,
    ) -> Result<PaymentReminder, FundsError>;

    /// Scheduled reminders with `due_at <= as_of`, ordered by `(due_at, id)`,
    /// resumable from a keyset cursor.
    async fn due_reminders(
        &self,
        as_of: DateTime<Utc>,
        cursor: Option<DueCursor>,
        limit: usize,
    ) -> Result<DueReminderPage, FundsError>;
}

/// Storage backend selection, resolved once at bootstrap.
#[derive(Debug, Clone, Default)]
pub enum StorageConfig {
    /// Process-memory store for tests and local development.
    #[default]
    Memory,
    /// PostgreSQL store; the schema is created on connect if missing.
    Postgres {
        database_url: String,
        max_connections: u32,
    },
}

impl StorageConfig {
    pub fn memory() -> Self {
        Self::Memory
    }

    pub fn postgres(database_url: impl Into<String>, max_connections: u32) -> Self {
        Self::Postgres {
            database_url: database_url.into(),
            max_connections,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Postgres { .. } => "postgres",
        }
    }

    pub async fn connect(&self) -> Result<Arc<dyn Store>, FundsError> {
        match self {
            Self::Memory => Ok(Arc::new(MemoryStore::new())),
            Self::Postgres {
                database_url,
                max_connections,
            } => {
                let store = PostgresStore::connect(database_url, *max_connections).await?;
                store.ensure_schema().await?;
                Ok(Arc::new(store))
            }
        }
    }
}

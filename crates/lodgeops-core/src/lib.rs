//! Hotel back-office funds pipeline core.
//!
//! Fund requests are validated at intake, decided by a supervisory gate,
//! materialized into payable expenses, settled through a partial-payment
//! ledger, and nudged by due-date reminders. Money-safety invariants
//! (exact totals, no overpayment, forward-only state machines) are enforced
//! here and inside the storage backends' atomic units.

#![deny(unsafe_code)]

pub mod approval;
pub mod authz;
pub mod connectors;
pub mod engine;
pub mod error;
pub mod intake;
pub mod memory;
pub mod payments;
pub mod postgres;
pub mod reminders;
pub mod store;
pub mod types;

pub use approval::{expense_from_request, Decision};
pub use authz::{Authorizer, Capability};
pub use connectors::{CashRegister, NullCashRegister};
pub use engine::{FundsEngine, PaymentRecorded};
pub use error::FundsError;
pub use intake::SubmitFundRequest;
pub use memory::MemoryStore;
pub use payments::PaymentDraft;
pub use postgres::PostgresStore;
pub use reminders::{DueCursor, DueReminderPage};
pub use store::{
    DecisionOutcome, MaterializeOutcome, PaymentOutcome, ReversalOutcome, StorageConfig, Store,
};
pub use types::{
    derive_payment_status, Expense, ExpenseStatus, FundRequest, FundRequestLine, PartialPayment,
    PaymentMode, PaymentReminder, PaymentStatus, ReminderStatus, RequestKind, RequestStatus,
};

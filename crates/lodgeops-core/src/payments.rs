//! Partial-payment arithmetic over expense aggregates.
//!
//! These helpers are pure so both storage backends apply identical rules
//! inside their own atomic units. The invariant they protect:
//! `sum(payments) == paid_minor <= amount_minor`, with the payment statuses
//! re-derived on every mutation.

use crate::error::FundsError;
use crate::types::{derive_payment_status, Expense, PartialPayment, PaymentMode};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Payment fields supplied by the caller; identifiers and timestamps are
/// assigned at record time.
#[derive(Debug, Clone)]
pub struct PaymentDraft {
    pub amount_minor: u64,
    pub mode: PaymentMode,
    pub reference: Option<String>,
    pub recorded_by: String,
    pub request_key: Option<String>,
}

impl PaymentDraft {
    pub fn into_payment(self, expense_id: Uuid, recorded_at: DateTime<Utc>) -> PartialPayment {
        PartialPayment {
            id: Uuid::new_v4(),
            expense_id,
            amount_minor: self.amount_minor,
            mode: self.mode,
            reference: self.reference,
            recorded_by: self.recorded_by,
            request_key: self.request_key,
            recorded_at,
        }
    }
}

/// Reject non-positive amounts before any storage work happens.
pub fn validate_amount(amount_minor: u64) -> Result<(), FundsError> {
    if amount_minor == 0 {
        return Err(FundsError::validation(
            "non_positive_amount",
            "payment amount must be positive",
        ));
    }
    Ok(())
}

/// Apply a payment to the expense aggregates. Fails with a `StateError` when
/// the amount exceeds the remaining balance evaluated at call time.
pub fn apply_payment(expense: &mut Expense, amount_minor: u64) -> Result<(), FundsError> {
    let remaining = expense.remaining_minor();
    if amount_minor > remaining {
        return Err(FundsError::state(
            "overpayment",
            format!(
                "payment of {} exceeds remaining balance {} on expense '{}'",
                amount_minor, remaining, expense.id
            ),
        ));
    }

    expense.paid_minor += amount_minor;
    let (payment_status, status) =
        derive_payment_status(expense.paid_minor, expense.amount_minor);
    expense.payment_status = payment_status;
    expense.status = status;
    Ok(())
}

/// Remove a payment's amount from the expense aggregates. A negative result
/// means stored state already violated the ledger invariant.
pub fn reverse_payment(expense: &mut Expense, amount_minor: u64) -> Result<(), FundsError> {
    expense.paid_minor = expense.paid_minor.checked_sub(amount_minor).ok_or_else(|| {
        FundsError::Inconsistency(format!(
            "reversing {} would drive paid amount below zero on expense '{}'",
            amount_minor, expense.id
        ))
    })?;
    let (payment_status, status) =
        derive_payment_status(expense.paid_minor, expense.amount_minor);
    expense.payment_status = payment_status;
    expense.status = status;
    Ok(())
}

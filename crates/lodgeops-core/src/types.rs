use crate::error::FundsError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fund-request variant. Purchase orders itemize inventory articles with
/// quantity and unit price; generic requests carry free-text flat amounts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    PurchaseOrder,
    Generic,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

/// One line of a fund request. Every line carries the same currency as its
/// parent request; intake rejects disagreements.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FundRequestLine {
    Article {
        article_ref: String,
        quantity: u32,
        unit_price_minor: u64,
        currency: String,
    },
    FreeText {
        label: String,
        amount_minor: u64,
        currency: String,
    },
}

impl FundRequestLine {
    pub fn currency(&self) -> &str {
        match self {
            Self::Article { currency, .. } => currency,
            Self::FreeText { currency, .. } => currency,
        }
    }

    /// Line amount in minor units. Checked so a hostile quantity/price pair
    /// cannot wrap the request total.
    pub fn amount_minor(&self) -> Result<u64, FundsError> {
        match self {
            Self::Article {
                quantity,
                unit_price_minor,
                ..
            } => u64::from(*quantity)
                .checked_mul(*unit_price_minor)
                .ok_or_else(|| {
                    FundsError::validation("line_amount_overflow", "line amount overflows")
                }),
            Self::FreeText { amount_minor, .. } => Ok(*amount_minor),
        }
    }
}

/// A line-itemized request for money, pending supervisory decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundRequest {
    pub id: Uuid,
    pub kind: RequestKind,
    pub lines: Vec<FundRequestLine>,
    pub currency: String,
    /// Derived server-side from the lines; never settable by callers.
    pub total_minor: u64,
    pub requester: String,
    /// Set by the approval gate together with the decision.
    pub supervisor: Option<String>,
    pub status: RequestStatus,
    pub motive: String,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Partial,
    Paid,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseStatus {
    PendingPayment,
    Settled,
}

/// The materialized payable obligation created once a fund request is
/// approved. Aggregates (`paid_minor`, statuses) are mutated only by the
/// partial-payment ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub description: String,
    pub amount_minor: u64,
    pub currency: String,
    pub paid_minor: u64,
    pub payment_status: PaymentStatus,
    pub status: ExpenseStatus,
    pub requester: String,
    pub approver: String,
    /// Back-reference to the approving request; unique per expense.
    pub source_request_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Expense {
    pub fn remaining_minor(&self) -> u64 {
        self.amount_minor.saturating_sub(self.paid_minor)
    }
}

/// `payment_status` is a pure function of paid vs owed; the expense-level
/// status follows it into `settled` once fully paid.
pub fn derive_payment_status(paid_minor: u64, amount_minor: u64) -> (PaymentStatus, ExpenseStatus) {
    if paid_minor == 0 {
        (PaymentStatus::Pending, ExpenseStatus::PendingPayment)
    } else if paid_minor < amount_minor {
        (PaymentStatus::Partial, ExpenseStatus::PendingPayment)
    } else {
        (PaymentStatus::Paid, ExpenseStatus::Settled)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    BankTransfer,
    Cash,
    Cheque,
    MobileMoney,
    Other,
}

impl PaymentMode {
    /// Cash-mode payments settle immediately from a till and must notify the
    /// cash-register balance service.
    pub fn settles_from_till(self) -> bool {
        matches!(self, Self::Cash)
    }
}

/// One recorded partial settlement against an expense.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialPayment {
    pub id: Uuid,
    pub expense_id: Uuid,
    pub amount_minor: u64,
    pub mode: PaymentMode,
    pub reference: Option<String>,
    pub recorded_by: String,
    /// Client-supplied idempotency key; a replay returns the original
    /// payment instead of charging twice.
    pub request_key: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReminderStatus {
    Scheduled,
    Sent,
    Read,
    Processed,
}

impl ReminderStatus {
    pub fn name(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Sent => "sent",
            Self::Read => "read",
            Self::Processed => "processed",
        }
    }

    /// Single transition function for reminder statuses. Only
    /// scheduled→sent→read→processed is representable; skips and reversals
    /// are rejected uniformly.
    pub fn advance(self, next: ReminderStatus) -> Result<ReminderStatus, FundsError> {
        let legal = matches!(
            (self, next),
            (Self::Scheduled, Self::Sent) | (Self::Sent, Self::Read) | (Self::Read, Self::Processed)
        );
        if legal {
            Ok(next)
        } else {
            Err(FundsError::state(
                "illegal_reminder_transition",
                format!(
                    "reminder transition '{}' -> '{}' is not permitted",
                    self.name(),
                    next.name()
                ),
            ))
        }
    }
}

/// A scheduled, status-tracked nudge about an expense's pending settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentReminder {
    pub id: Uuid,
    pub expense_id: Uuid,
    pub due_at: DateTime<Utc>,
    pub kind: String,
    pub message: String,
    pub status: ReminderStatus,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_status_is_pure_function_of_amounts() {
        assert_eq!(
            derive_payment_status(0, 1000),
            (PaymentStatus::Pending, ExpenseStatus::PendingPayment)
        );
        assert_eq!(
            derive_payment_status(1, 1000),
            (PaymentStatus::Partial, ExpenseStatus::PendingPayment)
        );
        assert_eq!(
            derive_payment_status(999, 1000),
            (PaymentStatus::Partial, ExpenseStatus::PendingPayment)
        );
        assert_eq!(
            derive_payment_status(1000, 1000),
            (PaymentStatus::Paid, ExpenseStatus::Settled)
        );
    }

    #[test]
    fn reminder_status_only_advances_forward() {
        assert_eq!(
            ReminderStatus::Scheduled.advance(ReminderStatus::Sent).unwrap(),
            ReminderStatus::Sent
        );
        assert_eq!(
            ReminderStatus::Sent.advance(ReminderStatus::Read).unwrap(),
            ReminderStatus::Read
        );
        assert_eq!(
            ReminderStatus::Read.advance(ReminderStatus::Processed).unwrap(),
            ReminderStatus::Processed
        );
    }

    #[test]
    fn reminder_status_rejects_skips_and_reversals() {
        assert!(ReminderStatus::Scheduled
            .advance(ReminderStatus::Processed)
            .is_err());
        assert!(ReminderStatus::Scheduled
            .advance(ReminderStatus::Read)
            .is_err());
        assert!(ReminderStatus::Sent
            .advance(ReminderStatus::Scheduled)
            .is_err());
        assert!(ReminderStatus::Processed
            .advance(ReminderStatus::Processed)
            .is_err());
    }

    #[test]
    fn article_line_amount_is_checked() {
        let line = FundRequestLine::Article {
            article_ref: "towels".to_string(),
            quantity: 2,
            unit_price_minor: 5_000,
            currency: "USD".to_string(),
        };
        assert_eq!(line.amount_minor().unwrap(), 10_000);

        let wrapping = FundRequestLine::Article {
            article_ref: "towels".to_string(),
            quantity: u32::MAX,
            unit_price_minor: u64::MAX,
            currency: "USD".to_string(),
        };
        assert!(wrapping.amount_minor().is_err());
    }
}

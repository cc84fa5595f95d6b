//! Pipeline orchestration.
//!
//! `FundsEngine` is the single entry point tying intake validation, the
//! approval gate, the partial-payment ledger and the reminder scheduler to
//! the store and the external collaborators. Stateless checks run here;
//! anything that must hold under concurrency runs inside the store's atomic
//! units.

use crate::approval::Decision;
use crate::authz::{Authorizer, Capability};
use crate::connectors::CashRegister;
use crate::error::FundsError;
use crate::intake::{self, SubmitFundRequest};
use crate::payments::{self, PaymentDraft};
use crate::reminders::{self, DueCursor, DueReminderPage};
use crate::store::{DecisionOutcome, MaterializeOutcome, ReversalOutcome, Store};
use crate::types::{
    Expense, FundRequest, FundRequestLine, PartialPayment, PaymentReminder, ReminderStatus,
    RequestStatus,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Result of recording a payment. `warning` is set when the payment itself
/// committed but a cash-register notification failed.
#[derive(Debug, Clone)]
pub struct PaymentRecorded {
    pub payment: PartialPayment,
    pub expense: Expense,
    pub replayed: bool,
    pub warning: Option<String>,
}

pub struct FundsEngine {
    store: Arc<dyn Store>,
    authorizer: Arc<dyn Authorizer>,
    cash_register: Arc<dyn CashRegister>,
}

impl FundsEngine {
    pub fn new(
        store: Arc<dyn Store>,
        authorizer: Arc<dyn Authorizer>,
        cash_register: Arc<dyn CashRegister>,
    ) -> Self {
        Self {
            store,
            authorizer,
            cash_register,
        }
    }

    // --- request intake ---

    pub async fn submit_fund_request(
        &self,
        submit: SubmitFundRequest,
    ) -> Result<FundRequest, FundsError> {
        let request = intake::build_fund_request(submit)?;
        let request = self.store.insert_fund_request(request).await?;
        info!(
            request_id = %request.id,
            total_minor = request.total_minor,
            currency = %request.currency,
            "fund request submitted"
        );
        Ok(request)
    }

    pub async fn fund_request(&self, id: Uuid) -> Result<FundRequest, FundsError> {
        self.store.fund_request(id).await
    }

    pub async fn list_fund_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<FundRequest>, FundsError> {
        self.store.list_fund_requests(status).await
    }

    /// Replace the lines of a pending request; the total is recomputed from
    /// the new lines against the request's declared currency and kind.
    pub async fn edit_fund_request(
        &self,
        id: Uuid,
        lines: Vec<FundRequestLine>,
    ) -> Result<FundRequest, FundsError> {
        let request = self.store.fund_request(id).await?;
        let total_minor = intake::validate_lines(request.kind, &request.currency, &lines)?;
        self.store
            .replace_fund_request_lines(id, lines, total_minor)
            .await
    }

    pub async fn delete_fund_request(&self, id: Uuid) -> Result<(), FundsError> {
        self.store.delete_fund_request(id).await
    }

    // --- approval gate ---

    /// Decide a pending request. Approval materializes the expense inside
    /// the same store transaction, so both commit or neither does.
    pub async fn decide_fund_request(
        &self,
        id: Uuid,
        decision: Decision,
        decider: &str,
        comment: Option<String>,
    ) -> Result<DecisionOutcome, FundsError> {
        self.authorizer
            .require(decider, Capability::Supervisory)
            .await?;

        let outcome = self
            .store
            .decide_fund_request(id, decision, decider, comment, Utc::now())
            .await?;
        info!(
            request_id = %id,
            decision = ?decision,
            decider = %decider,
            expense_id = ?outcome.expense.as_ref().map(|e| e.id),
            "fund request decided"
        );
        Ok(outcome)
    }

    /// Idempotent recovery path: ensure the expense for an approved request
    /// exists and return it.
    pub async fn materialize_expense(
        &self,
        request_id: Uuid,
    ) -> Result<MaterializeOutcome, FundsError> {
        self.store.materialize_expense(request_id).await
    }

    pub async fn expense(&self, id: Uuid) -> Result<Expense, FundsError> {
        self.store.expense(id).await
    }

    // --- partial-payment ledger ---

    pub async fn record_payment(
        &self,
        expense_id: Uuid,
        draft: PaymentDraft,
    ) -> Result<PaymentRecorded, FundsError> {
        self.authorizer
            .require(&draft.recorded_by, Capability::FinanceOperator)
            .await?;
        payments::validate_amount(draft.amount_minor)?;

        let mode = draft.mode;
        let outcome = self.store.record_partial_payment(expense_id, draft).await?;

        // The payment is durable at this point; a till notification failure
        // is surfaced as a warning, never a rollback.
        let mut warning = None;
        if mode.settles_from_till() && !outcome.replayed {
            if let Err(err) = self
                .cash_register
                .record_till_outflow(&outcome.payment, &outcome.expense)
                .await
            {
                warn!(
                    payment_id = %outcome.payment.id,
                    expense_id = %expense_id,
                    error = %err,
                    "cash register notification failed"
                );
                warning = Some(format!("cash register notification failed: {err}"));
            }
        }

        info!(
            payment_id = %outcome.payment.id,
            expense_id = %expense_id,
            amount_minor = outcome.payment.amount_minor,
            replayed = outcome.replayed,
            payment_status = ?outcome.expense.payment_status,
            "partial payment recorded"
        );

        Ok(PaymentRecorded {
            payment: outcome.payment,
            expense: outcome.expense,
            replayed: outcome.replayed,
            warning,
        })
    }

    pub async fn partial_payment(&self, id: Uuid) -> Result<PartialPayment, FundsError> {
        self.store.partial_payment(id).await
    }

    pub async fn reverse_payment(
        &self,
        payment_id: Uuid,
        actor: &str,
    ) -> Result<ReversalOutcome, FundsError> {
        self.authorizer
            .require(actor, Capability::FinanceOperator)
            .await?;
        let outcome = self.store.reverse_partial_payment(payment_id).await?;
        info!(
            payment_id = %payment_id,
            expense_id = %outcome.expense.id,
            actor = %actor,
            paid_minor = outcome.expense.paid_minor,
            "partial payment reversed"
        );
        Ok(outcome)
    }

    // --- reminder scheduler ---

    pub async fn schedule_reminder(
        &self,
        expense_id: Uuid,
        due_at: DateTime<Utc>,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<PaymentReminder, FundsError> {
        let reminder = reminders::build_reminder(expense_id, due_at, kind, message, Utc::now())?;
        self.store.insert_reminder(reminder).await
    }

    pub async fn reminder(&self, id: Uuid) -> Result<PaymentReminder, FundsError> {
        self.store.reminder(id).await
    }

    pub async fn transition_reminder(
        &self,
        id: Uuid,
        next: ReminderStatus,
    ) -> Result<PaymentReminder, FundsError> {
        self.store.transition_reminder(id, next).await
    }

    pub async fn due_reminders(
        &self,
        as_of: DateTime<Utc>,
        cursor: Option<DueCursor>,
        limit: usize,
    ) -> Result<DueReminderPage, FundsError> {
        // A zero-sized page would drop the cursor and look like an empty
        // due set; the smallest page is one reminder.
        self.store.due_reminders(as_of, cursor, limit.max(1)).await
    }
}

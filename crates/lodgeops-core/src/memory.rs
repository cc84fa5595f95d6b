//! In-memory storage backend.
//!
//! One async mutex guards all state, which makes every operation its own
//! atomic unit and serializes concurrent payments against the same expense.
//! These are the same guarantees the PostgreSQL backend gets from
//! transactions and row locks.

use crate::approval::{self, Decision};
use crate::error::FundsError;
use crate::payments::{self, PaymentDraft};
use crate::reminders::{past_cursor, DueCursor, DueReminderPage};
use crate::store::{
    DecisionOutcome, MaterializeOutcome, PaymentOutcome, ReversalOutcome, Store,
};
use crate::types::{
    Expense, FundRequest, FundRequestLine, PartialPayment, PaymentReminder, ReminderStatus,
    RequestStatus,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Default)]
struct MemoryState {
    requests: HashMap<Uuid, FundRequest>,
    expenses: HashMap<Uuid, Expense>,
    expense_by_request: HashMap<Uuid, Uuid>,
    payments: HashMap<Uuid, PartialPayment>,
    reminders: HashMap<Uuid, PaymentReminder>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn request_not_found(id: Uuid) -> FundsError {
    FundsError::not_found("fund request", id)
}

fn expense_not_found(id: Uuid) -> FundsError {
    FundsError::not_found("expense", id)
}

fn materialize_locked(
    state: &mut MemoryState,
    request_id: Uuid,
) -> Result<MaterializeOutcome, FundsError> {
    let request = state
        .requests
        .get(&request_id)
        .ok_or_else(|| request_not_found(request_id))?;

    if request.status != RequestStatus::Approved {
        return Err(FundsError::state(
            "request_not_approved",
            format!("fund request '{request_id}' is not approved"),
        ));
    }

    if let Some(expense_id) = state.expense_by_request.get(&request_id) {
        let expense = state
            .expenses
            .get(expense_id)
            .cloned()
            .ok_or_else(|| FundsError::Inconsistency(format!(
                "expense index points at missing expense for request '{request_id}'"
            )))?;
        return Ok(MaterializeOutcome {
            expense,
            created: false,
        });
    }

    let expense = approval::expense_from_request(request, Utc::now());
    state.expense_by_request.insert(request_id, expense.id);
    state.expenses.insert(expense.id, expense.clone());
    Ok(MaterializeOutcome {
        expense,
        created: true,
    })
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_fund_request(&self, request: FundRequest) -> Result<FundRequest, FundsError> {
        let mut state = self.state.lock().await;
        state.requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn fund_request(&self, id: Uuid) -> Result<FundRequest, FundsError> {
        let state = self.state.lock().await;
        state
            .requests
            .get(&id)
            .cloned()
            .ok_or_else(|| request_not_found(id))
    }

    async fn list_fund_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<FundRequest>, FundsError> {
        let state = self.state.lock().await;
        let mut requests: Vec<FundRequest> = state
            .requests
            .values()
            .filter(|request| status.map(|s| request.status == s).unwrap_or(true))
            .cloned()
            .collect();
        requests.sort_by_key(|request| request.created_at);
        Ok(requests)
    }

    async fn replace_fund_request_lines(
        &self,
        id: Uuid,
        lines: Vec<FundRequestLine>,
        total_minor: u64,
    ) -> Result<FundRequest, FundsError> {
        let mut state = self.state.lock().await;
        let request = state.requests.get_mut(&id).ok_or_else(|| request_not_found(id))?;
        if request.status != RequestStatus::Pending {
            return Err(FundsError::state(
                "request_frozen",
                format!("fund request '{id}' is decided and can no longer be edited"),
            ));
        }
        request.lines = lines;
        request.total_minor = total_minor;
        Ok(request.clone())
    }

    async fn delete_fund_request(&self, id: Uuid) -> Result<(), FundsError> {
        let mut state = self.state.lock().await;
        let request = state.requests.get(&id).ok_or_else(|| request_not_found(id))?;
        if request.status != RequestStatus::Pending {
            return Err(FundsError::state(
                "request_frozen",
                format!("fund request '{id}' is decided and can no longer be deleted"),
            ));
        }
        state.requests.remove(&id);
        Ok(())
    }

    async fn decide_fund_request(
        &self,
        id: Uuid,
        decision: Decision,
        supervisor: &str,
        comment: Option<String>,
        decided_at: DateTime<Utc>,
    ) -> Result<DecisionOutcome, FundsError> {
        let mut state = self.state.lock().await;
        let request = state.requests.get_mut(&id).ok_or_else(|| request_not_found(id))?;
        approval::apply_decision(request, decision, supervisor, comment, decided_at)?;
        let request = request.clone();

        let expense = match decision {
            Decision::Approved => Some(materialize_locked(&mut state, id)?.expense),
            Decision::Rejected => None,
        };

        Ok(DecisionOutcome { request, expense })
    }

    async fn materialize_expense(
        &self,
        request_id: Uuid,
    ) -> Result<MaterializeOutcome, FundsError> {
        let mut state = self.state.lock().await;
        materialize_locked(&mut state, request_id)
    }

    async fn expense(&self, id: Uuid) -> Result<Expense, FundsError> {
        let state = self.state.lock().await;
        state
            .expenses
            .get(&id)
            .cloned()
            .ok_or_else(|| expense_not_found(id))
    }

    async fn record_partial_payment(
        &self,
        expense_id: Uuid,
        draft: PaymentDraft,
    ) -> Result<PaymentOutcome, FundsError> {
        let mut state = self.state.lock().await;

        if !state.expenses.contains_key(&expense_id) {
            return Err(expense_not_found(expense_id));
        }

        if let Some(key) = draft.request_key.as_deref() {
            if let Some(existing) = state
                .payments
                .values()
                .find(|p| p.expense_id == expense_id && p.request_key.as_deref() == Some(key))
                .cloned()
            {
                let expense = state
                    .expenses
                    .get(&expense_id)
                    .cloned()
                    .ok_or_else(|| expense_not_found(expense_id))?;
                return Ok(PaymentOutcome {
                    payment: existing,
                    expense,
                    replayed: true,
                });
            }
        }

        let expense = state
            .expenses
            .get_mut(&expense_id)
            .ok_or_else(|| expense_not_found(expense_id))?;
        payments::apply_payment(expense, draft.amount_minor)?;
        let expense = expense.clone();

        let payment = draft.into_payment(expense_id, Utc::now());
        state.payments.insert(payment.id, payment.clone());

        Ok(PaymentOutcome {
            payment,
            expense,
            replayed: false,
        })
    }

    async fn partial_payment(&self, id: Uuid) -> Result<PartialPayment, FundsError> {
        let state = self.state.lock().await;
        state
            .payments
            .get(&id)
            .cloned()
            .ok_or_else(|| FundsError::not_found("partial payment", id))
    }

    async fn reverse_partial_payment(&self, id: Uuid) -> Result<ReversalOutcome, FundsError> {
        let mut state = self.state.lock().await;
        let payment = state
            .payments
            .get(&id)
            .cloned()
            .ok_or_else(|| FundsError::not_found("partial payment", id))?;

        let expense = state
            .expenses
            .get_mut(&payment.expense_id)
            .ok_or_else(|| expense_not_found(payment.expense_id))?;
        payments::reverse_payment(expense, payment.amount_minor)?;
        let expense = expense.clone();

        state.payments.remove(&id);
        Ok(ReversalOutcome { payment, expense })
    }

    async fn insert_reminder(
        &self,
        reminder: PaymentReminder,
    ) -> Result<PaymentReminder, FundsError> {
        let mut state = self.state.lock().await;
        if !state.expenses.contains_key(&reminder.expense_id) {
            return Err(expense_not_found(reminder.expense_id));
        }
        state.reminders.insert(reminder.id, reminder.clone());
        Ok(reminder)
    }

    async fn reminder(&self, id: Uuid) -> Result<PaymentReminder, FundsError> {
        let state = self.state.lock().await;
        state
            .reminders
            .get(&id)
            .cloned()
            .ok_or_else(|| FundsError::not_found("payment reminder", id))
    }

    async fn transition_reminder(
        &self,
        id: Uuid,
        next: ReminderStatus,
    ) -> Result<PaymentReminder, FundsError> {
        let mut state = self.state.lock().await;
        let reminder = state
            .reminders
            .get_mut(&id)
            .ok_or_else(|| FundsError::not_found("payment reminder", id))?;
        reminder.status = reminder.status.advance(next)?;
        Ok(reminder.clone())
    }

    async fn due_reminders(
        &self,
        as_of: DateTime<Utc>,
        cursor: Option<DueCursor>,
        limit: usize,
    ) -> Result<DueReminderPage, FundsError> {
        let state = self.state.lock().await;
        let mut due: Vec<PaymentReminder> = state
            .reminders
            .values()
            .filter(|reminder| {
                reminder.status == ReminderStatus::Scheduled
                    && reminder.due_at <= as_of
                    && past_cursor(reminder, cursor.as_ref())
            })
            .cloned()
            .collect();
        due.sort_by_key(|reminder| (reminder.due_at, reminder.id));

        let has_more = due.len() > limit;
        due.truncate(limit);
        let next_cursor = if has_more {
            due.last().map(DueCursor::after)
        } else {
            None
        };

        Ok(DueReminderPage {
            items: due,
            next_cursor,
        })
    }
}

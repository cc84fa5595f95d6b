//! Approval gate and expense materialization.
//!
//! A fund request transitions only out of `pending`; approved/rejected are
//! terminal. Approval materializes exactly one expense per request; the
//! store enforces that with a uniqueness constraint on `source_request_id`,
//! and `expense_from_request` stays a pure builder so both backends share it.

use crate::error::FundsError;
use crate::types::{
    Expense, ExpenseStatus, FundRequest, FundRequestLine, PaymentStatus, RequestStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    pub fn as_status(self) -> RequestStatus {
        match self {
            Self::Approved => RequestStatus::Approved,
            Self::Rejected => RequestStatus::Rejected,
        }
    }
}

/// Apply a supervisory decision to a pending request. The caller is
/// responsible for running this inside the same transaction that
/// materializes the expense.
pub fn apply_decision(
    request: &mut FundRequest,
    decision: Decision,
    supervisor: &str,
    comment: Option<String>,
    decided_at: DateTime<Utc>,
) -> Result<(), FundsError> {
    if request.status != RequestStatus::Pending {
        return Err(FundsError::state(
            "request_already_decided",
            format!("fund request '{}' is no longer pending", request.id),
        ));
    }

    request.status = decision.as_status();
    request.supervisor = Some(supervisor.to_string());
    request.decided_at = Some(decided_at);
    if comment.is_some() {
        request.comment = comment;
    }
    Ok(())
}

/// Build the payable obligation for an approved request.
///
/// Pure: no identifiers are reused, statuses start at their zero state, and
/// the description is assembled from the request's motive, comment and lines.
pub fn expense_from_request(request: &FundRequest, created_at: DateTime<Utc>) -> Expense {
    let approver = request.supervisor.clone().unwrap_or_default();

    Expense {
        id: Uuid::new_v4(),
        description: describe_request(request),
        amount_minor: request.total_minor,
        currency: request.currency.clone(),
        paid_minor: 0,
        payment_status: PaymentStatus::Pending,
        status: ExpenseStatus::PendingPayment,
        requester: request.requester.clone(),
        approver,
        source_request_id: Some(request.id),
        notes: request.comment.clone(),
        created_at,
    }
}

fn describe_request(request: &FundRequest) -> String {
    let mut description = request.motive.clone();

    let line_summaries: Vec<String> = request
        .lines
        .iter()
        .map(|line| match line {
            FundRequestLine::Article {
                article_ref,
                quantity,
                unit_price_minor,
                ..
            } => format!("{quantity} x {article_ref} @ {unit_price_minor}"),
            FundRequestLine::FreeText {
                label,
                amount_minor,
                ..
            } => format!("{label} ({amount_minor})"),
        })
        .collect();

    if !line_summaries.is_empty() {
        description.push_str(": ");
        description.push_str(&line_summaries.join(", "));
    }
    description
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::{build_fund_request, SubmitFundRequest};
    use crate::types::RequestKind;

    fn pending_request() -> FundRequest {
        build_fund_request(SubmitFundRequest {
            requester: "maintenance".to_string(),
            kind: RequestKind::PurchaseOrder,
            lines: vec![FundRequestLine::Article {
                article_ref: "paint".to_string(),
                quantity: 4,
                unit_price_minor: 2_500,
                currency: "USD".to_string(),
            }],
            currency: "USD".to_string(),
            motive: "repaint corridor".to_string(),
            comment: None,
        })
        .unwrap()
    }

    #[test]
    fn decision_transitions_out_of_pending_only() {
        let mut request = pending_request();
        apply_decision(&mut request, Decision::Approved, "gm", None, Utc::now()).unwrap();
        assert_eq!(request.status, RequestStatus::Approved);
        assert_eq!(request.supervisor.as_deref(), Some("gm"));
        assert!(request.decided_at.is_some());

        let err =
            apply_decision(&mut request, Decision::Rejected, "gm", None, Utc::now()).unwrap_err();
        assert_eq!(err.code(), "request_already_decided");
        assert_eq!(request.status, RequestStatus::Approved);
    }

    #[test]
    fn materialized_expense_starts_unpaid_and_references_request() {
        let mut request = pending_request();
        apply_decision(&mut request, Decision::Approved, "gm", None, Utc::now()).unwrap();

        let expense = expense_from_request(&request, Utc::now());
        assert_eq!(expense.amount_minor, 10_000);
        assert_eq!(expense.currency, "USD");
        assert_eq!(expense.paid_minor, 0);
        assert_eq!(expense.payment_status, PaymentStatus::Pending);
        assert_eq!(expense.status, ExpenseStatus::PendingPayment);
        assert_eq!(expense.source_request_id, Some(request.id));
        assert_eq!(expense.approver, "gm");
        assert!(expense.description.contains("repaint corridor"));
        assert!(expense.description.contains("4 x paint"));
    }
}

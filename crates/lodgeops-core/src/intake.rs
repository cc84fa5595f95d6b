//! Request intake: builds a validated fund request from line items.
//!
//! Totals are always computed server-side from the lines; callers cannot
//! supply one.

use crate::error::FundsError;
use crate::types::{FundRequest, FundRequestLine, RequestKind, RequestStatus};
use chrono::Utc;
use uuid::Uuid;

/// Payload accepted by `FundsEngine::submit_fund_request`.
#[derive(Debug, Clone)]
pub struct SubmitFundRequest {
    pub requester: String,
    pub kind: RequestKind,
    pub lines: Vec<FundRequestLine>,
    pub currency: String,
    pub motive: String,
    pub comment: Option<String>,
}

/// Validate lines against the declared currency and request kind, and return
/// the request total in minor units.
pub fn validate_lines(
    kind: RequestKind,
    currency: &str,
    lines: &[FundRequestLine],
) -> Result<u64, FundsError> {
    if lines.is_empty() {
        return Err(FundsError::validation(
            "empty_lines",
            "a fund request needs at least one line",
        ));
    }

    let mut total: u64 = 0;
    for (position, line) in lines.iter().enumerate() {
        if line.currency() != currency {
            return Err(FundsError::validation(
                "currency_mismatch",
                format!(
                    "line {} is in '{}' but the request declares '{}'",
                    position,
                    line.currency(),
                    currency
                ),
            ));
        }

        match (kind, line) {
            (RequestKind::PurchaseOrder, FundRequestLine::FreeText { .. }) => {
                return Err(FundsError::validation(
                    "line_shape_mismatch",
                    format!("line {position}: purchase orders take article lines only"),
                ));
            }
            (RequestKind::Generic, FundRequestLine::Article { .. }) => {
                return Err(FundsError::validation(
                    "line_shape_mismatch",
                    format!("line {position}: generic requests take free-text lines only"),
                ));
            }
            (
                _,
                FundRequestLine::Article {
                    quantity,
                    unit_price_minor,
                    ..
                },
            ) => {
                if *quantity == 0 || *unit_price_minor == 0 {
                    return Err(FundsError::validation(
                        "line_amount_not_computable",
                        format!("line {position}: quantity and unit price must be positive"),
                    ));
                }
            }
            (_, FundRequestLine::FreeText { amount_minor, .. }) => {
                if *amount_minor == 0 {
                    return Err(FundsError::validation(
                        "line_amount_not_computable",
                        format!("line {position}: amount must be positive"),
                    ));
                }
            }
        }

        total = total.checked_add(line.amount_minor()?).ok_or_else(|| {
            FundsError::validation("total_overflow", "request total overflows")
        })?;
    }

    Ok(total)
}

/// Build a pending fund request. Fails if the lines are empty, disagree with
/// the declared currency, or are not computable.
pub fn build_fund_request(submit: SubmitFundRequest) -> Result<FundRequest, FundsError> {
    if submit.currency.trim().is_empty() {
        return Err(FundsError::validation(
            "missing_currency",
            "a currency is required",
        ));
    }
    if submit.motive.trim().is_empty() {
        return Err(FundsError::validation(
            "missing_motive",
            "a motive is required",
        ));
    }

    let total_minor = validate_lines(submit.kind, &submit.currency, &submit.lines)?;

    Ok(FundRequest {
        id: Uuid::new_v4(),
        kind: submit.kind,
        lines: submit.lines,
        currency: submit.currency,
        total_minor,
        requester: submit.requester,
        supervisor: None,
        status: RequestStatus::Pending,
        motive: submit.motive,
        comment: submit.comment,
        created_at: Utc::now(),
        decided_at: None,
    })
}

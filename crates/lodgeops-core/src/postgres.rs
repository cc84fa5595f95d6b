//! PostgreSQL storage backend.
//!
//! Each pipeline mutation is one transaction; the expense row is locked with
//! `SELECT ... FOR UPDATE` so concurrent payments/reversals serialize on it.
//! Idempotent materialization is anchored by the unique index on
//! `expenses.source_request_id`, payment replay by the unique
//! `(expense_id, request_key)` pair.

use crate::approval::{self, Decision};
use crate::error::FundsError;
use crate::payments::{self, PaymentDraft};
use crate::reminders::{DueCursor, DueReminderPage};
use crate::store::{
    DecisionOutcome, MaterializeOutcome, PaymentOutcome, ReversalOutcome, Store,
};
use crate::types::{
    Expense, ExpenseStatus, FundRequest, FundRequestLine, PartialPayment, PaymentMode,
    PaymentReminder, PaymentStatus, ReminderStatus, RequestKind, RequestStatus,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, FundsError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await
            .map_err(|e| FundsError::Persistence(format!("postgres connect failed: {e}")))?;
        Ok(Self { pool })
    }

    pub async fn ensure_schema(&self) -> Result<(), FundsError> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS fund_requests (
                id UUID PRIMARY KEY,
                kind TEXT NOT NULL,
                lines JSONB NOT NULL,
                currency TEXT NOT NULL,
                total_minor BIGINT NOT NULL,
                requester TEXT NOT NULL,
                supervisor TEXT NULL,
                status TEXT NOT NULL,
                motive TEXT NOT NULL,
                comment TEXT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                decided_at TIMESTAMPTZ NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS expenses (
                id UUID PRIMARY KEY,
                description TEXT NOT NULL,
                amount_minor BIGINT NOT NULL,
                currency TEXT NOT NULL,
                paid_minor BIGINT NOT NULL,
                payment_status TEXT NOT NULL,
                status TEXT NOT NULL,
                requester TEXT NOT NULL,
                approver TEXT NOT NULL,
                source_request_id UUID NULL UNIQUE,
                notes TEXT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS partial_payments (
                id UUID PRIMARY KEY,
                expense_id UUID NOT NULL REFERENCES expenses (id),
                amount_minor BIGINT NOT NULL,
                mode TEXT NOT NULL,
                reference TEXT NULL,
                recorded_by TEXT NOT NULL,
                request_key TEXT NULL,
                recorded_at TIMESTAMPTZ NOT NULL,
                UNIQUE (expense_id, request_key)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS payment_reminders (
                id UUID PRIMARY KEY,
                expense_id UUID NOT NULL REFERENCES expenses (id),
                due_at TIMESTAMPTZ NOT NULL,
                kind TEXT NOT NULL,
                message TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_partial_payments_expense ON partial_payments (expense_id)",
            "CREATE INDEX IF NOT EXISTS idx_payment_reminders_due ON payment_reminders (status, due_at, id)",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| FundsError::Persistence(format!("postgres schema create failed: {e}")))?;
        }
        Ok(())
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, FundsError> {
        self.pool
            .begin()
            .await
            .map_err(|e| FundsError::Persistence(format!("postgres begin failed: {e}")))
    }

    async fn request_for_update(
        tx: &mut Transaction<'static, Postgres>,
        id: Uuid,
    ) -> Result<FundRequest, FundsError> {
        let row = sqlx::query("SELECT * FROM fund_requests WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(persistence)?
            .ok_or_else(|| FundsError::not_found("fund request", id))?;
        decode_request(&row)
    }

    async fn expense_for_update(
        tx: &mut Transaction<'static, Postgres>,
        id: Uuid,
    ) -> Result<Expense, FundsError> {
        let row = sqlx::query("SELECT * FROM expenses WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(persistence)?
            .ok_or_else(|| FundsError::not_found("expense", id))?;
        decode_expense(&row)
    }

    async fn insert_expense_row(
        tx: &mut Transaction<'static, Postgres>,
        expense: &Expense,
    ) -> Result<(), FundsError> {
        sqlx::query(
            r#"
            INSERT INTO expenses (
                id, description, amount_minor, currency, paid_minor,
                payment_status, status, requester, approver,
                source_request_id, notes, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(expense.id)
        .bind(&expense.description)
        .bind(to_db_amount(expense.amount_minor)?)
        .bind(&expense.currency)
        .bind(to_db_amount(expense.paid_minor)?)
        .bind(payment_status_to_str(expense.payment_status))
        .bind(expense_status_to_str(expense.status))
        .bind(&expense.requester)
        .bind(&expense.approver)
        .bind(expense.source_request_id)
        .bind(&expense.notes)
        .bind(expense.created_at)
        .execute(&mut **tx)
        .await
        .map_err(persistence)?;
        Ok(())
    }

    async fn update_expense_aggregates(
        tx: &mut Transaction<'static, Postgres>,
        expense: &Expense,
    ) -> Result<(), FundsError> {
        sqlx::query(
            "UPDATE expenses SET paid_minor = $2, payment_status = $3, status = $4 WHERE id = $1",
        )
        .bind(expense.id)
        .bind(to_db_amount(expense.paid_minor)?)
        .bind(payment_status_to_str(expense.payment_status))
        .bind(expense_status_to_str(expense.status))
        .execute(&mut **tx)
        .await
        .map_err(persistence)?;
        Ok(())
    }

    /// Materialize inside an open transaction. Returns the existing expense
    /// when one is already anchored to the request.
    async fn materialize_in_tx(
        tx: &mut Transaction<'static, Postgres>,
        request: &FundRequest,
    ) -> Result<MaterializeOutcome, FundsError> {
        if request.status != RequestStatus::Approved {
            return Err(FundsError::state(
                "request_not_approved",
                format!("fund request '{}' is not approved", request.id),
            ));
        }

        if let Some(row) = sqlx::query("SELECT * FROM expenses WHERE source_request_id = $1")
            .bind(request.id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(persistence)?
        {
            return Ok(MaterializeOutcome {
                expense: decode_expense(&row)?,
                created: false,
            });
        }

        let expense = approval::expense_from_request(request, Utc::now());
        Self::insert_expense_row(tx, &expense).await?;
        Ok(MaterializeOutcome {
            expense,
            created: true,
        })
    }

    async fn commit(tx: Transaction<'static, Postgres>) -> Result<(), FundsError> {
        tx.commit()
            .await
            .map_err(|e| FundsError::Persistence(format!("postgres commit failed: {e}")))
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn insert_fund_request(&self, request: FundRequest) -> Result<FundRequest, FundsError> {
        let lines = serde_json::to_value(&request.lines)
            .map_err(|e| FundsError::Persistence(format!("encode lines failed: {e}")))?;
        sqlx::query(
            r#"
            INSERT INTO fund_requests (
                id, kind, lines, currency, total_minor, requester,
                supervisor, status, motive, comment, created_at, decided_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(request.id)
        .bind(kind_to_str(request.kind))
        .bind(lines)
        .bind(&request.currency)
        .bind(to_db_amount(request.total_minor)?)
        .bind(&request.requester)
        .bind(&request.supervisor)
        .bind(request_status_to_str(request.status))
        .bind(&request.motive)
        .bind(&request.comment)
        .bind(request.created_at)
        .bind(request.decided_at)
        .execute(&self.pool)
        .await
        .map_err(persistence)?;
        Ok(request)
    }

    async fn fund_request(&self, id: Uuid) -> Result<FundRequest, FundsError> {
        let row = sqlx::query("SELECT * FROM fund_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(persistence)?
            .ok_or_else(|| FundsError::not_found("fund request", id))?;
        decode_request(&row)
    }

    async fn list_fund_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<FundRequest>, FundsError> {
        let rows = match status {
            Some(status) => {
                sqlx::query(
                    "SELECT * FROM fund_requests WHERE status = $1 ORDER BY created_at ASC",
                )
                .bind(request_status_to_str(status))
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query("SELECT * FROM fund_requests ORDER BY created_at ASC")
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(persistence)?;

        rows.iter().map(decode_request).collect()
    }

    async fn replace_fund_request_lines(
        &self,
        id: Uuid,
        lines: Vec<FundRequestLine>,
        total_minor: u64,
    ) -> Result<FundRequest, FundsError> {
        let mut tx = self.begin().await?;
        let mut request = Self::request_for_update(&mut tx, id).await?;
        if request.status != RequestStatus::Pending {
            return Err(FundsError::state(
                "request_frozen",
                format!("fund request '{id}' is decided and can no longer be edited"),
            ));
        }

        let encoded = serde_json::to_value(&lines)
            .map_err(|e| FundsError::Persistence(format!("encode lines failed: {e}")))?;
        sqlx::query("UPDATE fund_requests SET lines = $2, total_minor = $3 WHERE id = $1")
            .bind(id)
            .bind(encoded)
            .bind(to_db_amount(total_minor)?)
            .execute(&mut *tx)
            .await
            .map_err(persistence)?;
        Self::commit(tx).await?;

        request.lines = lines;
        request.total_minor = total_minor;
        Ok(request)
    }

    async fn delete_fund_request(&self, id: Uuid) -> Result<(), FundsError> {
        let mut tx = self.begin().await?;
        let request = Self::request_for_update(&mut tx, id).await?;
        if request.status != RequestStatus::Pending {
            return Err(FundsError::state(
                "request_frozen",
                format!("fund request '{id}' is decided and can no longer be deleted"),
            ));
        }
        sqlx::query("DELETE FROM fund_requests WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(persistence)?;
        Self::commit(tx).await
    }

    async fn decide_fund_request(
        &self,
        id: Uuid,
        decision: Decision,
        supervisor: &str,
        comment: Option<String>,
        decided_at: DateTime<Utc>,
    ) -> Result<DecisionOutcome, FundsError> {
        let mut tx = self.begin().await?;
        let mut request = Self::request_for_update(&mut tx, id).await?;
        approval::apply_decision(&mut request, decision, supervisor, comment, decided_at)?;

        sqlx::query(
            "UPDATE fund_requests SET status = $2, supervisor = $3, comment = $4, decided_at = $5 WHERE id = $1",
        )
        .bind(id)
        .bind(request_status_to_str(request.status))
        .bind(&request.supervisor)
        .bind(&request.comment)
        .bind(request.decided_at)
        .execute(&mut *tx)
        .await
        .map_err(persistence)?;

        let expense = match decision {
            Decision::Approved => Some(Self::materialize_in_tx(&mut tx, &request).await?.expense),
            Decision::Rejected => None,
        };

        Self::commit(tx).await?;
        Ok(DecisionOutcome { request, expense })
    }

    async fn materialize_expense(
        &self,
        request_id: Uuid,
    ) -> Result<MaterializeOutcome, FundsError> {
        let mut tx = self.begin().await?;
        let request = Self::request_for_update(&mut tx, request_id).await?;
        let outcome = Self::materialize_in_tx(&mut tx, &request).await?;
        Self::commit(tx).await?;
        Ok(outcome)
    }

    async fn expense(&self, id: Uuid) -> Result<Expense, FundsError> {
        let row = sqlx::query("SELECT * FROM expenses WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(persistence)?
            .ok_or_else(|| FundsError::not_found("expense", id))?;
        decode_expense(&row)
    }

    async fn record_partial_payment(
        &self,
        expense_id: Uuid,
        draft: PaymentDraft,
    ) -> Result<PaymentOutcome, FundsError> {
        let mut tx = self.begin().await?;
        let mut expense = Self::expense_for_update(&mut tx, expense_id).await?;

        if let Some(key) = draft.request_key.as_deref() {
            if let Some(row) = sqlx::query(
                "SELECT * FROM partial_payments WHERE expense_id = $1 AND request_key = $2",
            )
            .bind(expense_id)
            .bind(key)
            .fetch_optional(&mut *tx)
            .await
            .map_err(persistence)?
            {
                let payment = decode_payment(&row)?;
                Self::commit(tx).await?;
                return Ok(PaymentOutcome {
                    payment,
                    expense,
                    replayed: true,
                });
            }
        }

        payments::apply_payment(&mut expense, draft.amount_minor)?;
        let payment = draft.into_payment(expense_id, Utc::now());

        sqlx::query(
            r#"
            INSERT INTO partial_payments (
                id, expense_id, amount_minor, mode, reference,
                recorded_by, request_key, recorded_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(payment.id)
        .bind(payment.expense_id)
        .bind(to_db_amount(payment.amount_minor)?)
        .bind(mode_to_str(payment.mode))
        .bind(&payment.reference)
        .bind(&payment.recorded_by)
        .bind(&payment.request_key)
        .bind(payment.recorded_at)
        .execute(&mut *tx)
        .await
        .map_err(persistence)?;

        Self::update_expense_aggregates(&mut tx, &expense).await?;
        Self::commit(tx).await?;

        Ok(PaymentOutcome {
            payment,
            expense,
            replayed: false,
        })
    }

    async fn partial_payment(&self, id: Uuid) -> Result<PartialPayment, FundsError> {
        let row = sqlx::query("SELECT * FROM partial_payments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(persistence)?
            .ok_or_else(|| FundsError::not_found("partial payment", id))?;
        decode_payment(&row)
    }

    async fn reverse_partial_payment(&self, id: Uuid) -> Result<ReversalOutcome, FundsError> {
        let mut tx = self.begin().await?;

        // Lock the payment row first: concurrent reversals of the same
        // payment serialize here, and the loser re-reads after the winner's
        // delete commits, sees no row, and gets NotFound instead of
        // decrementing the expense a second time.
        let payment = sqlx::query("SELECT * FROM partial_payments WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(persistence)?
            .ok_or_else(|| FundsError::not_found("partial payment", id))
            .and_then(|row| decode_payment(&row))?;

        let mut expense = Self::expense_for_update(&mut tx, payment.expense_id).await?;
        payments::reverse_payment(&mut expense, payment.amount_minor)?;

        let deleted = sqlx::query("DELETE FROM partial_payments WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(persistence)?;
        if deleted.rows_affected() != 1 {
            return Err(FundsError::Inconsistency(format!(
                "reversal of payment '{id}' deleted {} rows instead of one",
                deleted.rows_affected()
            )));
        }
        Self::update_expense_aggregates(&mut tx, &expense).await?;
        Self::commit(tx).await?;

        Ok(ReversalOutcome { payment, expense })
    }

    async fn insert_reminder(
        &self,
        reminder: PaymentReminder,
    ) -> Result<PaymentReminder, FundsError> {
        // The FK on expense_id rejects reminders for unknown expenses, but a
        // clean NotFound beats a constraint violation string.
        self.expense(reminder.expense_id).await?;

        sqlx::query(
            r#"
            INSERT INTO payment_reminders (
                id, expense_id, due_at, kind, message, status, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(reminder.id)
        .bind(reminder.expense_id)
        .bind(reminder.due_at)
        .bind(&reminder.kind)
        .bind(&reminder.message)
        .bind(reminder.status.name())
        .bind(reminder.created_at)
        .execute(&self.pool)
        .await
        .map_err(persistence)?;
        Ok(reminder)
    }

    async fn reminder(&self, id: Uuid) -> Result<PaymentReminder, FundsError> {
        let row = sqlx::query("SELECT * FROM payment_reminders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(persistence)?
            .ok_or_else(|| FundsError::not_found("payment reminder", id))?;
        decode_reminder(&row)
    }

    async fn transition_reminder(
        &self,
        id: Uuid,
        next: ReminderStatus,
    ) -> Result<PaymentReminder, FundsError> {
        let mut tx = self.begin().await?;
        let row = sqlx::query("SELECT * FROM payment_reminders WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(persistence)?
            .ok_or_else(|| FundsError::not_found("payment reminder", id))?;
        let mut reminder = decode_reminder(&row)?;

        reminder.status = reminder.status.advance(next)?;
        sqlx::query("UPDATE payment_reminders SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(reminder.status.name())
            .execute(&mut *tx)
            .await
            .map_err(persistence)?;
        Self::commit(tx).await?;
        Ok(reminder)
    }

    async fn due_reminders(
        &self,
        as_of: DateTime<Utc>,
        cursor: Option<DueCursor>,
        limit: usize,
    ) -> Result<DueReminderPage, FundsError> {
        let fetch = (limit as i64) + 1;
        let rows = match cursor {
            Some(cursor) => {
                sqlx::query(
                    r#"
                    SELECT * FROM payment_reminders
                    WHERE status = 'scheduled' AND due_at <= $1 AND (due_at, id) > ($2, $3)
                    ORDER BY due_at ASC, id ASC
                    LIMIT $4
                    "#,
                )
                .bind(as_of)
                .bind(cursor.due_at)
                .bind(cursor.id)
                .bind(fetch)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT * FROM payment_reminders
                    WHERE status = 'scheduled' AND due_at <= $1
                    ORDER BY due_at ASC, id ASC
                    LIMIT $2
                    "#,
                )
                .bind(as_of)
                .bind(fetch)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(persistence)?;

        let mut items = rows
            .iter()
            .map(decode_reminder)
            .collect::<Result<Vec<_>, _>>()?;
        let has_more = items.len() > limit;
        items.truncate(limit);
        let next_cursor = if has_more {
            items.last().map(DueCursor::after)
        } else {
            None
        };

        Ok(DueReminderPage { items, next_cursor })
    }
}

fn persistence(e: sqlx::Error) -> FundsError {
    FundsError::Persistence(format!("postgres query failed: {e}"))
}

fn to_db_amount(amount: u64) -> Result<i64, FundsError> {
    amount
        .try_into()
        .map_err(|_| FundsError::Persistence("amount exceeds BIGINT range".to_string()))
}

fn from_db_amount(amount: i64) -> Result<u64, FundsError> {
    amount
        .try_into()
        .map_err(|_| FundsError::Inconsistency("negative amount in storage".to_string()))
}

fn kind_to_str(kind: RequestKind) -> &'static str {
    match kind {
        RequestKind::PurchaseOrder => "purchase_order",
        RequestKind::Generic => "generic",
    }
}

fn parse_kind(value: &str) -> Result<RequestKind, FundsError> {
    match value {
        "purchase_order" => Ok(RequestKind::PurchaseOrder),
        "generic" => Ok(RequestKind::Generic),
        other => Err(FundsError::Inconsistency(format!(
            "unknown request kind '{other}' in storage"
        ))),
    }
}

fn request_status_to_str(status: RequestStatus) -> &'static str {
    match status {
        RequestStatus::Pending => "pending",
        RequestStatus::Approved => "approved",
        RequestStatus::Rejected => "rejected",
    }
}

fn parse_request_status(value: &str) -> Result<RequestStatus, FundsError> {
    match value {
        "pending" => Ok(RequestStatus::Pending),
        "approved" => Ok(RequestStatus::Approved),
        "rejected" => Ok(RequestStatus::Rejected),
        other => Err(FundsError::Inconsistency(format!(
            "unknown request status '{other}' in storage"
        ))),
    }
}

fn payment_status_to_str(status: PaymentStatus) -> &'static str {
    match status {
        PaymentStatus::Pending => "pending",
        PaymentStatus::Partial => "partial",
        PaymentStatus::Paid => "paid",
    }
}

fn parse_payment_status(value: &str) -> Result<PaymentStatus, FundsError> {
    match value {
        "pending" => Ok(PaymentStatus::Pending),
        "partial" => Ok(PaymentStatus::Partial),
        "paid" => Ok(PaymentStatus::Paid),
        other => Err(FundsError::Inconsistency(format!(
            "unknown payment status '{other}' in storage"
        ))),
    }
}

fn expense_status_to_str(status: ExpenseStatus) -> &'static str {
    match status {
        ExpenseStatus::PendingPayment => "pending_payment",
        ExpenseStatus::Settled => "settled",
    }
}

fn parse_expense_status(value: &str) -> Result<ExpenseStatus, FundsError> {
    match value {
        "pending_payment" => Ok(ExpenseStatus::PendingPayment),
        "settled" => Ok(ExpenseStatus::Settled),
        other => Err(FundsError::Inconsistency(format!(
            "unknown expense status '{other}' in storage"
        ))),
    }
}

fn mode_to_str(mode: PaymentMode) -> &'static str {
    match mode {
        PaymentMode::BankTransfer => "bank_transfer",
        PaymentMode::Cash => "cash",
        PaymentMode::Cheque => "cheque",
        PaymentMode::MobileMoney => "mobile_money",
        PaymentMode::Other => "other",
    }
}

fn parse_mode(value: &str) -> Result<PaymentMode, FundsError> {
    match value {
        "bank_transfer" => Ok(PaymentMode::BankTransfer),
        "cash" => Ok(PaymentMode::Cash),
        "cheque" => Ok(PaymentMode::Cheque),
        "mobile_money" => Ok(PaymentMode::MobileMoney),
        "other" => Ok(PaymentMode::Other),
        unknown => Err(FundsError::Inconsistency(format!(
            "unknown payment mode '{unknown}' in storage"
        ))),
    }
}

fn parse_reminder_status(value: &str) -> Result<ReminderStatus, FundsError> {
    match value {
        "scheduled" => Ok(ReminderStatus::Scheduled),
        "sent" => Ok(ReminderStatus::Sent),
        "read" => Ok(ReminderStatus::Read),
        "processed" => Ok(ReminderStatus::Processed),
        other => Err(FundsError::Inconsistency(format!(
            "unknown reminder status '{other}' in storage"
        ))),
    }
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, FundsError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| FundsError::Persistence(format!("postgres decode '{name}' failed: {e}")))
}

fn decode_request(row: &PgRow) -> Result<FundRequest, FundsError> {
    let kind: String = column(row, "kind")?;
    let status: String = column(row, "status")?;
    let lines: serde_json::Value = column(row, "lines")?;
    let lines: Vec<FundRequestLine> = serde_json::from_value(lines)
        .map_err(|e| FundsError::Inconsistency(format!("undecodable lines in storage: {e}")))?;
    let total_minor: i64 = column(row, "total_minor")?;

    Ok(FundRequest {
        id: column(row, "id")?,
        kind: parse_kind(&kind)?,
        lines,
        currency: column(row, "currency")?,
        total_minor: from_db_amount(total_minor)?,
        requester: column(row, "requester")?,
        supervisor: column(row, "supervisor")?,
        status: parse_request_status(&status)?,
        motive: column(row, "motive")?,
        comment: column(row, "comment")?,
        created_at: column(row, "created_at")?,
        decided_at: column(row, "decided_at")?,
    })
}

fn decode_expense(row: &PgRow) -> Result<Expense, FundsError> {
    let payment_status: String = column(row, "payment_status")?;
    let status: String = column(row, "status")?;
    let amount_minor: i64 = column(row, "amount_minor")?;
    let paid_minor: i64 = column(row, "paid_minor")?;

    Ok(Expense {
        id: column(row, "id")?,
        description: column(row, "description")?,
        amount_minor: from_db_amount(amount_minor)?,
        currency: column(row, "currency")?,
        paid_minor: from_db_amount(paid_minor)?,
        payment_status: parse_payment_status(&payment_status)?,
        status: parse_expense_status(&status)?,
        requester: column(row, "requester")?,
        approver: column(row, "approver")?,
        source_request_id: column(row, "source_request_id")?,
        notes: column(row, "notes")?,
        created_at: column(row, "created_at")?,
    })
}

fn decode_payment(row: &PgRow) -> Result<PartialPayment, FundsError> {
    let mode: String = column(row, "mode")?;
    let amount_minor: i64 = column(row, "amount_minor")?;

    Ok(PartialPayment {
        id: column(row, "id")?,
        expense_id: column(row, "expense_id")?,
        amount_minor: from_db_amount(amount_minor)?,
        mode: parse_mode(&mode)?,
        reference: column(row, "reference")?,
        recorded_by: column(row, "recorded_by")?,
        request_key: column(row, "request_key")?,
        recorded_at: column(row, "recorded_at")?,
    })
}

fn decode_reminder(row: &PgRow) -> Result<PaymentReminder, FundsError> {
    let status: String = column(row, "status")?;

    Ok(PaymentReminder {
        id: column(row, "id")?,
        expense_id: column(row, "expense_id")?,
        due_at: column(row, "due_at")?,
        kind: column(row, "kind")?,
        message: column(row, "message")?,
        status: parse_reminder_status(&status)?,
        created_at: column(row, "created_at")?,
    })
}

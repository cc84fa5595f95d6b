//! Payment-reminder scheduling and the restartable due query.

use crate::error::FundsError;
use crate::types::{PaymentReminder, ReminderStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Build a reminder, rejecting anything not strictly in the future relative
/// to `now`.
pub fn build_reminder(
    expense_id: Uuid,
    due_at: DateTime<Utc>,
    kind: impl Into<String>,
    message: impl Into<String>,
    now: DateTime<Utc>,
) -> Result<PaymentReminder, FundsError> {
    if due_at <= now {
        return Err(FundsError::validation(
            "due_at_not_in_future",
            format!("due_at {due_at} is not strictly in the future"),
        ));
    }

    Ok(PaymentReminder {
        id: Uuid::new_v4(),
        expense_id,
        due_at,
        kind: kind.into(),
        message: message.into(),
        status: ReminderStatus::Scheduled,
        created_at: now,
    })
}

/// Keyset cursor over `(due_at, id)`. Re-running the query with the last
/// page's cursor resumes exactly where it stopped, so the due sequence is
/// finite and restartable even while new reminders are inserted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DueCursor {
    pub due_at: DateTime<Utc>,
    pub id: Uuid,
}

impl DueCursor {
    pub fn after(reminder: &PaymentReminder) -> Self {
        Self {
            due_at: reminder.due_at,
            id: reminder.id,
        }
    }
}

/// One page of scheduled reminders with `due_at <= as_of`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DueReminderPage {
    pub items: Vec<PaymentReminder>,
    pub next_cursor: Option<DueCursor>,
}

/// True when `reminder` sorts strictly after the cursor position.
pub fn past_cursor(reminder: &PaymentReminder, cursor: Option<&DueCursor>) -> bool {
    match cursor {
        None => true,
        Some(cursor) => {
            (reminder.due_at, reminder.id) > (cursor.due_at, cursor.id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn rejects_past_and_present_due_dates() {
        let now = Utc::now();
        let expense_id = Uuid::new_v4();

        let err = build_reminder(expense_id, now - Duration::days(1), "invoice", "m", now)
            .unwrap_err();
        assert_eq!(err.code(), "due_at_not_in_future");

        let err = build_reminder(expense_id, now, "invoice", "m", now).unwrap_err();
        assert_eq!(err.code(), "due_at_not_in_future");

        let reminder =
            build_reminder(expense_id, now + Duration::days(1), "invoice", "m", now).unwrap();
        assert_eq!(reminder.status, ReminderStatus::Scheduled);
    }

    #[test]
    fn cursor_orders_by_due_at_then_id() {
        let now = Utc::now();
        let first = build_reminder(Uuid::new_v4(), now + Duration::hours(1), "a", "m", now).unwrap();
        let second =
            build_reminder(Uuid::new_v4(), now + Duration::hours(2), "b", "m", now).unwrap();

        let cursor = DueCursor::after(&first);
        assert!(past_cursor(&second, Some(&cursor)));
        assert!(!past_cursor(&first, Some(&cursor)));
        assert!(past_cursor(&first, None));
    }
}

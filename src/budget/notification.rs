//! Notifications raised when a budget is exceeded.

use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;
use time::OffsetDateTime;

use crate::{DatabaseId, Error, Money, UserID, budget::BudgetId};

/// A notice that a budget was exceeded.
///
/// A budget has at most one active notification. It stays active until the
/// spending drops back to or below the limit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetNotification {
    /// The ID of the notification.
    pub id: DatabaseId,
    /// The user that was notified.
    pub user_id: UserID,
    /// The budget that was exceeded.
    pub budget_id: BudgetId,
    /// When the notification was raised.
    pub sent_at: OffsetDateTime,
    /// How much the spending exceeded the limit by when it was raised.
    pub exceeded_amount: Money,
    /// Whether the budget is still exceeded.
    pub active: bool,
}

/// What to do with a budget's notifications after its spending changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationAction {
    /// The budget has just been exceeded: raise a new notification.
    Raise {
        /// How much the spending exceeds the limit by.
        exceeded_amount: Money,
    },
    /// The budget is still exceeded and the user was already notified.
    Keep,
    /// The budget is not exceeded: deactivate any active notification.
    Clear,
}

/// Decide how a budget's notifications should change.
///
/// A budget is exceeded when `spent` is strictly greater than `limit`.
/// Only one notification is raised per breach, so an exceeded budget that
/// already has an active notification is left alone.
pub fn decide_notification(spent: Money, limit: Money, has_active: bool) -> NotificationAction {
    if spent > limit {
        if has_active {
            NotificationAction::Keep
        } else {
            NotificationAction::Raise {
                exceeded_amount: spent - limit,
            }
        }
    } else {
        NotificationAction::Clear
    }
}

/// Create the budget notification table in the database.
pub fn create_budget_notification_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS budget_notification (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            budget_id INTEGER NOT NULL,
            sent_at TEXT NOT NULL,
            exceeded_amount INTEGER NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(budget_id) REFERENCES budget(id) ON UPDATE CASCADE ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_budget_notification_active
            ON budget_notification(budget_id, active);",
    )?;

    Ok(())
}

/// Get the active notification of a budget, if there is one.
pub(super) fn get_active_notification(
    budget_id: BudgetId,
    connection: &Connection,
) -> Result<Option<BudgetNotification>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, budget_id, sent_at, exceeded_amount, active
             FROM budget_notification
             WHERE budget_id = ?1 AND active = 1
             ORDER BY id DESC LIMIT 1",
        )?
        .query_row((budget_id,), map_notification_row)
        .optional()
        .map_err(|error| error.into())
}

/// Record a new active notification for a budget.
pub(super) fn raise_notification(
    user_id: UserID,
    budget_id: BudgetId,
    exceeded_amount: Money,
    connection: &Connection,
) -> Result<BudgetNotification, Error> {
    connection
        .prepare(
            "INSERT INTO budget_notification (user_id, budget_id, sent_at, exceeded_amount, active)
             VALUES (?1, ?2, ?3, ?4, 1)
             RETURNING id, user_id, budget_id, sent_at, exceeded_amount, active",
        )?
        .query_row(
            (user_id, budget_id, OffsetDateTime::now_utc(), exceeded_amount),
            map_notification_row,
        )
        .map_err(|error| error.into())
}

/// Deactivate every active notification of a budget.
///
/// Returns the number of notifications that were deactivated.
pub(super) fn clear_notifications(
    budget_id: BudgetId,
    connection: &Connection,
) -> Result<usize, Error> {
    let rows_affected = connection.execute(
        "UPDATE budget_notification SET active = 0 WHERE budget_id = ?1 AND active = 1",
        (budget_id,),
    )?;

    Ok(rows_affected)
}

/// Get a user's active notifications, newest first.
pub fn get_active_notifications(
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<BudgetNotification>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, budget_id, sent_at, exceeded_amount, active
             FROM budget_notification
             WHERE user_id = ?1 AND active = 1
             ORDER BY sent_at DESC, id DESC",
        )?
        .query_map((user_id,), map_notification_row)?
        .map(|maybe_notification| maybe_notification.map_err(|error| error.into()))
        .collect()
}

fn map_notification_row(row: &Row) -> Result<BudgetNotification, rusqlite::Error> {
    let id = row.get(0)?;
    let user_id = row.get(1)?;
    let budget_id = row.get(2)?;
    let sent_at = row.get(3)?;
    let exceeded_amount = row.get(4)?;
    let active = row.get(5)?;

    Ok(BudgetNotification {
        id,
        user_id,
        budget_id,
        sent_at,
        exceeded_amount,
        active,
    })
}

#[cfg(test)]
mod decide_notification_tests {
    use crate::{
        Money,
        budget::{NotificationAction, decide_notification},
    };

    #[test]
    fn raises_when_first_exceeded() {
        let action = decide_notification(Money::from_cents(120_00), Money::from_cents(100_00), false);

        assert_eq!(
            action,
            NotificationAction::Raise {
                exceeded_amount: Money::from_cents(20_00)
            }
        );
    }

    #[test]
    fn keeps_existing_notification_while_exceeded() {
        let action = decide_notification(Money::from_cents(150_00), Money::from_cents(100_00), true);

        assert_eq!(action, NotificationAction::Keep);
    }

    #[test]
    fn spending_exactly_the_limit_is_not_exceeded() {
        let action = decide_notification(Money::from_cents(100_00), Money::from_cents(100_00), true);

        assert_eq!(action, NotificationAction::Clear);
    }

    #[test]
    fn clears_when_back_under_limit() {
        let action = decide_notification(Money::from_cents(10_00), Money::from_cents(100_00), true);

        assert_eq!(action, NotificationAction::Clear);
    }

    #[test]
    fn any_spending_exceeds_zero_limit() {
        let action = decide_notification(Money::from_cents(1), Money::ZERO, false);

        assert_eq!(
            action,
            NotificationAction::Raise {
                exceeded_amount: Money::from_cents(1)
            }
        );
    }
}

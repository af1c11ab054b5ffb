use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;
use time::Date;

use crate::{DatabaseId, Error, Money, UserID, YearMonth, category::CategoryId};

/// Database identifier for a budget.
pub type BudgetId = DatabaseId;

/// A spending limit for one month.
///
/// A budget without a category is the global budget for the month and
/// limits the total of all expenses. There is at most one budget per user,
/// month and category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Budget {
    /// The ID of the budget.
    pub id: BudgetId,
    /// The user the budget belongs to.
    pub user_id: UserID,
    /// The month the limit applies to.
    pub month: YearMonth,
    /// The category the limit applies to, or `None` for the global budget.
    pub category_id: Option<CategoryId>,
    /// The most that should be spent in the month.
    pub limit: Money,
}

/// Create the budget table in the database.
pub fn create_budget_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS budget (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            month TEXT NOT NULL,
            category_id INTEGER,
            limit_amount INTEGER NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(category_id) REFERENCES category(id) ON UPDATE CASCADE ON DELETE CASCADE
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_budget_user_month_category
            ON budget(user_id, month, IFNULL(category_id, 0));",
    )?;

    Ok(())
}

/// Set the limit for a user's month and category, creating the budget if it
/// does not exist yet.
///
/// # Errors
/// Returns [Error::InvalidBudgetLimit] if `limit` is negative or larger than
/// [Money::MAX].
pub fn upsert_budget(
    user_id: UserID,
    month: YearMonth,
    category_id: Option<CategoryId>,
    limit: Money,
    connection: &Connection,
) -> Result<Budget, Error> {
    if limit < Money::ZERO || !limit.is_within_limit() {
        return Err(Error::InvalidBudgetLimit(limit));
    }

    let budget = match get_budget(user_id, month, category_id, connection)? {
        Some(budget) => connection
            .prepare(
                "UPDATE budget SET limit_amount = ?1, updated_at = CURRENT_TIMESTAMP
                 WHERE id = ?2
                 RETURNING id, user_id, month, category_id, limit_amount",
            )?
            .query_row((limit, budget.id), map_budget_row)?,
        None => connection
            .prepare(
                "INSERT INTO budget (user_id, month, category_id, limit_amount)
                 VALUES (?1, ?2, ?3, ?4)
                 RETURNING id, user_id, month, category_id, limit_amount",
            )?
            .query_row(
                (user_id, month.first_day(), category_id, limit),
                map_budget_row,
            )?,
    };

    tracing::debug!(
        "Set budget {} for user {user_id} in {month} (category {category_id:?}) to {limit}",
        budget.id
    );

    Ok(budget)
}

/// Get the budget for a user's month and category, if one has been set.
///
/// Pass `None` as the category to get the global budget.
pub fn get_budget(
    user_id: UserID,
    month: YearMonth,
    category_id: Option<CategoryId>,
    connection: &Connection,
) -> Result<Option<Budget>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, month, category_id, limit_amount FROM budget
             WHERE user_id = ?1 AND month = ?2 AND category_id IS ?3",
        )?
        .query_row((user_id, month.first_day(), category_id), map_budget_row)
        .optional()
        .map_err(|error| error.into())
}

/// Get every budget of a user's month, with the global budget first.
pub fn get_budgets_for_month(
    user_id: UserID,
    month: YearMonth,
    connection: &Connection,
) -> Result<Vec<Budget>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, month, category_id, limit_amount FROM budget
             WHERE user_id = ?1 AND month = ?2
             ORDER BY category_id IS NOT NULL, category_id",
        )?
        .query_map((user_id, month.first_day()), map_budget_row)?
        .map(|maybe_budget| maybe_budget.map_err(|error| error.into()))
        .collect()
}

/// Get the months that have at least one budget, newest first.
pub(super) fn get_budgeted_months(
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<YearMonth>, Error> {
    connection
        .prepare("SELECT DISTINCT month FROM budget WHERE user_id = ?1 ORDER BY month DESC")?
        .query_map((user_id,), |row| row.get::<_, Date>(0))?
        .map(|maybe_date| {
            maybe_date
                .map(YearMonth::containing)
                .map_err(|error| error.into())
        })
        .collect()
}

/// Delete the budget of a single category in a month.
pub(super) fn delete_budget(
    user_id: UserID,
    month: YearMonth,
    category_id: CategoryId,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "DELETE FROM budget WHERE user_id = ?1 AND month = ?2 AND category_id = ?3",
        (user_id, month.first_day(), category_id),
    )?;

    Ok(())
}

/// Delete every budget of a user's month, along with their notifications.
///
/// Returns the number of budgets deleted.
pub fn delete_month_budget(
    user_id: UserID,
    month: YearMonth,
    connection: &Connection,
) -> Result<usize, Error> {
    let rows_affected = connection.execute(
        "DELETE FROM budget WHERE user_id = ?1 AND month = ?2",
        (user_id, month.first_day()),
    )?;

    tracing::info!("Deleted {rows_affected} budgets for user {user_id} in {month}");

    Ok(rows_affected)
}

fn map_budget_row(row: &Row) -> Result<Budget, rusqlite::Error> {
    let id = row.get(0)?;
    let user_id = row.get(1)?;
    let month: Date = row.get(2)?;
    let category_id = row.get(3)?;
    let limit = row.get(4)?;

    Ok(Budget {
        id,
        user_id,
        month: YearMonth::containing(month),
        category_id,
        limit,
    })
}

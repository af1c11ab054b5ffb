//! Monthly totals for the overview page.

use rusqlite::Connection;
use serde::Serialize;

use crate::{
    Error, Money, UserID, YearMonth,
    account::{Account, get_accounts_by_user, get_net_worth},
    budget::calculate_spending,
};

/// How much was spent in one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySpending {
    /// The category's name, or [UNCATEGORIZED] for expenses without one.
    pub name: String,
    /// The total of the category's expenses.
    pub total: Money,
}

/// The label for expenses without a category.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// A user's finances for one month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyOverview {
    /// The month being summarised.
    pub month: YearMonth,
    /// The total of the month's incomes.
    pub total_income: Money,
    /// The total of the month's expenses.
    pub total_expenses: Money,
    /// Income minus expenses.
    pub net_cash_flow: Money,
    /// The current total of all non-credit account balances.
    pub net_worth: Money,
    /// The user's accounts with their current balances.
    pub accounts: Vec<Account>,
    /// Expense totals per category, largest first.
    pub spending_by_category: Vec<CategorySpending>,
}

/// Summarise a user's income and spending for `month`.
pub fn get_monthly_overview(
    user_id: UserID,
    month: YearMonth,
    connection: &Connection,
) -> Result<MonthlyOverview, Error> {
    let total_income = get_total_income(user_id, month, connection)?;
    let total_expenses = calculate_spending(user_id, month, None, connection)?;

    Ok(MonthlyOverview {
        month,
        total_income,
        total_expenses,
        net_cash_flow: total_income - total_expenses,
        net_worth: get_net_worth(user_id, connection)?,
        accounts: get_accounts_by_user(user_id, connection)?,
        spending_by_category: get_spending_by_category(user_id, month, connection)?,
    })
}

fn get_total_income(
    user_id: UserID,
    month: YearMonth,
    connection: &Connection,
) -> Result<Money, Error> {
    let total: Money = connection
        .prepare(
            "SELECT COALESCE(SUM(amount), 0) FROM income
             WHERE user_id = ?1 AND date >= ?2 AND date < ?3",
        )?
        .query_row(
            (user_id, month.first_day(), month.next_first_day()),
            |row| row.get(0),
        )?;

    Ok(total)
}

fn get_spending_by_category(
    user_id: UserID,
    month: YearMonth,
    connection: &Connection,
) -> Result<Vec<CategorySpending>, Error> {
    connection
        .prepare(
            "SELECT COALESCE(c.name, ?4) AS label, SUM(e.amount) AS total
             FROM expense e
             LEFT JOIN category c ON c.id = e.category_id
             WHERE e.user_id = ?1 AND e.date >= ?2 AND e.date < ?3
             GROUP BY label
             ORDER BY total DESC, label ASC",
        )?
        .query_map(
            (
                user_id,
                month.first_day(),
                month.next_first_day(),
                UNCATEGORIZED,
            ),
            |row| {
                Ok(CategorySpending {
                    name: row.get(0)?,
                    total: row.get(1)?,
                })
            },
        )?
        .map(|maybe_spending| maybe_spending.map_err(|error| error.into()))
        .collect()
}

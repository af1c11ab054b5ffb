//! Money spent from an account.

use rusqlite::{Connection, Row};
use serde::Serialize;
use time::Date;

use crate::{
    DatabaseId, Error, Money, UserID, YearMonth,
    account::{AccountId, validate_account},
    budget::check_budgets_for_expense,
    category::{CategoryId, CategoryKind, validate_category},
    ledger::{
        BalanceEffect, LedgerEntry, apply_effects, reverse_effects, validate_amount,
    },
};

/// Database identifier for an expense.
pub type ExpenseId = DatabaseId;

/// Money that was spent.
///
/// To create a new `Expense`, use [Expense::build].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expense {
    /// The ID of the expense.
    pub id: ExpenseId,
    /// The user that spent the money.
    pub user_id: UserID,
    /// The account the money was spent from, if any.
    pub account_id: Option<AccountId>,
    /// The expense category, if any.
    pub category_id: Option<CategoryId>,
    /// The amount spent. Always positive.
    pub amount: Money,
    /// What the money was spent on.
    pub description: String,
    /// When the money was spent.
    pub date: Date,
}

impl Expense {
    /// Start building a new expense.
    ///
    /// Shortcut for [ExpenseBuilder] for discoverability.
    pub fn build(amount: Money, date: Date, description: &str) -> ExpenseBuilder {
        ExpenseBuilder {
            amount,
            date,
            description: description.to_owned(),
            account_id: None,
            category_id: None,
        }
    }
}

impl LedgerEntry for Expense {
    fn balance_effects(&self) -> Vec<BalanceEffect> {
        self.account_id
            .map(|account_id| BalanceEffect {
                account_id,
                delta: -self.amount,
            })
            .into_iter()
            .collect()
    }
}

/// The fields of an expense that are set when creating or editing it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseBuilder {
    /// The amount spent. Must be greater than zero.
    pub amount: Money,
    /// When the money was spent.
    pub date: Date,
    /// What the money was spent on.
    pub description: String,
    /// The account the money was spent from.
    pub account_id: Option<AccountId>,
    /// The expense category.
    pub category_id: Option<CategoryId>,
}

impl ExpenseBuilder {
    /// Set the account the money was spent from.
    pub fn account_id(mut self, account_id: Option<AccountId>) -> Self {
        self.account_id = account_id;
        self
    }

    /// Set the expense category.
    pub fn category_id(mut self, category_id: Option<CategoryId>) -> Self {
        self.category_id = category_id;
        self
    }

    fn validate(&self, user_id: UserID, connection: &Connection) -> Result<(), Error> {
        validate_amount(self.amount)?;
        validate_account(self.account_id, user_id, connection)?;
        validate_category(self.category_id, CategoryKind::Expense, user_id, connection)
    }
}

/// Record an expense, withdraw it from its account and re-evaluate the
/// budgets for its month.
///
/// # Errors
/// This function will return a:
/// - [Error::NonPositiveAmount] if the amount is zero or less,
/// - [Error::InvalidAmount] if the amount is larger than [Money::MAX],
/// - [Error::InvalidAccount] if the account does not belong to the user,
/// - [Error::InvalidCategory] if the category is not one of the user's expense categories,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_expense(
    user_id: UserID,
    builder: ExpenseBuilder,
    connection: &Connection,
) -> Result<Expense, Error> {
    builder.validate(user_id, connection)?;

    let tx = connection.unchecked_transaction()?;
    let expense = insert_expense(user_id, builder, &tx)?;
    check_budgets_for_expense(user_id, expense.date, expense.category_id, &tx)?;
    tx.commit()?;

    tracing::info!(
        "User {user_id} recorded expense {} of {} on {}",
        expense.id,
        expense.amount,
        expense.date
    );

    Ok(expense)
}

/// Insert an already validated expense and apply its balance effects without
/// starting a transaction or evaluating budgets.
pub(crate) fn insert_expense(
    user_id: UserID,
    builder: ExpenseBuilder,
    connection: &Connection,
) -> Result<Expense, Error> {
    let expense = connection
        .prepare(
            "INSERT INTO expense (user_id, account_id, category_id, amount, description, date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             RETURNING id, user_id, account_id, category_id, amount, description, date",
        )?
        .query_row(
            (
                user_id,
                builder.account_id,
                builder.category_id,
                builder.amount,
                builder.description,
                builder.date,
            ),
            map_expense_row,
        )?;

    apply_effects(&expense, connection)?;

    Ok(expense)
}

/// Retrieve an expense owned by `user_id`.
///
/// # Errors
/// Returns [Error::NotFound] if the expense does not exist or belongs to
/// another user.
pub fn get_expense(
    expense_id: ExpenseId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Expense, Error> {
    connection
        .prepare(
            "SELECT id, user_id, account_id, category_id, amount, description, date
             FROM expense WHERE id = :id AND user_id = :user_id",
        )?
        .query_row(
            rusqlite::named_params! {":id": expense_id, ":user_id": user_id},
            map_expense_row,
        )
        .map_err(|error| error.into())
}

/// Retrieve all of a user's expenses, newest first.
pub fn get_expenses_by_user(user_id: UserID, connection: &Connection) -> Result<Vec<Expense>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, account_id, category_id, amount, description, date
             FROM expense WHERE user_id = :user_id ORDER BY date DESC, id DESC",
        )?
        .query_map(&[(":user_id", &user_id)], map_expense_row)?
        .map(|maybe_expense| maybe_expense.map_err(|error| error.into()))
        .collect()
}

/// Replace the details of an expense.
///
/// The old amount is put back into the old account before the new amount is
/// withdrawn from the new account. Budgets are re-evaluated for both the old
/// and the new month and category.
///
/// # Errors
/// Returns [Error::UpdateMissingExpense] if the expense does not exist, plus
/// the validation errors of [create_expense].
pub fn update_expense(
    expense_id: ExpenseId,
    user_id: UserID,
    builder: ExpenseBuilder,
    connection: &Connection,
) -> Result<Expense, Error> {
    builder.validate(user_id, connection)?;

    let tx = connection.unchecked_transaction()?;

    let old_expense = get_expense(expense_id, user_id, &tx).map_err(|error| match error {
        Error::NotFound => Error::UpdateMissingExpense,
        error => error,
    })?;

    let new_expense = tx
        .prepare(
            "UPDATE expense
             SET account_id = ?1, category_id = ?2, amount = ?3, description = ?4, date = ?5
             WHERE id = ?6 AND user_id = ?7
             RETURNING id, user_id, account_id, category_id, amount, description, date",
        )?
        .query_row(
            (
                builder.account_id,
                builder.category_id,
                builder.amount,
                builder.description,
                builder.date,
                expense_id,
                user_id,
            ),
            map_expense_row,
        )?;

    reverse_effects(&old_expense, &tx)?;
    apply_effects(&new_expense, &tx)?;

    check_budgets_for_expense(user_id, new_expense.date, new_expense.category_id, &tx)?;
    if YearMonth::containing(old_expense.date) != YearMonth::containing(new_expense.date)
        || old_expense.category_id != new_expense.category_id
    {
        check_budgets_for_expense(user_id, old_expense.date, old_expense.category_id, &tx)?;
    }

    tx.commit()?;

    tracing::info!("User {user_id} updated expense {expense_id}");

    Ok(new_expense)
}

/// Delete an expense, put its amount back into its account and re-evaluate
/// the budgets for its month.
///
/// # Errors
/// Returns [Error::DeleteMissingExpense] if the expense does not exist.
pub fn delete_expense(
    expense_id: ExpenseId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let tx = connection.unchecked_transaction()?;

    let expense = get_expense(expense_id, user_id, &tx).map_err(|error| match error {
        Error::NotFound => Error::DeleteMissingExpense,
        error => error,
    })?;

    tx.execute(
        "DELETE FROM expense WHERE id = ?1 AND user_id = ?2",
        (expense_id, user_id),
    )?;
    reverse_effects(&expense, &tx)?;
    check_budgets_for_expense(user_id, expense.date, expense.category_id, &tx)?;

    tx.commit()?;

    tracing::info!("User {user_id} deleted expense {expense_id}");

    Ok(())
}

/// Create the expense table in the database.
pub(crate) fn create_expense_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS expense (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            account_id INTEGER,
            category_id INTEGER,
            amount INTEGER NOT NULL,
            description TEXT NOT NULL,
            date TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(account_id) REFERENCES account(id) ON UPDATE CASCADE ON DELETE SET NULL,
            FOREIGN KEY(category_id) REFERENCES category(id) ON UPDATE CASCADE ON DELETE SET NULL
        );

        CREATE INDEX IF NOT EXISTS idx_expense_user_date ON expense(user_id, date, category_id);",
    )?;

    Ok(())
}

fn map_expense_row(row: &Row) -> Result<Expense, rusqlite::Error> {
    let id = row.get(0)?;
    let user_id = row.get(1)?;
    let account_id = row.get(2)?;
    let category_id = row.get(3)?;
    let amount = row.get(4)?;
    let description = row.get(5)?;
    let date = row.get(6)?;

    Ok(Expense {
        id,
        user_id,
        account_id,
        category_id,
        amount,
        description,
        date,
    })
}

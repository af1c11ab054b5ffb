//! Money earned into an account.

use rusqlite::{Connection, Row};
use serde::Serialize;
use time::Date;

use crate::{
    DatabaseId, Error, Money, UserID,
    account::{AccountId, validate_account},
    category::{CategoryId, CategoryKind, validate_category},
    ledger::{BalanceEffect, LedgerEntry, apply_effects, reverse_effects, validate_amount},
};

/// Database identifier for an income.
pub type IncomeId = DatabaseId;

/// Money that was earned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Income {
    /// The ID of the income.
    pub id: IncomeId,
    /// The user that earned the money.
    pub user_id: UserID,
    /// The account the money was paid into, if any.
    pub account_id: Option<AccountId>,
    /// The income category, if any.
    pub category_id: Option<CategoryId>,
    /// The amount earned. Always positive.
    pub amount: Money,
    /// Where the money came from. May be empty when a category is set.
    pub source: String,
    /// When the money was earned.
    pub date: Date,
}

impl Income {
    /// Start building a new income.
    pub fn build(amount: Money, date: Date, source: &str) -> IncomeBuilder {
        IncomeBuilder {
            amount,
            date,
            source: source.to_owned(),
            account_id: None,
            category_id: None,
        }
    }
}

impl LedgerEntry for Income {
    fn balance_effects(&self) -> Vec<BalanceEffect> {
        self.account_id
            .map(|account_id| BalanceEffect {
                account_id,
                delta: self.amount,
            })
            .into_iter()
            .collect()
    }
}

/// The fields of an income that are set when creating or editing it.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomeBuilder {
    /// The amount earned. Must be greater than zero.
    pub amount: Money,
    /// When the money was earned.
    pub date: Date,
    /// Where the money came from.
    pub source: String,
    /// The account the money was paid into.
    pub account_id: Option<AccountId>,
    /// The income category.
    pub category_id: Option<CategoryId>,
}

impl IncomeBuilder {
    /// Set the account the money was paid into.
    pub fn account_id(mut self, account_id: Option<AccountId>) -> Self {
        self.account_id = account_id;
        self
    }

    /// Set the income category.
    pub fn category_id(mut self, category_id: Option<CategoryId>) -> Self {
        self.category_id = category_id;
        self
    }

    fn validate(&self, user_id: UserID, connection: &Connection) -> Result<(), Error> {
        validate_amount(self.amount)?;
        validate_account(self.account_id, user_id, connection)?;
        validate_category(self.category_id, CategoryKind::Income, user_id, connection)
    }
}

/// Record an income and deposit it into its account.
///
/// # Errors
/// This function will return a:
/// - [Error::NonPositiveAmount] if the amount is zero or less,
/// - [Error::InvalidAccount] if the account does not belong to the user,
/// - [Error::InvalidCategory] if the category is not one of the user's income categories,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_income(
    user_id: UserID,
    builder: IncomeBuilder,
    connection: &Connection,
) -> Result<Income, Error> {
    builder.validate(user_id, connection)?;

    let tx = connection.unchecked_transaction()?;
    let income = insert_income(user_id, builder, &tx)?;
    tx.commit()?;

    tracing::info!(
        "User {user_id} recorded income {} of {} on {}",
        income.id,
        income.amount,
        income.date
    );

    Ok(income)
}

/// Insert an already validated income and apply its balance effects without
/// starting a transaction.
pub(crate) fn insert_income(
    user_id: UserID,
    builder: IncomeBuilder,
    connection: &Connection,
) -> Result<Income, Error> {
    let income = connection
        .prepare(
            "INSERT INTO income (user_id, account_id, category_id, amount, source, date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             RETURNING id, user_id, account_id, category_id, amount, source, date",
        )?
        .query_row(
            (
                user_id,
                builder.account_id,
                builder.category_id,
                builder.amount,
                builder.source,
                builder.date,
            ),
            map_income_row,
        )?;

    apply_effects(&income, connection)?;

    Ok(income)
}

/// Retrieve an income owned by `user_id`.
///
/// # Errors
/// Returns [Error::NotFound] if the income does not exist or belongs to
/// another user.
pub fn get_income(
    income_id: IncomeId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Income, Error> {
    connection
        .prepare(
            "SELECT id, user_id, account_id, category_id, amount, source, date
             FROM income WHERE id = :id AND user_id = :user_id",
        )?
        .query_row(
            rusqlite::named_params! {":id": income_id, ":user_id": user_id},
            map_income_row,
        )
        .map_err(|error| error.into())
}

/// Retrieve all of a user's incomes, newest first.
pub fn get_incomes_by_user(user_id: UserID, connection: &Connection) -> Result<Vec<Income>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, account_id, category_id, amount, source, date
             FROM income WHERE user_id = :user_id ORDER BY date DESC, id DESC",
        )?
        .query_map(&[(":user_id", &user_id)], map_income_row)?
        .map(|maybe_income| maybe_income.map_err(|error| error.into()))
        .collect()
}

/// Replace the details of an income.
///
/// The old amount is taken back out of the old account before the new amount
/// is paid into the new account.
///
/// # Errors
/// Returns [Error::UpdateMissingIncome] if the income does not exist, plus
/// the validation errors of [create_income].
pub fn update_income(
    income_id: IncomeId,
    user_id: UserID,
    builder: IncomeBuilder,
    connection: &Connection,
) -> Result<Income, Error> {
    builder.validate(user_id, connection)?;

    let tx = connection.unchecked_transaction()?;

    let old_income = get_income(income_id, user_id, &tx).map_err(|error| match error {
        Error::NotFound => Error::UpdateMissingIncome,
        error => error,
    })?;

    let new_income = tx
        .prepare(
            "UPDATE income
             SET account_id = ?1, category_id = ?2, amount = ?3, source = ?4, date = ?5
             WHERE id = ?6 AND user_id = ?7
             RETURNING id, user_id, account_id, category_id, amount, source, date",
        )?
        .query_row(
            (
                builder.account_id,
                builder.category_id,
                builder.amount,
                builder.source,
                builder.date,
                income_id,
                user_id,
            ),
            map_income_row,
        )?;

    reverse_effects(&old_income, &tx)?;
    apply_effects(&new_income, &tx)?;

    tx.commit()?;

    tracing::info!("User {user_id} updated income {income_id}");

    Ok(new_income)
}

/// Delete an income and take its amount back out of its account.
///
/// # Errors
/// Returns [Error::DeleteMissingIncome] if the income does not exist.
pub fn delete_income(
    income_id: IncomeId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let tx = connection.unchecked_transaction()?;

    let income = get_income(income_id, user_id, &tx).map_err(|error| match error {
        Error::NotFound => Error::DeleteMissingIncome,
        error => error,
    })?;

    tx.execute(
        "DELETE FROM income WHERE id = ?1 AND user_id = ?2",
        (income_id, user_id),
    )?;
    reverse_effects(&income, &tx)?;

    tx.commit()?;

    tracing::info!("User {user_id} deleted income {income_id}");

    Ok(())
}

/// Create the income table in the database.
pub(crate) fn create_income_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS income (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            account_id INTEGER,
            category_id INTEGER,
            amount INTEGER NOT NULL,
            source TEXT NOT NULL DEFAULT '',
            date TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(account_id) REFERENCES account(id) ON UPDATE CASCADE ON DELETE SET NULL,
            FOREIGN KEY(category_id) REFERENCES category(id) ON UPDATE CASCADE ON DELETE SET NULL
        );

        CREATE INDEX IF NOT EXISTS idx_income_user_date ON income(user_id, date);",
    )?;

    Ok(())
}

fn map_income_row(row: &Row) -> Result<Income, rusqlite::Error> {
    let id = row.get(0)?;
    let user_id = row.get(1)?;
    let account_id = row.get(2)?;
    let category_id = row.get(3)?;
    let amount = row.get(4)?;
    let source = row.get(5)?;
    let date = row.get(6)?;

    Ok(Income {
        id,
        user_id,
        account_id,
        category_id,
        amount,
        source,
        date,
    })
}

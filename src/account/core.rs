use std::{fmt::Display, str::FromStr};

use rusqlite::{
    Connection, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};

use crate::{DatabaseId, Error, Money, UserID};

/// Database identifier for an account.
pub type AccountId = DatabaseId;

/// The broad type of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    /// An everyday transaction account.
    Checking,
    /// A savings account.
    Savings,
    /// A credit card. Excluded from net worth.
    Credit,
    /// Physical cash.
    Cash,
    /// An investment account.
    Investment,
    /// Anything else.
    Other,
}

impl AccountKind {
    fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Checking => "checking",
            AccountKind::Savings => "savings",
            AccountKind::Credit => "credit",
            AccountKind::Cash => "cash",
            AccountKind::Investment => "investment",
            AccountKind::Other => "other",
        }
    }
}

impl FromStr for AccountKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "checking" => Ok(AccountKind::Checking),
            "savings" => Ok(AccountKind::Savings),
            "credit" => Ok(AccountKind::Credit),
            "cash" => Ok(AccountKind::Cash),
            "investment" => Ok(AccountKind::Investment),
            "other" => Ok(AccountKind::Other),
            _ => Err(Error::InvalidAccountKind(s.to_owned())),
        }
    }
}

impl Display for AccountKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for AccountKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for AccountKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: Error| FromSqlError::Other(error.to_string().into()))
    }
}

/// The amount of money available in a bank account or credit card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    /// The id for the account.
    pub id: AccountId,
    /// The user that owns the account.
    pub user_id: UserID,
    /// The name of the account, e.g. "Everyday".
    pub name: String,
    /// The type of account.
    pub kind: AccountKind,
    /// The current balance.
    pub balance: Money,
}

/// Create the account table in the database.
pub fn create_account_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS account (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            kind TEXT NOT NULL DEFAULT 'checking',
            balance INTEGER NOT NULL DEFAULT 0,
            UNIQUE(user_id, name),
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_account_user ON account(user_id);",
    )?;

    Ok(())
}

fn map_row_to_account(row: &Row) -> Result<Account, rusqlite::Error> {
    let id = row.get(0)?;
    let user_id = row.get(1)?;
    let name = row.get(2)?;
    let kind = row.get(3)?;
    let balance = row.get(4)?;

    Ok(Account {
        id,
        user_id,
        name,
        kind,
        balance,
    })
}

fn map_unique_error(name: &str) -> impl FnOnce(rusqlite::Error) -> Error {
    move |error| match error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: _,
                extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
            },
            _,
        ) => Error::DuplicateAccountName(name.to_owned()),
        error => error.into(),
    }
}

/// Create an account for `user_id` with an opening `balance`.
///
/// # Errors
/// Returns [Error::EmptyAccountName] if `name` is blank, or
/// [Error::DuplicateAccountName] if the user already has an account with that name.
pub fn create_account(
    user_id: UserID,
    name: &str,
    kind: AccountKind,
    balance: Money,
    connection: &Connection,
) -> Result<Account, Error> {
    let name = name.trim();

    if name.is_empty() {
        return Err(Error::EmptyAccountName);
    }

    let account = connection
        .prepare(
            "INSERT INTO account (user_id, name, kind, balance) VALUES (?1, ?2, ?3, ?4)
             RETURNING id, user_id, name, kind, balance",
        )?
        .query_row((user_id, name, kind, balance), map_row_to_account)
        .map_err(map_unique_error(name))?;

    tracing::info!(
        "Created account {} \"{}\" for user {user_id} with balance {balance}",
        account.id,
        account.name
    );

    Ok(account)
}

/// Retrieve an account owned by `user_id`.
///
/// # Errors
/// Returns [Error::NotFound] if the account does not exist or belongs to
/// another user.
pub fn get_account(
    account_id: AccountId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Account, Error> {
    connection
        .prepare(
            "SELECT id, user_id, name, kind, balance FROM account
             WHERE id = :id AND user_id = :user_id",
        )?
        .query_row(
            rusqlite::named_params! {":id": account_id, ":user_id": user_id},
            map_row_to_account,
        )
        .map_err(|error| error.into())
}

/// Retrieve all of a user's accounts ordered by name.
pub fn get_accounts_by_user(user_id: UserID, connection: &Connection) -> Result<Vec<Account>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, name, kind, balance FROM account
             WHERE user_id = :user_id ORDER BY name ASC",
        )?
        .query_map(&[(":user_id", &user_id)], map_row_to_account)?
        .map(|maybe_account| maybe_account.map_err(|error| error.into()))
        .collect()
}

/// Check that `account_id`, if any, refers to an account owned by `user_id`.
///
/// # Errors
/// Returns [Error::InvalidAccount] if it does not.
pub(crate) fn validate_account(
    account_id: Option<AccountId>,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let Some(account_id) = account_id else {
        return Ok(());
    };

    match get_account(account_id, user_id, connection) {
        Ok(_) => Ok(()),
        Err(Error::NotFound) => Err(Error::InvalidAccount(account_id)),
        Err(error) => Err(error),
    }
}

/// Overwrite the name, type and balance of an account.
///
/// Setting the balance directly does not touch any recorded expenses,
/// incomes or transfers.
///
/// # Errors
/// Returns [Error::UpdateMissingAccount] if the account doesn't exist, or
/// [Error::DuplicateAccountName] if the new name is taken.
pub fn update_account(
    account_id: AccountId,
    user_id: UserID,
    name: &str,
    kind: AccountKind,
    balance: Money,
    connection: &Connection,
) -> Result<(), Error> {
    let name = name.trim();

    if name.is_empty() {
        return Err(Error::EmptyAccountName);
    }

    let rows_affected = connection
        .execute(
            "UPDATE account SET name = ?1, kind = ?2, balance = ?3 WHERE id = ?4 AND user_id = ?5",
            (name, kind, balance, account_id, user_id),
        )
        .map_err(map_unique_error(name))?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingAccount);
    }

    Ok(())
}

/// Delete an account.
///
/// Entries that referenced the account are kept but no longer refer to any account.
///
/// # Errors
/// Returns [Error::DeleteMissingAccount] if the account doesn't exist.
pub fn delete_account(
    account_id: AccountId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM account WHERE id = ?1 AND user_id = ?2",
        (account_id, user_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingAccount);
    }

    tracing::info!("Deleted account {account_id} for user {user_id}");

    Ok(())
}

/// Add `delta` to the balance of an account.
///
/// # Errors
/// Returns [Error::NotFound] if the account does not exist.
pub fn adjust_balance(
    account_id: AccountId,
    delta: Money,
    connection: &Connection,
) -> Result<Money, Error> {
    let balance: Money = connection
        .prepare("UPDATE account SET balance = balance + ?1 WHERE id = ?2 RETURNING balance")?
        .query_row((delta, account_id), |row| row.get(0))?;

    tracing::debug!("Adjusted balance of account {account_id} by {delta} to {balance}");

    Ok(balance)
}

/// Get the total balance of a user's accounts, excluding credit cards.
///
/// # Errors
/// Returns [Error::SqlError] if the SQL query fails.
pub fn get_net_worth(user_id: UserID, connection: &Connection) -> Result<Money, Error> {
    let mut stmt = connection.prepare(
        "SELECT COALESCE(SUM(balance), 0) FROM account WHERE user_id = ?1 AND kind != ?2",
    )?;

    let total: Money = stmt.query_row((user_id, AccountKind::Credit), |row| row.get(0))?;

    Ok(total)
}

#[cfg(test)]
mod account_kind_tests {
    use crate::{Error, account::AccountKind};

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Credit".parse(), Ok(AccountKind::Credit));
        assert_eq!(" savings ".parse(), Ok(AccountKind::Savings));
    }

    #[test]
    fn rejects_unknown_kind() {
        assert_eq!(
            "piggy bank".parse::<AccountKind>(),
            Err(Error::InvalidAccountKind("piggy bank".to_owned()))
        );
    }
}

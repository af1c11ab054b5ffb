//! Money moved between two of a user's accounts.

use rusqlite::{Connection, Row};
use serde::Serialize;
use time::Date;

use crate::{
    DatabaseId, Error, Money, UserID,
    account::{AccountId, validate_account},
    ledger::{BalanceEffect, LedgerEntry, apply_effects, reverse_effects, validate_amount},
};

/// Database identifier for a transfer.
pub type TransferId = DatabaseId;

/// Money moved from one account to another.
///
/// Either account may be `None` if it has since been deleted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transfer {
    /// The ID of the transfer.
    pub id: TransferId,
    /// The user that owns both accounts.
    pub user_id: UserID,
    /// The account the money left.
    pub from_account_id: Option<AccountId>,
    /// The account the money arrived in.
    pub to_account_id: Option<AccountId>,
    /// The amount moved. Always positive.
    pub amount: Money,
    /// A note about the transfer.
    pub description: String,
    /// When the money was moved.
    pub date: Date,
}

impl Transfer {
    /// Start building a transfer of `amount` from one account to another.
    pub fn build(
        amount: Money,
        date: Date,
        from_account_id: AccountId,
        to_account_id: AccountId,
    ) -> TransferBuilder {
        TransferBuilder {
            amount,
            date,
            description: String::new(),
            from_account_id,
            to_account_id,
        }
    }
}

impl LedgerEntry for Transfer {
    fn balance_effects(&self) -> Vec<BalanceEffect> {
        let withdrawal = self.from_account_id.map(|account_id| BalanceEffect {
            account_id,
            delta: -self.amount,
        });
        let deposit = self.to_account_id.map(|account_id| BalanceEffect {
            account_id,
            delta: self.amount,
        });

        withdrawal.into_iter().chain(deposit).collect()
    }
}

/// The fields of a transfer that are set when creating or editing it.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferBuilder {
    /// The amount moved. Must be greater than zero.
    pub amount: Money,
    /// When the money was moved.
    pub date: Date,
    /// A note about the transfer.
    pub description: String,
    /// The account the money leaves.
    pub from_account_id: AccountId,
    /// The account the money arrives in. Must differ from `from_account_id`.
    pub to_account_id: AccountId,
}

impl TransferBuilder {
    /// Set the note for the transfer.
    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_owned();
        self
    }

    fn validate(&self, user_id: UserID, connection: &Connection) -> Result<(), Error> {
        validate_amount(self.amount)?;

        if self.from_account_id == self.to_account_id {
            return Err(Error::SameAccountTransfer);
        }

        validate_account(Some(self.from_account_id), user_id, connection)?;
        validate_account(Some(self.to_account_id), user_id, connection)
    }
}

/// Record a transfer and move the money between the two accounts.
///
/// # Errors
/// This function will return a:
/// - [Error::NonPositiveAmount] if the amount is zero or less,
/// - [Error::SameAccountTransfer] if both accounts are the same,
/// - [Error::InvalidAccount] if either account does not belong to the user,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transfer(
    user_id: UserID,
    builder: TransferBuilder,
    connection: &Connection,
) -> Result<Transfer, Error> {
    builder.validate(user_id, connection)?;

    let tx = connection.unchecked_transaction()?;

    let transfer = tx
        .prepare(
            "INSERT INTO transfer (user_id, from_account_id, to_account_id, amount, description, date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             RETURNING id, user_id, from_account_id, to_account_id, amount, description, date",
        )?
        .query_row(
            (
                user_id,
                builder.from_account_id,
                builder.to_account_id,
                builder.amount,
                builder.description,
                builder.date,
            ),
            map_transfer_row,
        )?;

    apply_effects(&transfer, &tx)?;
    tx.commit()?;

    tracing::info!(
        "User {user_id} transferred {} from account {} to account {}",
        transfer.amount,
        builder.from_account_id,
        builder.to_account_id
    );

    Ok(transfer)
}

/// Retrieve a transfer owned by `user_id`.
///
/// # Errors
/// Returns [Error::NotFound] if the transfer does not exist or belongs to
/// another user.
pub fn get_transfer(
    transfer_id: TransferId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Transfer, Error> {
    connection
        .prepare(
            "SELECT id, user_id, from_account_id, to_account_id, amount, description, date
             FROM transfer WHERE id = :id AND user_id = :user_id",
        )?
        .query_row(
            rusqlite::named_params! {":id": transfer_id, ":user_id": user_id},
            map_transfer_row,
        )
        .map_err(|error| error.into())
}

/// Retrieve all of a user's transfers, newest first.
pub fn get_transfers_by_user(
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<Transfer>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, from_account_id, to_account_id, amount, description, date
             FROM transfer WHERE user_id = :user_id ORDER BY date DESC, id DESC",
        )?
        .query_map(&[(":user_id", &user_id)], map_transfer_row)?
        .map(|maybe_transfer| maybe_transfer.map_err(|error| error.into()))
        .collect()
}

/// Replace the details of a transfer, undoing the old movement of money
/// before applying the new one.
///
/// # Errors
/// Returns [Error::UpdateMissingTransfer] if the transfer does not exist, plus
/// the validation errors of [create_transfer].
pub fn update_transfer(
    transfer_id: TransferId,
    user_id: UserID,
    builder: TransferBuilder,
    connection: &Connection,
) -> Result<Transfer, Error> {
    builder.validate(user_id, connection)?;

    let tx = connection.unchecked_transaction()?;

    let old_transfer = get_transfer(transfer_id, user_id, &tx).map_err(|error| match error {
        Error::NotFound => Error::UpdateMissingTransfer,
        error => error,
    })?;

    let new_transfer = tx
        .prepare(
            "UPDATE transfer
             SET from_account_id = ?1, to_account_id = ?2, amount = ?3, description = ?4, date = ?5
             WHERE id = ?6 AND user_id = ?7
             RETURNING id, user_id, from_account_id, to_account_id, amount, description, date",
        )?
        .query_row(
            (
                builder.from_account_id,
                builder.to_account_id,
                builder.amount,
                builder.description,
                builder.date,
                transfer_id,
                user_id,
            ),
            map_transfer_row,
        )?;

    reverse_effects(&old_transfer, &tx)?;
    apply_effects(&new_transfer, &tx)?;

    tx.commit()?;

    tracing::info!("User {user_id} updated transfer {transfer_id}");

    Ok(new_transfer)
}

/// Delete a transfer and move the money back.
///
/// # Errors
/// Returns [Error::DeleteMissingTransfer] if the transfer does not exist.
pub fn delete_transfer(
    transfer_id: TransferId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let tx = connection.unchecked_transaction()?;

    let transfer = get_transfer(transfer_id, user_id, &tx).map_err(|error| match error {
        Error::NotFound => Error::DeleteMissingTransfer,
        error => error,
    })?;

    tx.execute(
        "DELETE FROM transfer WHERE id = ?1 AND user_id = ?2",
        (transfer_id, user_id),
    )?;
    reverse_effects(&transfer, &tx)?;

    tx.commit()?;

    tracing::info!("User {user_id} deleted transfer {transfer_id}");

    Ok(())
}

/// Create the transfer table in the database.
pub(crate) fn create_transfer_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS transfer (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            from_account_id INTEGER,
            to_account_id INTEGER,
            amount INTEGER NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            date TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(from_account_id) REFERENCES account(id) ON UPDATE CASCADE ON DELETE SET NULL,
            FOREIGN KEY(to_account_id) REFERENCES account(id) ON UPDATE CASCADE ON DELETE SET NULL
        );

        CREATE INDEX IF NOT EXISTS idx_transfer_user_date ON transfer(user_id, date);",
    )?;

    Ok(())
}

fn map_transfer_row(row: &Row) -> Result<Transfer, rusqlite::Error> {
    let id = row.get(0)?;
    let user_id = row.get(1)?;
    let from_account_id = row.get(2)?;
    let to_account_id = row.get(3)?;
    let amount = row.get(4)?;
    let description = row.get(5)?;
    let date = row.get(6)?;

    Ok(Transfer {
        id,
        user_id,
        from_account_id,
        to_account_id,
        amount,
        description,
        date,
    })
}

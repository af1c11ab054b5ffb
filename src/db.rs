//! Creates the application's database schema.

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::{
    Error,
    account::create_account_table,
    budget::{create_budget_notification_table, create_budget_table},
    category::create_category_table,
    connection::create_user_connection_table,
    ledger::{create_expense_table, create_income_table, create_transfer_table},
    user::create_user_table,
};

/// Create all the application's tables.
///
/// Foreign key enforcement is switched on for `connection` first, since
/// SQLite leaves it off by default and ignores the pragma inside a
/// transaction. The tables are then created in a single exclusive
/// transaction, so calling this on an existing database is a no-op.
///
/// # Errors
/// Returns an [Error::SqlError] if any of the tables could not be created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    connection.execute_batch("PRAGMA foreign_keys = ON;")?;

    let transaction = Transaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_user_table(&transaction)?;
    create_category_table(&transaction)?;
    create_account_table(&transaction)?;
    create_expense_table(&transaction)?;
    create_income_table(&transaction)?;
    create_transfer_table(&transaction)?;
    create_budget_table(&transaction)?;
    create_budget_notification_table(&transaction)?;
    create_user_connection_table(&transaction)?;

    transaction.commit()?;

    tracing::debug!("Database schema initialized");

    Ok(())
}

#[cfg(test)]
mod initialize_tests {
    use rusqlite::Connection;

    use crate::{Error, db::initialize, ledger::Expense, user::UserID};

    #[test]
    fn initialize_is_idempotent() {
        let connection = Connection::open_in_memory().unwrap();

        assert_eq!(initialize(&connection), Ok(()));
        assert_eq!(initialize(&connection), Ok(()));
    }

    #[test]
    fn creates_every_table() {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();

        let mut tables: Vec<String> = connection
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap()
            .query_map((), |row| row.get(0))
            .unwrap()
            .map(|name| name.unwrap())
            .collect();
        tables.sort();

        assert_eq!(
            tables,
            [
                "account",
                "budget",
                "budget_notification",
                "category",
                "expense",
                "income",
                "transfer",
                "user",
                "user_connection",
            ]
        );
    }

    #[test]
    fn enables_foreign_keys() {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();

        let result = crate::ledger::create_expense(
            UserID::new(42),
            Expense::build(
                crate::Money::from_cents(1_00),
                time::macros::date!(2025 - 03 - 01),
                "",
            ),
            &connection,
        );

        assert!(
            matches!(result, Err(Error::SqlError(_))),
            "expected a foreign key error, got {result:?}"
        );
    }
}

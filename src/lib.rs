//! Moneytracker is a library for tracking personal finances.
//!
//! Users record expenses, incomes and transfers against their bank accounts,
//! and the library keeps the account balances consistent as entries are
//! created, edited and deleted. Monthly budgets (a global limit plus optional
//! per-category limits) are re-evaluated after every expense write and raise
//! a notification when exceeded.

#![warn(missing_docs)]

pub mod account;
pub mod activity;
pub mod budget;
pub mod category;
pub mod connection;
pub mod dashboard;
mod database_id;
mod db;
pub mod import;
pub mod ledger;
mod logging;
mod money;
mod month;
pub mod user;

pub use database_id::DatabaseId;
pub use db::initialize as initialize_db;
pub use logging::setup_logging;
pub use money::Money;
pub use month::YearMonth;
pub use user::{User, UserID};

use crate::{
    account::AccountId,
    category::{CategoryId, CategoryKind},
};

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A string could not be parsed as an amount of money.
    #[error("\"{0}\" is not a valid amount of money")]
    InvalidAmount(String),

    /// An expense, income, or transfer was given an amount of zero or less.
    ///
    /// The direction of an entry is given by its type, so amounts are always
    /// positive.
    #[error("{0} is not a positive amount")]
    NonPositiveAmount(Money),

    /// A budget was given a limit below zero or above [Money::MAX].
    #[error("{0} is not a valid budget limit")]
    InvalidBudgetLimit(Money),

    /// A string could not be parsed as a calendar month.
    #[error("\"{0}\" is not a valid month, expected YYYY-MM")]
    InvalidMonth(String),

    /// An empty string was used to create a username.
    #[error("username cannot be empty")]
    EmptyUsername,

    /// The username is already taken.
    #[error("the username \"{0}\" already exists")]
    DuplicateUsername(String),

    /// No user exists with the given username.
    #[error("could not find a user with the username \"{0}\"")]
    UnknownUsername(String),

    /// An empty string was used to create a category name.
    #[error("category name cannot be empty")]
    EmptyCategoryName,

    /// An empty string was used to create an account name.
    #[error("account name cannot be empty")]
    EmptyAccountName,

    /// A string did not name a known account type.
    #[error("\"{0}\" is not a valid account type")]
    InvalidAccountKind(String),

    /// The user already has an account with the given name.
    #[error("the account \"{0}\" already exists")]
    DuplicateAccountName(String),

    /// The category ID did not refer to a category of the right kind owned
    /// by the user.
    #[error("category {0} is not a valid {1} category")]
    InvalidCategory(CategoryId, CategoryKind),

    /// The account ID did not refer to an account owned by the user.
    #[error("account {0} is not a valid account")]
    InvalidAccount(AccountId),

    /// A transfer used the same account as its source and destination.
    #[error("cannot transfer from an account to itself")]
    SameAccountTransfer,

    /// A user tried to connect with themselves.
    #[error("you cannot connect with yourself")]
    SelfConnection,

    /// A user tried to view another user's data without an accepted
    /// connection.
    #[error("you are not connected with user {0}")]
    NotConnected(UserID),

    /// The CSV had issues that prevented it from being imported.
    #[error("could not import the CSV file: {0}")]
    InvalidCSV(String),

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Tried to update an account that does not exist
    #[error("tried to update an account that is not in the database")]
    UpdateMissingAccount,

    /// Tried to delete an account that does not exist
    #[error("tried to delete an account that is not in the database")]
    DeleteMissingAccount,

    /// Tried to delete a category that does not exist
    #[error("tried to delete a category that is not in the database")]
    DeleteMissingCategory,

    /// Tried to update an expense that does not exist
    #[error("tried to update an expense that is not in the database")]
    UpdateMissingExpense,

    /// Tried to delete an expense that does not exist
    #[error("tried to delete an expense that is not in the database")]
    DeleteMissingExpense,

    /// Tried to update an income that does not exist
    #[error("tried to update an income that is not in the database")]
    UpdateMissingIncome,

    /// Tried to delete an income that does not exist
    #[error("tried to delete an income that is not in the database")]
    DeleteMissingIncome,

    /// Tried to update a transfer that does not exist
    #[error("tried to update a transfer that is not in the database")]
    UpdateMissingTransfer,

    /// Tried to delete a transfer that does not exist
    #[error("tried to delete a transfer that is not in the database")]
    DeleteMissingTransfer,

    /// Tried to respond to a connection request that does not exist or was
    /// not sent to the user.
    #[error("tried to respond to a connection request that is not in the database")]
    RespondMissingRequest,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

//! Expenses, incomes and transfers, and the account balances they move.
//!
//! Every write in this module runs inside a single SQLite transaction that
//! covers the entry itself, the balance updates of the accounts it touches,
//! and (for expenses) the re-evaluation of the affected budgets:
//! - creating an entry applies its balance effects,
//! - editing an entry reverses the effects of the old version before applying
//!   those of the new version,
//! - deleting an entry reverses its effects.

mod balance;
mod expense;
mod income;
mod transfer;

pub use balance::{BalanceEffect, LedgerEntry};
pub use expense::{
    Expense, ExpenseBuilder, ExpenseId, create_expense, delete_expense, get_expense,
    get_expenses_by_user, update_expense,
};
pub use income::{
    Income, IncomeBuilder, IncomeId, create_income, delete_income, get_income,
    get_incomes_by_user, update_income,
};
pub use transfer::{
    Transfer, TransferBuilder, TransferId, create_transfer, delete_transfer, get_transfer,
    get_transfers_by_user, update_transfer,
};

pub(crate) use balance::{apply_effects, reverse_effects};
pub(crate) use expense::{create_expense_table, insert_expense};
pub(crate) use income::{create_income_table, insert_income};
pub(crate) use transfer::create_transfer_table;

use crate::{Error, Money};

/// Entry amounts give the size of the movement, its direction comes from the
/// entry type.
fn validate_amount(amount: Money) -> Result<(), Error> {
    if !amount.is_positive() {
        Err(Error::NonPositiveAmount(amount))
    } else if !amount.is_within_limit() {
        Err(Error::InvalidAmount(amount.to_string()))
    } else {
        Ok(())
    }
}

//! The effect of ledger entries on account balances.

use rusqlite::Connection;

use crate::{Error, Money, account::AccountId, account::adjust_balance};

/// A signed change to the balance of one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceEffect {
    /// The account whose balance changes.
    pub account_id: AccountId,
    /// The amount added to the balance. Negative values withdraw money.
    pub delta: Money,
}

/// An entry in the ledger that moves money in or out of accounts.
pub trait LedgerEntry {
    /// The balance changes recording this entry causes.
    ///
    /// An entry that is not linked to any account has no effects.
    fn balance_effects(&self) -> Vec<BalanceEffect>;
}

/// Apply the balance effects of `entry`.
pub(crate) fn apply_effects(entry: &impl LedgerEntry, connection: &Connection) -> Result<(), Error> {
    for effect in entry.balance_effects() {
        adjust_balance(effect.account_id, effect.delta, connection)?;
    }

    Ok(())
}

/// Undo the balance effects of `entry`, e.g. before it is edited or deleted.
pub(crate) fn reverse_effects(
    entry: &impl LedgerEntry,
    connection: &Connection,
) -> Result<(), Error> {
    for effect in entry.balance_effects() {
        adjust_balance(effect.account_id, -effect.delta, connection)?;
    }

    Ok(())
}

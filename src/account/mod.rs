//! Bank accounts, credit cards and other places money is kept.

mod core;

pub use core::{
    Account, AccountId, AccountKind, adjust_balance, create_account, create_account_table,
    delete_account, get_account, get_accounts_by_user, get_net_worth, update_account,
};

pub(crate) use core::validate_account;

//! A single feed of a user's expenses, incomes and transfers.

use std::collections::HashMap;

use rusqlite::Connection;
use serde::Serialize;
use time::Date;

use crate::{
    DatabaseId, Error, Money, UserID,
    account::AccountId,
    category::get_categories,
    ledger::{get_expenses_by_user, get_incomes_by_user, get_transfers_by_user},
};

/// The type of entry in an activity feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    /// Money spent.
    Expense,
    /// Money earned.
    Income,
    /// Money moved between accounts.
    Transfer,
}

/// One line of a user's activity feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityEntry {
    /// Whether this is an expense, income or transfer.
    pub kind: ActivityKind,
    /// The ID of the expense, income or transfer.
    pub id: DatabaseId,
    /// When it happened.
    pub date: Date,
    /// The amount of money involved. Always positive.
    pub amount: Money,
    /// The category name, if any.
    ///
    /// Uncategorised incomes show their source here instead.
    pub category: Option<String>,
    /// A short description of the entry.
    pub description: String,
    /// The account the entry affects, or the source account of a transfer.
    pub account_id: Option<AccountId>,
    /// The destination account of a transfer.
    pub to_account_id: Option<AccountId>,
}

const INCOME_LABEL: &str = "Income";

/// Get every expense, income and transfer of a user, newest first.
pub fn get_activity(user_id: UserID, connection: &Connection) -> Result<Vec<ActivityEntry>, Error> {
    let category_names: HashMap<_, _> = get_categories(user_id, None, connection)?
        .into_iter()
        .map(|category| (category.id, category.name.to_string()))
        .collect();
    let category_name = |category_id: Option<DatabaseId>| {
        category_id.and_then(|id| category_names.get(&id).cloned())
    };

    let expenses = get_expenses_by_user(user_id, connection)?
        .into_iter()
        .map(|expense| ActivityEntry {
            kind: ActivityKind::Expense,
            id: expense.id,
            date: expense.date,
            amount: expense.amount,
            category: category_name(expense.category_id),
            description: expense.description,
            account_id: expense.account_id,
            to_account_id: None,
        });

    let incomes = get_incomes_by_user(user_id, connection)?
        .into_iter()
        .map(|income| {
            let (category, description) = match category_name(income.category_id) {
                Some(name) => (Some(name), income.source),
                None if income.source.is_empty() => {
                    (Some(INCOME_LABEL.to_owned()), INCOME_LABEL.to_owned())
                }
                None => (Some(income.source), INCOME_LABEL.to_owned()),
            };

            ActivityEntry {
                kind: ActivityKind::Income,
                id: income.id,
                date: income.date,
                amount: income.amount,
                category,
                description,
                account_id: income.account_id,
                to_account_id: None,
            }
        });

    let transfers = get_transfers_by_user(user_id, connection)?
        .into_iter()
        .map(|transfer| ActivityEntry {
            kind: ActivityKind::Transfer,
            id: transfer.id,
            date: transfer.date,
            amount: transfer.amount,
            category: None,
            description: transfer.description,
            account_id: transfer.from_account_id,
            to_account_id: transfer.to_account_id,
        });

    let mut activity: Vec<_> = expenses.chain(incomes).chain(transfers).collect();
    activity.sort_by(|a, b| b.date.cmp(&a.date));

    Ok(activity)
}

#[cfg(test)]
mod activity_tests {
    use rusqlite::Connection;
    use time::macros::date;

    use crate::{
        Money, User,
        account::{AccountKind, create_account},
        activity::{ActivityKind, get_activity},
        category::{CategoryKind, CategoryName, create_category},
        db::initialize,
        ledger::{Expense, Income, Transfer, create_expense, create_income, create_transfer},
        user::create_user,
    };

    fn get_test_connection() -> (Connection, User) {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let user = create_user("alice", &connection).unwrap();
        (connection, user)
    }

    #[test]
    fn merges_entries_newest_first() {
        let (conn, user) = get_test_connection();
        let everyday =
            create_account(user.id, "Everyday", AccountKind::Checking, Money::ZERO, &conn).unwrap();
        let savings =
            create_account(user.id, "Savings", AccountKind::Savings, Money::ZERO, &conn).unwrap();
        create_expense(
            user.id,
            Expense::build(Money::from_cents(5_00), date!(2025 - 03 - 02), "Coffee"),
            &conn,
        )
        .unwrap();
        create_income(
            user.id,
            Income::build(Money::from_cents(100_00), date!(2025 - 03 - 03), "Employer"),
            &conn,
        )
        .unwrap();
        create_transfer(
            user.id,
            Transfer::build(
                Money::from_cents(20_00),
                date!(2025 - 03 - 01),
                everyday.id,
                savings.id,
            ),
            &conn,
        )
        .unwrap();

        let activity = get_activity(user.id, &conn).unwrap();

        let kinds: Vec<_> = activity.iter().map(|entry| entry.kind).collect();
        assert_eq!(
            kinds,
            [
                ActivityKind::Income,
                ActivityKind::Expense,
                ActivityKind::Transfer
            ]
        );
        assert_eq!(activity[2].account_id, Some(everyday.id));
        assert_eq!(activity[2].to_account_id, Some(savings.id));
    }

    #[test]
    fn labels_incomes_by_category_or_source() {
        let (conn, user) = get_test_connection();
        let salary = create_category(
            user.id,
            CategoryName::new_unchecked("Salary"),
            CategoryKind::Income,
            &conn,
        )
        .unwrap();
        create_income(
            user.id,
            Income::build(Money::from_cents(1_00), date!(2025 - 03 - 03), "Employer")
                .category_id(Some(salary.id)),
            &conn,
        )
        .unwrap();
        create_income(
            user.id,
            Income::build(Money::from_cents(1_00), date!(2025 - 03 - 02), "Market stall"),
            &conn,
        )
        .unwrap();
        create_income(
            user.id,
            Income::build(Money::from_cents(1_00), date!(2025 - 03 - 01), ""),
            &conn,
        )
        .unwrap();

        let labels: Vec<_> = get_activity(user.id, &conn)
            .unwrap()
            .into_iter()
            .map(|entry| (entry.category.unwrap(), entry.description))
            .collect();

        assert_eq!(
            labels,
            [
                ("Salary".to_owned(), "Employer".to_owned()),
                ("Market stall".to_owned(), "Income".to_owned()),
                ("Income".to_owned(), "Income".to_owned()),
            ]
        );
    }

    #[test]
    fn excludes_other_users() {
        let (conn, user) = get_test_connection();
        let bob = create_user("bob", &conn).unwrap();
        create_expense(
            bob.id,
            Expense::build(Money::from_cents(5_00), date!(2025 - 03 - 02), "Coffee"),
            &conn,
        )
        .unwrap();

        assert_eq!(get_activity(user.id, &conn), Ok(vec![]));
    }
}

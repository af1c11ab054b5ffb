//! Re-evaluates budgets after spending or limits change.

use std::collections::HashMap;

use rusqlite::Connection;
use time::Date;

use crate::{
    Error, Money, UserID, YearMonth,
    budget::{
        Budget, NotificationAction,
        core::{delete_budget, get_budget, upsert_budget},
        decide_notification,
        notification::{clear_notifications, get_active_notification, raise_notification},
    },
    category::{CategoryId, CategoryKind, get_categories},
};

/// Sum the amounts of a user's expenses in `month`.
///
/// When `category_id` is given only expenses in that category are counted,
/// otherwise every expense of the month is counted.
pub fn calculate_spending(
    user_id: UserID,
    month: YearMonth,
    category_id: Option<CategoryId>,
    connection: &Connection,
) -> Result<Money, Error> {
    let spent: Money = connection
        .prepare(
            "SELECT COALESCE(SUM(amount), 0) FROM expense
             WHERE user_id = ?1 AND date >= ?2 AND date < ?3
               AND (?4 IS NULL OR category_id = ?4)",
        )?
        .query_row(
            (
                user_id,
                month.first_day(),
                month.next_first_day(),
                category_id,
            ),
            |row| row.get(0),
        )?;

    Ok(spent)
}

/// Check whether `budget` is exceeded and raise or clear its notification.
///
/// Returns the action that was taken.
pub fn check_budget_state(
    budget: &Budget,
    connection: &Connection,
) -> Result<NotificationAction, Error> {
    let spent = calculate_spending(budget.user_id, budget.month, budget.category_id, connection)?;
    let has_active = get_active_notification(budget.id, connection)?.is_some();

    let action = decide_notification(spent, budget.limit, has_active);
    tracing::debug!(
        "Budget {} in {}: spent {spent} of {}, {action:?}",
        budget.id,
        budget.month,
        budget.limit
    );

    match action {
        NotificationAction::Raise { exceeded_amount } => {
            raise_notification(budget.user_id, budget.id, exceeded_amount, connection)?;
            tracing::info!(
                "User {} exceeded budget {} for {} by {exceeded_amount}",
                budget.user_id,
                budget.id,
                budget.month
            );
        }
        NotificationAction::Keep => {}
        NotificationAction::Clear => {
            let cleared = clear_notifications(budget.id, connection)?;
            if cleared > 0 {
                tracing::info!(
                    "Budget {} for {} is no longer exceeded",
                    budget.id,
                    budget.month
                );
            }
        }
    }

    Ok(action)
}

/// Re-evaluate the budgets an expense on `date` in `category_id` counts towards.
///
/// That is the budget of the expense's category (if it has one) and the
/// global budget of the expense's month. Budgets that have not been set are
/// skipped.
pub fn check_budgets_for_expense(
    user_id: UserID,
    date: Date,
    category_id: Option<CategoryId>,
    connection: &Connection,
) -> Result<(), Error> {
    let month = YearMonth::containing(date);

    if let Some(category_id) = category_id
        && let Some(budget) = get_budget(user_id, month, Some(category_id), connection)?
    {
        check_budget_state(&budget, connection)?;
    }

    if let Some(budget) = get_budget(user_id, month, None, connection)? {
        check_budget_state(&budget, connection)?;
    }

    Ok(())
}

/// Set all the limits of a user's month at once.
///
/// The global budget is set to `global_limit`. Each of the user's expense
/// categories with a positive entry in `category_limits` gets a budget with
/// that limit, and any other category budget of the month is removed. Limits
/// given for income categories are ignored. Every budget that is kept is
/// re-evaluated against the month's spending.
///
/// # Errors
/// Nothing is changed if any of these are returned:
/// - [Error::InvalidCategory] if `category_limits` names a category the user
///   does not own,
/// - [Error::InvalidBudgetLimit] if a limit is negative or larger than
///   [Money::MAX].
pub fn set_month_budget(
    user_id: UserID,
    month: YearMonth,
    global_limit: Money,
    category_limits: &HashMap<CategoryId, Money>,
    connection: &Connection,
) -> Result<(), Error> {
    let categories = get_categories(user_id, None, connection)?;

    if let Some(unknown) = category_limits
        .keys()
        .find(|id| !categories.iter().any(|category| category.id == **id))
    {
        return Err(Error::InvalidCategory(*unknown, CategoryKind::Expense));
    }

    let tx = connection.unchecked_transaction()?;

    let global_budget = upsert_budget(user_id, month, None, global_limit, &tx)?;
    check_budget_state(&global_budget, &tx)?;

    for category in categories
        .iter()
        .filter(|category| category.kind == CategoryKind::Expense)
    {
        match category_limits.get(&category.id) {
            Some(limit) if limit.is_positive() => {
                let budget = upsert_budget(user_id, month, Some(category.id), *limit, &tx)?;
                check_budget_state(&budget, &tx)?;
            }
            _ => delete_budget(user_id, month, category.id, &tx)?,
        }
    }

    tx.commit()?;

    tracing::info!("User {user_id} updated the budget for {month}");

    Ok(())
}

#[cfg(test)]
mod evaluator_tests {
    use std::collections::HashMap;

    use rusqlite::Connection;
    use time::{Month, macros::date};

    use crate::{
        Error, Money, User, YearMonth,
        budget::{
            NotificationAction, calculate_spending, check_budget_state, get_active_notifications,
            get_budget, get_budgets_for_month, set_month_budget, upsert_budget,
        },
        category::{Category, CategoryKind, CategoryName, create_category},
        db::initialize,
        ledger::{Expense, create_expense, delete_expense, update_expense},
        user::create_user,
    };

    const MARCH: YearMonth = YearMonth::new(2025, Month::March);

    fn get_test_connection() -> (Connection, User, Category) {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let user = create_user("alice", &connection).unwrap();
        let groceries = create_category(
            user.id,
            CategoryName::new_unchecked("Groceries"),
            CategoryKind::Expense,
            &connection,
        )
        .unwrap();

        (connection, user, groceries)
    }

    fn spend(user: &User, cents: i64, date: time::Date, category: Option<&Category>, conn: &Connection) {
        create_expense(
            user.id,
            Expense::build(Money::from_cents(cents), date, "")
                .category_id(category.map(|category| category.id)),
            conn,
        )
        .unwrap();
    }

    #[test]
    fn spending_is_limited_to_the_month() {
        let (conn, user, groceries) = get_test_connection();
        spend(&user, 10_00, date!(2025 - 02 - 28), None, &conn);
        spend(&user, 20_00, date!(2025 - 03 - 01), Some(&groceries), &conn);
        spend(&user, 30_00, date!(2025 - 03 - 31), None, &conn);
        spend(&user, 40_00, date!(2025 - 04 - 01), Some(&groceries), &conn);

        assert_eq!(
            calculate_spending(user.id, MARCH, None, &conn),
            Ok(Money::from_cents(50_00))
        );
        assert_eq!(
            calculate_spending(user.id, MARCH, Some(groceries.id), &conn),
            Ok(Money::from_cents(20_00))
        );
    }

    #[test]
    fn spending_is_zero_without_expenses() {
        let (conn, user, _) = get_test_connection();

        assert_eq!(calculate_spending(user.id, MARCH, None, &conn), Ok(Money::ZERO));
    }

    #[test]
    fn spending_ignores_other_users() {
        let (conn, user, _) = get_test_connection();
        let bob = create_user("bob", &conn).unwrap();
        spend(&bob, 10_00, date!(2025 - 03 - 05), None, &conn);

        assert_eq!(calculate_spending(user.id, MARCH, None, &conn), Ok(Money::ZERO));
    }

    #[test]
    fn exceeding_global_budget_raises_one_notification() {
        let (conn, user, _) = get_test_connection();
        let budget = upsert_budget(user.id, MARCH, None, Money::from_cents(100_00), &conn).unwrap();

        spend(&user, 80_00, date!(2025 - 03 - 05), None, &conn);
        assert_eq!(get_active_notifications(user.id, &conn), Ok(vec![]));

        spend(&user, 30_00, date!(2025 - 03 - 06), None, &conn);
        spend(&user, 5_00, date!(2025 - 03 - 07), None, &conn);

        let notifications = get_active_notifications(user.id, &conn).unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].budget_id, budget.id);
        assert_eq!(notifications[0].exceeded_amount, Money::from_cents(10_00));
    }

    #[test]
    fn category_expense_counts_towards_category_and_global_budgets() {
        let (conn, user, groceries) = get_test_connection();
        upsert_budget(user.id, MARCH, None, Money::from_cents(100_00), &conn).unwrap();
        upsert_budget(user.id, MARCH, Some(groceries.id), Money::from_cents(50_00), &conn)
            .unwrap();

        spend(&user, 60_00, date!(2025 - 03 - 05), Some(&groceries), &conn);
        assert_eq!(get_active_notifications(user.id, &conn).unwrap().len(), 1);

        spend(&user, 45_00, date!(2025 - 03 - 06), None, &conn);
        assert_eq!(get_active_notifications(user.id, &conn).unwrap().len(), 2);
    }

    #[test]
    fn uncategorised_expense_does_not_touch_category_budget() {
        let (conn, user, groceries) = get_test_connection();
        upsert_budget(user.id, MARCH, Some(groceries.id), Money::from_cents(50_00), &conn)
            .unwrap();

        spend(&user, 60_00, date!(2025 - 03 - 05), None, &conn);

        assert_eq!(get_active_notifications(user.id, &conn), Ok(vec![]));
    }

    #[test]
    fn deleting_expense_clears_notification() {
        let (conn, user, _) = get_test_connection();
        upsert_budget(user.id, MARCH, None, Money::from_cents(100_00), &conn).unwrap();
        let expense = create_expense(
            user.id,
            Expense::build(Money::from_cents(150_00), date!(2025 - 03 - 05), "TV"),
            &conn,
        )
        .unwrap();
        assert_eq!(get_active_notifications(user.id, &conn).unwrap().len(), 1);

        delete_expense(expense.id, user.id, &conn).unwrap();

        assert_eq!(get_active_notifications(user.id, &conn), Ok(vec![]));
    }

    #[test]
    fn moving_expense_to_another_month_re_evaluates_both_months() {
        let (conn, user, _) = get_test_connection();
        let april = YearMonth::new(2025, Month::April);
        upsert_budget(user.id, MARCH, None, Money::from_cents(100_00), &conn).unwrap();
        let april_budget =
            upsert_budget(user.id, april, None, Money::from_cents(100_00), &conn).unwrap();
        let expense = create_expense(
            user.id,
            Expense::build(Money::from_cents(150_00), date!(2025 - 03 - 05), "TV"),
            &conn,
        )
        .unwrap();

        update_expense(
            expense.id,
            user.id,
            Expense::build(Money::from_cents(150_00), date!(2025 - 04 - 05), "TV"),
            &conn,
        )
        .unwrap();

        let notifications = get_active_notifications(user.id, &conn).unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].budget_id, april_budget.id);
    }

    #[test]
    fn moving_expense_to_another_category_re_evaluates_both_categories() {
        let (conn, user, groceries) = get_test_connection();
        let fun = create_category(
            user.id,
            CategoryName::new_unchecked("Fun"),
            CategoryKind::Expense,
            &conn,
        )
        .unwrap();
        upsert_budget(user.id, MARCH, Some(groceries.id), Money::from_cents(100_00), &conn)
            .unwrap();
        let fun_budget =
            upsert_budget(user.id, MARCH, Some(fun.id), Money::from_cents(100_00), &conn).unwrap();
        let expense = create_expense(
            user.id,
            Expense::build(Money::from_cents(150_00), date!(2025 - 03 - 05), "Concert")
                .category_id(Some(groceries.id)),
            &conn,
        )
        .unwrap();
        assert_eq!(get_active_notifications(user.id, &conn).unwrap().len(), 1);

        update_expense(
            expense.id,
            user.id,
            Expense::build(Money::from_cents(150_00), date!(2025 - 03 - 05), "Concert")
                .category_id(Some(fun.id)),
            &conn,
        )
        .unwrap();

        let notifications = get_active_notifications(user.id, &conn).unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].budget_id, fun_budget.id);
    }

    #[test]
    fn notification_is_raised_again_after_being_cleared() {
        let (conn, user, _) = get_test_connection();
        let budget = upsert_budget(user.id, MARCH, None, Money::from_cents(100_00), &conn).unwrap();
        spend(&user, 150_00, date!(2025 - 03 - 05), None, &conn);

        let raised_limit =
            upsert_budget(user.id, MARCH, None, Money::from_cents(200_00), &conn).unwrap();
        assert_eq!(
            check_budget_state(&raised_limit, &conn),
            Ok(NotificationAction::Clear)
        );

        let lowered_limit =
            upsert_budget(user.id, MARCH, None, Money::from_cents(100_00), &conn).unwrap();
        assert_eq!(
            check_budget_state(&lowered_limit, &conn),
            Ok(NotificationAction::Raise {
                exceeded_amount: Money::from_cents(50_00)
            })
        );
        assert_eq!(lowered_limit.id, budget.id);
    }

    #[test]
    fn set_month_budget_upserts_and_removes_category_budgets() {
        let (conn, user, groceries) = get_test_connection();
        let rent = create_category(
            user.id,
            CategoryName::new_unchecked("Rent"),
            CategoryKind::Expense,
            &conn,
        )
        .unwrap();
        let limits = HashMap::from([
            (groceries.id, Money::from_cents(300_00)),
            (rent.id, Money::from_cents(1_500_00)),
        ]);
        set_month_budget(user.id, MARCH, Money::from_cents(2_000_00), &limits, &conn).unwrap();
        assert_eq!(get_budgets_for_month(user.id, MARCH, &conn).unwrap().len(), 3);

        let limits = HashMap::from([(groceries.id, Money::ZERO)]);
        set_month_budget(user.id, MARCH, Money::from_cents(2_500_00), &limits, &conn).unwrap();

        let budgets = get_budgets_for_month(user.id, MARCH, &conn).unwrap();
        assert_eq!(budgets.len(), 1);
        assert_eq!(budgets[0].category_id, None);
        assert_eq!(budgets[0].limit, Money::from_cents(2_500_00));
    }

    #[test]
    fn set_month_budget_raises_notification_for_existing_spending() {
        let (conn, user, groceries) = get_test_connection();
        spend(&user, 80_00, date!(2025 - 03 - 05), Some(&groceries), &conn);

        let limits = HashMap::from([(groceries.id, Money::from_cents(50_00))]);
        set_month_budget(user.id, MARCH, Money::from_cents(1_000_00), &limits, &conn).unwrap();

        let notifications = get_active_notifications(user.id, &conn).unwrap();
        let groceries_budget = get_budget(user.id, MARCH, Some(groceries.id), &conn)
            .unwrap()
            .unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].budget_id, groceries_budget.id);
    }

    #[test]
    fn set_month_budget_rejects_unknown_category() {
        let (conn, user, _) = get_test_connection();
        let limits = HashMap::from([(999, Money::from_cents(1_00))]);

        let result = set_month_budget(user.id, MARCH, Money::from_cents(1_00), &limits, &conn);

        assert_eq!(result, Err(Error::InvalidCategory(999, CategoryKind::Expense)));
        assert_eq!(get_budgets_for_month(user.id, MARCH, &conn), Ok(vec![]));
    }

    #[test]
    fn set_month_budget_ignores_income_categories() {
        let (conn, user, _) = get_test_connection();
        let salary = create_category(
            user.id,
            CategoryName::new_unchecked("Salary"),
            CategoryKind::Income,
            &conn,
        )
        .unwrap();
        let limits = HashMap::from([(salary.id, Money::from_cents(1_00))]);

        set_month_budget(user.id, MARCH, Money::from_cents(1_000_00), &limits, &conn).unwrap();

        let budgets = get_budgets_for_month(user.id, MARCH, &conn).unwrap();
        assert_eq!(budgets.len(), 1);
        assert_eq!(budgets[0].category_id, None);
    }

    #[test]
    fn set_month_budget_rejects_negative_global_limit() {
        let (conn, user, groceries) = get_test_connection();
        let limits = HashMap::from([(groceries.id, Money::from_cents(50_00))]);
        let limit = Money::from_cents(-9_000_000_000_000_000_000);

        let result = set_month_budget(user.id, MARCH, limit, &limits, &conn);

        assert_eq!(result, Err(Error::InvalidBudgetLimit(limit)));
        assert_eq!(get_budgets_for_month(user.id, MARCH, &conn), Ok(vec![]));
        spend(&user, 10_00, date!(2025 - 03 - 05), Some(&groceries), &conn);
        assert_eq!(get_active_notifications(user.id, &conn), Ok(vec![]));
    }

    #[test]
    fn set_month_budget_rejects_oversized_category_limit() {
        let (conn, user, groceries) = get_test_connection();
        let limit = Money::from_cents(i64::MAX);
        let limits = HashMap::from([(groceries.id, limit)]);

        let result = set_month_budget(user.id, MARCH, Money::from_cents(100_00), &limits, &conn);

        assert_eq!(result, Err(Error::InvalidBudgetLimit(limit)));
        assert_eq!(get_budgets_for_month(user.id, MARCH, &conn), Ok(vec![]));
    }
}

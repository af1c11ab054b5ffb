//! Monthly budgets and the notifications raised when they are exceeded.
//!
//! A month can have one global budget, which limits the total of all the
//! user's expenses that month, plus one budget per expense category.
//! Budgets are re-evaluated whenever an expense is written, and whenever the
//! limits of a month are changed.

mod core;
mod evaluator;
mod notification;
mod summary;

pub use core::{
    Budget, BudgetId, create_budget_table, delete_month_budget, get_budget, get_budgets_for_month,
    upsert_budget,
};
pub use evaluator::{
    calculate_spending, check_budget_state, check_budgets_for_expense, set_month_budget,
};
pub use notification::{
    BudgetNotification, NotificationAction, create_budget_notification_table,
    decide_notification, get_active_notifications,
};
pub use summary::{BudgetProgress, MonthBudgetSummary, get_budget_summaries, get_budget_summary};

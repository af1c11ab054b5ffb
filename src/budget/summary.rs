//! Budget versus spending figures for display.

use std::collections::HashMap;

use rusqlite::Connection;
use serde::Serialize;

use crate::{
    Error, Money, UserID, YearMonth,
    budget::{Budget, BudgetId, calculate_spending, core::get_budgeted_months, get_budgets_for_month},
    category::{Category, get_categories},
};

/// How much of one budget has been used.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetProgress {
    /// The budget being tracked.
    pub budget_id: BudgetId,
    /// The budget's category, or `None` for the global budget.
    pub category: Option<Category>,
    /// The spending limit.
    pub limit: Money,
    /// How much has been spent so far.
    pub spent: Money,
    /// How much is left to spend. Negative once the budget is exceeded.
    pub remaining: Money,
    /// `spent` as a percentage of `limit`, or 100 when the limit is zero.
    pub percent: f64,
    /// Whether more than the limit has been spent.
    pub is_exceeded: bool,
}

impl BudgetProgress {
    fn new(budget: &Budget, category: Option<Category>, spent: Money) -> Self {
        let percent = if budget.limit.is_positive() {
            spent.as_f64() / budget.limit.as_f64() * 100.0
        } else {
            100.0
        };

        Self {
            budget_id: budget.id,
            category,
            limit: budget.limit,
            spent,
            remaining: budget.limit - spent,
            percent,
            is_exceeded: spent > budget.limit,
        }
    }
}

/// The budgets of one month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthBudgetSummary {
    /// The month the budgets apply to.
    pub month: YearMonth,
    /// Progress against the global budget, if one was set.
    pub global: Option<BudgetProgress>,
    /// Progress against each category budget, ordered by category name.
    pub categories: Vec<BudgetProgress>,
    /// The total of all the month's expenses.
    pub total_spent: Money,
}

/// Compare a user's budgets for `month` with what they have spent.
pub fn get_budget_summary(
    user_id: UserID,
    month: YearMonth,
    connection: &Connection,
) -> Result<MonthBudgetSummary, Error> {
    let categories: HashMap<_, _> = get_categories(user_id, None, connection)?
        .into_iter()
        .map(|category| (category.id, category))
        .collect();
    let total_spent = calculate_spending(user_id, month, None, connection)?;

    let mut global = None;
    let mut category_progress = Vec::new();

    for budget in get_budgets_for_month(user_id, month, connection)? {
        match budget.category_id {
            None => global = Some(BudgetProgress::new(&budget, None, total_spent)),
            Some(category_id) => {
                let spent = calculate_spending(user_id, month, Some(category_id), connection)?;
                let category = categories.get(&category_id).cloned();
                category_progress.push(BudgetProgress::new(&budget, category, spent));
            }
        }
    }

    category_progress.sort_by(|a, b| {
        let name = |progress: &BudgetProgress| {
            progress
                .category
                .as_ref()
                .map(|category| category.name.to_string())
        };
        name(a).cmp(&name(b))
    });

    Ok(MonthBudgetSummary {
        month,
        global,
        categories: category_progress,
        total_spent,
    })
}

/// Summarise every month the user has set a budget for, newest first.
pub fn get_budget_summaries(
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<MonthBudgetSummary>, Error> {
    get_budgeted_months(user_id, connection)?
        .into_iter()
        .map(|month| get_budget_summary(user_id, month, connection))
        .collect()
}

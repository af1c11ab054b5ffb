//! Bulk import of expenses and incomes from CSV.
//!
//! The CSV must start with the header
//! `date,kind,amount,description,category,account`. Dates are written as
//! `YYYY-MM-DD`, `kind` is either `expense` or `income`, and the category and
//! account columns name one of the user's categories or accounts, or are left
//! empty.
//!
//! An import is all or nothing: the rows are written in a single transaction
//! and the first invalid row rolls the whole import back.

use std::{collections::BTreeSet, io::Read};

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

use crate::{
    Error, Money, UserID, YearMonth,
    account::{Account, AccountId, get_accounts_by_user},
    budget::check_budgets_for_expense,
    category::{Category, CategoryId, CategoryKind, get_categories},
    ledger::{Expense, Income, insert_expense, insert_income},
};

const DATE_FORMAT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");

/// What an import added to the database.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportSummary {
    /// The number of expenses imported.
    pub expense_count: usize,
    /// The number of incomes imported.
    pub income_count: usize,
    /// The total of the imported expenses.
    pub total_expenses: Money,
    /// The total of the imported incomes.
    pub total_income: Money,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: String,
    kind: String,
    amount: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    account: String,
}

/// An import row after validation against the user's records.
#[derive(Debug)]
struct ParsedRow {
    date: Date,
    kind: CategoryKind,
    amount: Money,
    description: String,
    category_id: Option<CategoryId>,
    account_id: Option<AccountId>,
}

/// Import the expenses and incomes in `reader` for `user_id`.
///
/// Account balances are updated for every row, and the budgets of each
/// affected month and category are re-evaluated once after all rows have
/// been written.
///
/// # Errors
/// Returns [Error::InvalidCSV] naming the first bad row (counting the first
/// row after the header as row 1) if any row cannot be parsed or refers to a
/// category or account the user does not have. Nothing is imported in that
/// case.
pub fn import_csv<R: Read>(
    user_id: UserID,
    reader: R,
    connection: &Connection,
) -> Result<ImportSummary, Error> {
    let categories = get_categories(user_id, None, connection)?;
    let accounts = get_accounts_by_user(user_id, connection)?;

    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (index, record) in csv_reader.deserialize::<CsvRow>().enumerate() {
        let row_number = index + 1;
        let parsed = record
            .map_err(|error| error.to_string())
            .and_then(|row| parse_row(row, &categories, &accounts))
            .map_err(|reason| Error::InvalidCSV(format!("row {row_number}: {reason}")))?;
        rows.push(parsed);
    }

    let tx = connection.unchecked_transaction()?;
    let mut summary = ImportSummary::default();
    let mut affected_budgets = BTreeSet::new();

    for row in rows {
        match row.kind {
            CategoryKind::Expense => {
                let builder = Expense::build(row.amount, row.date, &row.description)
                    .account_id(row.account_id)
                    .category_id(row.category_id);
                let expense = insert_expense(user_id, builder, &tx)?;
                affected_budgets.insert((YearMonth::containing(expense.date), expense.category_id));
                summary.expense_count += 1;
                summary.total_expenses += expense.amount;
            }
            CategoryKind::Income => {
                let builder = Income::build(row.amount, row.date, &row.description)
                    .account_id(row.account_id)
                    .category_id(row.category_id);
                let income = insert_income(user_id, builder, &tx)?;
                summary.income_count += 1;
                summary.total_income += income.amount;
            }
        }
    }

    for (month, category_id) in affected_budgets {
        check_budgets_for_expense(user_id, month.first_day(), category_id, &tx)?;
    }

    tx.commit()?;

    tracing::info!(
        "User {user_id} imported {} expenses and {} incomes",
        summary.expense_count,
        summary.income_count
    );

    Ok(summary)
}

fn parse_row(row: CsvRow, categories: &[Category], accounts: &[Account]) -> Result<ParsedRow, String> {
    let date = Date::parse(&row.date, DATE_FORMAT)
        .map_err(|_| format!("\"{}\" is not a date in the format YYYY-MM-DD", row.date))?;

    let kind = match row.kind.to_lowercase().as_str() {
        "expense" => CategoryKind::Expense,
        "income" => CategoryKind::Income,
        _ => return Err(format!("\"{}\" is not \"expense\" or \"income\"", row.kind)),
    };

    let amount: Money = row.amount.parse().map_err(|error: Error| error.to_string())?;
    if !amount.is_positive() {
        return Err(Error::NonPositiveAmount(amount).to_string());
    }

    let category_id = if row.category.is_empty() {
        None
    } else {
        let candidates: Vec<_> = categories
            .iter()
            .filter(|category| category.kind == kind)
            .collect();
        let category = find_by_name(&candidates, &row.category, |category| category.name.as_ref())
            .map_err(|matches| {
                format!("\"{}\" matches {matches} {kind} categories", row.category)
            })?
            .ok_or_else(|| format!("there is no {kind} category called \"{}\"", row.category))?;
        Some(category.id)
    };

    let account_id = if row.account.is_empty() {
        None
    } else {
        let candidates: Vec<_> = accounts.iter().collect();
        let account = find_by_name(&candidates, &row.account, |account| account.name.as_str())
            .map_err(|matches| format!("\"{}\" matches {matches} accounts", row.account))?
            .ok_or_else(|| format!("there is no account called \"{}\"", row.account))?;
        Some(account.id)
    };

    Ok(ParsedRow {
        date,
        kind,
        amount,
        description: row.description,
        category_id,
        account_id,
    })
}

/// Find the item called `name`, preferring an exact match and otherwise
/// ignoring case.
///
/// Returns the number of matches as the error when `name` only matches
/// ignoring case and more than one item does.
fn find_by_name<'a, T>(
    items: &[&'a T],
    name: &str,
    name_of: impl Fn(&T) -> &str,
) -> Result<Option<&'a T>, usize> {
    if let Some(item) = items.iter().find(|item| name_of(**item) == name) {
        return Ok(Some(*item));
    }

    let matches: Vec<_> = items
        .iter()
        .filter(|item| name_of(**item).eq_ignore_ascii_case(name))
        .collect();

    match matches.as_slice() {
        [] => Ok(None),
        [item] => Ok(Some(**item)),
        _ => Err(matches.len()),
    }
}

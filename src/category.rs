//! Categories that group expenses and incomes, e.g. 'Groceries' or 'Salary'.

use std::{fmt::Display, str::FromStr};

use rusqlite::{
    Connection, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};

use crate::{DatabaseId, Error, UserID};

/// Database identifier for a category.
pub type CategoryId = DatabaseId;

/// Whether a category is used for expenses or incomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    /// Money spent.
    Expense,
    /// Money earned.
    Income,
}

impl CategoryKind {
    fn as_str(&self) -> &'static str {
        match self {
            CategoryKind::Expense => "expense",
            CategoryKind::Income => "income",
        }
    }
}

impl Display for CategoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for CategoryKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for CategoryKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "expense" => Ok(CategoryKind::Expense),
            "income" => Ok(CategoryKind::Income),
            other => Err(FromSqlError::Other(
                format!("invalid category kind {other:?}").into(),
            )),
        }
    }
}

/// A validated, non-empty category name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct CategoryName(String);

impl CategoryName {
    /// Create a category name.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::EmptyCategoryName] if `name` is
    /// empty or only whitespace.
    pub fn new(name: &str) -> Result<Self, Error> {
        let name = name.trim();

        if name.is_empty() {
            Err(Error::EmptyCategoryName)
        } else {
            Ok(Self(name.to_string()))
        }
    }

    /// Create a category name without validation.
    ///
    /// The caller should ensure that the string is not empty.
    pub fn new_unchecked(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl AsRef<str> for CategoryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for CategoryName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CategoryName::new(s)
    }
}

impl Display for CategoryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user-defined category for expenses or incomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct Category {
    /// The ID of the category.
    pub id: CategoryId,
    /// The user that owns the category.
    pub user_id: UserID,
    /// The display name of the category.
    pub name: CategoryName,
    /// Whether the category applies to expenses or incomes.
    pub kind: CategoryKind,
}

/// Create a category for `user_id` and return it with its generated ID.
pub fn create_category(
    user_id: UserID,
    name: CategoryName,
    kind: CategoryKind,
    connection: &Connection,
) -> Result<Category, Error> {
    connection.execute(
        "INSERT INTO category (user_id, name, kind) VALUES (?1, ?2, ?3);",
        (user_id, name.as_ref(), kind),
    )?;

    let id = connection.last_insert_rowid();

    Ok(Category {
        id,
        user_id,
        name,
        kind,
    })
}

/// Retrieve a single category owned by `user_id`.
///
/// # Errors
/// Returns [Error::NotFound] if the category does not exist or belongs to
/// another user.
pub fn get_category(
    category_id: CategoryId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Category, Error> {
    connection
        .prepare(
            "SELECT id, user_id, name, kind FROM category WHERE id = :id AND user_id = :user_id;",
        )?
        .query_row(
            rusqlite::named_params! {":id": category_id, ":user_id": user_id},
            map_category_row,
        )
        .map_err(|error| error.into())
}

/// Retrieve a user's categories ordered alphabetically by name.
///
/// When `kind` is given only categories of that kind are returned.
pub fn get_categories(
    user_id: UserID,
    kind: Option<CategoryKind>,
    connection: &Connection,
) -> Result<Vec<Category>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, name, kind FROM category
             WHERE user_id = :user_id AND (:kind IS NULL OR kind = :kind)
             ORDER BY name ASC;",
        )?
        .query_map(
            rusqlite::named_params! {":user_id": user_id, ":kind": kind},
            map_category_row,
        )?
        .map(|maybe_category| maybe_category.map_err(|error| error.into()))
        .collect()
}

/// Check that `category_id` is a category of `kind` owned by `user_id`.
///
/// # Errors
/// Returns [Error::InvalidCategory] if it is not.
pub(crate) fn validate_category(
    category_id: Option<CategoryId>,
    kind: CategoryKind,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let Some(category_id) = category_id else {
        return Ok(());
    };

    match get_category(category_id, user_id, connection) {
        Ok(category) if category.kind == kind => Ok(()),
        Ok(_) | Err(Error::NotFound) => Err(Error::InvalidCategory(category_id, kind)),
        Err(error) => Err(error),
    }
}

/// Delete a category owned by `user_id`.
///
/// Expenses and incomes in the category become uncategorised and budgets
/// for the category are deleted.
///
/// # Errors
/// Returns [Error::DeleteMissingCategory] if the category doesn't exist.
pub fn delete_category(
    category_id: CategoryId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM category WHERE id = ?1 AND user_id = ?2",
        (category_id, user_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingCategory);
    }

    tracing::info!("Deleted category {category_id} for user {user_id}");

    Ok(())
}

/// Initialize the category table and indexes.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS category (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            kind TEXT NOT NULL DEFAULT 'expense',
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_category_user ON category(user_id, name);",
    )?;

    Ok(())
}

fn map_category_row(row: &Row) -> Result<Category, rusqlite::Error> {
    let id = row.get(0)?;
    let user_id = row.get(1)?;
    let raw_name: String = row.get(2)?;
    let name = CategoryName::new_unchecked(&raw_name);
    let kind = row.get(3)?;

    Ok(Category {
        id,
        user_id,
        name,
        kind,
    })
}


#[cfg(test)]
mod category_query_tests {
    use rusqlite::Connection;

    use time::macros::date;

    use crate::{
        Error, Money,
        category::{
            CategoryKind, CategoryName, create_category, delete_category, get_categories,
            get_category, validate_category,
        },
        db::initialize,
        ledger::{Expense, Income, create_expense, create_income, get_expense, get_income},
        user::create_user,
    };

    fn get_test_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        connection
    }

    #[test]
    fn create_and_get_category() {
        let connection = get_test_connection();
        let user = create_user("alice", &connection).unwrap();

        let category = create_category(
            user.id,
            CategoryName::new_unchecked("Groceries"),
            CategoryKind::Expense,
            &connection,
        )
        .unwrap();

        assert!(category.id > 0);
        assert_eq!(get_category(category.id, user.id, &connection), Ok(category));
    }

    #[test]
    fn get_category_of_other_user_is_not_found() {
        let connection = get_test_connection();
        let alice = create_user("alice", &connection).unwrap();
        let bob = create_user("bob", &connection).unwrap();
        let category = create_category(
            alice.id,
            CategoryName::new_unchecked("Groceries"),
            CategoryKind::Expense,
            &connection,
        )
        .unwrap();

        assert_eq!(
            get_category(category.id, bob.id, &connection),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn get_categories_filters_by_kind_and_sorts_by_name() {
        let connection = get_test_connection();
        let user = create_user("alice", &connection).unwrap();
        for (name, kind) in [
            ("Rent", CategoryKind::Expense),
            ("Salary", CategoryKind::Income),
            ("Groceries", CategoryKind::Expense),
        ] {
            create_category(user.id, CategoryName::new_unchecked(name), kind, &connection)
                .unwrap();
        }

        let expenses = get_categories(user.id, Some(CategoryKind::Expense), &connection).unwrap();
        let all = get_categories(user.id, None, &connection).unwrap();

        let names: Vec<_> = expenses.iter().map(|c| c.name.as_ref()).collect();
        assert_eq!(names, ["Groceries", "Rent"]);
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn validate_rejects_wrong_kind() {
        let connection = get_test_connection();
        let user = create_user("alice", &connection).unwrap();
        let salary = create_category(
            user.id,
            CategoryName::new_unchecked("Salary"),
            CategoryKind::Income,
            &connection,
        )
        .unwrap();

        assert_eq!(
            validate_category(Some(salary.id), CategoryKind::Expense, user.id, &connection),
            Err(Error::InvalidCategory(salary.id, CategoryKind::Expense))
        );
        assert_eq!(
            validate_category(Some(salary.id), CategoryKind::Income, user.id, &connection),
            Ok(())
        );
        assert_eq!(
            validate_category(None, CategoryKind::Expense, user.id, &connection),
            Ok(())
        );
    }

    #[test]
    fn deleting_category_uncategorises_expenses_and_incomes() {
        let connection = get_test_connection();
        let user = create_user("alice", &connection).unwrap();
        let groceries = create_category(
            user.id,
            CategoryName::new_unchecked("Groceries"),
            CategoryKind::Expense,
            &connection,
        )
        .unwrap();
        let salary = create_category(
            user.id,
            CategoryName::new_unchecked("Salary"),
            CategoryKind::Income,
            &connection,
        )
        .unwrap();
        let expense = create_expense(
            user.id,
            Expense::build(Money::from_cents(12_00), date!(2025 - 03 - 02), "Bread")
                .category_id(Some(groceries.id)),
            &connection,
        )
        .unwrap();
        let income = create_income(
            user.id,
            Income::build(Money::from_cents(500_00), date!(2025 - 03 - 01), "Employer")
                .category_id(Some(salary.id)),
            &connection,
        )
        .unwrap();

        delete_category(groceries.id, user.id, &connection).unwrap();
        delete_category(salary.id, user.id, &connection).unwrap();

        let expense = get_expense(expense.id, user.id, &connection).unwrap();
        let income = get_income(income.id, user.id, &connection).unwrap();
        assert_eq!(expense.category_id, None);
        assert_eq!(expense.amount, Money::from_cents(12_00));
        assert_eq!(income.category_id, None);
        assert_eq!(income.amount, Money::from_cents(500_00));
    }

    #[test]
    fn delete_missing_category_fails() {
        let connection = get_test_connection();
        let user = create_user("alice", &connection).unwrap();

        assert_eq!(
            delete_category(99, user.id, &connection),
            Err(Error::DeleteMissingCategory)
        );
    }
}
